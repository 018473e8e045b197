// Marketfeed Core - Domain Logic, Ports & Refresh Engine
// NO infrastructure dependencies (storage and fetching live behind ports)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
