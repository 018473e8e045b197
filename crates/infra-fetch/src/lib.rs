// Marketfeed Infrastructure - HTTP Fetch Adapter
// Implements: MarketFetcher (Yahoo chart/search APIs, movers pages, constituent lists)

mod client;
pub mod movers;
mod session;
pub mod symbols;
mod yahoo;

pub use client::{FetchConfig, HttpMarketFetcher};
pub use session::{PageSession, SessionTracker};
