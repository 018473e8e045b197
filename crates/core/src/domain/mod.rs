// Domain Layer - Pure business logic and entities

pub mod cache;
pub mod error;
pub mod job;
pub mod log;
pub mod market;
pub mod symbol;

// Re-exports
pub use cache::{CachePayload, CacheRecord, Domain, Freshness};
pub use error::DomainError;
pub use job::{Job, JobId, JobRun, JobSpec, LastRunAtPolicy, RunOutcome};
pub use log::{LogEntry, LogLevel, NewLogEntry};
pub use market::{
    HistoryPoint, MarketIndex, MarketMover, MoveDirection, MoversSnapshot, NewsItem,
    QuoteSnapshot, StockListSource, SymbolListFormat, SymbolRecord,
};
pub use symbol::SymbolKey;
