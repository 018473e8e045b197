// Port Layer - Interfaces for external dependencies

pub mod cache_repository;
pub mod fetcher;
pub mod id_provider; // For deterministic testing
pub mod index_repository;
pub mod job_repository;
pub mod log_repository;
pub mod time_provider;

// Re-exports
pub use cache_repository::CacheRepository;
pub use fetcher::{FetchError, MarketFetcher};
pub use id_provider::IdProvider;
pub use index_repository::IndexRepository;
pub use job_repository::JobRepository;
pub use log_repository::LogRepository;
pub use time_provider::TimeProvider;
