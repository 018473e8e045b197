// Marketfeed Infrastructure - SQLite Adapter
// Implements: CacheRepository, JobRepository, LogRepository, IndexRepository

mod cache_repository;
mod connection;
mod error;
mod index_repository;
mod job_repository;
mod log_repository;
mod migration;

pub use cache_repository::SqliteCacheRepository;
pub use connection::{create_pool, is_memory_url};
pub use index_repository::SqliteIndexRepository;
pub use job_repository::SqliteJobRepository;
pub use log_repository::SqliteLogRepository;
pub use migration::run_migrations;

// Note: sqlx::Error conversion is handled by a helper (error::map_sqlx_error)
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
