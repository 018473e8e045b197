// Log Repository Port (Interface)

use crate::domain::{LogEntry, NewLogEntry};
use crate::error::Result;
use async_trait::async_trait;

/// Append-only diagnostic log storage
#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Append an entry, returning its id
    async fn append(&self, entry: &NewLogEntry) -> Result<i64>;

    /// Most recent entries, id descending
    async fn recent(&self, limit: i64) -> Result<Vec<LogEntry>>;

    /// Total number of entries
    async fn count(&self) -> Result<i64>;

    /// Keep the `keep` highest ids and delete the rest in one statement.
    ///
    /// The threshold is taken from the kept set, so no entry is expired
    /// by age. Returns the number of deleted entries (0 when fewer than
    /// `keep` exist).
    async fn retain_latest(&self, keep: i64) -> Result<u64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory log repository
    #[derive(Default)]
    pub struct InMemoryLogRepository {
        entries: Mutex<Vec<LogEntry>>,
        fail_writes: AtomicBool,
    }

    impl InMemoryLogRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn entries(&self) -> Vec<LogEntry> {
            self.entries.lock().unwrap().clone()
        }

        /// Make every subsequent append fail
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl LogRepository for InMemoryLogRepository {
        async fn append(&self, entry: &NewLogEntry) -> Result<i64> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Database("log store unavailable".to_string()));
            }
            let mut entries = self.entries.lock().unwrap();
            let id = entries.last().map(|e| e.id).unwrap_or(0) + 1;
            entries.push(LogEntry {
                id,
                level: entry.level,
                message: entry.message.clone(),
                context: entry.context.clone(),
                created: entry.created,
            });
            Ok(id)
        }

        async fn recent(&self, limit: i64) -> Result<Vec<LogEntry>> {
            let entries = self.entries.lock().unwrap();
            Ok(entries
                .iter()
                .rev()
                .take(limit.max(0) as usize)
                .cloned()
                .collect())
        }

        async fn count(&self) -> Result<i64> {
            Ok(self.entries.lock().unwrap().len() as i64)
        }

        async fn retain_latest(&self, keep: i64) -> Result<u64> {
            let mut entries = self.entries.lock().unwrap();
            let keep = keep.max(0) as usize;
            if entries.len() <= keep {
                return Ok(0);
            }
            let mut ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
            ids.sort_unstable_by(|a, b| b.cmp(a));
            let threshold = match keep {
                0 => i64::MAX,
                n => ids[n - 1],
            };
            let before = entries.len();
            entries.retain(|e| e.id >= threshold);
            Ok((before - entries.len()) as u64)
        }
    }
}
