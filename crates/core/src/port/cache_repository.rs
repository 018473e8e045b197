// Cache Repository Port (Interface)

use crate::domain::{CachePayload, CacheRecord, Domain, SymbolKey};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence for freshness-cache records.
///
/// Implementations provide per-record atomicity only; the single-record
/// invariant per (domain, key) is enforced by `insert` being an upsert and
/// `replace` deleting and inserting as one unit.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Most recent record for (domain, key)
    async fn find(&self, domain: Domain, key: &SymbolKey) -> Result<Option<CacheRecord>>;

    /// Insert a record with `created_at = updated_at = now`.
    /// A concurrent writer for the same key wins last (upsert).
    async fn insert(
        &self,
        domain: Domain,
        key: &SymbolKey,
        payload: &CachePayload,
        now: i64,
    ) -> Result<CacheRecord>;

    /// Update payload and `updated_at` of an existing record in place
    async fn update_payload(&self, id: i64, payload: &CachePayload, updated_at: i64) -> Result<()>;

    /// Delete every record for (domain, key) and insert a fresh one, atomically
    async fn replace(
        &self,
        domain: Domain,
        key: &SymbolKey,
        payload: &CachePayload,
        now: i64,
    ) -> Result<CacheRecord>;

    /// Delete every record for (domain, key)
    async fn delete(&self, domain: Domain, key: &SymbolKey) -> Result<u64>;

    /// Count records for (domain, key)
    async fn count(&self, domain: Domain, key: &SymbolKey) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory cache repository
    #[derive(Default)]
    pub struct InMemoryCacheRepository {
        records: Mutex<Vec<CacheRecord>>,
        next_id: Mutex<i64>,
        fail_writes: AtomicBool,
    }

    impl InMemoryCacheRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every write fail with a database error
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn all(&self) -> Vec<CacheRecord> {
            self.records.lock().unwrap().clone()
        }

        fn check_writable(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Database("simulated write failure".to_string()));
            }
            Ok(())
        }

        fn allocate_id(&self) -> i64 {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        }
    }

    #[async_trait]
    impl CacheRepository for InMemoryCacheRepository {
        async fn find(&self, domain: Domain, key: &SymbolKey) -> Result<Option<CacheRecord>> {
            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .filter(|r| r.domain == domain && r.key == key.as_str())
                .max_by_key(|r| (r.updated_at, r.id))
                .cloned())
        }

        async fn insert(
            &self,
            domain: Domain,
            key: &SymbolKey,
            payload: &CachePayload,
            now: i64,
        ) -> Result<CacheRecord> {
            self.check_writable()?;
            let mut records = self.records.lock().unwrap();
            if let Some(existing) = records
                .iter_mut()
                .find(|r| r.domain == domain && r.key == key.as_str())
            {
                existing.payload = payload.clone();
                existing.updated_at = now;
                return Ok(existing.clone());
            }
            let record = CacheRecord {
                id: self.allocate_id(),
                domain,
                key: key.to_string(),
                payload: payload.clone(),
                created_at: now,
                updated_at: now,
            };
            records.push(record.clone());
            Ok(record)
        }

        async fn update_payload(
            &self,
            id: i64,
            payload: &CachePayload,
            updated_at: i64,
        ) -> Result<()> {
            self.check_writable()?;
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| AppError::NotFound(format!("cache record {}", id)))?;
            record.payload = payload.clone();
            record.updated_at = updated_at;
            Ok(())
        }

        async fn replace(
            &self,
            domain: Domain,
            key: &SymbolKey,
            payload: &CachePayload,
            now: i64,
        ) -> Result<CacheRecord> {
            self.check_writable()?;
            let record = CacheRecord {
                id: self.allocate_id(),
                domain,
                key: key.to_string(),
                payload: payload.clone(),
                created_at: now,
                updated_at: now,
            };
            let mut records = self.records.lock().unwrap();
            records.retain(|r| !(r.domain == domain && r.key == key.as_str()));
            records.push(record.clone());
            Ok(record)
        }

        async fn delete(&self, domain: Domain, key: &SymbolKey) -> Result<u64> {
            self.check_writable()?;
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| !(r.domain == domain && r.key == key.as_str()));
            Ok((before - records.len()) as u64)
        }

        async fn count(&self, domain: Domain, key: &SymbolKey) -> Result<i64> {
            let records = self.records.lock().unwrap();
            Ok(records
                .iter()
                .filter(|r| r.domain == domain && r.key == key.as_str())
                .count() as i64)
        }
    }
}
