// Freshness Cache
// Per-domain TTL policy over a CacheRepository: reuse a fresh record,
// refetch a stale one, degrade to last-known-good on refresh failure

pub mod policy;

pub use policy::{CachePolicies, DomainPolicy, RefreshFailurePolicy, ReplaceStrategy, Ttl};

use crate::application::diagnostics::DiagnosticLog;
use crate::domain::{CachePayload, CacheRecord, Domain, Freshness, SymbolKey};
use crate::error::{AppError, Result};
use crate::port::{CacheRepository, TimeProvider};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Result of a cache lookup: the record served and how it was obtained
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub record: CacheRecord,
    pub freshness: Freshness,
}

/// Freshness cache shared by every domain service.
///
/// Keys are normalized (`SymbolKey`) before lookup, fetch and store.
/// Same-key concurrent calls may both refetch; the last writer wins.
pub struct FreshnessCache {
    repo: Arc<dyn CacheRepository>,
    diagnostics: Arc<DiagnosticLog>,
    time_provider: Arc<dyn TimeProvider>,
    policies: CachePolicies,
}

impl FreshnessCache {
    pub fn new(
        repo: Arc<dyn CacheRepository>,
        diagnostics: Arc<DiagnosticLog>,
        time_provider: Arc<dyn TimeProvider>,
        policies: CachePolicies,
    ) -> Self {
        Self {
            repo,
            diagnostics,
            time_provider,
            policies,
        }
    }

    pub fn policies(&self) -> &CachePolicies {
        &self.policies
    }

    /// Return the record for (domain, key), fetching only when absent or stale.
    ///
    /// - absent: fetch, insert, return `Fetched`. Fetch errors propagate, nothing is written.
    /// - fresh (`age <= ttl`): return `Cached`, no fetch, no write.
    /// - stale: fetch and replace per the domain's strategy. On a fetch error the
    ///   stale record is returned as `Stale` (or the error propagates, per policy).
    ///
    /// Store errors always propagate.
    #[instrument(skip(self, fetch), fields(domain = %domain, key = %key))]
    pub async fn get_or_fetch<F, Fut>(
        &self,
        domain: Domain,
        key: &SymbolKey,
        fetch: F,
    ) -> Result<CacheLookup>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<CachePayload>> + Send,
    {
        let policy = *self.policies.for_domain(domain);

        let existing = match self.repo.find(domain, key).await? {
            None => {
                let payload = fetch().await?;
                let now = self.time_provider.now_millis();
                let record = self.repo.insert(domain, key, &payload, now).await?;
                debug!(record_id = record.id, "Cache miss populated");
                return Ok(CacheLookup {
                    record,
                    freshness: Freshness::Fetched,
                });
            }
            Some(record) => record,
        };

        let age = existing.age_millis(self.time_provider.now_millis());
        if policy.ttl.is_fresh(age) {
            debug!(record_id = existing.id, age_ms = age, "Cache hit");
            return Ok(CacheLookup {
                record: existing,
                freshness: Freshness::Cached,
            });
        }

        match fetch().await {
            Ok(payload) => {
                let now = self.time_provider.now_millis();
                let record = match policy.replace {
                    ReplaceStrategy::UpdateInPlace => {
                        self.repo.update_payload(existing.id, &payload, now).await?;
                        CacheRecord {
                            payload,
                            updated_at: now,
                            ..existing
                        }
                    }
                    ReplaceStrategy::DeleteThenInsert => {
                        self.repo.replace(domain, key, &payload, now).await?
                    }
                };
                debug!(record_id = record.id, age_ms = age, "Stale record refreshed");
                Ok(CacheLookup {
                    record,
                    freshness: Freshness::Fetched,
                })
            }
            Err(AppError::Fetch(err))
                if self.policies.on_refresh_failure == RefreshFailurePolicy::ServeStale =>
            {
                let context = format!("{}:{}", domain, key);
                self.diagnostics
                    .error(
                        format!("Refresh failed, serving last-known-good: {}", err),
                        Some(&context),
                    )
                    .await?;
                Ok(CacheLookup {
                    record: existing,
                    freshness: Freshness::Stale {
                        error: err.to_string(),
                    },
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Current record without any fetch
    pub async fn peek(&self, domain: Domain, key: &SymbolKey) -> Result<Option<CacheRecord>> {
        self.repo.find(domain, key).await
    }

    /// Drop every record for (domain, key); the next lookup refetches
    pub async fn invalidate(&self, domain: Domain, key: &SymbolKey) -> Result<u64> {
        self.repo.delete(domain, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::cache_repository::mocks::InMemoryCacheRepository;
    use crate::port::log_repository::mocks::InMemoryLogRepository;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use crate::port::FetchError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    const NEWS_STALE_AT: i64 = 4 * 3_600_000 + 1;

    struct Fixture {
        cache: FreshnessCache,
        repo: Arc<InMemoryCacheRepository>,
        logs: Arc<InMemoryLogRepository>,
        clock: Arc<ManualTimeProvider>,
        fetches: Arc<AtomicUsize>,
    }

    fn fixture(policies: CachePolicies) -> Fixture {
        let repo = Arc::new(InMemoryCacheRepository::new());
        let logs = Arc::new(InMemoryLogRepository::new());
        let clock = Arc::new(ManualTimeProvider::new(0));
        let diagnostics = Arc::new(DiagnosticLog::new(logs.clone(), clock.clone()));
        let cache = FreshnessCache::new(repo.clone(), diagnostics, clock.clone(), policies);
        Fixture {
            cache,
            repo,
            logs,
            clock,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    impl Fixture {
        async fn get(&self, domain: Domain, raw: &str) -> Result<CacheLookup> {
            let key = SymbolKey::parse(raw)?;
            let fetches = self.fetches.clone();
            self.cache
                .get_or_fetch(domain, &key, || async move {
                    let n = fetches.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok::<_, AppError>(CachePayload::new(json!({ "n": n })))
                })
                .await
        }

        async fn get_failing(&self, domain: Domain, raw: &str) -> Result<CacheLookup> {
            let key = SymbolKey::parse(raw)?;
            let fetches = self.fetches.clone();
            self.cache
                .get_or_fetch(domain, &key, || async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Err::<CachePayload, _>(AppError::from(FetchError::Network(
                        "connection refused".into(),
                    )))
                })
                .await
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_quote_scenario_30s_cached_61s_refetched() {
        let f = fixture(CachePolicies::default());

        let first = f.get(Domain::Quote, "AAPL").await.unwrap();
        assert_eq!(first.freshness, Freshness::Fetched);
        assert_eq!(f.fetch_count(), 1);

        f.clock.set(30_000);
        let second = f.get(Domain::Quote, "AAPL").await.unwrap();
        assert_eq!(second.freshness, Freshness::Cached);
        assert_eq!(second.record.payload, first.record.payload);
        assert_eq!(f.fetch_count(), 1);

        f.clock.set(61_000);
        let third = f.get(Domain::Quote, "AAPL").await.unwrap();
        assert_eq!(third.freshness, Freshness::Fetched);
        assert_eq!(f.fetch_count(), 2);
        assert_eq!(third.record.updated_at, 61_000);
        assert_eq!(third.record.created_at, 0);
        assert_eq!(third.record.id, first.record.id);
    }

    #[tokio::test]
    async fn test_ttl_boundary_for_every_finite_domain() {
        for domain in [Domain::Quote, Domain::History, Domain::Movers, Domain::News] {
            let f = fixture(CachePolicies::default());
            let ttl = match f.cache.policies().for_domain(domain).ttl {
                Ttl::Finite(ttl) => ttl.as_millis() as i64,
                Ttl::Infinite => unreachable!(),
            };

            f.get(domain, "MSFT").await.unwrap();
            f.clock.set(ttl - 1);
            f.get(domain, "MSFT").await.unwrap();
            assert_eq!(f.fetch_count(), 1, "{} refetched before ttl", domain);

            f.clock.set(ttl + 1);
            f.get(domain, "MSFT").await.unwrap();
            assert_eq!(f.fetch_count(), 2, "{} not refetched after ttl", domain);
        }
    }

    #[tokio::test]
    async fn test_constituents_never_refresh() {
        let f = fixture(CachePolicies::default());
        f.get(Domain::Constituents, "^GSPC").await.unwrap();
        f.clock.set(10 * 365 * 86_400_000);
        let lookup = f.get(Domain::Constituents, "^GSPC").await.unwrap();
        assert_eq!(lookup.freshness, Freshness::Cached);
        assert_eq!(f.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_single_record_after_many_refreshes() {
        let f = fixture(CachePolicies::default());
        for domain in Domain::ALL {
            for step in 0..5 {
                f.clock.set(step * 100 * 86_400_000);
                f.get(domain, "IBM").await.unwrap();
            }
            let key = SymbolKey::parse("IBM").unwrap();
            assert_eq!(f.repo.count(domain, &key).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_key_normalization_shares_record() {
        let f = fixture(CachePolicies::default());
        let a = f.get(Domain::Quote, "msft").await.unwrap();
        let b = f.get(Domain::Quote, "MSFT").await.unwrap();
        let c = f.get(Domain::Quote, " MSFT ").await.unwrap();

        assert_eq!(f.fetch_count(), 1);
        assert_eq!(a.record.id, b.record.id);
        assert_eq!(b.record.id, c.record.id);
        assert_eq!(c.record.key, "MSFT");
        assert_eq!(f.repo.all().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_then_insert_replaces_record() {
        let f = fixture(CachePolicies::default());
        let first = f.get(Domain::News, "TSLA").await.unwrap();
        f.clock.set(NEWS_STALE_AT);
        let second = f.get(Domain::News, "TSLA").await.unwrap();

        assert_ne!(second.record.id, first.record.id);
        assert_eq!(second.record.created_at, NEWS_STALE_AT);
        assert_eq!(f.repo.all().len(), 1);
    }

    #[tokio::test]
    async fn test_first_fetch_failure_propagates_without_write() {
        let f = fixture(CachePolicies::default());
        let err = assert_err!(f.get_failing(Domain::Quote, "AAPL").await);
        assert!(err.is_fetch());
        assert!(f.repo.all().is_empty());
    }

    #[tokio::test]
    async fn test_stale_refresh_failure_serves_last_known_good() {
        let f = fixture(CachePolicies::default());
        let first = f.get(Domain::Quote, "AAPL").await.unwrap();

        f.clock.set(120_000);
        let lookup = assert_ok!(f.get_failing(Domain::Quote, "AAPL").await);

        assert!(lookup.freshness.is_stale());
        assert_eq!(lookup.record, first.record);
        let logs = f.logs.entries();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, crate::domain::LogLevel::Error);
        assert_eq!(logs[0].context.as_deref(), Some("quote:AAPL"));
    }

    #[tokio::test]
    async fn test_stale_refresh_failure_propagates_when_configured() {
        let f = fixture(
            CachePolicies::default().with_refresh_failure(RefreshFailurePolicy::Propagate),
        );
        f.get(Domain::Quote, "AAPL").await.unwrap();
        f.clock.set(120_000);

        let err = assert_err!(f.get_failing(Domain::Quote, "AAPL").await);
        assert!(err.is_fetch());
        assert!(f.logs.entries().is_empty());
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let f = fixture(CachePolicies::default());
        f.repo.set_fail_writes(true);
        let err = assert_err!(f.get(Domain::Quote, "AAPL").await);
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let f = fixture(
            CachePolicies::default().with_ttl(Domain::Quote, Ttl::Finite(Duration::from_secs(600))),
        );
        f.get(Domain::Quote, "AAPL").await.unwrap();
        let key = SymbolKey::parse("aapl").unwrap();
        assert_eq!(f.cache.invalidate(Domain::Quote, &key).await.unwrap(), 1);
        assert!(f.cache.peek(Domain::Quote, &key).await.unwrap().is_none());

        f.get(Domain::Quote, "AAPL").await.unwrap();
        assert_eq!(f.fetch_count(), 2);
    }
}
