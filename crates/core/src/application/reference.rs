// Reference Data Service
// Seeds declared indexes once; existing indexes are never modified

use crate::domain::{MarketIndex, SymbolKey};
use crate::error::Result;
use crate::port::{IndexRepository, TimeProvider};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

pub struct ReferenceService {
    repo: Arc<dyn IndexRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl ReferenceService {
    pub fn new(repo: Arc<dyn IndexRepository>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            repo,
            time_provider,
        }
    }

    /// Insert declared indexes whose normalized symbol is not stored yet.
    /// Returns the number inserted; a second call with the same input inserts nothing.
    pub async fn reconcile_indexes(&self, declared: &[MarketIndex]) -> Result<u64> {
        let mut known: HashSet<SymbolKey> = HashSet::new();
        for index in self.repo.list_all().await? {
            known.insert(SymbolKey::parse(&index.symbol)?);
        }

        let now = self.time_provider.now_millis();
        let mut missing = Vec::new();
        for index in declared {
            let key = SymbolKey::parse(&index.symbol)?;
            if !known.insert(key.clone()) {
                continue;
            }
            let mut index = index.clone();
            index.symbol = key.to_string();
            index.stamp_created(now);
            missing.push(index);
        }

        if missing.is_empty() {
            return Ok(0);
        }
        let inserted = self.repo.insert_many(&missing).await?;
        info!(inserted, "Reference indexes seeded");
        Ok(inserted)
    }

    pub async fn list_indexes(&self) -> Result<Vec<MarketIndex>> {
        self.repo.list_all().await
    }
}
