// Reference Index Repository Port (Interface)

use crate::domain::{MarketIndex, SymbolKey};
use crate::error::Result;
use async_trait::async_trait;

/// Storage for reference indexes (populate-once, never refreshed)
#[async_trait]
pub trait IndexRepository: Send + Sync {
    /// All indexes in insertion order
    async fn list_all(&self) -> Result<Vec<MarketIndex>>;

    async fn find_by_symbol(&self, symbol: &SymbolKey) -> Result<Option<MarketIndex>>;

    /// Insert several indexes at once, returning how many were written
    async fn insert_many(&self, indexes: &[MarketIndex]) -> Result<u64>;
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// In-memory index repository
    #[derive(Default)]
    pub struct InMemoryIndexRepository {
        indexes: Mutex<Vec<MarketIndex>>,
    }

    impl InMemoryIndexRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(indexes: Vec<MarketIndex>) -> Self {
            Self {
                indexes: Mutex::new(indexes),
            }
        }
    }

    #[async_trait]
    impl IndexRepository for InMemoryIndexRepository {
        async fn list_all(&self) -> Result<Vec<MarketIndex>> {
            Ok(self.indexes.lock().unwrap().clone())
        }

        async fn find_by_symbol(&self, symbol: &SymbolKey) -> Result<Option<MarketIndex>> {
            Ok(self
                .indexes
                .lock()
                .unwrap()
                .iter()
                .find(|i| i.symbol == symbol.as_str())
                .cloned())
        }

        async fn insert_many(&self, indexes: &[MarketIndex]) -> Result<u64> {
            self.indexes.lock().unwrap().extend_from_slice(indexes);
            Ok(indexes.len() as u64)
        }
    }
}
