// Market Data Service
// On-demand read path: each domain goes through the FreshnessCache

use super::constants::{HISTORY_LOOKBACK_EXTRA_DAYS, HISTORY_LOOKBACK_MONTHS};
use super::freshness::{CacheLookup, FreshnessCache};
use crate::domain::{
    CachePayload, Domain, Freshness, HistoryPoint, MoversSnapshot, NewsItem, QuoteSnapshot,
    SymbolKey, SymbolRecord,
};
use crate::error::{AppError, Result};
use crate::port::{IndexRepository, MarketFetcher, TimeProvider};
use chrono::{DateTime, Days, Months, NaiveDate};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Decoded payload plus where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub freshness: Freshness,
    /// `updated_at` of the backing record (epoch ms)
    pub updated_at: i64,
}

impl<T: DeserializeOwned> Cached<T> {
    fn decode(lookup: CacheLookup) -> Result<Self> {
        Ok(Self {
            value: lookup.record.payload.decode()?,
            freshness: lookup.freshness,
            updated_at: lookup.record.updated_at,
        })
    }
}

/// History window ending on `today`: five years plus sixty days back
pub fn history_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let from = today
        .checked_sub_months(Months::new(HISTORY_LOOKBACK_MONTHS))
        .and_then(|d| d.checked_sub_days(Days::new(HISTORY_LOOKBACK_EXTRA_DAYS as u64)))
        .unwrap_or(NaiveDate::MIN);
    (from, today)
}

pub struct MarketDataService {
    cache: Arc<FreshnessCache>,
    fetcher: Arc<dyn MarketFetcher>,
    indexes: Arc<dyn IndexRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl MarketDataService {
    pub fn new(
        cache: Arc<FreshnessCache>,
        fetcher: Arc<dyn MarketFetcher>,
        indexes: Arc<dyn IndexRepository>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            indexes,
            time_provider,
        }
    }

    pub async fn quote(&self, symbol: &str) -> Result<Cached<QuoteSnapshot>> {
        let key = SymbolKey::parse(symbol)?;
        let fetcher = self.fetcher.clone();
        let symbol = key.to_string();
        let lookup = self
            .cache
            .get_or_fetch(Domain::Quote, &key, || async move {
                let quote = fetcher.fetch_quote(&symbol).await?;
                Ok::<_, AppError>(CachePayload::encode(&quote)?)
            })
            .await?;
        Cached::decode(lookup)
    }

    /// Daily history, ascending by date
    pub async fn history(&self, symbol: &str) -> Result<Cached<Vec<HistoryPoint>>> {
        let key = SymbolKey::parse(symbol)?;
        let today = DateTime::from_timestamp_millis(self.time_provider.now_millis())
            .map(|dt| dt.date_naive())
            .ok_or_else(|| AppError::Internal("clock out of range".to_string()))?;
        let (from, to) = history_window(today);

        let fetcher = self.fetcher.clone();
        let symbol = key.to_string();
        let lookup = self
            .cache
            .get_or_fetch(Domain::History, &key, || async move {
                let mut points = fetcher.fetch_history(&symbol, from, to).await?;
                points.sort_by_key(|p| p.date);
                Ok::<_, AppError>(CachePayload::encode(&points)?)
            })
            .await?;
        Cached::decode(lookup)
    }

    /// Top movers of a reference index. Fails with `NotFound` for unknown indexes.
    pub async fn movers(&self, index_symbol: &str) -> Result<Cached<MoversSnapshot>> {
        let key = SymbolKey::parse(index_symbol)?;
        let index = self
            .indexes
            .find_by_symbol(&key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("index {}", key)))?;

        let fetcher = self.fetcher.clone();
        let lookup = self
            .cache
            .get_or_fetch(Domain::Movers, &key, || async move {
                let movers = fetcher.fetch_movers(&index).await?;
                Ok::<_, AppError>(CachePayload::encode(&movers)?)
            })
            .await?;
        Cached::decode(lookup)
    }

    pub async fn news(&self, symbol: &str) -> Result<Cached<Vec<NewsItem>>> {
        let key = SymbolKey::parse(symbol)?;
        let fetcher = self.fetcher.clone();
        let symbol = key.to_string();
        let lookup = self
            .cache
            .get_or_fetch(Domain::News, &key, || async move {
                let news = fetcher.fetch_news(&symbol).await?;
                Ok::<_, AppError>(CachePayload::encode(&news)?)
            })
            .await?;
        Cached::decode(lookup)
    }

    /// Constituents of a reference index, populated once from its stock list source
    pub async fn constituents(&self, index_symbol: &str) -> Result<Cached<Vec<SymbolRecord>>> {
        let key = SymbolKey::parse(index_symbol)?;
        let index = self
            .indexes
            .find_by_symbol(&key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("index {}", key)))?;
        let source = index.stock_list.ok_or_else(|| {
            AppError::Validation(format!("index {} has no stock list source", key))
        })?;

        let fetcher = self.fetcher.clone();
        let lookup = self
            .cache
            .get_or_fetch(Domain::Constituents, &key, || async move {
                let symbols = fetcher.fetch_symbol_list(&source).await?;
                Ok::<_, AppError>(CachePayload::encode(&symbols)?)
            })
            .await?;
        Cached::decode(lookup)
    }
}
