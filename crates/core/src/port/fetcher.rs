// Market Fetcher Port (Interface)
// Abstraction over every external source (quote/history/news API,
// movers page, constituent lists)

use crate::domain::{
    HistoryPoint, MarketIndex, MoversSnapshot, NewsItem, QuoteSnapshot, StockListSource,
    SymbolRecord,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// Fetch errors (external source unavailable or malformed)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No data returned for {0}")]
    Empty(String),
}

/// Market data fetcher
///
/// Implementations:
/// - HttpMarketFetcher: Yahoo APIs, movers page, CSV/HTML constituent lists
/// - ScriptedFetcher: deterministic test double (see `mocks`)
#[async_trait]
pub trait MarketFetcher: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<QuoteSnapshot, FetchError>;

    /// Daily bars in `[from, to]`, ascending by date
    async fn fetch_history(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoryPoint>, FetchError>;

    /// Top gainers / losers of an index
    async fn fetch_movers(&self, index: &MarketIndex) -> Result<MoversSnapshot, FetchError>;

    async fn fetch_news(&self, symbol: &str) -> Result<Vec<NewsItem>, FetchError>;

    /// Constituents from a CSV or tabular-HTML source
    async fn fetch_symbol_list(
        &self,
        source: &StockListSource,
    ) -> Result<Vec<SymbolRecord>, FetchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Deterministic fetcher: every call succeeds with generated data
    /// (the quote price is the per-symbol call count) unless failures are on.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        calls: Mutex<HashMap<String, usize>>,
        failing: AtomicBool,
        symbol_list: Mutex<Vec<SymbolRecord>>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_symbol_list(symbols: Vec<SymbolRecord>) -> Self {
            let fetcher = Self::default();
            *fetcher.symbol_list.lock().unwrap() = symbols;
            fetcher
        }

        /// Make every subsequent call fail with a network error
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Calls made for `method:symbol` (e.g. `quote:AAPL`)
        pub fn calls(&self, method: &str, symbol: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .get(&format!("{}:{}", method, symbol))
                .copied()
                .unwrap_or(0)
        }

        pub fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().values().sum()
        }

        fn record(&self, method: &str, symbol: &str) -> Result<usize, FetchError> {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(format!("{}:{}", method, symbol)).or_insert(0);
            *count += 1;
            if self.failing.load(Ordering::SeqCst) {
                return Err(FetchError::Network(format!(
                    "{} unavailable for {}",
                    method, symbol
                )));
            }
            Ok(*count)
        }
    }

    #[async_trait]
    impl MarketFetcher for ScriptedFetcher {
        async fn fetch_quote(&self, symbol: &str) -> Result<QuoteSnapshot, FetchError> {
            let n = self.record("quote", symbol)?;
            Ok(QuoteSnapshot {
                symbol: symbol.to_string(),
                regular_market_price: Some(n as f64),
                ..Default::default()
            })
        }

        async fn fetch_history(
            &self,
            symbol: &str,
            from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<Vec<HistoryPoint>, FetchError> {
            let n = self.record("history", symbol)?;
            Ok(vec![HistoryPoint {
                date: from,
                timestamp: 0,
                open: Some(n as f64),
                high: Some(n as f64),
                low: Some(n as f64),
                close: Some(n as f64),
                adj_close: Some(n as f64),
                volume: Some(n as u64),
            }])
        }

        async fn fetch_movers(&self, index: &MarketIndex) -> Result<MoversSnapshot, FetchError> {
            self.record("movers", &index.symbol)?;
            Ok(MoversSnapshot {
                index_symbol: index.symbol.clone(),
                gainers: Vec::new(),
                losers: Vec::new(),
            })
        }

        async fn fetch_news(&self, symbol: &str) -> Result<Vec<NewsItem>, FetchError> {
            let n = self.record("news", symbol)?;
            Ok(vec![NewsItem {
                id: Some(format!("{}-{}", symbol, n)),
                title: format!("{} headline {}", symbol, n),
                publisher: None,
                link: format!("https://news.example/{}/{}", symbol, n),
                published_at: None,
                related_tickers: vec![symbol.to_string()],
            }])
        }

        async fn fetch_symbol_list(
            &self,
            source: &StockListSource,
        ) -> Result<Vec<SymbolRecord>, FetchError> {
            self.record("symbols", &source.source_url)?;
            Ok(self.symbol_list.lock().unwrap().clone())
        }
    }
}
