//! HTTP MarketFetcher

use crate::movers::{components_url, extract_next_data, extract_stocks, top_movers};
use crate::session::{PageSession, SessionTracker};
use crate::symbols::{parse_csv, parse_html_table};
use crate::yahoo::{self, ChartResponse, SearchResponse};
use async_trait::async_trait;
use chrono::NaiveDate;
use marketfeed_core::domain::{
    HistoryPoint, MarketIndex, MoveDirection, MoversSnapshot, NewsItem, QuoteSnapshot,
    StockListSource, SymbolListFormat, SymbolRecord,
};
use marketfeed_core::port::{FetchError, MarketFetcher};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

/// Endpoints and client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Yahoo chart API host
    pub chart_base_url: String,
    /// Yahoo search API host (news)
    pub search_base_url: String,
    /// Movers page host
    pub movers_base_url: String,
    pub news_count: u32,
    pub top_movers: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            chart_base_url: "https://query2.finance.yahoo.com".to_string(),
            search_base_url: "https://query1.finance.yahoo.com".to_string(),
            movers_base_url: "https://www.investing.com".to_string(),
            news_count: 10,
            top_movers: crate::movers::DEFAULT_TOP_MOVERS,
        }
    }
}

pub struct HttpMarketFetcher {
    client: reqwest::Client,
    config: FetchConfig,
    sessions: SessionTracker,
}

impl HttpMarketFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            sessions: SessionTracker::new(),
        })
    }

    /// Page sessions currently open
    pub fn open_sessions(&self) -> usize {
        self.sessions.open_sessions()
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(format!("{}: {}", url, e)))
    }

    async fn get_page(&self, url: &str) -> Result<String, FetchError> {
        let session = PageSession::open(&self.client, &self.sessions, url);
        session.fetch_html().await
    }
}

#[async_trait]
impl MarketFetcher for HttpMarketFetcher {
    #[instrument(skip(self))]
    async fn fetch_quote(&self, symbol: &str) -> Result<QuoteSnapshot, FetchError> {
        let url = yahoo::quote_url(&self.config.chart_base_url, symbol);
        let chart: ChartResponse = self.get_json(&url).await?;
        yahoo::parse_quote(symbol, chart)
    }

    #[instrument(skip(self))]
    async fn fetch_history(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoryPoint>, FetchError> {
        let url = yahoo::chart_url(&self.config.chart_base_url, symbol, from, to);
        let chart: ChartResponse = self.get_json(&url).await?;
        yahoo::parse_history(symbol, chart)
    }

    #[instrument(skip(self, index), fields(index = %index.symbol))]
    async fn fetch_movers(&self, index: &MarketIndex) -> Result<MoversSnapshot, FetchError> {
        let url_name = index.investing_url_name.as_deref().ok_or_else(|| {
            FetchError::Malformed(format!("index {} has no movers page", index.symbol))
        })?;
        let html = self
            .get_page(&components_url(&self.config.movers_base_url, url_name))
            .await?;

        let state = extract_next_data(&html)?;
        let stocks = extract_stocks(&state)?;
        if stocks.is_empty() {
            return Err(FetchError::Empty(index.symbol.clone()));
        }

        Ok(MoversSnapshot {
            index_symbol: index.symbol.clone(),
            gainers: top_movers(&stocks, MoveDirection::Up, self.config.top_movers),
            losers: top_movers(&stocks, MoveDirection::Down, self.config.top_movers),
        })
    }

    #[instrument(skip(self))]
    async fn fetch_news(&self, symbol: &str) -> Result<Vec<NewsItem>, FetchError> {
        let url = yahoo::news_url(&self.config.search_base_url, symbol, self.config.news_count);
        let search: SearchResponse = self.get_json(&url).await?;
        Ok(yahoo::parse_news(search))
    }

    #[instrument(skip(self, source), fields(url = %source.source_url))]
    async fn fetch_symbol_list(
        &self,
        source: &StockListSource,
    ) -> Result<Vec<SymbolRecord>, FetchError> {
        let body = self.get_page(&source.source_url).await?;
        match source.format {
            SymbolListFormat::Csv => parse_csv(&body, source),
            SymbolListFormat::Wikipedia => parse_html_table(&body, source),
        }
    }
}
