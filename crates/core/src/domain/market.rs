// Market Domain Model - typed payloads stored in the freshness cache

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Point-in-time quote for a single symbol
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSnapshot {
    pub symbol: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub market_state: Option<String>,
    #[serde(default)]
    pub regular_market_price: Option<f64>,
    #[serde(default)]
    pub regular_market_change: Option<f64>,
    #[serde(default)]
    pub regular_market_change_percent: Option<f64>,
    #[serde(default)]
    pub regular_market_previous_close: Option<f64>,
    #[serde(default)]
    pub regular_market_open: Option<f64>,
    #[serde(default)]
    pub regular_market_day_high: Option<f64>,
    #[serde(default)]
    pub regular_market_day_low: Option<f64>,
    #[serde(default)]
    pub regular_market_volume: Option<u64>,
    /// Exchange timestamp (epoch seconds)
    #[serde(default)]
    pub regular_market_time: Option<i64>,
    #[serde(default)]
    pub fifty_two_week_high: Option<f64>,
    #[serde(default)]
    pub fifty_two_week_low: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

/// One daily bar of a historical series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    /// Bar timestamp (epoch ms)
    pub timestamp: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    /// Adjusted close, falls back to close when the source has none
    pub adj_close: Option<f64>,
    pub volume: Option<u64>,
}

/// Direction of a price move on the movers page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveDirection::Up => "Up",
            MoveDirection::Down => "Down",
        }
    }
}

/// A single top gainer / loser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketMover {
    pub symbol: String,
    pub name: Option<String>,
    pub volume: Option<f64>,
    pub avg_volume: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: f64,
    pub price: Option<f64>,
}

/// Top movers of one index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoversSnapshot {
    pub index_symbol: String,
    pub gainers: Vec<MarketMover>,
    pub losers: Vec<MarketMover>,
}

/// News headline related to a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: Option<String>,
    pub title: String,
    pub publisher: Option<String>,
    pub link: String,
    /// Publish time (epoch ms)
    pub published_at: Option<i64>,
    #[serde(default)]
    pub related_tickers: Vec<String>,
}

/// Constituent of an index (symbol + display name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub symbol: String,
    pub name: Option<String>,
}

/// Source format of a constituent list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolListFormat {
    /// Downloadable CSV file with a header row
    Csv,
    /// HTML table (e.g. a Wikipedia constituents table)
    Wikipedia,
}

/// Where and how to read an index's constituent list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockListSource {
    pub source_url: String,
    pub format: SymbolListFormat,
    /// CSS selector of the table (HTML sources only)
    #[serde(default)]
    pub table_selector: Option<String>,
    /// Column header holding the ticker
    pub symbol_column: String,
    /// Column header holding the company name
    pub name_column: String,
}

/// Reference index (populate-once, never refreshed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndex {
    /// Yahoo Finance symbol (e.g. `^GSPC`)
    pub symbol: String,
    pub investing_symbol: Option<String>,
    /// Path segment of the investing.com movers page
    pub investing_url_name: Option<String>,
    #[serde(default)]
    pub stock_list: Option<StockListSource>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl MarketIndex {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            investing_symbol: None,
            investing_url_name: None,
            stock_list: None,
            created: None,
            created_at: None,
        }
    }

    /// Stamp creation time, deriving the ISO companion string
    pub fn stamp_created(&mut self, now_millis: i64) {
        self.created = Some(now_millis);
        if self.created_at.is_none() {
            self.created_at = super::job::millis_to_iso(now_millis);
        }
    }
}
