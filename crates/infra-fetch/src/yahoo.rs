//! Yahoo Finance response parsing.
//!
//! Quotes and history both come from the v8 chart API (the quote is read
//! from the chart `meta` block); news comes from the v1 search API.
//! Yahoo has no official API, so every field is optional on the way in.

use chrono::NaiveDate;
use marketfeed_core::domain::{HistoryPoint, NewsItem, QuoteSnapshot};
use marketfeed_core::port::FetchError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: Option<String>,
    currency: Option<String>,
    exchange_name: Option<String>,
    full_exchange_name: Option<String>,
    short_name: Option<String>,
    long_name: Option<String>,
    regular_market_price: Option<f64>,
    regular_market_time: Option<i64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_volume: Option<u64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    news: Vec<SearchNews>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNews {
    uuid: Option<String>,
    title: String,
    publisher: Option<String>,
    link: String,
    provider_publish_time: Option<i64>,
    #[serde(default)]
    related_tickers: Vec<String>,
}

/// Chart URL for a date range (daily bars, adjusted close included)
pub(crate) fn chart_url(base: &str, symbol: &str, from: NaiveDate, to: NaiveDate) -> String {
    let start_ts = from.and_hms_opt(0, 0, 0).map(|d| d.and_utc().timestamp()).unwrap_or(0);
    let end_ts = to
        .and_hms_opt(23, 59, 59)
        .map(|d| d.and_utc().timestamp())
        .unwrap_or(start_ts);
    format!(
        "{base}/v8/finance/chart/{symbol}?period1={start_ts}&period2={end_ts}\
         &interval=1d&includeAdjustedClose=true",
        symbol = encode_symbol(symbol)
    )
}

/// Chart URL for the latest session only (used for quotes)
pub(crate) fn quote_url(base: &str, symbol: &str) -> String {
    format!(
        "{base}/v8/finance/chart/{symbol}?range=1d&interval=1d",
        symbol = encode_symbol(symbol)
    )
}

pub(crate) fn news_url(base: &str, symbol: &str, count: u32) -> String {
    format!(
        "{base}/v1/finance/search?q={symbol}&quotesCount=0&newsCount={count}",
        symbol = encode_symbol(symbol)
    )
}

/// Percent-encode the characters index and class-share symbols use
fn encode_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| match c {
            '^' => "%5E".to_string(),
            '=' => "%3D".to_string(),
            '&' => "%26".to_string(),
            ' ' => "%20".to_string(),
            c => c.to_string(),
        })
        .collect()
}

fn first_result(symbol: &str, resp: ChartResponse) -> Result<ChartData, FetchError> {
    let results = match (resp.chart.result, resp.chart.error) {
        (Some(results), _) => results,
        (None, Some(err)) if err.code == "Not Found" => {
            return Err(FetchError::Empty(symbol.to_string()))
        }
        (None, Some(err)) => {
            return Err(FetchError::Malformed(format!(
                "{}: {}",
                err.code, err.description
            )))
        }
        (None, None) => {
            return Err(FetchError::Malformed(
                "empty result with no error".to_string(),
            ))
        }
    };

    results
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Empty(symbol.to_string()))
}

/// Quote snapshot from the chart `meta` block
pub(crate) fn parse_quote(symbol: &str, resp: ChartResponse) -> Result<QuoteSnapshot, FetchError> {
    let data = first_result(symbol, resp)?;
    let meta = data
        .meta
        .ok_or_else(|| FetchError::Malformed(format!("no chart meta for {}", symbol)))?;

    if meta.regular_market_price.is_none() {
        return Err(FetchError::Empty(symbol.to_string()));
    }

    let previous_close = meta.previous_close.or(meta.chart_previous_close);
    let change = match (meta.regular_market_price, previous_close) {
        (Some(price), Some(prev)) => Some(price - prev),
        _ => None,
    };
    let change_percent = match (change, previous_close) {
        (Some(change), Some(prev)) if prev != 0.0 => Some(change / prev * 100.0),
        _ => None,
    };

    Ok(QuoteSnapshot {
        symbol: meta.symbol.unwrap_or_else(|| symbol.to_string()),
        short_name: meta.short_name,
        long_name: meta.long_name,
        currency: meta.currency,
        exchange: meta.full_exchange_name.or(meta.exchange_name),
        market_state: None,
        regular_market_price: meta.regular_market_price,
        regular_market_change: change,
        regular_market_change_percent: change_percent,
        regular_market_previous_close: previous_close,
        regular_market_open: first_open(&data.indicators),
        regular_market_day_high: meta.regular_market_day_high,
        regular_market_day_low: meta.regular_market_day_low,
        regular_market_volume: meta.regular_market_volume,
        regular_market_time: meta.regular_market_time,
        fifty_two_week_high: meta.fifty_two_week_high,
        fifty_two_week_low: meta.fifty_two_week_low,
        market_cap: None,
    })
}

fn first_open(indicators: &Option<Indicators>) -> Option<f64> {
    indicators
        .as_ref()
        .and_then(|i| i.quote.first())
        .and_then(|q| q.open.last().copied().flatten())
}

/// Daily bars ascending by date. Bars with no OHLCV values (holidays) are
/// skipped; an empty series is `FetchError::Empty`.
pub(crate) fn parse_history(
    symbol: &str,
    resp: ChartResponse,
) -> Result<Vec<HistoryPoint>, FetchError> {
    let data = first_result(symbol, resp)?;
    let timestamps = data.timestamp.unwrap_or_default();
    let indicators = data
        .indicators
        .ok_or_else(|| FetchError::Malformed(format!("no indicators for {}", symbol)))?;
    let quote = indicators.quote.into_iter().next().unwrap_or_default();
    let adj_closes = indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut points = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| FetchError::Malformed(format!("invalid timestamp: {}", ts)))?;

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();
        let adj_close = adj_closes
            .as_ref()
            .and_then(|v| v.get(i).copied().flatten())
            .or(close);

        if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none()
        {
            continue;
        }

        points.push(HistoryPoint {
            date,
            timestamp: ts * 1000,
            open,
            high,
            low,
            close,
            adj_close,
            volume,
        });
    }

    if points.is_empty() {
        return Err(FetchError::Empty(symbol.to_string()));
    }
    points.sort_by_key(|p| p.date);
    Ok(points)
}

pub(crate) fn parse_news(resp: SearchResponse) -> Vec<NewsItem> {
    resp.news
        .into_iter()
        .map(|n| NewsItem {
            id: n.uuid,
            title: n.title,
            publisher: n.publisher,
            link: n.link,
            published_at: n.provider_publish_time.map(|secs| secs * 1000),
            related_tickers: n.related_tickers,
        })
        .collect()
}
