//! Market movers page parsing.
//!
//! The components page of an index embeds its state as JSON in
//! `script#__NEXT_DATA__`. Stocks live in
//! `props.pageProps.state.quotesStore.quotes[*][1]._collection`.

use marketfeed_core::domain::{MarketMover, MoveDirection};
use marketfeed_core::port::FetchError;
use scraper::{Html, Selector};
use serde_json::Value;

/// Movers kept per direction
pub const DEFAULT_TOP_MOVERS: usize = 5;

/// A stock row from the page state
#[derive(Debug, Clone, PartialEq)]
pub struct PageStock {
    pub symbol: String,
    pub name: Option<String>,
    pub volume: Option<f64>,
    pub avg_volume: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: f64,
    pub direction: Option<MoveDirection>,
    pub last: Option<f64>,
}

pub(crate) fn components_url(base: &str, url_name: &str) -> String {
    format!("{}/indices/{}-components", base.trim_end_matches('/'), url_name)
}

/// Extract the embedded `__NEXT_DATA__` JSON from a page
pub fn extract_next_data(html: &str) -> Result<Value, FetchError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script#__NEXT_DATA__")
        .map_err(|e| FetchError::Malformed(format!("selector: {}", e)))?;

    let script = document
        .select(&selector)
        .next()
        .ok_or_else(|| FetchError::Malformed("page has no __NEXT_DATA__ script".to_string()))?;

    let raw: String = script.text().collect();
    serde_json::from_str(raw.trim())
        .map_err(|e| FetchError::Malformed(format!("__NEXT_DATA__ is not JSON: {}", e)))
}

/// Flatten every `[key, { _collection: [...] }]` section into stock rows
pub fn extract_stocks(state: &Value) -> Result<Vec<PageStock>, FetchError> {
    let sections = state
        .pointer("/props/pageProps/state/quotesStore/quotes")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Malformed("quotesStore.quotes missing".to_string()))?;

    let mut stocks = Vec::new();
    for section in sections {
        let collection = match section.as_array() {
            Some(pair) if pair.len() == 2 => pair[1].get("_collection").and_then(Value::as_array),
            _ => None,
        };
        if let Some(rows) = collection {
            stocks.extend(rows.iter().filter_map(parse_stock));
        }
    }
    Ok(stocks)
}

fn parse_stock(row: &Value) -> Option<PageStock> {
    let symbol = row.get("symbol")?.as_str()?.trim().to_string();
    if symbol.is_empty() {
        return None;
    }
    let direction = match row.get("changeDirection").and_then(Value::as_str) {
        Some("Up") => Some(MoveDirection::Up),
        Some("Down") => Some(MoveDirection::Down),
        _ => None,
    };
    Some(PageStock {
        symbol,
        name: row
            .get("name")
            .and_then(|n| n.get("label").or(Some(n)))
            .and_then(Value::as_str)
            .map(str::to_string),
        volume: number(row.get("volume")),
        avg_volume: number(row.get("avgVolume")),
        change: number(row.get("change")),
        change_percent: number(row.get("changePercent")).unwrap_or(0.0),
        direction,
        last: number(row.get("last")),
    })
}

/// Numbers arrive as JSON numbers or numeric strings ("1.25", "-0.4%")
fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .replace(',', "")
            .parse()
            .ok(),
        _ => None,
    }
}

/// Top `n` stocks moving in `direction`, by absolute percent change descending
pub fn top_movers(stocks: &[PageStock], direction: MoveDirection, n: usize) -> Vec<MarketMover> {
    let mut matching: Vec<&PageStock> = stocks
        .iter()
        .filter(|s| s.direction == Some(direction))
        .collect();
    matching.sort_by(|a, b| {
        b.change_percent
            .abs()
            .total_cmp(&a.change_percent.abs())
    });

    matching
        .into_iter()
        .take(n)
        .map(|s| MarketMover {
            symbol: s.symbol.clone(),
            name: s.name.clone(),
            volume: s.volume,
            avg_volume: s.avg_volume,
            change: s.change,
            change_percent: s.change_percent,
            price: s.last,
        })
        .collect()
}
