//! Constituent list parsing (CSV download or HTML table)

use marketfeed_core::domain::{StockListSource, SymbolRecord};
use marketfeed_core::port::FetchError;
use scraper::{ElementRef, Html, Selector};

const DEFAULT_TABLE_SELECTOR: &str = "table";

/// Parse a CSV body with a header row
pub fn parse_csv(body: &str, source: &StockListSource) -> Result<Vec<SymbolRecord>, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| FetchError::Malformed(format!("CSV header: {}", e)))?
        .clone();
    let symbol_idx = column_index(headers.iter(), &source.symbol_column)?;
    let name_idx = column_index(headers.iter(), &source.name_column).ok();

    let mut symbols = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| FetchError::Malformed(format!("CSV row: {}", e)))?;
        push_symbol(
            &mut symbols,
            record.get(symbol_idx),
            name_idx.and_then(|i| record.get(i)),
        );
    }
    finish(symbols, source)
}

/// Parse the first table matching the source's selector
pub fn parse_html_table(
    html: &str,
    source: &StockListSource,
) -> Result<Vec<SymbolRecord>, FetchError> {
    let document = Html::parse_document(html);
    let table_css = source
        .table_selector
        .as_deref()
        .unwrap_or(DEFAULT_TABLE_SELECTOR);
    let table_selector = selector(table_css)?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("th, td")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| FetchError::Malformed(format!("no table matches {}", table_css)))?;

    let mut rows = table.select(&row_selector);
    let header_row = rows
        .next()
        .ok_or_else(|| FetchError::Malformed("table has no rows".to_string()))?;
    let headers: Vec<String> = header_row.select(&cell_selector).map(cell_text).collect();
    let symbol_idx = column_index(headers.iter().map(String::as_str), &source.symbol_column)?;
    let name_idx = column_index(headers.iter().map(String::as_str), &source.name_column).ok();

    let mut symbols = Vec::new();
    for row in rows {
        let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
        push_symbol(
            &mut symbols,
            cells.get(symbol_idx).map(String::as_str),
            name_idx.and_then(|i| cells.get(i)).map(String::as_str),
        );
    }
    finish(symbols, source)
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Malformed(format!("selector {}: {}", css, e)))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn column_index<'a>(
    mut headers: impl Iterator<Item = &'a str>,
    wanted: &str,
) -> Result<usize, FetchError> {
    headers
        .position(|h| h.trim().eq_ignore_ascii_case(wanted.trim()))
        .ok_or_else(|| FetchError::Malformed(format!("column {} not found", wanted)))
}

fn push_symbol(out: &mut Vec<SymbolRecord>, symbol: Option<&str>, name: Option<&str>) {
    let Some(symbol) = symbol.map(str::trim).filter(|s| !s.is_empty()) else {
        return;
    };
    out.push(SymbolRecord {
        symbol: symbol.to_uppercase(),
        name: name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
    });
}

fn finish(
    symbols: Vec<SymbolRecord>,
    source: &StockListSource,
) -> Result<Vec<SymbolRecord>, FetchError> {
    if symbols.is_empty() {
        return Err(FetchError::Empty(source.source_url.clone()));
    }
    Ok(symbols)
}
