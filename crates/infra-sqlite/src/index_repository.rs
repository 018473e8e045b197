// SQLite IndexRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use marketfeed_core::domain::{MarketIndex, StockListSource, SymbolKey};
use marketfeed_core::error::Result;
use marketfeed_core::port::IndexRepository;
use sqlx::SqlitePool;
use tracing::debug;

const INDEX_COLUMNS: &str =
    "symbol, investing_symbol, investing_url_name, stock_list, created, created_at";

pub struct SqliteIndexRepository {
    pool: SqlitePool,
}

impl SqliteIndexRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IndexRepository for SqliteIndexRepository {
    async fn list_all(&self) -> Result<Vec<MarketIndex>> {
        let rows: Vec<IndexRow> = sqlx::query_as(&format!(
            "SELECT {} FROM market_indexes ORDER BY id ASC",
            INDEX_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(IndexRow::into_index).collect()
    }

    async fn find_by_symbol(&self, symbol: &SymbolKey) -> Result<Option<MarketIndex>> {
        let row: Option<IndexRow> = sqlx::query_as(&format!(
            "SELECT {} FROM market_indexes WHERE symbol = ?",
            INDEX_COLUMNS
        ))
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(IndexRow::into_index).transpose()
    }

    async fn insert_many(&self, indexes: &[MarketIndex]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut inserted = 0;

        for index in indexes {
            let stock_list = index
                .stock_list
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            let result = sqlx::query(&format!(
                "INSERT INTO market_indexes ({}) VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (symbol) DO NOTHING",
                INDEX_COLUMNS
            ))
            .bind(&index.symbol)
            .bind(&index.investing_symbol)
            .bind(&index.investing_url_name)
            .bind(stock_list)
            .bind(index.created)
            .bind(&index.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(inserted, "Indexes inserted");
        Ok(inserted)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IndexRow {
    symbol: String,
    investing_symbol: Option<String>,
    investing_url_name: Option<String>,
    stock_list: Option<String>,
    created: Option<i64>,
    created_at: Option<String>,
}

impl IndexRow {
    fn into_index(self) -> Result<MarketIndex> {
        let stock_list = self
            .stock_list
            .as_deref()
            .map(serde_json::from_str::<StockListSource>)
            .transpose()?;

        Ok(MarketIndex {
            symbol: self.symbol,
            investing_symbol: self.investing_symbol,
            investing_url_name: self.investing_url_name,
            stock_list,
            created: self.created,
            created_at: self.created_at,
        })
    }
}
