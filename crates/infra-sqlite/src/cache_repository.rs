// SQLite CacheRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use marketfeed_core::domain::{CachePayload, CacheRecord, Domain, SymbolKey};
use marketfeed_core::error::{AppError, Result};
use marketfeed_core::port::CacheRepository;
use sqlx::SqlitePool;
use std::str::FromStr;

const RECORD_COLUMNS: &str = "id, domain, cache_key, payload, created_at, updated_at";

pub struct SqliteCacheRepository {
    pool: SqlitePool,
}

impl SqliteCacheRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheRepository for SqliteCacheRepository {
    async fn find(&self, domain: Domain, key: &SymbolKey) -> Result<Option<CacheRecord>> {
        let row: Option<CacheRow> = sqlx::query_as(&format!(
            "SELECT {} FROM cache_records WHERE domain = ? AND cache_key = ? \
             ORDER BY updated_at DESC, id DESC LIMIT 1",
            RECORD_COLUMNS
        ))
        .bind(domain.as_str())
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(CacheRow::into_record).transpose()
    }

    async fn insert(
        &self,
        domain: Domain,
        key: &SymbolKey,
        payload: &CachePayload,
        now: i64,
    ) -> Result<CacheRecord> {
        let row: CacheRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO cache_records (domain, cache_key, payload, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (domain, cache_key) DO UPDATE
                SET payload = excluded.payload, updated_at = excluded.updated_at
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(domain.as_str())
        .bind(key.as_str())
        .bind(payload_text(payload)?)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.into_record()
    }

    async fn update_payload(&self, id: i64, payload: &CachePayload, updated_at: i64) -> Result<()> {
        let result = sqlx::query("UPDATE cache_records SET payload = ?, updated_at = ? WHERE id = ?")
            .bind(payload_text(payload)?)
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("cache record {}", id)));
        }
        Ok(())
    }

    async fn replace(
        &self,
        domain: Domain,
        key: &SymbolKey,
        payload: &CachePayload,
        now: i64,
    ) -> Result<CacheRecord> {
        let encoded = payload_text(payload)?;
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM cache_records WHERE domain = ? AND cache_key = ?")
            .bind(domain.as_str())
            .bind(key.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let row: CacheRow = sqlx::query_as(&format!(
            "INSERT INTO cache_records (domain, cache_key, payload, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {}",
            RECORD_COLUMNS
        ))
        .bind(domain.as_str())
        .bind(key.as_str())
        .bind(encoded)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        row.into_record()
    }

    async fn delete(&self, domain: Domain, key: &SymbolKey) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_records WHERE domain = ? AND cache_key = ?")
            .bind(domain.as_str())
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn count(&self, domain: Domain, key: &SymbolKey) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM cache_records WHERE domain = ? AND cache_key = ?")
            .bind(domain.as_str())
            .bind(key.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CacheRow {
    id: i64,
    domain: String,
    cache_key: String,
    payload: String,
    created_at: i64,
    updated_at: i64,
}

impl CacheRow {
    fn into_record(self) -> Result<CacheRecord> {
        Ok(CacheRecord {
            id: self.id,
            domain: Domain::from_str(&self.domain)?,
            key: self.cache_key,
            payload: CachePayload::new(serde_json::from_str(&self.payload)?),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn payload_text(payload: &CachePayload) -> Result<String> {
    Ok(serde_json::to_string(payload.as_value())?)
}
