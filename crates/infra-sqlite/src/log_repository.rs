// SQLite LogRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use marketfeed_core::domain::{LogEntry, LogLevel, NewLogEntry};
use marketfeed_core::error::Result;
use marketfeed_core::port::LogRepository;
use sqlx::SqlitePool;

pub struct SqliteLogRepository {
    pool: SqlitePool,
}

impl SqliteLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogRepository for SqliteLogRepository {
    async fn append(&self, entry: &NewLogEntry) -> Result<i64> {
        sqlx::query_scalar(
            "INSERT INTO log_entries (level, message, context, created) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(entry.level.as_str())
        .bind(&entry.message)
        .bind(&entry.context)
        .bind(entry.created)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<LogEntry>> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT id, level, message, context, created FROM log_entries ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(LogRow::into_entry).collect()
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM log_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn retain_latest(&self, keep: i64) -> Result<u64> {
        if keep <= 0 {
            let result = sqlx::query("DELETE FROM log_entries")
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            return Ok(result.rows_affected());
        }

        // Threshold = lowest kept id; NULL (nothing deleted) when fewer than `keep` exist
        let result = sqlx::query(
            r#"
            DELETE FROM log_entries
            WHERE id < (SELECT id FROM log_entries ORDER BY id DESC LIMIT 1 OFFSET ?)
            "#,
        )
        .bind(keep - 1)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: i64,
    level: String,
    message: String,
    context: Option<String>,
    created: i64,
}

impl LogRow {
    fn into_entry(self) -> Result<LogEntry> {
        Ok(LogEntry {
            id: self.id,
            level: self.level.parse::<LogLevel>()?,
            message: self.message,
            context: self.context,
            created: self.created,
        })
    }
}
