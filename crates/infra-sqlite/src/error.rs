// sqlx error mapping

use marketfeed_core::error::AppError;

/// Convert sqlx::Error to AppError::Database, naming the store invariant
/// a constraint failure broke
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            // SQLite extended result codes: https://www.sqlite.org/rescode.html
            match db_err.code().as_deref() {
                Some("2067") | Some("1555") => AppError::Database(unique_violation(message)),
                Some("787") => AppError::Database(format!(
                    "Run references a job that is not registered: {}",
                    message
                )),
                Some("275") => AppError::Database(check_violation(message)),
                Some("5") => AppError::Database(format!("Store busy: {}", message)),
                Some(code) => AppError::Database(format!("Store error [{}]: {}", code, message)),
                None => AppError::Database(format!("Store error: {}", message)),
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}

fn unique_violation(message: &str) -> String {
    if message.contains("cache_records.") {
        format!(
            "Cache already holds a record for this domain and key: {}",
            message
        )
    } else if message.contains("jobs.name") {
        format!("Job name already registered: {}", message)
    } else if message.contains("job_runs.") {
        format!("Run id already recorded: {}", message)
    } else if message.contains("market_indexes.symbol") {
        format!("Index already stored: {}", message)
    } else {
        format!("Unique constraint violation: {}", message)
    }
}

fn check_violation(message: &str) -> String {
    if message.contains("interval_minutes") {
        format!("Job interval must be a positive number of minutes: {}", message)
    } else {
        format!("Check constraint violation: {}", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use sqlx::SqlitePool;
    use tokio_test::assert_err;

    async fn setup_pool() -> SqlitePool {
        let pool = create_pool("sqlite::memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    async fn failing(pool: &SqlitePool, sql: &str) -> String {
        let err = assert_err!(sqlx::query(sql).execute(pool).await);
        match map_sqlx_error(err) {
            AppError::Database(msg) => msg,
            other => panic!("expected database error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_second_cache_record_names_single_record_rule() {
        let pool = setup_pool().await;
        let insert = "INSERT INTO cache_records (domain, cache_key, payload, created_at, updated_at) \
                      VALUES ('quote', 'AAPL', '{}', 1, 1)";
        sqlx::query(insert).execute(&pool).await.unwrap();

        let msg = failing(&pool, insert).await;
        assert!(msg.starts_with("Cache already holds a record"), "{msg}");
        assert!(msg.contains("cache_key"), "{msg}");
    }

    #[tokio::test]
    async fn test_job_constraints_named() {
        let pool = setup_pool().await;
        let insert = "INSERT INTO jobs (name, description, method, interval_minutes, enabled) \
                      VALUES ('newsRefresh', '', 'refreshNews', 240, 1)";
        sqlx::query(insert).execute(&pool).await.unwrap();

        let msg = failing(&pool, insert).await;
        assert!(msg.starts_with("Job name already registered"), "{msg}");

        let msg = failing(
            &pool,
            "INSERT INTO jobs (name, description, method, interval_minutes, enabled) \
             VALUES ('bad', '', 'refreshNews', 0, 1)",
        )
        .await;
        assert!(msg.starts_with("Job interval must be a positive"), "{msg}");
    }

    #[tokio::test]
    async fn test_orphan_run_names_missing_job() {
        let pool = setup_pool().await;
        let msg = failing(
            &pool,
            "INSERT INTO job_runs (id, job_id, started_at, finished_at, outcome, error) \
             VALUES ('r1', 42, 1, 2, 'succeeded', NULL)",
        )
        .await;
        assert!(msg.starts_with("Run references a job that is not registered"), "{msg}");
    }

    #[test]
    fn test_unrelated_errors_keep_message() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            AppError::Database(msg) if msg == "Row not found"
        ));
        assert_eq!(
            unique_violation("UNIQUE constraint failed: other.col"),
            "Unique constraint violation: UNIQUE constraint failed: other.col"
        );
    }
}
