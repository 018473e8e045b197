// SQLite JobRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use marketfeed_core::domain::{Job, JobId, JobRun, JobSpec, RunOutcome};
use marketfeed_core::error::{AppError, Result};
use marketfeed_core::port::JobRepository;
use sqlx::SqlitePool;

const JOB_COLUMNS: &str =
    "id, name, description, method, interval_minutes, enabled, last_run, last_run_at";

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, spec: &JobSpec) -> Result<Job> {
        let row: JobRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO jobs (name, description, method, interval_minutes, enabled)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(&spec.name)
        .bind(&spec.description)
        .bind(&spec.method)
        .bind(spec.interval_minutes)
        .bind(spec.enabled)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into_job())
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(row.map(JobRow::into_job))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Job>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs WHERE name = ?", JOB_COLUMNS))
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(row.map(JobRow::into_job))
    }

    async fn list_all(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs ORDER BY id ASC", JOB_COLUMNS))
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(JobRow::into_job).collect())
    }

    async fn list_enabled(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM jobs WHERE enabled = 1 ORDER BY id ASC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(JobRow::into_job).collect())
    }

    async fn update_last_run(
        &self,
        id: JobId,
        last_run: i64,
        last_run_at: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE jobs SET last_run = ?, last_run_at = ? WHERE id = ?")
            .bind(last_run)
            .bind(last_run_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {} not found", id)));
        }
        Ok(())
    }

    async fn insert_run(&self, run: &JobRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_runs (id, job_id, started_at, finished_at, outcome, error)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(run.job_id)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.outcome.to_string())
        .bind(&run.error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn recent_runs(&self, job_id: JobId, limit: i64) -> Result<Vec<JobRun>> {
        let rows: Vec<JobRunRow> = sqlx::query_as(
            r#"
            SELECT id, job_id, started_at, finished_at, outcome, error
            FROM job_runs
            WHERE job_id = ?
            ORDER BY finished_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(job_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRunRow::into_run).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    name: String,
    description: Option<String>,
    method: String,
    interval_minutes: i64,
    enabled: bool,
    last_run: Option<i64>,
    last_run_at: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Job {
        Job {
            id: self.id,
            name: self.name,
            description: self.description,
            method: self.method,
            interval_minutes: self.interval_minutes,
            enabled: self.enabled,
            last_run: self.last_run,
            last_run_at: self.last_run_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRunRow {
    id: String,
    job_id: i64,
    started_at: i64,
    finished_at: i64,
    outcome: String,
    error: Option<String>,
}

impl JobRunRow {
    fn into_run(self) -> Result<JobRun> {
        Ok(JobRun {
            id: self.id,
            job_id: self.job_id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            outcome: self.outcome.parse::<RunOutcome>()?,
            error: self.error,
        })
    }
}
