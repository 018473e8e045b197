//! Job Registry Integration Tests
//!
//! Reconciliation and run bookkeeping over the SQLite job store.

use std::sync::Arc;

use marketfeed_core::application::{handler_fn, JobCatalog, JobRegistry};
use marketfeed_core::domain::{JobRun, JobSpec, LastRunAtPolicy, RunOutcome};
use marketfeed_core::error::AppError;
use marketfeed_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};
use sqlx::SqlitePool;

fn catalog() -> JobCatalog {
    let noop = || handler_fn(|_| Box::pin(async { Ok::<(), AppError>(()) }));
    JobCatalog::new()
        .register("refreshNews", noop())
        .register("refreshQuotes", noop())
}

async fn pool() -> SqlitePool {
    let pool = create_pool("sqlite::memory:", 1).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

fn registry(pool: &SqlitePool, policy: LastRunAtPolicy) -> JobRegistry {
    JobRegistry::new(Arc::new(SqliteJobRepository::new(pool.clone())), policy)
}

/// newsRefresh: reconciled into an empty registry, run once at t=1000
#[tokio::test]
async fn test_news_refresh_lifecycle() {
    let pool = pool().await;
    let registry = registry(&pool, LastRunAtPolicy::DeriveOnce);

    let report = registry
        .reconcile(&[JobSpec::new("newsRefresh", "refreshNews", 240)], &catalog())
        .await
        .unwrap();
    assert_eq!(report.inserted, vec!["newsRefresh"]);

    let enabled = registry.list_enabled().await.unwrap();
    assert_eq!(enabled.len(), 1);
    let job = &enabled[0];
    assert_eq!(job.name, "newsRefresh");
    assert_eq!(job.interval_minutes, 240);
    assert!(job.enabled);
    assert_eq!(job.last_run, None);
    assert_eq!(job.last_run_at, None);

    registry.record_run(job.id, 1_000).await.unwrap();

    let stored = registry.find_by_name("newsRefresh").await.unwrap().unwrap();
    assert_eq!(stored.last_run, Some(1_000));
    assert_eq!(stored.last_run_at.as_deref(), Some("1970-01-01T00:00:01.000Z"));

    println!("✅ newsRefresh registered and run bookkeeping persisted");
}

/// Reconcile twice with the same input: second pass inserts nothing
#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let pool = pool().await;
    let registry = registry(&pool, LastRunAtPolicy::DeriveOnce);
    let declared = vec![
        JobSpec::new("quoteRefresh", "refreshQuotes", 5),
        JobSpec::new("newsRefresh", "refreshNews", 240),
    ];

    registry.reconcile(&declared, &catalog()).await.unwrap();
    let second = registry.reconcile(&declared, &catalog()).await.unwrap();

    assert!(second.inserted.is_empty());
    assert_eq!(second.existing.len(), 2);
    assert_eq!(registry.list_all().await.unwrap().len(), 2);
}

/// Stored jobs never follow later config edits
#[tokio::test]
async fn test_existing_job_not_updated_from_declaration() {
    let pool = pool().await;
    let registry = registry(&pool, LastRunAtPolicy::DeriveOnce);

    registry
        .reconcile(&[JobSpec::new("newsRefresh", "refreshNews", 240)], &catalog())
        .await
        .unwrap();
    registry
        .reconcile(&[JobSpec::new("newsRefresh", "refreshNews", 15)], &catalog())
        .await
        .unwrap();

    let job = registry.find_by_name("newsRefresh").await.unwrap().unwrap();
    assert_eq!(job.interval_minutes, 240);
}

/// Disabled jobs are stored but not listed as enabled
#[tokio::test]
async fn test_disabled_jobs_excluded_from_enabled_list() {
    let pool = pool().await;
    let registry = registry(&pool, LastRunAtPolicy::DeriveOnce);
    let mut paused = JobSpec::new("quoteRefresh", "refreshQuotes", 5);
    paused.enabled = false;

    registry
        .reconcile(
            &[paused, JobSpec::new("newsRefresh", "refreshNews", 240)],
            &catalog(),
        )
        .await
        .unwrap();

    let enabled = registry.list_enabled().await.unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].name, "newsRefresh");
    assert_eq!(registry.list_all().await.unwrap().len(), 2);
}

/// last_run_at policies differ only after the second recorded run
#[tokio::test]
async fn test_last_run_at_policies() {
    let pool = pool().await;
    let declared = [JobSpec::new("newsRefresh", "refreshNews", 240)];

    let derive_once = registry(&pool, LastRunAtPolicy::DeriveOnce);
    derive_once.reconcile(&declared, &catalog()).await.unwrap();
    let id = derive_once.list_all().await.unwrap()[0].id;

    derive_once.record_run(id, 0).await.unwrap();
    derive_once.record_run(id, 60_000).await.unwrap();
    let job = derive_once.find_by_name("newsRefresh").await.unwrap().unwrap();
    assert_eq!(job.last_run, Some(60_000));
    assert_eq!(job.last_run_at.as_deref(), Some("1970-01-01T00:00:00.000Z"));

    let recompute = registry(&pool, LastRunAtPolicy::AlwaysRecompute);
    recompute.record_run(id, 120_000).await.unwrap();
    let job = recompute.find_by_name("newsRefresh").await.unwrap().unwrap();
    assert_eq!(job.last_run, Some(120_000));
    assert_eq!(job.last_run_at.as_deref(), Some("1970-01-01T00:02:00.000Z"));
}

/// Run history is read back newest first
#[tokio::test]
async fn test_run_history_newest_first() {
    let pool = pool().await;
    let registry = registry(&pool, LastRunAtPolicy::DeriveOnce);
    registry
        .reconcile(&[JobSpec::new("newsRefresh", "refreshNews", 240)], &catalog())
        .await
        .unwrap();
    let job_id = registry.list_all().await.unwrap()[0].id;

    for (i, outcome) in [RunOutcome::Succeeded, RunOutcome::Failed, RunOutcome::Succeeded]
        .into_iter()
        .enumerate()
    {
        let started_at = (i as i64) * 1_000;
        registry
            .record_history(&JobRun {
                id: format!("run-{}", i + 1),
                job_id,
                started_at,
                finished_at: started_at + 500,
                outcome,
                error: (outcome == RunOutcome::Failed).then(|| "source down".to_string()),
            })
            .await
            .unwrap();
    }

    let runs = registry.recent_runs(job_id, 2).await.unwrap();
    let ids: Vec<&str> = runs.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["run-3", "run-2"]);
    assert_eq!(runs[1].error.as_deref(), Some("source down"));
}

/// record_run for a missing job id is NotFound
#[tokio::test]
async fn test_record_run_unknown_job() {
    let pool = pool().await;
    let registry = registry(&pool, LastRunAtPolicy::DeriveOnce);

    let err = registry.record_run(42, 1_000).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
