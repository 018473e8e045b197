// Job Registry
// Reconciles declared jobs into storage and owns run bookkeeping

use super::catalog::JobCatalog;
use crate::domain::{Job, JobId, JobRun, JobSpec, LastRunAtPolicy};
use crate::error::{AppError, Result};
use crate::port::JobRepository;
use std::sync::Arc;
use tracing::{info, warn};

/// What a reconcile pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: Vec<String>,
    pub existing: Vec<String>,
    /// Declared jobs whose method has no registered body
    pub unknown_methods: Vec<String>,
}

pub struct JobRegistry {
    repo: Arc<dyn JobRepository>,
    policy: LastRunAtPolicy,
}

impl JobRegistry {
    pub fn new(repo: Arc<dyn JobRepository>, policy: LastRunAtPolicy) -> Self {
        Self { repo, policy }
    }

    /// Insert declared jobs that have no stored job of the same name.
    ///
    /// Existing jobs are left untouched, so a second call with the same
    /// input is a no-op. Unknown methods only produce a warning.
    pub async fn reconcile(
        &self,
        declared: &[JobSpec],
        catalog: &JobCatalog,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for spec in declared {
            spec.validate()?;

            if !catalog.contains(&spec.method) {
                warn!(job = %spec.name, method = %spec.method, "Job references unknown method");
                report.unknown_methods.push(spec.name.clone());
            }

            if self.repo.find_by_name(&spec.name).await?.is_some() {
                report.existing.push(spec.name.clone());
                continue;
            }

            let job = self.repo.insert(spec).await?;
            info!(job_id = job.id, job = %job.name, interval_minutes = job.interval_minutes, "Job registered");
            report.inserted.push(job.name);
        }

        Ok(report)
    }

    /// Enabled jobs by id ascending (execution priority)
    pub async fn list_enabled(&self) -> Result<Vec<Job>> {
        self.repo.list_enabled().await
    }

    pub async fn list_all(&self) -> Result<Vec<Job>> {
        self.repo.list_all().await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Job>> {
        self.repo.find_by_name(name).await
    }

    /// Set `last_run = finished_at`; `last_run_at` follows the configured policy
    pub async fn record_run(&self, job_id: JobId, finished_at: i64) -> Result<Job> {
        let mut job = self
            .repo
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

        job.record_run(finished_at, self.policy);
        self.repo
            .update_last_run(job.id, finished_at, job.last_run_at.as_deref())
            .await?;
        Ok(job)
    }

    pub async fn record_history(&self, run: &JobRun) -> Result<()> {
        self.repo.insert_run(run).await
    }

    pub async fn recent_runs(&self, job_id: JobId, limit: i64) -> Result<Vec<JobRun>> {
        self.repo.recent_runs(job_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::catalog::handler_fn;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use futures::FutureExt;
    use tokio_test::{assert_err, assert_ok};

    fn catalog() -> JobCatalog {
        JobCatalog::new().register(
            "refreshNews",
            handler_fn(|_| async { Ok::<(), AppError>(()) }.boxed()),
        )
    }

    fn registry(policy: LastRunAtPolicy) -> JobRegistry {
        JobRegistry::new(Arc::new(InMemoryJobRepository::new()), policy)
    }

    #[tokio::test]
    async fn test_news_refresh_reconciled_into_empty_registry() {
        let registry = registry(LastRunAtPolicy::DeriveOnce);
        let declared = vec![JobSpec::new("newsRefresh", "refreshNews", 240)];

        registry.reconcile(&declared, &catalog()).await.unwrap();

        let enabled = registry.list_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "newsRefresh");
        assert_eq!(enabled[0].last_run, None);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let registry = registry(LastRunAtPolicy::DeriveOnce);
        let declared = vec![
            JobSpec::new("newsRefresh", "refreshNews", 240),
            JobSpec::new("quoteRefresh", "refreshNews", 1),
        ];

        let first = registry.reconcile(&declared, &catalog()).await.unwrap();
        let second = registry.reconcile(&declared, &catalog()).await.unwrap();

        assert_eq!(first.inserted.len(), 2);
        assert!(second.inserted.is_empty());
        assert_eq!(second.existing.len(), 2);
        assert_eq!(registry.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_existing_job_not_mutated_by_spec_drift() {
        let registry = registry(LastRunAtPolicy::DeriveOnce);
        registry
            .reconcile(&[JobSpec::new("newsRefresh", "refreshNews", 240)], &catalog())
            .await
            .unwrap();

        let mut drifted = JobSpec::new("newsRefresh", "refreshNews", 5);
        drifted.enabled = false;
        registry.reconcile(&[drifted], &catalog()).await.unwrap();

        let job = registry.find_by_name("newsRefresh").await.unwrap().unwrap();
        assert_eq!(job.interval_minutes, 240);
        assert!(job.enabled);
    }

    #[tokio::test]
    async fn test_list_enabled_skips_disabled_in_id_order() {
        let registry = registry(LastRunAtPolicy::DeriveOnce);
        let mut disabled = JobSpec::new("b", "refreshNews", 10);
        disabled.enabled = false;
        let declared = vec![
            JobSpec::new("c", "refreshNews", 10),
            disabled,
            JobSpec::new("a", "refreshNews", 10),
        ];
        registry.reconcile(&declared, &catalog()).await.unwrap();

        let names: Vec<String> = registry
            .list_enabled()
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.name)
            .collect();
        assert_eq!(names, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_unknown_method_is_warning_not_failure() {
        let registry = registry(LastRunAtPolicy::DeriveOnce);
        let report = registry
            .reconcile(&[JobSpec::new("mystery", "refreshEverything", 10)], &catalog())
            .await
            .unwrap();
        assert_eq!(report.unknown_methods, vec!["mystery"]);
        assert_eq!(report.inserted, vec!["mystery"]);
    }

    #[tokio::test]
    async fn test_invalid_interval_rejected() {
        let registry = registry(LastRunAtPolicy::DeriveOnce);
        let err = assert_err!(
            registry
                .reconcile(&[JobSpec::new("bad", "refreshNews", 0)], &catalog())
                .await
        );
        assert!(matches!(err, AppError::Domain(_)));
    }

    #[tokio::test]
    async fn test_record_run_derive_once() {
        let registry = registry(LastRunAtPolicy::DeriveOnce);
        registry
            .reconcile(&[JobSpec::new("newsRefresh", "refreshNews", 240)], &catalog())
            .await
            .unwrap();

        assert_ok!(registry.record_run(1, 1_000).await);
        let job = assert_ok!(registry.record_run(1, 2_000).await);

        assert_eq!(job.last_run, Some(2_000));
        assert_eq!(job.last_run_at.as_deref(), Some("1970-01-01T00:00:01.000Z"));
        let stored = registry.find_by_name("newsRefresh").await.unwrap().unwrap();
        assert_eq!(stored, job);
    }

    #[tokio::test]
    async fn test_record_run_always_recompute() {
        let registry = registry(LastRunAtPolicy::AlwaysRecompute);
        registry
            .reconcile(&[JobSpec::new("newsRefresh", "refreshNews", 240)], &catalog())
            .await
            .unwrap();

        registry.record_run(1, 1_000).await.unwrap();
        let job = registry.record_run(1, 2_000).await.unwrap();
        assert_eq!(job.last_run_at.as_deref(), Some("1970-01-01T00:00:02.000Z"));
    }

    #[tokio::test]
    async fn test_record_run_unknown_job() {
        let registry = registry(LastRunAtPolicy::DeriveOnce);
        let err = assert_err!(registry.record_run(99, 1).await);
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
