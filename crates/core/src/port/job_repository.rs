// Job Repository Port (Interface)

use crate::domain::{Job, JobId, JobRun, JobSpec};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Job and run-history persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a job from its spec (`last_run = None`), returning the stored job
    async fn insert(&self, spec: &JobSpec) -> Result<Job>;

    /// Find job by ID
    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>>;

    /// Find job by unique name
    async fn find_by_name(&self, name: &str) -> Result<Option<Job>>;

    /// All jobs, ordered by id ascending
    async fn list_all(&self) -> Result<Vec<Job>>;

    /// Enabled jobs, ordered by id ascending (execution priority)
    async fn list_enabled(&self) -> Result<Vec<Job>>;

    /// Persist `last_run` / `last_run_at`
    async fn update_last_run(
        &self,
        id: JobId,
        last_run: i64,
        last_run_at: Option<&str>,
    ) -> Result<()>;

    /// Append a run history entry
    async fn insert_run(&self, run: &JobRun) -> Result<()>;

    /// Most recent runs of a job, newest first
    async fn recent_runs(&self, job_id: JobId, limit: i64) -> Result<Vec<JobRun>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// In-memory job repository
    #[derive(Default)]
    pub struct InMemoryJobRepository {
        jobs: Mutex<Vec<Job>>,
        runs: Mutex<Vec<JobRun>>,
    }

    impl InMemoryJobRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn runs(&self) -> Vec<JobRun> {
            self.runs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, spec: &JobSpec) -> Result<Job> {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.iter().any(|j| j.name == spec.name) {
                return Err(AppError::Database(format!(
                    "Unique constraint violation: jobs.name = {}",
                    spec.name
                )));
            }
            let job = Job {
                id: jobs.iter().map(|j| j.id).max().unwrap_or(0) + 1,
                name: spec.name.clone(),
                description: spec.description.clone(),
                method: spec.method.clone(),
                interval_minutes: spec.interval_minutes,
                enabled: spec.enabled,
                last_run: None,
                last_run_at: None,
            };
            jobs.push(job.clone());
            Ok(job)
        }

        async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
            Ok(self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned())
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<Job>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .find(|j| j.name == name)
                .cloned())
        }

        async fn list_all(&self) -> Result<Vec<Job>> {
            let mut jobs = self.jobs.lock().unwrap().clone();
            jobs.sort_by_key(|j| j.id);
            Ok(jobs)
        }

        async fn list_enabled(&self) -> Result<Vec<Job>> {
            let mut jobs: Vec<Job> = self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.enabled)
                .cloned()
                .collect();
            jobs.sort_by_key(|j| j.id);
            Ok(jobs)
        }

        async fn update_last_run(
            &self,
            id: JobId,
            last_run: i64,
            last_run_at: Option<&str>,
        ) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .iter_mut()
                .find(|j| j.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
            job.last_run = Some(last_run);
            job.last_run_at = last_run_at.map(str::to_string);
            Ok(())
        }

        async fn insert_run(&self, run: &JobRun) -> Result<()> {
            self.runs.lock().unwrap().push(run.clone());
            Ok(())
        }

        async fn recent_runs(&self, job_id: JobId, limit: i64) -> Result<Vec<JobRun>> {
            let mut runs: Vec<JobRun> = self
                .runs
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.job_id == job_id)
                .cloned()
                .collect();
            runs.reverse();
            runs.truncate(limit.max(0) as usize);
            Ok(runs)
        }
    }
}
