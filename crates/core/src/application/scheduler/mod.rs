// Sequential Scheduler
// Single loop over a fire queue; one job body at a time, system-wide

mod fire_queue;
mod shutdown;

pub use fire_queue::{FireQueue, Firing};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use super::catalog::{JobCatalog, JobContext};
use super::constants::{DEFAULT_STARTUP_STAGGER, INTERVAL_UNIT};
use super::diagnostics::DiagnosticLog;
use super::registry::JobRegistry;
use crate::domain::{Job, JobId, JobRun, RunOutcome};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, TimeProvider};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{error, info, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Offset between consecutive jobs' initial runs
    pub startup_stagger: Duration,
    /// Real duration of one `interval_minutes` unit
    pub interval_unit: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            startup_stagger: DEFAULT_STARTUP_STAGGER,
            interval_unit: INTERVAL_UNIT,
        }
    }
}

impl SchedulerConfig {
    pub fn interval_of(&self, job: &Job) -> Duration {
        let units = u32::try_from(job.interval_minutes.max(1)).unwrap_or(u32::MAX);
        self.interval_unit.saturating_mul(units)
    }
}

/// Runs every enabled job once, then re-arms each on its own interval.
///
/// Job bodies execute one at a time: the loop awaits each dispatch, and
/// `run_job_now` shares the same gate.
pub struct SequentialScheduler {
    registry: Arc<JobRegistry>,
    catalog: JobCatalog,
    diagnostics: Arc<DiagnosticLog>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    config: SchedulerConfig,
    gate: Mutex<()>,
}

impl SequentialScheduler {
    pub fn new(
        registry: Arc<JobRegistry>,
        catalog: JobCatalog,
        diagnostics: Arc<DiagnosticLog>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            catalog,
            diagnostics,
            time_provider,
            id_provider,
            config,
            gate: Mutex::new(()),
        }
    }

    /// Scheduler loop. Returns once shutdown is signalled; an in-flight
    /// job runs to completion first.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        let jobs = self.registry.list_enabled().await?;
        info!(jobs = jobs.len(), "Scheduler started");

        // Initial runs in id order; each one is queued only after the
        // previous initial run finished, plus the stagger
        let mut startup: VecDeque<Job> = jobs.into();
        let mut startup_head: Option<JobId> = None;
        let mut queue = FireQueue::new();
        if let Some(first) = startup.pop_front() {
            startup_head = Some(first.id);
            queue.push(Instant::now(), first);
        }

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            let Some(deadline) = queue.next_deadline() else {
                info!("No runnable jobs left, waiting for shutdown");
                shutdown.wait().await;
                break;
            };

            tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = shutdown.wait() => break,
            }

            let Some(firing) = queue.pop_due(Instant::now()) else {
                continue;
            };

            let result = self.dispatch(&firing.job).await;

            if startup_head == Some(firing.job.id) {
                startup_head = None;
                if let Some(next) = startup.pop_front() {
                    startup_head = Some(next.id);
                    queue.push(Instant::now() + self.config.startup_stagger, next);
                }
            }

            match result {
                Err(AppError::UnknownMethod(method)) => {
                    warn!(job = %firing.job.name, method = %method, "Job not re-armed");
                    continue;
                }
                Err(e) => {
                    error!(job = %firing.job.name, error = %e, "Dispatch bookkeeping failed");
                }
                Ok(_) => {}
            }

            let interval = self.config.interval_of(&firing.job);
            let now = Instant::now();
            let mut next = firing.fire_at + interval;
            if next <= now {
                next = now + interval;
            }
            queue.push(next, firing.job);
        }

        info!("Scheduler stopped");
        Ok(())
    }

    /// Execute one job body under the gate, then record the run.
    ///
    /// A failing or panicking body yields a `Failed` run, not an error.
    /// Errors are `UnknownMethod` or storage failures while recording.
    pub async fn dispatch(&self, job: &Job) -> Result<JobRun> {
        let handler = match self.catalog.resolve(&job.method) {
            Ok(handler) => handler,
            Err(err) => {
                if let Err(log_err) = self
                    .diagnostics
                    .error(
                        format!("Job {} skipped: {}", job.name, err),
                        Some(&job.name),
                    )
                    .await
                {
                    warn!(job = %job.name, error = %log_err, "Skip diagnostic not written");
                }
                return Err(err);
            }
        };

        let _slot = self.gate.lock().await;

        let ctx = JobContext {
            job_id: job.id,
            job_name: job.name.clone(),
            run_id: self.id_provider.generate_id(),
        };
        let span = info_span!("job", job = %ctx.job_name, run_id = %ctx.run_id);
        let started_at = self.time_provider.now_millis();
        info!(parent: &span, "Job started");

        let task_ctx = ctx.clone();
        let outcome = tokio::spawn(
            async move { handler.run(&task_ctx).await }.instrument(span.clone()),
        )
        .await;

        let (outcome, error) = match outcome {
            Ok(Ok(())) => (RunOutcome::Succeeded, None),
            Ok(Err(e)) => (RunOutcome::Failed, Some(e.to_string())),
            Err(join_err) => (
                RunOutcome::Failed,
                Some(format!("job panicked: {}", panic_message(join_err))),
            ),
        };
        let finished_at = self.time_provider.now_millis();

        if let Some(message) = &error {
            self.diagnostics
                .error(format!("Job {} failed: {}", job.name, message), Some(&job.name))
                .await?;
        }

        let run = JobRun {
            id: ctx.run_id,
            job_id: job.id,
            started_at,
            finished_at,
            outcome,
            error,
        };
        self.registry.record_run(job.id, finished_at).await?;
        self.registry.record_history(&run).await?;
        info!(parent: &span, outcome = %run.outcome, duration_ms = run.duration_ms(), "Job finished");
        Ok(run)
    }

    /// Run a job by name immediately, serialized with scheduled firings
    pub async fn run_job_now(&self, name: &str) -> Result<JobRun> {
        let job = self
            .registry
            .find_by_name(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", name)))?;
        self.dispatch(&job).await
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if err.is_cancelled() {
        return "cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::catalog::{handler_fn, JobHandler};
    use crate::domain::{JobSpec, LastRunAtPolicy, LogLevel};
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::log_repository::mocks::InMemoryLogRepository;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use crate::port::JobRepository;
    use async_trait::async_trait;
    use futures::FutureExt;
    use std::sync::Mutex as StdMutex;
    use tokio_test::assert_err;

    type Windows = Arc<StdMutex<Vec<(String, Instant, Instant)>>>;

    /// Records its execution window and holds the slot for `work`
    struct Recording {
        windows: Windows,
        work: Duration,
    }

    #[async_trait]
    impl JobHandler for Recording {
        async fn run(&self, ctx: &JobContext) -> Result<()> {
            let start = Instant::now();
            tokio::time::sleep(self.work).await;
            self.windows
                .lock()
                .unwrap()
                .push((ctx.job_name.clone(), start, Instant::now()));
            Ok(())
        }
    }

    struct Panicking;

    #[async_trait]
    impl JobHandler for Panicking {
        async fn run(&self, _ctx: &JobContext) -> Result<()> {
            panic!("boom")
        }
    }

    struct Harness {
        scheduler: Arc<SequentialScheduler>,
        repo: Arc<InMemoryJobRepository>,
        logs: Arc<InMemoryLogRepository>,
        windows: Windows,
    }

    async fn harness(specs: Vec<JobSpec>, work: Duration, extra: JobCatalog) -> Harness {
        let repo = Arc::new(InMemoryJobRepository::new());
        let logs = Arc::new(InMemoryLogRepository::new());
        let clock = Arc::new(ManualTimeProvider::new(1_000));
        let diagnostics = Arc::new(DiagnosticLog::new(logs.clone(), clock.clone()));
        let registry = Arc::new(JobRegistry::new(repo.clone(), LastRunAtPolicy::DeriveOnce));
        let windows: Windows = Arc::new(StdMutex::new(Vec::new()));

        let catalog = extra.register(
            "record",
            Arc::new(Recording {
                windows: windows.clone(),
                work,
            }),
        );
        registry.reconcile(&specs, &catalog).await.unwrap();

        let scheduler = Arc::new(SequentialScheduler::new(
            registry,
            catalog,
            diagnostics,
            clock,
            Arc::new(SequentialIdProvider::new()),
            SchedulerConfig::default(),
        ));
        Harness {
            scheduler,
            repo,
            logs,
            windows,
        }
    }

    async fn run_for(scheduler: Arc<SequentialScheduler>, span: Duration) {
        let (tx, token) = shutdown_channel();
        let handle = tokio::spawn(async move { scheduler.run(token).await });
        tokio::time::sleep(span).await;
        tx.shutdown();
        handle.await.unwrap().unwrap();
    }

    fn assert_no_overlap(windows: &[(String, Instant, Instant)]) {
        let mut sorted = windows.to_vec();
        sorted.sort_by_key(|w| w.1);
        for pair in sorted.windows(2) {
            assert!(
                pair[0].2 <= pair[1].1,
                "{} overlapped {}",
                pair[0].0,
                pair[1].0
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bodies_never_overlap() {
        let h = harness(
            vec![
                JobSpec::new("quoteRefresh", "record", 1),
                JobSpec::new("newsRefresh", "record", 1),
            ],
            Duration::from_secs(40),
            JobCatalog::new(),
        )
        .await;

        run_for(h.scheduler.clone(), Duration::from_secs(600)).await;

        let windows = h.windows.lock().unwrap().clone();
        assert!(windows.iter().filter(|w| w.0 == "quoteRefresh").count() >= 3);
        assert!(windows.iter().filter(|w| w.0 == "newsRefresh").count() >= 3);
        assert_no_overlap(&windows);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_trigger_shares_the_gate() {
        let h = harness(
            vec![JobSpec::new("historyRefresh", "record", 1)],
            Duration::from_secs(30),
            JobCatalog::new(),
        )
        .await;

        let scheduler = h.scheduler.clone();
        let manual = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            scheduler.run_job_now("historyRefresh").await
        });
        run_for(h.scheduler.clone(), Duration::from_secs(120)).await;
        let run = manual.await.unwrap().unwrap();

        assert_eq!(run.outcome, RunOutcome::Succeeded);
        assert_no_overlap(&h.windows.lock().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_runs_follow_id_order_with_stagger() {
        let h = harness(
            vec![
                JobSpec::new("first", "record", 60),
                JobSpec::new("second", "record", 60),
                JobSpec::new("third", "record", 60),
            ],
            Duration::ZERO,
            JobCatalog::new(),
        )
        .await;

        run_for(h.scheduler.clone(), Duration::from_secs(30)).await;

        let windows = h.windows.lock().unwrap().clone();
        let names: Vec<&str> = windows.iter().map(|w| w.0.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert!(windows[1].1 - windows[0].1 >= Duration::from_secs(2));
        assert!(windows[2].1 - windows[1].1 >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_job_keeps_rearming() {
        let catalog = JobCatalog::new().register(
            "explode",
            handler_fn(|_| {
                async { Err::<(), _>(AppError::Internal("source down".to_string())) }.boxed()
            }),
        );
        let h = harness(
            vec![
                JobSpec::new("broken", "explode", 1),
                JobSpec::new("healthy", "record", 1),
            ],
            Duration::from_secs(1),
            catalog,
        )
        .await;

        run_for(h.scheduler.clone(), Duration::from_secs(200)).await;

        let broken_runs: Vec<JobRun> = h
            .repo
            .runs()
            .into_iter()
            .filter(|r| r.job_id == 1)
            .collect();
        assert!(broken_runs.len() >= 3);
        assert!(broken_runs.iter().all(|r| r.outcome == RunOutcome::Failed));
        assert_eq!(
            broken_runs[0].error.as_deref(),
            Some("Internal error: source down")
        );

        let broken = h.repo.find_by_name("broken").await.unwrap().unwrap();
        assert!(broken.last_run.is_some());
        assert!(h.windows.lock().unwrap().len() >= 3);

        let errors: Vec<_> = h
            .logs
            .entries()
            .into_iter()
            .filter(|e| e.level == LogLevel::Error)
            .collect();
        assert!(errors.iter().all(|e| e.context.as_deref() == Some("broken")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_is_isolated() {
        let catalog = JobCatalog::new().register("panic", Arc::new(Panicking));
        let h = harness(
            vec![JobSpec::new("crashy", "panic", 1)],
            Duration::ZERO,
            catalog,
        )
        .await;

        let run = h.scheduler.run_job_now("crashy").await.unwrap();
        assert_eq!(run.outcome, RunOutcome::Failed);
        assert_eq!(run.error.as_deref(), Some("job panicked: boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_method_skipped_without_stopping_others() {
        let h = harness(
            vec![
                JobSpec::new("mystery", "refreshEverything", 1),
                JobSpec::new("healthy", "record", 1),
            ],
            Duration::ZERO,
            JobCatalog::new(),
        )
        .await;

        run_for(h.scheduler.clone(), Duration::from_secs(150)).await;

        let mystery = h.repo.find_by_name("mystery").await.unwrap().unwrap();
        assert_eq!(mystery.last_run, None);
        assert!(h.repo.runs().iter().all(|r| r.job_id != mystery.id));
        assert!(h.windows.lock().unwrap().len() >= 3);

        let skipped: Vec<_> = h
            .logs
            .entries()
            .into_iter()
            .filter(|e| e.context.as_deref() == Some("mystery"))
            .collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].level, LogLevel::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_stagger_counts_from_previous_finish() {
        let h = harness(
            vec![
                JobSpec::new("slow", "record", 60),
                JobSpec::new("next", "record", 60),
            ],
            Duration::from_secs(5),
            JobCatalog::new(),
        )
        .await;

        run_for(h.scheduler.clone(), Duration::from_secs(30)).await;

        let windows = h.windows.lock().unwrap().clone();
        assert_eq!(windows.len(), 2);
        assert!(windows[1].1 >= windows[0].2 + Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unknown_method_kept_when_diagnostic_write_fails() {
        let h = harness(
            vec![JobSpec::new("mystery", "refreshEverything", 1)],
            Duration::ZERO,
            JobCatalog::new(),
        )
        .await;
        h.logs.set_fail_writes(true);

        let job = h.repo.find_by_name("mystery").await.unwrap().unwrap();
        let err = assert_err!(h.scheduler.dispatch(&job).await);
        assert!(matches!(err, AppError::UnknownMethod(_)));
    }

    #[tokio::test]
    async fn test_run_job_now_unknown_name() {
        let h = harness(vec![], Duration::ZERO, JobCatalog::new()).await;
        let err = assert_err!(h.scheduler.run_job_now("nope").await);
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_with_no_jobs() {
        let h = harness(vec![], Duration::ZERO, JobCatalog::new()).await;
        run_for(h.scheduler.clone(), Duration::from_secs(1)).await;
        assert!(h.repo.runs().is_empty());
    }
}
