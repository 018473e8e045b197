//! Marketfeed - Main Entry Point
//! Freshness-driven market data refresh daemon

mod settings;
mod telemetry;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use settings::DaemonConfig;
use marketfeed_core::application::{
    shutdown_channel, standard_catalog, DiagnosticLog, FreshnessCache, JobRegistry, LogRetention,
    MarketDataService, ReferenceService, SequentialScheduler,
};
use marketfeed_core::port::id_provider::UuidProvider;
use marketfeed_core::port::time_provider::SystemTimeProvider;
use marketfeed_core::port::{IdProvider, TimeProvider};
use marketfeed_infra_fetch::HttpMarketFetcher;
use marketfeed_infra_sqlite::{
    create_pool, is_memory_url, run_migrations, SqliteCacheRepository, SqliteIndexRepository,
    SqliteJobRepository, SqliteLogRepository,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_ENV: &str = "development";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let env = std::env::var("MARKETFEED_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    let config = DaemonConfig::load(&env)?;

    // 2. Initialize logging
    let _log_guard = telemetry::init(&config.logging)?;
    info!(env = %env, "Marketfeed v{} starting...", VERSION);

    // 3. Initialize database
    let db_url = config.database.expanded_url();
    if !is_memory_url(&db_url) {
        if let Some(parent) = Path::new(&db_url).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    info!(db_url = %db_url, "Initializing database...");

    let pool = create_pool(&db_url, config.database.max_connections)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let id_provider: Arc<dyn IdProvider> = Arc::new(UuidProvider);

    let cache_repo = Arc::new(SqliteCacheRepository::new(pool.clone()));
    let job_repo = Arc::new(SqliteJobRepository::new(pool.clone()));
    let log_repo = Arc::new(SqliteLogRepository::new(pool.clone()));
    let index_repo = Arc::new(SqliteIndexRepository::new(pool.clone()));

    let fetcher = Arc::new(
        HttpMarketFetcher::new(config.fetch.to_fetch_config())
            .map_err(|e| anyhow::anyhow!("HTTP client setup failed: {}", e))?,
    );

    let diagnostics = Arc::new(DiagnosticLog::new(log_repo.clone(), time_provider.clone()));
    let cache = Arc::new(FreshnessCache::new(
        cache_repo,
        diagnostics.clone(),
        time_provider.clone(),
        config.cache.to_policies(),
    ));
    let market = Arc::new(MarketDataService::new(
        cache,
        fetcher,
        index_repo.clone(),
        time_provider.clone(),
    ));
    let reference = Arc::new(ReferenceService::new(index_repo, time_provider.clone()));
    let retention = Arc::new(LogRetention::new(log_repo, diagnostics.clone()));
    let registry = Arc::new(JobRegistry::new(job_repo, config.scheduler.last_run_at));

    // 5. Reconcile reference data and the declared job table
    let seeded = reference
        .reconcile_indexes(&config.indexes)
        .await
        .map_err(|e| anyhow::anyhow!("Index reconciliation failed: {}", e))?;
    info!(inserted = seeded, declared = config.indexes.len(), "Reference indexes reconciled");

    let catalog = standard_catalog(market, reference, retention, &config.job_settings())
        .map_err(|e| anyhow::anyhow!("Job catalog setup failed: {}", e))?;

    let report = registry
        .reconcile(&config.jobs, &catalog)
        .await
        .map_err(|e| anyhow::anyhow!("Job reconciliation failed: {}", e))?;
    info!(
        inserted = report.inserted.len(),
        existing = report.existing.len(),
        "Job table reconciled"
    );
    for name in &report.unknown_methods {
        warn!(job = %name, "Declared job has no registered body");
    }

    // 6. Start the scheduler
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let scheduler = SequentialScheduler::new(
        registry,
        catalog,
        diagnostics,
        time_provider,
        id_provider,
        config.scheduler.to_scheduler_config(),
    );

    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.run(shutdown_rx).await {
            error!(error = %e, "Scheduler failed");
        }
    });

    info!("✅ System ready. Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown (a running job body is allowed to finish)
    shutdown_tx.shutdown();
    if tokio::time::timeout(SHUTDOWN_GRACE, scheduler_handle)
        .await
        .is_err()
    {
        warn!("Scheduler did not stop within {:?}", SHUTDOWN_GRACE);
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
