//! Daemon configuration.
//!
//! Merged from `config/default.toml`, an optional `config/{MARKETFEED_ENV}.toml`
//! overlay and `MARKETFEED__SECTION__KEY` environment variables.

use anyhow::{Context, Result};
use marketfeed_core::application::constants::{
    DEFAULT_FETCH_PACING, DEFAULT_LOG_RETENTION_KEEP, DEFAULT_STARTUP_STAGGER, HISTORY_TTL,
    INTERVAL_UNIT, MOVERS_TTL, NEWS_TTL, QUOTE_TTL,
};
use marketfeed_core::application::{
    CachePolicies, JobSettings, RefreshFailurePolicy, SchedulerConfig, Ttl,
};
use marketfeed_core::domain::{Domain, JobSpec, LastRunAtPolicy, MarketIndex};
use marketfeed_infra_fetch::FetchConfig;
use serde::Deserialize;
use std::time::Duration;

pub const ENV_PREFIX: &str = "MARKETFEED";
const DEFAULT_DB_URL: &str = "~/.marketfeed/marketfeed.db";

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub fetch: FetchSection,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
    /// Reference indexes seeded at startup
    #[serde(default)]
    pub indexes: Vec<MarketIndex>,
    /// Declared job table
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// File path (`~` expanded) or `sqlite::memory:`
    #[serde(default = "default_db_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn expanded_url(&self) -> String {
        shellexpand::tilde(&self.url).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Used when RUST_LOG is unset
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Daily rolling log files are written here when set
    #[serde(default)]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
            directory: None,
        }
    }
}

/// Per-domain TTLs in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_quote_ttl")]
    pub quote_ttl_secs: u64,
    #[serde(default = "default_history_ttl")]
    pub history_ttl_secs: u64,
    #[serde(default = "default_movers_ttl")]
    pub movers_ttl_secs: u64,
    #[serde(default = "default_news_ttl")]
    pub news_ttl_secs: u64,
    #[serde(default = "default_true")]
    pub serve_stale_on_error: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            quote_ttl_secs: default_quote_ttl(),
            history_ttl_secs: default_history_ttl(),
            movers_ttl_secs: default_movers_ttl(),
            news_ttl_secs: default_news_ttl(),
            serve_stale_on_error: true,
        }
    }
}

impl CacheConfig {
    pub fn to_policies(&self) -> CachePolicies {
        let secs = |s| Ttl::Finite(Duration::from_secs(s));
        let failure = if self.serve_stale_on_error {
            RefreshFailurePolicy::ServeStale
        } else {
            RefreshFailurePolicy::Propagate
        };

        CachePolicies::default()
            .with_ttl(Domain::Quote, secs(self.quote_ttl_secs))
            .with_ttl(Domain::History, secs(self.history_ttl_secs))
            .with_ttl(Domain::Movers, secs(self.movers_ttl_secs))
            .with_ttl(Domain::News, secs(self.news_ttl_secs))
            .with_refresh_failure(failure)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_stagger_millis")]
    pub startup_stagger_millis: u64,
    #[serde(default = "default_interval_unit")]
    pub interval_unit_secs: u64,
    #[serde(default)]
    pub last_run_at: LastRunAtPolicy,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            startup_stagger_millis: default_stagger_millis(),
            interval_unit_secs: default_interval_unit(),
            last_run_at: LastRunAtPolicy::default(),
        }
    }
}

impl SchedulerSection {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            startup_stagger: Duration::from_millis(self.startup_stagger_millis),
            interval_unit: Duration::from_secs(self.interval_unit_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchSection {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_pacing_millis")]
    pub pacing_millis: u64,
    #[serde(default = "default_news_count")]
    pub news_count: u32,
    #[serde(default = "default_top_movers")]
    pub top_movers: usize,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            user_agent: None,
            pacing_millis: default_pacing_millis(),
            news_count: default_news_count(),
            top_movers: default_top_movers(),
        }
    }
}

impl FetchSection {
    pub fn to_fetch_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            news_count: self.news_count,
            top_movers: self.top_movers,
            ..FetchConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_keep")]
    pub keep: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep: default_keep(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchlistConfig {
    /// Extra symbols refreshed alongside the index symbols
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl DaemonConfig {
    /// Load from `config/` relative to the working directory
    pub fn load(env: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build config")?;

        config
            .try_deserialize()
            .context("Failed to deserialize config")
    }

    /// Parse a single TOML document (no overlays)
    pub fn from_toml(source: &str) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .context("Failed to build config")?
            .try_deserialize()
            .context("Failed to deserialize config")
    }

    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            watchlist: self.watchlist.symbols.clone(),
            pacing: Duration::from_millis(self.fetch.pacing_millis),
            retention_keep: self.retention.keep,
        }
    }
}

fn default_db_url() -> String {
    DEFAULT_DB_URL.to_string()
}

fn default_max_connections() -> u32 {
    4
}

fn default_filter() -> String {
    "marketfeed=info".to_string()
}

fn default_quote_ttl() -> u64 {
    QUOTE_TTL.as_secs()
}

fn default_history_ttl() -> u64 {
    HISTORY_TTL.as_secs()
}

fn default_movers_ttl() -> u64 {
    MOVERS_TTL.as_secs()
}

fn default_news_ttl() -> u64 {
    NEWS_TTL.as_secs()
}

fn default_true() -> bool {
    true
}

fn default_stagger_millis() -> u64 {
    DEFAULT_STARTUP_STAGGER.as_millis() as u64
}

fn default_interval_unit() -> u64 {
    INTERVAL_UNIT.as_secs()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_pacing_millis() -> u64 {
    DEFAULT_FETCH_PACING.as_millis() as u64
}

fn default_news_count() -> u32 {
    10
}

fn default_top_movers() -> usize {
    5
}

fn default_keep() -> i64 {
    DEFAULT_LOG_RETENTION_KEEP
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketfeed_core::domain::SymbolListFormat;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = DaemonConfig::from_toml("").unwrap();

        assert_eq!(config.database.url, DEFAULT_DB_URL);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.retention.keep, 100);
        assert_eq!(config.scheduler.last_run_at, LastRunAtPolicy::DeriveOnce);
        assert_eq!(
            config.scheduler.to_scheduler_config(),
            SchedulerConfig::default()
        );
        assert_eq!(config.cache.to_policies(), CachePolicies::default());
        assert!(config.jobs.is_empty());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = DaemonConfig::from_toml(
            r#"
            [logging]
            format = "json"

            [cache]
            quote_ttl_secs = 30
            serve_stale_on_error = false

            [scheduler]
            startup_stagger_millis = 0
            last_run_at = "always_recompute"

            [watchlist]
            symbols = ["AAPL", "msft"]

            [[indexes]]
            symbol = "^GSPC"
            investing_url_name = "us-spx-500"

            [indexes.stock_list]
            source_url = "https://example.com/sp500"
            format = "wikipedia"
            symbol_column = "Symbol"
            name_column = "Security"

            [[jobs]]
            name = "newsRefresh"
            method = "refreshNews"
            interval_minutes = 240
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
        let policies = config.cache.to_policies();
        assert_eq!(policies.quote.ttl, Ttl::Finite(Duration::from_secs(30)));
        assert_eq!(policies.on_refresh_failure, RefreshFailurePolicy::Propagate);
        assert_eq!(
            config.scheduler.last_run_at,
            LastRunAtPolicy::AlwaysRecompute
        );
        assert_eq!(
            config.scheduler.to_scheduler_config().startup_stagger,
            Duration::ZERO
        );
        assert_eq!(config.job_settings().watchlist, vec!["AAPL", "msft"]);

        assert_eq!(config.indexes.len(), 1);
        let source = config.indexes[0].stock_list.as_ref().unwrap();
        assert_eq!(source.format, SymbolListFormat::Wikipedia);

        assert_eq!(config.jobs.len(), 1);
        assert_eq!(config.jobs[0].interval_minutes, 240);
        assert!(config.jobs[0].enabled);
    }
}
