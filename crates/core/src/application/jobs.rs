// Standard Job Bodies
// Refresh jobs walk their targets through MarketDataService, so each
// symbol is only refetched when its cache record is stale

use super::catalog::{JobCatalog, JobContext, JobHandler};
use super::market_data::MarketDataService;
use super::reference::ReferenceService;
use super::retention::LogRetention;
use crate::domain::{Freshness, MarketIndex, SymbolKey};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Method names bound by `standard_catalog`
pub mod methods {
    pub const REFRESH_QUOTES: &str = "refreshQuotes";
    pub const REFRESH_HISTORY: &str = "refreshHistory";
    pub const REFRESH_MOVERS: &str = "refreshMovers";
    pub const REFRESH_NEWS: &str = "refreshNews";
    pub const REFRESH_CONSTITUENTS: &str = "refreshConstituents";
    pub const COMPACT_LOGS: &str = "compactLogs";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    Quotes,
    History,
    Movers,
    News,
    Constituents,
}

impl RefreshKind {
    fn label(&self) -> &'static str {
        match self {
            RefreshKind::Quotes => "quotes",
            RefreshKind::History => "history",
            RefreshKind::Movers => "movers",
            RefreshKind::News => "news",
            RefreshKind::Constituents => "constituents",
        }
    }
}

/// Settings shared by the standard job bodies
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Symbols refreshed by the quote, history and news jobs (besides index symbols)
    pub watchlist: Vec<String>,
    /// Pause between two targets of one job
    pub pacing: Duration,
    /// Entries kept by log compaction
    pub retention_keep: i64,
}

/// Refresh one domain for every target
pub struct RefreshJob {
    kind: RefreshKind,
    market: Arc<MarketDataService>,
    reference: Arc<ReferenceService>,
    watchlist: Vec<String>,
    pacing: Duration,
}

impl RefreshJob {
    pub fn new(
        kind: RefreshKind,
        market: Arc<MarketDataService>,
        reference: Arc<ReferenceService>,
        settings: &JobSettings,
    ) -> Self {
        Self {
            kind,
            market,
            reference,
            watchlist: settings.watchlist.clone(),
            pacing: settings.pacing,
        }
    }

    /// Normalized, de-duplicated targets for this kind
    async fn targets(&self) -> Result<Vec<String>> {
        let indexes = self.reference.list_indexes().await?;
        let selected: Vec<&MarketIndex> = match self.kind {
            RefreshKind::Movers => indexes
                .iter()
                .filter(|i| i.investing_url_name.is_some())
                .collect(),
            RefreshKind::Constituents => {
                indexes.iter().filter(|i| i.stock_list.is_some()).collect()
            }
            _ => indexes.iter().collect(),
        };

        let mut targets = BTreeSet::new();
        for index in selected {
            targets.insert(SymbolKey::parse(&index.symbol)?.to_string());
        }
        if matches!(
            self.kind,
            RefreshKind::Quotes | RefreshKind::History | RefreshKind::News
        ) {
            for symbol in &self.watchlist {
                match SymbolKey::parse(symbol) {
                    Ok(key) => {
                        targets.insert(key.to_string());
                    }
                    Err(_) => warn!(symbol = %symbol, "Skipping blank watchlist symbol"),
                }
            }
        }
        Ok(targets.into_iter().collect())
    }

    /// Refresh one target. A refresh that fell back to stale data is an error here.
    async fn refresh_one(&self, symbol: &str) -> Result<()> {
        let freshness = match self.kind {
            RefreshKind::Quotes => self.market.quote(symbol).await?.freshness,
            RefreshKind::History => self.market.history(symbol).await?.freshness,
            RefreshKind::Movers => self.market.movers(symbol).await?.freshness,
            RefreshKind::News => self.market.news(symbol).await?.freshness,
            RefreshKind::Constituents => self.market.constituents(symbol).await?.freshness,
        };
        match freshness {
            Freshness::Stale { error } => Err(AppError::StaleRefresh {
                key: symbol.to_string(),
                error,
            }),
            Freshness::Fetched | Freshness::Cached => Ok(()),
        }
    }
}

#[async_trait]
impl JobHandler for RefreshJob {
    async fn run(&self, ctx: &JobContext) -> Result<()> {
        let targets = self.targets().await?;
        let mut failed = 0usize;
        let mut last_error = None;

        for (i, symbol) in targets.iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            match self.refresh_one(symbol).await {
                Ok(()) => {}
                Err(err) if err.is_fetch() => {
                    warn!(job = %ctx.job_name, symbol = %symbol, error = %err, "Refresh fetch failed");
                    failed += 1;
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            job = %ctx.job_name,
            kind = self.kind.label(),
            targets = targets.len(),
            failed,
            "Refresh pass finished"
        );

        // Nothing refreshed at all: surface the failure to the run history
        match last_error {
            Some(err) if failed == targets.len() => Err(err),
            _ => Ok(()),
        }
    }
}

/// Trim the diagnostic log
pub struct LogCompactionJob {
    retention: Arc<LogRetention>,
    keep: i64,
}

impl LogCompactionJob {
    pub fn new(retention: Arc<LogRetention>, keep: i64) -> Self {
        Self { retention, keep }
    }
}

#[async_trait]
impl JobHandler for LogCompactionJob {
    async fn run(&self, _ctx: &JobContext) -> Result<()> {
        self.retention.compact(self.keep).await.map(|_| ())
    }
}

/// Catalog with every standard job body bound to its method name
pub fn standard_catalog(
    market: Arc<MarketDataService>,
    reference: Arc<ReferenceService>,
    retention: Arc<LogRetention>,
    settings: &JobSettings,
) -> Result<JobCatalog> {
    if settings.retention_keep <= 0 {
        return Err(AppError::Config(format!(
            "retention keep must be positive, got {}",
            settings.retention_keep
        )));
    }

    let refresh = |kind| -> Arc<dyn JobHandler> {
        Arc::new(RefreshJob::new(
            kind,
            market.clone(),
            reference.clone(),
            settings,
        ))
    };

    Ok(JobCatalog::new()
        .register(methods::REFRESH_QUOTES, refresh(RefreshKind::Quotes))
        .register(methods::REFRESH_HISTORY, refresh(RefreshKind::History))
        .register(methods::REFRESH_MOVERS, refresh(RefreshKind::Movers))
        .register(methods::REFRESH_NEWS, refresh(RefreshKind::News))
        .register(
            methods::REFRESH_CONSTITUENTS,
            refresh(RefreshKind::Constituents),
        )
        .register(
            methods::COMPACT_LOGS,
            Arc::new(LogCompactionJob::new(retention, settings.retention_keep)),
        ))
}
