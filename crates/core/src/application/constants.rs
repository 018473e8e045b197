// Refresh engine constants (no magic values)
use std::time::Duration;

/// Quote staleness window (1 minute)
pub const QUOTE_TTL: Duration = Duration::from_secs(60);

/// History staleness window (24 hours)
pub const HISTORY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Market movers staleness window (4 hours)
pub const MOVERS_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// News staleness window (4 hours)
pub const NEWS_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Settling delay between jobs' initial runs at scheduler startup (2s)
pub const DEFAULT_STARTUP_STAGGER: Duration = Duration::from_secs(2);

/// Length of one job interval unit (job intervals are declared in minutes)
pub const INTERVAL_UNIT: Duration = Duration::from_secs(60);

/// Diagnostic log entries kept by compaction
pub const DEFAULT_LOG_RETENTION_KEEP: i64 = 100;

/// Pause between per-symbol fetches inside a refresh job
pub const DEFAULT_FETCH_PACING: Duration = Duration::from_millis(250);

/// History lookback: five years ...
pub const HISTORY_LOOKBACK_MONTHS: u32 = 60;

/// ... plus sixty days
pub const HISTORY_LOOKBACK_EXTRA_DAYS: i64 = 60;

/// Run history entries returned by default
pub const DEFAULT_RECENT_RUNS_LIMIT: i64 = 20;
