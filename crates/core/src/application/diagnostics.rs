// Diagnostic Log Service
// Persists LogEntry rows and mirrors each one as a tracing event

use crate::domain::{LogLevel, NewLogEntry};
use crate::error::Result;
use crate::port::{LogRepository, TimeProvider};
use std::sync::Arc;

/// Append-only diagnostic log shared by the cache, scheduler and retention
pub struct DiagnosticLog {
    repo: Arc<dyn LogRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl DiagnosticLog {
    pub fn new(repo: Arc<dyn LogRepository>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            repo,
            time_provider,
        }
    }

    /// Append an entry and emit the matching tracing event.
    ///
    /// Storage failures propagate to the caller.
    pub async fn record(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        context: Option<&str>,
    ) -> Result<i64> {
        let message = message.into();
        let ctx = context.unwrap_or("-");
        match level {
            LogLevel::Debug => tracing::debug!(context = %ctx, "{}", message),
            LogLevel::Info => tracing::info!(context = %ctx, "{}", message),
            LogLevel::Warn => tracing::warn!(context = %ctx, "{}", message),
            LogLevel::Error => tracing::error!(context = %ctx, "{}", message),
        }

        let entry = NewLogEntry {
            level,
            message,
            context: context.map(str::to_string),
            created: self.time_provider.now_millis(),
        };
        self.repo.append(&entry).await
    }

    pub async fn info(&self, message: impl Into<String>, context: Option<&str>) -> Result<i64> {
        self.record(LogLevel::Info, message, context).await
    }

    pub async fn warn(&self, message: impl Into<String>, context: Option<&str>) -> Result<i64> {
        self.record(LogLevel::Warn, message, context).await
    }

    pub async fn error(&self, message: impl Into<String>, context: Option<&str>) -> Result<i64> {
        self.record(LogLevel::Error, message, context).await
    }
}
