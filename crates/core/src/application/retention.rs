// Log Retention
// Bounds the diagnostic log to the most recent entries by id

use super::diagnostics::DiagnosticLog;
use crate::error::{AppError, Result};
use crate::port::LogRepository;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    pub kept: i64,
    pub deleted: u64,
}

pub struct LogRetention {
    repo: Arc<dyn LogRepository>,
    diagnostics: Arc<DiagnosticLog>,
}

impl LogRetention {
    pub fn new(repo: Arc<dyn LogRepository>, diagnostics: Arc<DiagnosticLog>) -> Self {
        Self { repo, diagnostics }
    }

    /// Keep the `keep` highest ids, delete the rest.
    ///
    /// The summary entry is appended first so it is part of the kept set.
    pub async fn compact(&self, keep: i64) -> Result<CompactionReport> {
        if keep <= 0 {
            return Err(AppError::Validation(format!(
                "log retention must keep at least one entry, got {}",
                keep
            )));
        }

        let total = self.repo.count().await? + 1;
        let kept = total.min(keep);
        self.diagnostics
            .info(format!("Log compaction kept {} entries", kept), Some("compactLogs"))
            .await?;

        let deleted = self.repo.retain_latest(keep).await?;
        info!(kept, deleted, "Diagnostic log compacted");
        Ok(CompactionReport { kept, deleted })
    }
}
