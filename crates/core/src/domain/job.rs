// Job Domain Model

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

/// Job ID (stable, assigned by storage on insert; ascending = insertion order)
pub type JobId = i64;

/// Render epoch millis the way the run timestamps are displayed (ISO-8601, UTC, ms)
pub fn millis_to_iso(millis: i64) -> Option<String> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Declared job, as read from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Symbolic name of a registered job body
    pub method: String,
    pub interval_minutes: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl JobSpec {
    pub fn new(name: impl Into<String>, method: impl Into<String>, interval_minutes: i64) -> Self {
        Self {
            name: name.into(),
            description: None,
            method: method.into(),
            interval_minutes,
            enabled: true,
        }
    }

    pub fn validate(&self) -> super::error::Result<()> {
        if self.name.trim().is_empty() {
            return Err(super::DomainError::ValidationError(
                "job name cannot be empty".to_string(),
            ));
        }
        if self.interval_minutes <= 0 {
            return Err(super::DomainError::InvalidInterval {
                name: self.name.clone(),
                minutes: self.interval_minutes,
            });
        }
        Ok(())
    }
}

/// How `last_run_at` follows `last_run`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastRunAtPolicy {
    /// Derived from the first recorded run only, never refreshed afterwards.
    /// Reproduces the legacy behaviour; likely unintended.
    #[default]
    DeriveOnce,
    /// Re-derived from `last_run` on every recorded run
    AlwaysRecompute,
}

/// Persisted job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub description: Option<String>,
    pub method: String,
    pub interval_minutes: i64,
    pub enabled: bool,
    /// Completion of the most recent run (epoch ms)
    pub last_run: Option<i64>,
    /// ISO companion of `last_run`, see [`LastRunAtPolicy`]
    pub last_run_at: Option<String>,
}

impl Job {
    /// Record a completed run at `finished_at`
    pub fn record_run(&mut self, finished_at: i64, policy: LastRunAtPolicy) {
        self.last_run = Some(finished_at);
        match policy {
            LastRunAtPolicy::DeriveOnce => {
                if self.last_run_at.is_none() {
                    self.last_run_at = millis_to_iso(finished_at);
                }
            }
            LastRunAtPolicy::AlwaysRecompute => {
                self.last_run_at = millis_to_iso(finished_at);
            }
        }
    }
}

/// Outcome of a single dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Succeeded => write!(f, "SUCCEEDED"),
            RunOutcome::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for RunOutcome {
    type Err = super::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCEEDED" => Ok(RunOutcome::Succeeded),
            "FAILED" => Ok(RunOutcome::Failed),
            other => Err(super::DomainError::ValidationError(format!(
                "unknown run outcome: {other}"
            ))),
        }
    }
}

/// Run history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    /// UUID v4
    pub id: String,
    pub job_id: JobId,
    pub started_at: i64,
    pub finished_at: i64,
    pub outcome: RunOutcome,
    pub error: Option<String>,
}

impl JobRun {
    pub fn duration_ms(&self) -> i64 {
        self.finished_at - self.started_at
    }
}
