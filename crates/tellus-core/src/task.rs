//! Harvest run tracking.
//!
//! A [`HarvestTask`] represents one run over one catalog. Failures of
//! individual nodes are recorded against it through the [`TaskLogger`]
//! trait instead of being raised, so a run's log is the primary place
//! where problems surface.
//!
//! ```text
//! running → finished   (per-node errors may still be logged)
//!    ↓
//!  failed              (the catalog itself could not be ingested)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::EntityRef;
use crate::stats::HarvestStats;

// =============================================================================
// Task Status
// =============================================================================

/// Status of a harvest task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Finished,
    Failed,
}

impl TaskStatus {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Finished => "finished",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

/// Error type for parsing TaskStatus from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTaskStatusError(String);

impl std::fmt::Display for ParseTaskStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid task status: {}", self.0)
    }
}

impl std::error::Error for ParseTaskStatusError {}

impl std::str::FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(TaskStatus::Running),
            "finished" => Ok(TaskStatus::Finished),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Log Entries
// =============================================================================

/// Severity of a task log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Expected condition worth reporting, such as an empty filtered list.
    Info,
    /// A node failed and was skipped.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// One structured log entry of a harvest task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLogEntry {
    pub level: LogLevel,
    pub message: String,
    pub entity: Option<EntityRef>,
    pub recorded_at: DateTime<Utc>,
}

impl TaskLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, entity: Option<EntityRef>) -> Self {
        Self {
            level,
            message: message.into(),
            entity,
            recorded_at: Utc::now(),
        }
    }
}

/// Sink for harvest log entries.
///
/// Recording never fails and never changes the caller's control flow.
pub trait TaskLogger: Send {
    fn record(&mut self, entry: TaskLogEntry);

    /// Records a failed node.
    fn error(&mut self, entity: EntityRef, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.record(TaskLogEntry::new(LogLevel::Error, message, Some(entity)));
    }

    /// Records an informational entry.
    fn info(&mut self, entity: Option<EntityRef>, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.record(TaskLogEntry::new(LogLevel::Info, message, entity));
    }
}

// =============================================================================
// Harvest Task
// =============================================================================

/// One harvest run over one catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestTask {
    pub id: Uuid,
    pub catalog_id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub logs: Vec<TaskLogEntry>,
    pub stats: HarvestStats,
}

impl HarvestTask {
    pub fn new(catalog_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            catalog_id: catalog_id.into(),
            status: TaskStatus::Running,
            created_at: Utc::now(),
            finished_at: None,
            logs: Vec::new(),
            stats: HarvestStats::default(),
        }
    }

    /// Marks the run as finished with the given statistics.
    pub fn finish(&mut self, stats: HarvestStats) {
        self.stats = stats;
        self.status = TaskStatus::Finished;
        self.finished_at = Some(Utc::now());
    }

    /// Marks the run as failed, recording the fatal error.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.record(TaskLogEntry::new(LogLevel::Error, message, None));
        self.status = TaskStatus::Failed;
        self.finished_at = Some(Utc::now());
    }

    pub fn errors(&self) -> impl Iterator<Item = &TaskLogEntry> {
        self.logs.iter().filter(|e| e.level == LogLevel::Error)
    }

    /// Log entries referencing the given identifier.
    pub fn entries_for<'a>(&'a self, identifier: &'a str) -> impl Iterator<Item = &'a TaskLogEntry> {
        self.logs.iter().filter(move |e| {
            e.entity
                .as_ref()
                .and_then(|entity| entity.identifier.as_deref())
                == Some(identifier)
        })
    }
}

impl TaskLogger for HarvestTask {
    fn record(&mut self, entry: TaskLogEntry) {
        let entity = entry.entity.as_ref().map(ToString::to_string);
        match entry.level {
            LogLevel::Error => tracing::warn!(
                task = %self.id,
                catalog = %self.catalog_id,
                entity = entity.as_deref().unwrap_or("-"),
                "{}",
                entry.message
            ),
            LogLevel::Info => tracing::info!(
                task = %self.id,
                catalog = %self.catalog_id,
                entity = entity.as_deref().unwrap_or("-"),
                "{}",
                entry.message
            ),
        }
        self.logs.push(entry);
    }
}
