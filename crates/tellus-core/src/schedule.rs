//! Repeatable job registration.
//!
//! The periodic harvest itself is executed by an external job runner; this
//! module only decides what gets registered. A job is keyed by name, and a
//! second registration with the same callable and interval is refused so
//! the same harvest is never scheduled twice.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ScheduleDefaults;
use crate::error::AppError;
use crate::traits::ScheduleStore;

// =============================================================================
// Interval Unit
// =============================================================================

/// Unit of a repeat interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Weeks,
    Days,
    Hours,
    Minutes,
}

impl IntervalUnit {
    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Weeks => "weeks",
            IntervalUnit::Days => "days",
            IntervalUnit::Hours => "hours",
            IntervalUnit::Minutes => "minutes",
        }
    }

    /// Length of `count` units.
    pub fn duration(&self, count: u32) -> TimeDelta {
        let count = i64::from(count);
        match self {
            IntervalUnit::Weeks => TimeDelta::weeks(count),
            IntervalUnit::Days => TimeDelta::days(count),
            IntervalUnit::Hours => TimeDelta::hours(count),
            IntervalUnit::Minutes => TimeDelta::minutes(count),
        }
    }
}

/// Error type for parsing IntervalUnit from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIntervalUnitError(String);

impl std::fmt::Display for ParseIntervalUnitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid interval unit: {} (expected weeks, days, hours or minutes)",
            self.0
        )
    }
}

impl std::error::Error for ParseIntervalUnitError {}

impl std::str::FromStr for IntervalUnit {
    type Err = ParseIntervalUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weeks" => Ok(IntervalUnit::Weeks),
            "days" => Ok(IntervalUnit::Days),
            "hours" => Ok(IntervalUnit::Hours),
            "minutes" => Ok(IntervalUnit::Minutes),
            _ => Err(ParseIntervalUnitError(s.to_string())),
        }
    }
}

impl std::fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Repeatable Job
// =============================================================================

/// A periodic invocation registered with the job runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatableJob {
    pub id: Uuid,
    /// Unique job name.
    pub name: String,
    /// Reference to the function the runner invokes.
    pub callable: String,
    pub queue: String,
    /// First run.
    pub scheduled_time: DateTime<Utc>,
    pub interval: u32,
    pub unit: IntervalUnit,
    /// Number of repetitions; `None` repeats forever.
    pub repeat: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Parameters of a job registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub name: String,
    pub callable: String,
    pub hour: u32,
    pub minute: u32,
    pub interval: u32,
    pub unit: IntervalUnit,
    pub queue: String,
}

impl ScheduleRequest {
    /// Creates a request using the built-in defaults (daily at 06:00 UTC).
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_defaults(name, &ScheduleDefaults::default())
    }

    pub fn from_defaults(name: impl Into<String>, defaults: &ScheduleDefaults) -> Self {
        Self {
            name: name.into(),
            callable: defaults.callable.clone(),
            hour: defaults.hour,
            minute: defaults.minute,
            interval: defaults.interval,
            unit: defaults.unit,
            queue: defaults.queue.clone(),
        }
    }

    pub fn with_callable(mut self, callable: impl Into<String>) -> Self {
        self.callable = callable.into();
        self
    }

    pub fn with_time(mut self, hour: u32, minute: u32) -> Self {
        self.hour = hour;
        self.minute = minute;
        self
    }

    pub fn with_interval(mut self, interval: u32, unit: IntervalUnit) -> Self {
        self.interval = interval;
        self.unit = unit;
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ConfigError("job name must not be empty".to_string()));
        }
        if self.callable.trim().is_empty() {
            return Err(AppError::ConfigError("callable must not be empty".to_string()));
        }
        if self.interval == 0 {
            return Err(AppError::ConfigError(
                "interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of [`register_repeatable_job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(RepeatableJob),
    /// Jobs with the same callable and interval that already exist.
    AlreadyScheduled(Vec<RepeatableJob>),
}

/// Tomorrow (relative to `now`) at `hour:minute:00` UTC.
pub fn first_run_at(now: DateTime<Utc>, hour: u32, minute: u32) -> Result<DateTime<Utc>, AppError> {
    let tomorrow = (now + TimeDelta::days(1)).date_naive();
    tomorrow
        .and_hms_opt(hour, minute, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            AppError::ConfigError(format!("invalid time of day {:02}:{:02}", hour, minute))
        })
}

/// Registers a repeatable harvest job.
///
/// Nothing is written when a job with the same callable, interval and unit
/// exists, whatever its name. Otherwise the job named `request.name` is
/// created or overwritten.
pub async fn register_repeatable_job<S: ScheduleStore>(
    store: &S,
    request: &ScheduleRequest,
    now: DateTime<Utc>,
) -> Result<Registration, AppError> {
    request.validate()?;
    let scheduled_time = first_run_at(now, request.hour, request.minute)?;

    let existing = store
        .find_jobs(&request.callable, request.interval, request.unit)
        .await?;
    if !existing.is_empty() {
        tracing::info!(
            callable = %request.callable,
            interval = request.interval,
            unit = %request.unit,
            "Job already scheduled"
        );
        return Ok(Registration::AlreadyScheduled(existing));
    }

    let job = RepeatableJob {
        id: Uuid::new_v4(),
        name: request.name.clone(),
        callable: request.callable.clone(),
        queue: request.queue.clone(),
        scheduled_time,
        interval: request.interval,
        unit: request.unit,
        repeat: None,
        created_at: now,
    };
    let saved = store.upsert_job_by_name(&job).await?;

    tracing::info!(
        name = %saved.name,
        first_run = %saved.scheduled_time,
        "Registered repeatable job"
    );
    Ok(Registration::Created(saved))
}
