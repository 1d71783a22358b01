//! Repeatable job registrations.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use tellus_core::error::AppError;
use tellus_core::schedule::{IntervalUnit, RepeatableJob};
use tellus_core::traits::ScheduleStore;

const JOB_COLUMNS: &str = "id, name, callable, queue, scheduled_time, interval_count, interval_unit, repeat_count, created_at";

/// PostgreSQL store for repeatable jobs, unique by name.
#[derive(Clone)]
pub struct ScheduleRepository {
    pool: Pool<Postgres>,
}

impl ScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    name: String,
    callable: String,
    queue: String,
    scheduled_time: DateTime<Utc>,
    interval_count: i32,
    interval_unit: String,
    repeat_count: Option<i32>,
    created_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for RepeatableJob {
    type Error = AppError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let unit: IntervalUnit = row
            .interval_unit
            .parse()
            .map_err(|e| AppError::Generic(format!("job '{}': {}", row.name, e)))?;
        Ok(Self {
            id: row.id,
            name: row.name,
            callable: row.callable,
            queue: row.queue,
            scheduled_time: row.scheduled_time,
            interval: row.interval_count as u32,
            unit,
            repeat: row.repeat_count.map(|r| r as u32),
            created_at: row.created_at,
        })
    }
}

impl ScheduleStore for ScheduleRepository {
    async fn find_jobs(
        &self,
        callable: &str,
        interval: u32,
        unit: IntervalUnit,
    ) -> Result<Vec<RepeatableJob>, AppError> {
        let query = format!(
            "SELECT {} FROM repeatable_jobs WHERE callable = $1 AND interval_count = $2 AND interval_unit = $3 ORDER BY name",
            JOB_COLUMNS
        );
        let rows: Vec<JobRow> = sqlx::query_as(&query)
            .bind(callable)
            .bind(interval as i32)
            .bind(unit.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(RepeatableJob::try_from).collect()
    }

    async fn upsert_job_by_name(&self, job: &RepeatableJob) -> Result<RepeatableJob, AppError> {
        let query = format!(
            r#"
            INSERT INTO repeatable_jobs (
                id, name, callable, queue, scheduled_time,
                interval_count, interval_unit, repeat_count, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name)
            DO UPDATE SET
                callable = EXCLUDED.callable,
                queue = EXCLUDED.queue,
                scheduled_time = EXCLUDED.scheduled_time,
                interval_count = EXCLUDED.interval_count,
                interval_unit = EXCLUDED.interval_unit,
                repeat_count = EXCLUDED.repeat_count
            RETURNING {}
            "#,
            JOB_COLUMNS
        );
        let row: JobRow = sqlx::query_as(&query)
            .bind(job.id)
            .bind(&job.name)
            .bind(&job.callable)
            .bind(&job.queue)
            .bind(job.scheduled_time)
            .bind(job.interval as i32)
            .bind(job.unit.as_str())
            .bind(job.repeat.map(|r| r as i32))
            .bind(job.created_at)
            .fetch_one(&self.pool)
            .await?;

        RepeatableJob::try_from(row)
    }

    async fn list_jobs(&self) -> Result<Vec<RepeatableJob>, AppError> {
        let query = format!("SELECT {} FROM repeatable_jobs ORDER BY name", JOB_COLUMNS);
        let rows: Vec<JobRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        rows.into_iter().map(RepeatableJob::try_from).collect()
    }
}
