//! Harvest task repository.
//!
//! Each task row carries its log and statistics as JSONB documents, written
//! once when the run reaches a terminal state.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use tellus_core::error::AppError;
use tellus_core::stats::HarvestStats;
use tellus_core::task::{HarvestTask, TaskLogEntry, TaskStatus};
use tellus_core::traits::TaskStore;

/// PostgreSQL store for harvest tasks.
#[derive(Clone)]
pub struct TaskRepository {
    pool: Pool<Postgres>,
}

impl TaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of tasks currently marked running.
    pub async fn count_running(&self) -> Result<i64, AppError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM harvest_tasks WHERE status = $1")
                .bind(TaskStatus::Running.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    catalog_id: String,
    status: String,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    logs: Json<Vec<TaskLogEntry>>,
    stats: Json<HarvestStats>,
}

impl TryFrom<TaskRow> for HarvestTask {
    type Error = AppError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status: TaskStatus = row
            .status
            .parse()
            .map_err(|e| AppError::Generic(format!("task {}: {}", row.id, e)))?;
        Ok(Self {
            id: row.id,
            catalog_id: row.catalog_id,
            status,
            created_at: row.created_at,
            finished_at: row.finished_at,
            logs: row.logs.0,
            stats: row.stats.0,
        })
    }
}

impl TaskStore for TaskRepository {
    async fn create_task(&self, catalog_id: &str) -> Result<HarvestTask, AppError> {
        let task = HarvestTask::new(catalog_id);

        sqlx::query(
            r#"
            INSERT INTO harvest_tasks (id, catalog_id, status, created_at, logs, stats)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(task.id)
        .bind(&task.catalog_id)
        .bind(task.status.as_str())
        .bind(task.created_at)
        .bind(Json(&task.logs))
        .bind(Json(&task.stats))
        .execute(&self.pool)
        .await?;

        tracing::debug!(task = %task.id, catalog = %catalog_id, "Task created");
        Ok(task)
    }

    async fn save_task(&self, task: &HarvestTask) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE harvest_tasks
            SET status = $2, finished_at = $3, logs = $4, stats = $5
            WHERE id = $1
            "#,
        )
        .bind(task.id)
        .bind(task.status.as_str())
        .bind(task.finished_at)
        .bind(Json(&task.logs))
        .bind(Json(&task.stats))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("task {}", task.id)));
        }
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<HarvestTask>, AppError> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            SELECT id, catalog_id, status, created_at, finished_at, logs, stats
            FROM harvest_tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(HarvestTask::try_from).transpose()
    }

    async fn list_tasks(&self, limit: usize) -> Result<Vec<HarvestTask>, AppError> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT id, catalog_id, status, created_at, finished_at, logs, stats
            FROM harvest_tasks
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HarvestTask::try_from).collect()
    }
}
