//! Database schema.
//!
//! Node uniqueness is scoped to the parent. Catalogs have no parent, so the
//! unique key uses `parent_key` (the nil UUID for catalogs) and `title_key`
//! (the field title, empty for every other kind) to stay free of NULLs.

use sqlx::PgPool;
use tellus_core::error::AppError;

/// Schema statements, executed one by one.
pub const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS nodes (
        id UUID PRIMARY KEY,
        kind VARCHAR(16) NOT NULL,
        parent_id UUID REFERENCES nodes(id) ON DELETE CASCADE,
        parent_key UUID NOT NULL,
        identifier TEXT NOT NULL,
        title TEXT,
        title_key TEXT NOT NULL DEFAULT '',
        metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
        updated BOOLEAN NOT NULL DEFAULT FALSE,
        indexable_eligible BOOLEAN NOT NULL DEFAULT FALSE,
        download_url TEXT,
        content_digest VARCHAR(128),
        indexable BOOLEAN NOT NULL DEFAULT FALSE,
        last_content_update TIMESTAMPTZ,
        payload_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        modified_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT uk_nodes_scope_key UNIQUE (kind, parent_key, identifier, title_key)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id, kind)",
    r#"CREATE TABLE IF NOT EXISTS payloads (
        id UUID PRIMARY KEY,
        node_id UUID NOT NULL UNIQUE REFERENCES nodes(id) ON DELETE CASCADE,
        digest VARCHAR(128) NOT NULL,
        content BYTEA NOT NULL,
        stored_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS harvest_tasks (
        id UUID PRIMARY KEY,
        catalog_id TEXT NOT NULL,
        status VARCHAR(16) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        finished_at TIMESTAMPTZ,
        logs JSONB NOT NULL DEFAULT '[]'::jsonb,
        stats JSONB NOT NULL DEFAULT '{}'::jsonb
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_harvest_tasks_created ON harvest_tasks(created_at DESC)",
    r#"CREATE TABLE IF NOT EXISTS repeatable_jobs (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        callable TEXT NOT NULL,
        queue TEXT NOT NULL,
        scheduled_time TIMESTAMPTZ NOT NULL,
        interval_count INTEGER NOT NULL,
        interval_unit VARCHAR(16) NOT NULL,
        repeat_count INTEGER,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_repeatable_jobs_callable ON repeatable_jobs(callable, interval_count, interval_unit)",
];

/// Creates missing tables and indexes.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    for migration in MIGRATIONS {
        sqlx::query(migration).execute(pool).await?;
    }
    tracing::debug!(statements = MIGRATIONS.len(), "Schema up to date");
    Ok(())
}
