//! Node repository for the harvested metadata tree.
//!
//! Upserts rely on `INSERT ... ON CONFLICT` over the scoped unique key, so
//! two runs racing on the same catalog end up with last-write-wins rather
//! than duplicate-key failures.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use tellus_core::error::AppError;
use tellus_core::models::{
    Node, NodeDefaults, NodeKey, NodeKind, NodeScope, PayloadRef, StagedPayload,
};
use tellus_core::traits::MetadataStore;

/// Column list for node SELECT/RETURNING clauses.
const NODE_COLUMNS: &str = "id, kind, parent_id, identifier, title, metadata, updated, indexable_eligible, download_url, content_digest, indexable, last_content_update, payload_id, created_at, modified_at";

/// Repository for metadata nodes and their payloads.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use tellus_db::NodeRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/tellus")
///     .await?;
///
/// let repo = NodeRepository::new(pool);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NodeRepository {
    pool: Pool<Postgres>,
}

impl NodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the stored payload bytes of a distribution.
    pub async fn payload_content(&self, node_id: Uuid) -> Result<Option<Vec<u8>>, AppError> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT content FROM payloads WHERE node_id = $1")
                .bind(node_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Distributions flagged indexable by the most recent harvest.
    pub async fn list_indexable(&self) -> Result<Vec<Node>, AppError> {
        let query = format!(
            "SELECT {} FROM nodes WHERE kind = $1 AND indexable ORDER BY last_content_update DESC",
            NODE_COLUMNS
        );
        let rows: Vec<NodeRow> = sqlx::query_as(&query)
            .bind(NodeKind::Distribution.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Node::try_from).collect()
    }
}

// =============================================================================
// Helper Types for Database Mapping
// =============================================================================

/// Unique-key columns derived from a scope and key.
struct KeyColumns {
    parent_key: Uuid,
    title_key: String,
}

impl KeyColumns {
    fn new(scope: NodeScope, key: &NodeKey) -> Self {
        Self {
            parent_key: scope.parent_id.unwrap_or(Uuid::nil()),
            title_key: key.title.clone().unwrap_or_default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct NodeRow {
    id: Uuid,
    kind: String,
    parent_id: Option<Uuid>,
    identifier: String,
    title: Option<String>,
    metadata: Value,
    updated: bool,
    indexable_eligible: bool,
    download_url: Option<String>,
    content_digest: Option<String>,
    indexable: bool,
    last_content_update: Option<DateTime<Utc>>,
    payload_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    node: NodeRow,
    inserted: bool,
}

impl TryFrom<NodeRow> for Node {
    type Error = AppError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        let kind: NodeKind = row
            .kind
            .parse()
            .map_err(|e| AppError::Generic(format!("node {}: {}", row.id, e)))?;
        Ok(Self {
            id: row.id,
            kind,
            parent_id: row.parent_id,
            identifier: row.identifier,
            title: row.title,
            metadata: row.metadata,
            updated: row.updated,
            indexable_eligible: row.indexable_eligible,
            download_url: row.download_url,
            content_digest: row.content_digest,
            indexable: row.indexable,
            last_content_update: row.last_content_update,
            payload: row.payload_id.map(PayloadRef),
            created_at: row.created_at,
            modified_at: row.modified_at,
        })
    }
}

// =============================================================================
// MetadataStore Trait Implementation
// =============================================================================

impl MetadataStore for NodeRepository {
    async fn upsert_node(
        &self,
        scope: NodeScope,
        key: &NodeKey,
        defaults: &NodeDefaults,
    ) -> Result<(Node, bool), AppError> {
        let fresh = Node::new(scope, key, defaults);
        let columns = KeyColumns::new(scope, key);

        let query = format!(
            r#"
            INSERT INTO nodes (
                id, kind, parent_id, parent_key, identifier, title, title_key,
                download_url, indexable_eligible
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (kind, parent_key, identifier, title_key)
            DO UPDATE SET
                title = EXCLUDED.title,
                download_url = EXCLUDED.download_url,
                modified_at = NOW()
            RETURNING {}, (xmax = 0) AS inserted
            "#,
            NODE_COLUMNS
        );

        let row: UpsertRow = sqlx::query_as(&query)
            .bind(fresh.id)
            .bind(scope.kind.as_str())
            .bind(scope.parent_id)
            .bind(columns.parent_key)
            .bind(&key.identifier)
            .bind(&fresh.title)
            .bind(&columns.title_key)
            .bind(&fresh.download_url)
            .bind(fresh.indexable_eligible)
            .fetch_one(&self.pool)
            .await?;

        let inserted = row.inserted;
        Ok((Node::try_from(row.node)?, inserted))
    }

    async fn save_node(&self, node: &Node) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE nodes SET
                title = $2,
                metadata = $3,
                updated = $4,
                indexable_eligible = $5,
                download_url = $6,
                content_digest = $7,
                indexable = $8,
                last_content_update = $9,
                payload_id = $10,
                modified_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(node.id)
        .bind(&node.title)
        .bind(&node.metadata)
        .bind(node.updated)
        .bind(node.indexable_eligible)
        .bind(&node.download_url)
        .bind(&node.content_digest)
        .bind(node.indexable)
        .bind(node.last_content_update)
        .bind(node.payload.map(|p| p.0))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("node {}", node.id)));
        }
        Ok(())
    }

    async fn store_payload(
        &self,
        node_id: Uuid,
        payload: &StagedPayload,
    ) -> Result<PayloadRef, AppError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO payloads (id, node_id, digest, content)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (node_id)
            DO UPDATE SET
                digest = EXCLUDED.digest,
                content = EXCLUDED.content,
                stored_at = NOW()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(node_id)
        .bind(&payload.digest)
        .bind(&payload.bytes)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(node = %node_id, bytes = payload.bytes.len(), "Stored payload");
        Ok(PayloadRef(row.0))
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<Node>, AppError> {
        let query = format!("SELECT {} FROM nodes WHERE id = $1", NODE_COLUMNS);
        let row: Option<NodeRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Node::try_from).transpose()
    }

    async fn find_node(&self, scope: NodeScope, key: &NodeKey) -> Result<Option<Node>, AppError> {
        let columns = KeyColumns::new(scope, key);
        let query = format!(
            "SELECT {} FROM nodes WHERE kind = $1 AND parent_key = $2 AND identifier = $3 AND title_key = $4",
            NODE_COLUMNS
        );
        let row: Option<NodeRow> = sqlx::query_as(&query)
            .bind(scope.kind.as_str())
            .bind(columns.parent_key)
            .bind(&key.identifier)
            .bind(&columns.title_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Node::try_from).transpose()
    }

    async fn list_children(&self, kind: NodeKind, parent_id: Uuid) -> Result<Vec<Node>, AppError> {
        let query = format!(
            "SELECT {} FROM nodes WHERE kind = $1 AND parent_id = $2 ORDER BY identifier, title_key",
            NODE_COLUMNS
        );
        let rows: Vec<NodeRow> = sqlx::query_as(&query)
            .bind(kind.as_str())
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Node::try_from).collect()
    }
}
