//! Trait definitions for external dependencies.
//!
//! The harvest core talks to storage, the network and the scheduler only
//! through these traits, which keeps the walker testable with in-memory
//! mocks and lets `tellus-db` and `tellus-client` supply the real backends.
//!
//! # Example
//!
//! ```
//! use tellus_core::traits::MetadataStore;
//! use tellus_core::{AppError, Node, NodeKind};
//! use uuid::Uuid;
//!
//! // Business logic uses traits, not concrete types
//! async fn count_datasets<S: MetadataStore>(store: &S, catalog: Uuid) -> Result<usize, AppError> {
//!     Ok(store.list_children(NodeKind::Dataset, catalog).await?.len())
//! }
//! ```

use std::future::Future;

use serde_json::Value;
use uuid::Uuid;

use crate::change::Locator;
use crate::models::{Node, NodeDefaults, NodeKey, NodeKind, NodeScope, PayloadRef, StagedPayload};
use crate::schedule::{IntervalUnit, RepeatableJob};
use crate::task::HarvestTask;
use crate::AppError;

/// Store for the harvested metadata tree.
///
/// Uniqueness is scoped: a key only has to be unique among the nodes sharing
/// the same [`NodeScope`].
pub trait MetadataStore: Send + Sync + Clone {
    /// Finds the node with `key` in `scope`, creating it from `defaults`
    /// when absent.
    ///
    /// For an existing node the title and download URL from `defaults` are
    /// written through. The flag is `true` when the node was created.
    fn upsert_node(
        &self,
        scope: NodeScope,
        key: &NodeKey,
        defaults: &NodeDefaults,
    ) -> impl Future<Output = Result<(Node, bool), AppError>> + Send;

    /// Persists every scalar attribute and the metadata blob of `node`.
    fn save_node(&self, node: &Node) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Stores the staged payload bytes of a distribution, replacing any
    /// previous payload of that node.
    fn store_payload(
        &self,
        node_id: Uuid,
        payload: &StagedPayload,
    ) -> impl Future<Output = Result<PayloadRef, AppError>> + Send;

    fn get_node(&self, id: Uuid) -> impl Future<Output = Result<Option<Node>, AppError>> + Send;

    fn find_node(
        &self,
        scope: NodeScope,
        key: &NodeKey,
    ) -> impl Future<Output = Result<Option<Node>, AppError>> + Send;

    /// Lists the nodes of `kind` directly below `parent_id`.
    fn list_children(
        &self,
        kind: NodeKind,
        parent_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Node>, AppError>> + Send;
}

/// Store for harvest run records.
pub trait TaskStore: Send + Sync + Clone {
    /// Creates a running task for the given catalog.
    fn create_task(
        &self,
        catalog_id: &str,
    ) -> impl Future<Output = Result<HarvestTask, AppError>> + Send;

    /// Persists the status, log and statistics of `task`.
    fn save_task(&self, task: &HarvestTask) -> impl Future<Output = Result<(), AppError>> + Send;

    fn get_task(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<HarvestTask>, AppError>> + Send;

    /// Lists the most recent tasks, newest first.
    fn list_tasks(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<HarvestTask>, AppError>> + Send;
}

/// Store for repeatable job registrations.
pub trait ScheduleStore: Send + Sync + Clone {
    /// Jobs with exactly this callable and repeat interval.
    fn find_jobs(
        &self,
        callable: &str,
        interval: u32,
        unit: IntervalUnit,
    ) -> impl Future<Output = Result<Vec<RepeatableJob>, AppError>> + Send;

    /// Creates the job, or overwrites the job with the same name.
    fn upsert_job_by_name(
        &self,
        job: &RepeatableJob,
    ) -> impl Future<Output = Result<RepeatableJob, AppError>> + Send;

    fn list_jobs(&self) -> impl Future<Output = Result<Vec<RepeatableJob>, AppError>> + Send;
}

/// Retrieves distribution payloads.
pub trait PayloadFetcher: Send + Sync + Clone {
    /// Reads the whole payload behind `locator`.
    ///
    /// A non-success HTTP status must be returned as an error.
    fn fetch_payload(
        &self,
        locator: &Locator,
    ) -> impl Future<Output = Result<Vec<u8>, AppError>> + Send;
}

/// Loads catalog documents (data.json) as an untyped tree.
pub trait CatalogSource: Send + Sync + Clone {
    fn load_catalog(
        &self,
        locator: &Locator,
    ) -> impl Future<Output = Result<Value, AppError>> + Send;
}
