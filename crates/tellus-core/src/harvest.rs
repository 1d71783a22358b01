//! Harvest service: one tracked run per catalog.
//!
//! [`HarvestService`] wires the walker to a task store and a catalog
//! source. Each catalog gets its own [`HarvestTask`]; the task ends up
//! `finished` even when individual nodes failed, and `failed` only when the
//! catalog as a whole could not be ingested.
//!
//! # Example
//!
//! ```ignore
//! use tellus_core::harvest::HarvestService;
//!
//! let service = HarvestService::with_config(repo, tasks, client.clone(), client, config);
//! let result = service.harvest_catalog(&entry).await?;
//! println!("{}: updated = {}", result.catalog_id, result.updated);
//! ```

use uuid::Uuid;

use crate::change::Locator;
use crate::config::{CatalogEntry, HarvestConfig};
use crate::error::AppError;
use crate::stats::HarvestStats;
use crate::task::{HarvestTask, TaskStatus};
use crate::traits::{CatalogSource, MetadataStore, PayloadFetcher, TaskStore};
use crate::walker::{CatalogIngest, CatalogWalker};

// =============================================================================
// Results
// =============================================================================

/// Outcome of harvesting one catalog.
#[derive(Debug, Clone)]
pub struct CatalogHarvestResult {
    pub catalog_id: String,
    pub url: String,
    pub task_id: Option<Uuid>,
    pub status: TaskStatus,
    /// Whether anything in the catalog changed in this run.
    pub updated: bool,
    pub stats: HarvestStats,
    pub error: Option<String>,
}

impl CatalogHarvestResult {
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Finished
    }

    fn from_task(entry: &CatalogEntry, task: &HarvestTask, updated: bool) -> Self {
        let error = match task.status {
            TaskStatus::Failed => task.errors().last().map(|e| e.message.clone()),
            _ => None,
        };
        Self {
            catalog_id: entry.identifier.clone(),
            url: entry.url.clone(),
            task_id: Some(task.id),
            status: task.status,
            updated,
            stats: task.stats.clone(),
            error,
        }
    }

    /// Result for a catalog whose task could not even be recorded.
    fn unrecorded(entry: &CatalogEntry, error: &AppError) -> Self {
        Self {
            catalog_id: entry.identifier.clone(),
            url: entry.url.clone(),
            task_id: None,
            status: TaskStatus::Failed,
            updated: false,
            stats: HarvestStats::default(),
            error: Some(error.to_string()),
        }
    }
}

/// Aggregated results of [`HarvestService::harvest_all`].
#[derive(Debug, Clone, Default)]
pub struct BatchHarvestSummary {
    pub results: Vec<CatalogHarvestResult>,
}

impl BatchHarvestSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: CatalogHarvestResult) {
        self.results.push(result);
    }

    pub fn total_catalogs(&self) -> usize {
        self.results.len()
    }

    pub fn successful_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.total_catalogs() - self.successful_count()
    }

    /// Catalogs with changes, to be picked up by downstream indexing.
    pub fn updated_catalogs(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.updated)
            .map(|r| r.catalog_id.as_str())
            .collect()
    }

    pub fn total_indexable(&self) -> usize {
        self.results.iter().map(|r| r.stats.indexable).sum()
    }
}

// =============================================================================
// Harvest Service
// =============================================================================

/// Harvests catalogs and records one task per catalog.
///
/// # Type Parameters
///
/// * `S` - Metadata store (e.g., `NodeRepository`)
/// * `T` - Task store (e.g., `TaskRepository`)
/// * `P` - Payload fetcher (e.g., `DownloadClient`)
/// * `C` - Catalog document source (e.g., `DownloadClient`)
#[derive(Clone)]
pub struct HarvestService<S, T, P, C>
where
    S: MetadataStore,
    T: TaskStore,
    P: PayloadFetcher,
    C: CatalogSource,
{
    walker: CatalogWalker<S, P>,
    tasks: T,
    source: C,
}

impl<S, T, P, C> HarvestService<S, T, P, C>
where
    S: MetadataStore,
    T: TaskStore,
    P: PayloadFetcher,
    C: CatalogSource,
{
    /// Creates a harvest service with default configuration.
    pub fn new(store: S, tasks: T, fetcher: P, source: C) -> Self {
        Self::with_config(store, tasks, fetcher, source, HarvestConfig::default())
    }

    /// Creates a harvest service with custom configuration.
    pub fn with_config(store: S, tasks: T, fetcher: P, source: C, config: HarvestConfig) -> Self {
        Self {
            walker: CatalogWalker::new(store, fetcher, config),
            tasks,
            source,
        }
    }

    pub fn walker(&self) -> &CatalogWalker<S, P> {
        &self.walker
    }

    /// Harvests one catalog.
    ///
    /// # Errors
    ///
    /// Only task store failures are returned. A catalog that cannot be
    /// loaded or ingested yields a result with status `failed`.
    pub async fn harvest_catalog(
        &self,
        entry: &CatalogEntry,
    ) -> Result<CatalogHarvestResult, AppError> {
        let mut task = self.tasks.create_task(&entry.identifier).await?;
        tracing::info!(
            catalog = %entry.identifier,
            url = %entry.url,
            task = %task.id,
            "Starting harvest"
        );

        let updated = match self.run(entry, &mut task).await {
            Ok(ingest) => {
                task.finish(ingest.stats);
                ingest.catalog.updated
            }
            Err(e) => {
                tracing::warn!(catalog = %entry.identifier, error = %e, "Harvest failed");
                task.fail(format!("Harvest of catalog {} failed: {}", entry.identifier, e));
                false
            }
        };

        self.tasks.save_task(&task).await?;

        tracing::info!(
            catalog = %entry.identifier,
            status = %task.status,
            updated,
            logged_errors = task.errors().count(),
            "Harvest finished"
        );
        Ok(CatalogHarvestResult::from_task(entry, &task, updated))
    }

    /// Harvests catalogs one after another.
    ///
    /// A failing catalog does not stop the batch.
    pub async fn harvest_all(&self, entries: &[&CatalogEntry]) -> BatchHarvestSummary {
        let mut summary = BatchHarvestSummary::new();

        for entry in entries {
            match self.harvest_catalog(entry).await {
                Ok(result) => summary.add(result),
                Err(e) => {
                    tracing::warn!(
                        catalog = %entry.identifier,
                        error = %e,
                        "Could not record harvest task"
                    );
                    summary.add(CatalogHarvestResult::unrecorded(entry, &e));
                }
            }
        }

        tracing::info!(
            total = summary.total_catalogs(),
            successful = summary.successful_count(),
            failed = summary.failed_count(),
            "Batch harvest complete"
        );
        summary
    }

    async fn run(
        &self,
        entry: &CatalogEntry,
        task: &mut HarvestTask,
    ) -> Result<CatalogIngest, AppError> {
        let locator = Locator::parse(&entry.url, false)?;
        let document = self.source.load_catalog(&locator).await?;
        self.walker
            .ingest_catalog(&document, &entry.identifier, task)
            .await
    }
}
