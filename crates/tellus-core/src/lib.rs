//! Tellus Core - Domain types, harvesting logic, and services.
//!
//! This crate provides the core functionality for Tellus, including:
//!
//! - **Domain models**: [`Node`], [`NodeKind`], [`HarvestTask`], [`RepeatableJob`]
//! - **Harvest logic**: metadata projection, payload change detection,
//!   bottom-up `updated` propagation, the depth-first [`CatalogWalker`]
//! - **Services**: [`HarvestService`] for tracked catalog runs,
//!   [`register_repeatable_job`] for periodic scheduling
//! - **Traits**: [`MetadataStore`], [`TaskStore`], [`ScheduleStore`],
//!   [`PayloadFetcher`], [`CatalogSource`] for dependency injection
//!
//! # Architecture
//!
//! Storage and network access sit behind traits so the same logic runs
//! against PostgreSQL and HTTP (`tellus-db`, `tellus-client`) or against
//! in-memory mocks in tests.
//!
//! # Example
//!
//! ```ignore
//! use tellus_core::{CatalogEntry, HarvestService};
//!
//! let harvest = HarvestService::with_config(nodes, tasks, client.clone(), client, config);
//! let result = harvest.harvest_catalog(&CatalogEntry::new("sspm", url)).await?;
//! ```

pub mod change;
pub mod config;
pub mod error;
pub mod harvest;
pub mod models;
pub mod projection;
pub mod propagation;
pub mod schedule;
pub mod stats;
pub mod task;
pub mod traits;
pub mod walker;

// Configuration
pub use config::{
    CatalogEntry, CatalogsConfig, DbConfig, HarvestConfig, HttpConfig, ScheduleDefaults,
    default_config_path, load_catalogs_config,
};

// Error handling
pub use error::AppError;

// Domain models
pub use models::{
    EntityRef, Node, NodeDefaults, NodeKey, NodeKind, NodeScope, PayloadRef, StagedPayload,
};

// Harvest building blocks
pub use change::{ChangeDetector, ContentChange, Locator, compute_digest};
pub use projection::project;
pub use propagation::compute_updated;
pub use stats::{HarvestStats, KindStats, NodeOutcome};
pub use task::{HarvestTask, LogLevel, TaskLogEntry, TaskLogger, TaskStatus};
pub use walker::{CatalogIngest, CatalogWalker, NodeIngest};

// Traits for dependency injection
pub use traits::{CatalogSource, MetadataStore, PayloadFetcher, ScheduleStore, TaskStore};

// Services (generic over trait implementations)
pub use harvest::{BatchHarvestSummary, CatalogHarvestResult, HarvestService};

// Scheduling
pub use schedule::{
    IntervalUnit, Registration, RepeatableJob, ScheduleRequest, first_run_at,
    register_repeatable_job,
};
