//! Depth-first ingestion of a catalog tree.
//!
//! Every level goes through the same upsert-subtree routine, parameterized
//! by [`NodeKind`]:
//!
//! 1. project the raw metadata (level blacklist, child collection removed)
//! 2. upsert the node by its scoped key
//! 3. for distributions of indexable-eligible datasets, fetch the payload
//!    and compare digests
//! 4. ingest the children one by one; a failing child is logged against the
//!    task and skipped, its siblings continue
//! 5. compute `updated` from {created, any child updated, content changed}
//! 6. persist the node once
//!
//! Errors raised in steps 1–3 or 6 are returned to the parent's loop, which
//! is where isolation happens. Only an error at the catalog itself reaches
//! the caller of [`CatalogWalker::ingest_catalog`].

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::change::{ChangeDetector, ContentChange, Locator};
use crate::config::HarvestConfig;
use crate::error::AppError;
use crate::models::{EntityRef, Node, NodeDefaults, NodeKey, NodeKind, NodeScope};
use crate::projection::project;
use crate::propagation::compute_updated;
use crate::stats::{HarvestStats, NodeOutcome};
use crate::task::TaskLogger;
use crate::traits::{MetadataStore, PayloadFetcher};

/// Raw metadata key holding a distribution's download URL.
pub const DOWNLOAD_URL_KEY: &str = "downloadURL";

/// Field `specialType` marking the time index of a time series.
const TIME_INDEX: &str = "time_index";

/// A node after ingestion.
#[derive(Debug, Clone)]
pub struct NodeIngest {
    pub node: Node,
    pub created: bool,
}

/// Result of ingesting a whole catalog.
#[derive(Debug, Clone)]
pub struct CatalogIngest {
    pub catalog: Node,
    pub created: bool,
    pub stats: HarvestStats,
}

/// Mutable state threaded through one walk.
struct Walk<'l, L> {
    logger: &'l mut L,
    stats: HarvestStats,
}

/// Upserts catalog trees into a [`MetadataStore`].
#[derive(Clone)]
pub struct CatalogWalker<S: MetadataStore, P: PayloadFetcher> {
    store: S,
    detector: ChangeDetector<P>,
    config: HarvestConfig,
}

impl<S: MetadataStore, P: PayloadFetcher> CatalogWalker<S, P> {
    pub fn new(store: S, fetcher: P, config: HarvestConfig) -> Self {
        Self {
            store,
            detector: ChangeDetector::new(fetcher),
            config,
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Ingests a catalog document under `catalog_id`.
    ///
    /// Dataset-level failures are logged against `logger` and do not make
    /// this call fail. An error is returned only when the catalog node
    /// itself cannot be processed.
    pub async fn ingest_catalog<L: TaskLogger>(
        &self,
        raw: &Value,
        catalog_id: &str,
        logger: &mut L,
    ) -> Result<CatalogIngest, AppError> {
        let raw = raw.as_object().ok_or_else(|| {
            AppError::Generic(format!("catalog '{}' is not a JSON object", catalog_id))
        })?;

        let mut walk = Walk {
            logger,
            stats: HarvestStats::new(),
        };
        let ingest = self
            .ingest_node(NodeKind::Catalog, NodeKey::new(catalog_id), raw, None, &mut walk)
            .await?;

        tracing::info!(
            catalog = catalog_id,
            updated = ingest.node.updated,
            datasets = walk.stats.datasets.successful(),
            failed = walk.stats.failed(),
            indexable = walk.stats.indexable,
            "Catalog ingested"
        );

        Ok(CatalogIngest {
            catalog: ingest.node,
            created: ingest.created,
            stats: walk.stats,
        })
    }

    /// Ingests one dataset (and its subtree) below an existing catalog.
    pub async fn ingest_dataset<L: TaskLogger>(
        &self,
        raw: &Map<String, Value>,
        catalog: &Node,
        logger: &mut L,
    ) -> Result<NodeIngest, AppError> {
        self.ingest_child(NodeKind::Dataset, raw, catalog, logger).await
    }

    /// Ingests one distribution (and its fields) below an existing dataset.
    pub async fn ingest_distribution<L: TaskLogger>(
        &self,
        raw: &Map<String, Value>,
        dataset: &Node,
        logger: &mut L,
    ) -> Result<NodeIngest, AppError> {
        self.ingest_child(NodeKind::Distribution, raw, dataset, logger)
            .await
    }

    /// Ingests one field below an existing distribution.
    pub async fn ingest_field<L: TaskLogger>(
        &self,
        raw: &Map<String, Value>,
        distribution: &Node,
        logger: &mut L,
    ) -> Result<NodeIngest, AppError> {
        self.ingest_child(NodeKind::Field, raw, distribution, logger)
            .await
    }

    async fn ingest_child<L: TaskLogger>(
        &self,
        kind: NodeKind,
        raw: &Map<String, Value>,
        parent: &Node,
        logger: &mut L,
    ) -> Result<NodeIngest, AppError> {
        if parent.kind.child_kind() != Some(kind) {
            return Err(AppError::Generic(format!(
                "a {} cannot be stored below a {}",
                kind, parent.kind
            )));
        }
        let key = node_key(kind, raw)?;
        let mut walk = Walk {
            logger,
            stats: HarvestStats::new(),
        };
        self.ingest_node(kind, key, raw, Some(parent), &mut walk).await
    }

    fn ingest_node<'a, 'l: 'a, L: TaskLogger + 'a>(
        &'a self,
        kind: NodeKind,
        key: NodeKey,
        raw: &'a Map<String, Value>,
        parent: Option<&'a Node>,
        walk: &'a mut Walk<'l, L>,
    ) -> BoxFuture<'a, Result<NodeIngest, AppError>> {
        Box::pin(async move {
            let projected = project(raw, self.config.blacklist(kind), kind.child_key());
            let defaults = self.defaults_for(kind, &key, &projected);
            let scope = match parent {
                Some(parent) => NodeScope::child_of(kind, parent.id),
                None => NodeScope::root(),
            };

            let (mut node, created) = self.store.upsert_node(scope, &key, &defaults).await?;

            let change = match parent {
                Some(dataset) if kind == NodeKind::Distribution && dataset.indexable_eligible => {
                    let change = self.check_content(&node).await?;
                    walk.stats.payloads_fetched += 1;
                    Some(change)
                }
                _ => None,
            };
            let content_changed = change.as_ref().is_some_and(|c| c.changed);

            let mut children_updated = false;
            if let Some(child_kind) = kind.child_kind() {
                let children = self.children_of(kind, &key, raw, walk)?;
                for child in children {
                    if self.ingest_isolated(child_kind, child, &node, walk).await {
                        children_updated = true;
                    }
                }
            }

            let updated = compute_updated(created, children_updated, content_changed);
            node.metadata = Value::Object(projected);
            node.updated = updated;

            match change {
                Some(change) => {
                    if let Some(staged) = change.apply_to(&mut node) {
                        node.payload = Some(self.store.store_payload(node.id, &staged).await?);
                    }
                    if node.indexable {
                        walk.stats.indexable += 1;
                    }
                }
                None if kind == NodeKind::Distribution => node.indexable = false,
                None => {}
            }

            self.store.save_node(&node).await?;
            walk.stats.record(kind, NodeOutcome::classify(created, updated));

            tracing::debug!(
                kind = %kind,
                identifier = %node.identifier,
                created,
                updated,
                "Node ingested"
            );

            Ok(NodeIngest { node, created })
        })
    }

    /// Ingests one child, logging instead of returning its failure.
    ///
    /// Returns the child's `updated` flag, `false` when it failed.
    async fn ingest_isolated<'a, 'l: 'a, L: TaskLogger + 'a>(
        &'a self,
        kind: NodeKind,
        raw: &'a Value,
        parent: &'a Node,
        walk: &'a mut Walk<'l, L>,
    ) -> bool {
        let entity = EntityRef::new(kind, raw_identifier(kind, raw));
        let result = match raw.as_object() {
            Some(map) => match node_key(kind, map) {
                Ok(key) => self.ingest_node(kind, key, map, Some(parent), walk).await,
                Err(e) => Err(e),
            },
            None => Err(AppError::Generic(format!("{} is not a JSON object", kind))),
        };

        match result {
            Ok(ingest) => ingest.node.updated,
            Err(e) => {
                walk.stats.record(kind, NodeOutcome::Failed);
                walk.logger
                    .error(entity.clone(), format!("Failed to ingest {}: {}", entity, e));
                false
            }
        }
    }

    async fn check_content(&self, node: &Node) -> Result<ContentChange, AppError> {
        let location = node
            .download_url
            .as_deref()
            .ok_or_else(|| AppError::MissingField {
                entity: node.entity_ref().to_string(),
                field: DOWNLOAD_URL_KEY,
            })?;
        let locator = Locator::parse(location, self.config.read_local)?;
        self.detector
            .fetch(&locator, node.content_digest.as_deref())
            .await
    }

    /// Children to ingest below a node, after the time series filter.
    fn children_of<'r, L: TaskLogger>(
        &self,
        kind: NodeKind,
        key: &NodeKey,
        raw: &'r Map<String, Value>,
        walk: &mut Walk<'_, L>,
    ) -> Result<Vec<&'r Value>, AppError> {
        let Some(child_key) = kind.child_key() else {
            return Ok(Vec::new());
        };
        let children = match raw.get(child_key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().collect(),
            Some(_) => {
                return Err(AppError::Generic(format!(
                    "'{}' of {} '{}' is not a list",
                    child_key, kind, key.identifier
                )));
            }
        };

        if kind != NodeKind::Catalog || !self.config.time_series_only {
            return Ok(children);
        }

        let series: Vec<&Value> = children.into_iter().filter(|d| is_time_series(d)).collect();
        if series.is_empty() {
            walk.logger.info(
                Some(EntityRef::new(NodeKind::Catalog, Some(key.identifier.clone()))),
                format!("No time series found in catalog {}", key.identifier),
            );
        }
        Ok(series)
    }

    fn defaults_for(
        &self,
        kind: NodeKind,
        key: &NodeKey,
        projected: &Map<String, Value>,
    ) -> NodeDefaults {
        let title = if kind.title_is_key() {
            key.title.clone()
        } else {
            string_value(projected.get("title"))
                .or_else(|| kind.default_title().map(str::to_string))
        };
        let download_url = match kind {
            NodeKind::Distribution => string_value(projected.get(DOWNLOAD_URL_KEY)),
            _ => None,
        };
        NodeDefaults {
            title,
            download_url,
            indexable_eligible: kind == NodeKind::Dataset && self.config.default_indexable,
        }
    }
}

/// Builds the scoped key of a raw node.
///
/// Fields are keyed by `id` plus their title, and a field with a title but
/// no `id` is keyed by its title alone (empty identifier). Other levels are
/// keyed by `identifier`.
pub fn node_key(kind: NodeKind, raw: &Map<String, Value>) -> Result<NodeKey, AppError> {
    let identifier = string_value(raw.get(kind.identifier_key()));
    let missing = || AppError::MissingField {
        entity: kind.to_string(),
        field: kind.identifier_key(),
    };

    if !kind.title_is_key() {
        return identifier.map(NodeKey::new).ok_or_else(missing);
    }

    let title = string_value(raw.get("title"));
    if identifier.is_none() && title.is_none() {
        return Err(missing());
    }
    Ok(NodeKey::new(identifier.unwrap_or_default()).with_title(title))
}

/// Identifier used in log entries; title-keyed nodes fall back to the title.
fn raw_identifier(kind: NodeKind, raw: &Value) -> Option<String> {
    string_value(raw.get(kind.identifier_key())).or_else(|| {
        if kind.title_is_key() {
            string_value(raw.get("title"))
        } else {
            None
        }
    })
}

/// Reads a string or a number as text; empty strings count as missing.
fn string_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whether a raw dataset has a distribution with a time index field.
pub fn is_time_series(dataset: &Value) -> bool {
    let distributions = dataset.get("distribution").and_then(Value::as_array);
    distributions.into_iter().flatten().any(|distribution| {
        distribution
            .get("field")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .any(|field| field.get("specialType").and_then(Value::as_str) == Some(TIME_INDEX))
    })
}
