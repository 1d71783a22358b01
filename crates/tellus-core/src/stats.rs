//! Per-run harvest statistics.

use serde::{Deserialize, Serialize};

use crate::models::NodeKind;

/// Outcome of ingesting a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Node existed and nothing below it changed
    Unchanged,
    /// Node existed and it or a descendant changed
    Updated,
    /// First time seeing this node
    Created,
    /// Ingest failed and was logged against the task
    Failed,
}

impl NodeOutcome {
    /// Classifies a successfully ingested node.
    pub fn classify(created: bool, updated: bool) -> Self {
        if created {
            NodeOutcome::Created
        } else if updated {
            NodeOutcome::Updated
        } else {
            NodeOutcome::Unchanged
        }
    }
}

/// Counters for one node kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    pub unchanged: usize,
    pub updated: usize,
    pub created: usize,
    pub failed: usize,
}

impl KindStats {
    /// Records an outcome, incrementing the appropriate counter.
    pub fn record(&mut self, outcome: NodeOutcome) {
        match outcome {
            NodeOutcome::Unchanged => self.unchanged += 1,
            NodeOutcome::Updated => self.updated += 1,
            NodeOutcome::Created => self.created += 1,
            NodeOutcome::Failed => self.failed += 1,
        }
    }

    /// Returns the total number of processed nodes.
    pub fn total(&self) -> usize {
        self.unchanged + self.updated + self.created + self.failed
    }

    /// Returns the number of successfully processed nodes.
    pub fn successful(&self) -> usize {
        self.unchanged + self.updated + self.created
    }
}

/// Statistics for a catalog harvest.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestStats {
    pub catalogs: KindStats,
    pub datasets: KindStats,
    pub distributions: KindStats,
    pub fields: KindStats,
    /// Distribution payloads fetched successfully.
    pub payloads_fetched: usize,
    /// Distributions marked indexable in this run.
    pub indexable: usize,
}

impl HarvestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self, kind: NodeKind) -> &KindStats {
        match kind {
            NodeKind::Catalog => &self.catalogs,
            NodeKind::Dataset => &self.datasets,
            NodeKind::Distribution => &self.distributions,
            NodeKind::Field => &self.fields,
        }
    }

    pub fn record(&mut self, kind: NodeKind, outcome: NodeOutcome) {
        let counters = match kind {
            NodeKind::Catalog => &mut self.catalogs,
            NodeKind::Dataset => &mut self.datasets,
            NodeKind::Distribution => &mut self.distributions,
            NodeKind::Field => &mut self.fields,
        };
        counters.record(outcome);
    }

    /// Nodes that failed at any level.
    pub fn failed(&self) -> usize {
        NodeKind::ALL.iter().map(|k| self.kind(*k).failed).sum()
    }
}
