//! Domain types for the harvested metadata tree.
//!
//! A harvested catalog is stored as four levels of nodes:
//!
//! ```text
//! catalog → dataset → distribution → field
//! ```
//!
//! All levels share one [`Node`] record. The level-specific behaviour
//! (child key, identifier key, default title) hangs off [`NodeKind`], so the
//! walker can treat every level with the same upsert-subtree routine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Title assigned to catalogs and datasets that do not declare one.
pub const DEFAULT_TITLE: &str = "No Title";

// =============================================================================
// Node Kind
// =============================================================================

/// One of the four nesting levels of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Catalog,
    Dataset,
    Distribution,
    Field,
}

impl NodeKind {
    /// All kinds, root first.
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Catalog,
        NodeKind::Dataset,
        NodeKind::Distribution,
        NodeKind::Field,
    ];

    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Catalog => "catalog",
            NodeKind::Dataset => "dataset",
            NodeKind::Distribution => "distribution",
            NodeKind::Field => "field",
        }
    }

    /// Key under which the raw metadata nests this kind's children.
    pub fn child_key(&self) -> Option<&'static str> {
        self.child_kind().map(|kind| kind.as_str())
    }

    /// The kind of the nodes nested below this one.
    pub fn child_kind(&self) -> Option<NodeKind> {
        match self {
            NodeKind::Catalog => Some(NodeKind::Dataset),
            NodeKind::Dataset => Some(NodeKind::Distribution),
            NodeKind::Distribution => Some(NodeKind::Field),
            NodeKind::Field => None,
        }
    }

    /// Raw metadata key holding the node identifier.
    ///
    /// Fields are identified by `id`; every other level by `identifier`.
    pub fn identifier_key(&self) -> &'static str {
        match self {
            NodeKind::Field => "id",
            _ => "identifier",
        }
    }

    /// Title used when the raw metadata has none.
    pub fn default_title(&self) -> Option<&'static str> {
        match self {
            NodeKind::Catalog | NodeKind::Dataset => Some(DEFAULT_TITLE),
            NodeKind::Distribution | NodeKind::Field => None,
        }
    }

    /// Whether the title is part of the node's unique key.
    pub fn title_is_key(&self) -> bool {
        matches!(self, NodeKind::Field)
    }
}

/// Error type for parsing NodeKind from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNodeKindError(String);

impl std::fmt::Display for ParseNodeKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid node kind: {}", self.0)
    }
}

impl std::error::Error for ParseNodeKindError {}

impl std::str::FromStr for NodeKind {
    type Err = ParseNodeKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "catalog" => Ok(NodeKind::Catalog),
            "dataset" => Ok(NodeKind::Dataset),
            "distribution" => Ok(NodeKind::Distribution),
            "field" => Ok(NodeKind::Field),
            _ => Err(ParseNodeKindError(s.to_string())),
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Upsert Keys
// =============================================================================

/// Where a node lives: its level and its parent (none for catalogs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeScope {
    pub kind: NodeKind,
    pub parent_id: Option<Uuid>,
}

impl NodeScope {
    pub fn root() -> Self {
        Self {
            kind: NodeKind::Catalog,
            parent_id: None,
        }
    }

    pub fn child_of(kind: NodeKind, parent_id: Uuid) -> Self {
        Self {
            kind,
            parent_id: Some(parent_id),
        }
    }
}

/// Identity of a node within its scope.
///
/// `title` only participates for fields; it is `None` for other kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub identifier: String,
    pub title: Option<String>,
}

impl NodeKey {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }
}

/// Scalar values written on upsert.
///
/// On creation every value is used; on an existing node only `title` and
/// `download_url` are refreshed. `indexable_eligible` is a creation default
/// that an operator may change afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeDefaults {
    pub title: Option<String>,
    pub download_url: Option<String>,
    pub indexable_eligible: bool,
}

// =============================================================================
// Node
// =============================================================================

/// Reference to a stored distribution payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadRef(pub Uuid);

/// Payload bytes fetched during a run, waiting to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPayload {
    pub bytes: Vec<u8>,
    pub digest: String,
}

/// A persisted catalog, dataset, distribution or field.
///
/// Distribution-only attributes (`download_url`, `content_digest`,
/// `indexable`, `last_content_update`, `payload`) stay empty on other kinds;
/// `indexable_eligible` is only meaningful on datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub kind: NodeKind,
    pub parent_id: Option<Uuid>,
    pub identifier: String,
    pub title: Option<String>,
    /// Projected metadata blob.
    pub metadata: Value,
    pub updated: bool,
    pub indexable_eligible: bool,
    pub download_url: Option<String>,
    pub content_digest: Option<String>,
    pub indexable: bool,
    pub last_content_update: Option<DateTime<Utc>>,
    pub payload: Option<PayloadRef>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Node {
    /// Builds a fresh node as a store would create it on first upsert.
    pub fn new(scope: NodeScope, key: &NodeKey, defaults: &NodeDefaults) -> Self {
        let now = Utc::now();
        let title = if scope.kind.title_is_key() {
            key.title.clone()
        } else {
            defaults
                .title
                .clone()
                .or_else(|| scope.kind.default_title().map(str::to_string))
        };
        Self {
            id: Uuid::new_v4(),
            kind: scope.kind,
            parent_id: scope.parent_id,
            identifier: key.identifier.clone(),
            title,
            metadata: Value::Object(Map::new()),
            updated: false,
            indexable_eligible: defaults.indexable_eligible,
            download_url: defaults.download_url.clone(),
            content_digest: None,
            indexable: false,
            last_content_update: None,
            payload: None,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn scope(&self) -> NodeScope {
        NodeScope {
            kind: self.kind,
            parent_id: self.parent_id,
        }
    }

    pub fn key(&self) -> NodeKey {
        let title = if self.kind.title_is_key() {
            self.title.clone()
        } else {
            None
        };
        NodeKey {
            identifier: self.identifier.clone(),
            title,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.kind, Some(self.identifier.clone()))
    }
}

/// Entity referenced by a task log entry.
///
/// `identifier` is `None` when the failing node had no usable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: NodeKind,
    pub identifier: Option<String>,
}

impl EntityRef {
    pub fn new(kind: NodeKind, identifier: Option<String>) -> Self {
        Self { kind, identifier }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.identifier {
            Some(id) => write!(f, "{} '{}'", self.kind, id),
            None => write!(f, "{} <no identifier>", self.kind),
        }
    }
}
