//! Configuration types for Tellus components.
//!
//! Harvest behaviour is an explicit [`HarvestConfig`] value handed to the
//! walker when it is built. The catalog list, harvest options and schedule
//! defaults live together in `catalogs.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;
use crate::models::NodeKind;
use crate::schedule::IntervalUnit;

// =============================================================================
// Harvest Configuration
// =============================================================================

/// Options controlling how a catalog tree is persisted.
///
/// Upper snake case keys (`CATALOG_BLACKLIST`, `TIME_SERIES_ONLY`, ...) are
/// accepted as aliases so settings exported from older deployments load
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Catalog-level metadata keys stripped before persistence.
    #[serde(alias = "CATALOG_BLACKLIST")]
    pub catalog_blacklist: BTreeSet<String>,

    /// Dataset-level metadata keys stripped before persistence.
    #[serde(alias = "DATASET_BLACKLIST")]
    pub dataset_blacklist: BTreeSet<String>,

    /// Distribution-level metadata keys stripped before persistence.
    #[serde(alias = "DISTRIBUTION_BLACKLIST")]
    pub distribution_blacklist: BTreeSet<String>,

    /// Field-level metadata keys stripped before persistence.
    #[serde(alias = "FIELD_BLACKLIST")]
    pub field_blacklist: BTreeSet<String>,

    /// Only ingest datasets that carry a time index field.
    #[serde(alias = "TIME_SERIES_ONLY")]
    pub time_series_only: bool,

    /// Treat download URLs as local filesystem paths.
    #[serde(alias = "READ_LOCAL")]
    pub read_local: bool,

    /// Indexable-eligible marker given to newly created datasets.
    #[serde(alias = "DEFAULT_INDEXABLE")]
    pub default_indexable: bool,
}

impl HarvestConfig {
    /// Returns the blacklist applied at the given level.
    pub fn blacklist(&self, kind: NodeKind) -> &BTreeSet<String> {
        match kind {
            NodeKind::Catalog => &self.catalog_blacklist,
            NodeKind::Dataset => &self.dataset_blacklist,
            NodeKind::Distribution => &self.distribution_blacklist,
            NodeKind::Field => &self.field_blacklist,
        }
    }

    /// Replaces the blacklist of one level.
    pub fn with_blacklist<I, K>(mut self, kind: NodeKind, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys = keys.into_iter().map(Into::into).collect();
        match kind {
            NodeKind::Catalog => self.catalog_blacklist = keys,
            NodeKind::Dataset => self.dataset_blacklist = keys,
            NodeKind::Distribution => self.distribution_blacklist = keys,
            NodeKind::Field => self.field_blacklist = keys,
        }
        self
    }

    pub fn with_time_series_only(mut self, enabled: bool) -> Self {
        self.time_series_only = enabled;
        self
    }

    pub fn with_read_local(mut self, enabled: bool) -> Self {
        self.read_local = enabled;
        self
    }

    pub fn with_default_indexable(mut self, enabled: bool) -> Self {
        self.default_indexable = enabled;
        self
    }
}

// =============================================================================
// Client and Pool Configuration
// =============================================================================

/// Database connection pool configuration.
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// HTTP client configuration for payload and catalog downloads.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            user_agent: format!("tellus/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// Schedule Defaults
// =============================================================================

/// Defaults for `tellus schedule` when options are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleDefaults {
    pub callable: String,
    pub hour: u32,
    pub minute: u32,
    pub interval: u32,
    pub unit: IntervalUnit,
    pub queue: String,
}

/// Callable registered when none is given.
pub const DEFAULT_CALLABLE: &str = "tellus::harvest_all";

/// Queue label of registered harvest jobs.
pub const DEFAULT_QUEUE: &str = "indexing";

impl Default for ScheduleDefaults {
    fn default() -> Self {
        Self {
            callable: DEFAULT_CALLABLE.to_string(),
            hour: 6,
            minute: 0,
            interval: 24,
            unit: IntervalUnit::Hours,
            queue: DEFAULT_QUEUE.to_string(),
        }
    }
}

// =============================================================================
// Catalog Configuration (catalogs.toml)
// =============================================================================

/// Default enabled status when not specified in configuration.
fn default_enabled() -> bool {
    true
}

/// Root configuration structure for catalogs.toml.
///
/// # Example
///
/// ```toml
/// [harvest]
/// dataset_blacklist = ["spatial"]
/// time_series_only = true
///
/// [[catalogs]]
/// identifier = "sspm"
/// url = "https://example.org/data.json"
/// description = "Ministry catalog"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogsConfig {
    #[serde(default)]
    pub harvest: HarvestConfig,

    #[serde(default)]
    pub schedule: ScheduleDefaults,

    /// Catalogs to harvest.
    #[serde(default)]
    pub catalogs: Vec<CatalogEntry>,
}

impl CatalogsConfig {
    /// Returns only enabled catalogs.
    pub fn enabled_catalogs(&self) -> Vec<&CatalogEntry> {
        self.catalogs.iter().filter(|c| c.enabled).collect()
    }

    /// Find a catalog by identifier (case-insensitive).
    pub fn find_by_identifier(&self, identifier: &str) -> Option<&CatalogEntry> {
        self.catalogs
            .iter()
            .find(|c| c.identifier.eq_ignore_ascii_case(identifier))
    }
}

/// A single catalog entry in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Identifier the catalog node is stored under.
    pub identifier: String,

    /// Location of the catalog document: an http(s) URL, a `file://` URL
    /// or a plain path.
    pub url: String,

    /// Whether this catalog is included in `harvest_all`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub description: Option<String>,
}

impl CatalogEntry {
    pub fn new(identifier: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            url: url.into(),
            enabled: true,
            description: None,
        }
    }
}

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "catalogs.toml";

/// Returns the default configuration directory path: `~/.config/tellus/`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tellus"))
}

/// Returns the default configuration file path.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Tellus Catalog Configuration
#
# Usage:
#   tellus harvest                   # Harvest all enabled catalogs
#   tellus harvest --catalog sspm    # Harvest one catalog by identifier
#   tellus harvest --file data.json --id local
#
# Set enabled = false to skip a catalog during batch harvest.

[harvest]
catalog_blacklist = []
dataset_blacklist = []
distribution_blacklist = []
field_blacklist = []
time_series_only = false
read_local = false
default_indexable = false

[schedule]
callable = "tellus::harvest_all"
hour = 6
minute = 0
interval = 24
unit = "hours"
queue = "indexing"

# [[catalogs]]
# identifier = "example"
# url = "https://example.org/data.json"
# description = "Example catalog"
"#;

/// Load catalog configuration from a TOML file.
///
/// # Returns
/// * `Ok(Some(config))` - Configuration loaded successfully
/// * `Ok(None)` - No configuration directory could be determined, or the
///   default template could not be written
/// * `Err(e)` - A custom path is missing, or the file is invalid
///
/// A template is written when the default file does not exist yet.
pub fn load_catalogs_config(path: Option<PathBuf>) -> Result<Option<CatalogsConfig>, AppError> {
    let using_default_path = path.is_none();
    let config_path = match path {
        Some(p) => p,
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    if !config_path.exists() {
        if using_default_path {
            if let Err(e) = create_default_config(&config_path) {
                tracing::warn!("Could not create default config template: {}", e);
                return Ok(None);
            }
        } else {
            return Err(AppError::ConfigError(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    parse_catalogs_config(&content).map_err(|e| {
        AppError::ConfigError(format!("Invalid TOML in '{}': {}", config_path.display(), e))
    })
    .map(Some)
}

/// Parses the contents of a catalogs.toml file.
pub fn parse_catalogs_config(content: &str) -> Result<CatalogsConfig, toml::de::Error> {
    toml::from_str(content)
}

fn create_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    tracing::info!("Created default config template at: {}", path.display());

    Ok(())
}
