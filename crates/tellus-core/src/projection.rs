//! Metadata projection applied before a node is persisted.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// Returns a shallow copy of `metadata` without `child_key` and without any
/// blacklisted key.
///
/// The child collection is dropped because it is persisted as separate
/// nodes. Keys that are absent are ignored.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeSet;
/// use serde_json::json;
/// use tellus_core::projection::project;
///
/// let raw = json!({"identifier": "d1", "issued": "2017", "distribution": []});
/// let blacklist = BTreeSet::from(["issued".to_string()]);
/// let trimmed = project(raw.as_object().unwrap(), &blacklist, Some("distribution"));
///
/// assert_eq!(trimmed.len(), 1);
/// assert!(trimmed.contains_key("identifier"));
/// ```
pub fn project(
    metadata: &Map<String, Value>,
    blacklist: &BTreeSet<String>,
    child_key: Option<&str>,
) -> Map<String, Value> {
    metadata
        .iter()
        .filter(|(key, _)| child_key != Some(key.as_str()) && !blacklist.contains(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
