//! Bottom-up computation of the `updated` flag.

/// Whether a node counts as updated in the current run.
///
/// Evaluated once per node, after all of its children were processed, so a
/// change at a leaf reaches the catalog through the return values of the
/// walk. A node's own scalar metadata (such as an edited title) is persisted
/// but does not contribute.
pub fn compute_updated(created: bool, children_updated: bool, content_changed: bool) -> bool {
    created || children_updated || content_changed
}
