//! Tree vertex: one filesystem path with its accumulated Mapping and the
//! names of its direct children.
//!
//! A node never stores a parent reference. Parent linkage is implicit in
//! the path structure and re-resolved by string manipulation plus a store
//! lookup, which sidesteps ownership cycles entirely.

#![allow(missing_docs)]

use std::collections::BTreeSet;

use crate::index::mapping::Mapping;

/// One filesystem path in the aggregation tree.
///
/// `path` is absolute, slash-separated, and canonical: no trailing slash.
/// `child_names` holds direct child *names*; a child's full path is always
/// `path + "/" + name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    path: String,
    is_directory: bool,
    mapping: Mapping,
    child_names: BTreeSet<String>,
}

impl Node {
    /// Create an empty node: no Mapping entries, no children.
    #[must_use]
    pub fn new(is_directory: bool, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory,
            mapping: Mapping::new(),
            child_names: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Final path component (derived, never stored).
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    #[must_use]
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Combine `mapping` into this node's own Mapping.
    pub fn update(&mut self, mapping: Mapping) {
        self.mapping.update(mapping);
    }

    /// Register a direct child by name. Idempotent.
    pub fn add_child(&mut self, name: impl Into<String>) {
        self.child_names.insert(name.into());
    }

    /// Remove a direct child by name; unknown names are a no-op.
    pub fn remove_child(&mut self, name: &str) {
        self.child_names.remove(name);
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.child_names.is_empty()
    }

    /// Direct child names in deterministic order.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.child_names.iter().map(String::as_str)
    }

    /// Full path of a direct child, derived by concatenation.
    #[must_use]
    pub fn child_path(&self, name: &str) -> String {
        format!("{}/{name}", self.path)
    }

    /// Rebuild a node from its decoded parts (used by the codecs).
    pub(crate) fn from_parts(
        path: String,
        is_directory: bool,
        mapping: Mapping,
        child_names: BTreeSet<String>,
    ) -> Self {
        Self {
            path,
            is_directory,
            mapping,
            child_names,
        }
    }
}
