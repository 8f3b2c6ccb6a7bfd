//! Path-keyed node storage: one trait, two independent backends.
//!
//! The tree only ever talks to [`NodeStore`]; the in-memory backend serves
//! small trees and tests, the disk backend scales to snapshots with
//! hundreds of millions of nodes. Shared caching logic lives in
//! [`cache`] as plain composable types, not inherited behavior.

pub mod cache;
pub mod disk;
pub mod memory;

use crate::core::errors::Result;
use crate::index::node::Node;

/// Reserved store key holding the root node's path, so a reopened store
/// recovers its entry point without a separate manifest. Node paths always
/// start with a slash and can never collide with it.
pub const ROOT_PATH_KEY: &str = "_root_path";

/// Path-keyed store of tree nodes.
///
/// Methods take `&mut self`: the disk backend mutates its caches and its
/// open transaction even on reads. Single-writer by design.
pub trait NodeStore {
    /// Fetch the node stored under `path`, or `NotFound`.
    fn get(&mut self, path: &str) -> Result<Node>;

    /// Store (insert or overwrite) a node under `path`.
    fn set(&mut self, path: &str, node: &Node) -> Result<()>;

    /// Remove the node under `path`; absent paths are a no-op.
    fn delete(&mut self, path: &str) -> Result<()>;

    /// Whether `path` currently resolves, including uncommitted state.
    fn contains(&mut self, path: &str) -> Result<bool>;

    /// Number of stored nodes, including uncommitted state.
    fn len(&mut self) -> Result<u64>;

    /// Whether the store holds no nodes.
    fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The tree's entry-point path, if one has been established.
    fn root_path(&self) -> Option<&str>;

    /// Establish the tree's entry-point path.
    fn set_root_path(&mut self, path: &str) -> Result<()>;

    /// Flush caches, commit, and make the store durable. Idempotent.
    fn close(&mut self) -> Result<()>;
}
