//! Tree orchestration: streaming insertion with ancestor inference, the
//! one-time bottom-up finalize pass, and the nested query formatter.
//!
//! The tree only talks to a [`NodeStore`]; it holds no node graph of its
//! own. Parents are re-resolved from path strings, so records can arrive
//! in any order and ancestors are synthesized before they are named
//! explicitly.

#![allow(missing_docs)]

use std::collections::BTreeSet;

use serde_json::{Value, json};

use crate::core::errors::{Result, TcError};
use crate::index::mapping::{CostRate, Mapping};
use crate::index::node::Node;
use crate::store::NodeStore;

/// Name of the synthetic non-directory child holding the residual
/// file-level cost directly inside a directory.
pub const STAR_NODE_NAME: &str = "*.*";

/// Lifecycle of a tree.
///
/// `Empty` → `Building` on the first `add_node`, `Building` → `Finalized`
/// by `finalize`, anything → `Closed` by `close`. A tree constructed over
/// a store that already carries a root path starts `Finalized` (the store
/// was built and closed by an earlier run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeState {
    Empty,
    Building,
    Finalized,
    Closed,
}

/// Post-order traversal frame for the finalize pass. An explicit stack
/// keeps pathological directory nesting off the call stack.
enum Frame {
    Enter(String),
    Exit(String),
}

/// Aggregation tree over a node store.
#[derive(Debug)]
pub struct Tree<S: NodeStore> {
    store: S,
    state: TreeState,
    nodes_created: u64,
    cost_rate: CostRate,
}

impl<S: NodeStore> Tree<S> {
    /// Wrap a store with the default cost rate.
    pub fn new(store: S) -> Self {
        Self::with_cost_rate(store, CostRate::default())
    }

    /// Wrap a store, pricing time metrics at `cost_rate` when formatting.
    pub fn with_cost_rate(store: S, cost_rate: CostRate) -> Self {
        let state = if store.root_path().is_some() {
            TreeState::Finalized
        } else {
            TreeState::Empty
        };
        Self {
            store,
            state,
            nodes_created: 0,
            cost_rate,
        }
    }

    #[must_use]
    pub fn state(&self) -> TreeState {
        self.state
    }

    /// Nodes created by this instance, synthetic ancestors and `*.*`
    /// nodes included. Owned by the instance, never process-wide.
    #[must_use]
    pub fn node_count(&self) -> u64 {
        self.nodes_created
    }

    /// The root node's path, once the first record has established it.
    #[must_use]
    pub fn root_path(&self) -> Option<&str> {
        self.store.root_path()
    }

    /// Fetch a node by path, `NotFound` if absent.
    pub fn get_node(&mut self, path: &str) -> Result<Node> {
        self.store.get(path)
    }

    /// Insert one record, synthesizing any missing ancestors.
    ///
    /// The first path component ever seen becomes the root; every later
    /// record must share it. A mismatched root is a caller contract
    /// violation and panics. Re-adding an existing path merges `mapping`
    /// into the stored node, so an inferred placeholder later named
    /// explicitly gains its data.
    ///
    /// # Panics
    ///
    /// If `path` is empty, not absolute, or rooted differently from every
    /// previous record.
    pub fn add_node(&mut self, path: &str, is_directory: bool, mapping: Mapping) -> Result<()> {
        match self.state {
            TreeState::Empty | TreeState::Building => {}
            TreeState::Finalized | TreeState::Closed => {
                return Err(TcError::InvalidState {
                    details: "add_node on a finalized tree".to_string(),
                });
            }
        }
        assert!(
            path.starts_with('/'),
            "add_node requires an absolute path, got {path:?}"
        );
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        assert!(!components.is_empty(), "add_node requires a non-empty path");

        let root_path = format!("/{}", components[0]);
        match self.store.root_path() {
            None => {
                self.store.set(&root_path, &Node::new(true, &root_path))?;
                self.store.set_root_path(&root_path)?;
                self.nodes_created += 1;
                self.state = TreeState::Building;
            }
            Some(existing) => {
                assert!(
                    existing == root_path,
                    "all records must share one root: tree is rooted at \
                     {existing:?}, record names {root_path:?}"
                );
            }
        }

        if components.len() == 1 {
            // The record names the root itself.
            let mut root = self.store.get(&root_path)?;
            root.update(mapping);
            return self.store.set(&root_path, &root);
        }

        let mut mapping = Some(mapping);
        let mut parent_path = root_path;
        for (i, name) in components[1..].iter().enumerate() {
            let is_target = i == components.len() - 2;
            let child_path = format!("{parent_path}/{name}");

            let mut parent = self.store.get(&parent_path)?;
            if !parent.child_names().any(|n| n == *name) {
                parent.add_child(*name);
                self.store.set(&parent_path, &parent)?;
            }

            if is_target {
                let mut node = match self.store.get(&child_path) {
                    Ok(node) => node,
                    Err(TcError::NotFound { .. }) => {
                        self.nodes_created += 1;
                        Node::new(is_directory, &child_path)
                    }
                    Err(e) => return Err(e),
                };
                node.update(mapping.take().unwrap_or_default());
                self.store.set(&child_path, &node)?;
            } else if !self.store.contains(&child_path)? {
                // Inferred ancestor: directory with an empty Mapping.
                self.nodes_created += 1;
                self.store.set(&child_path, &Node::new(true, &child_path))?;
            }
            parent_path = child_path;
        }
        Ok(())
    }

    /// One-time bottom-up aggregation pass.
    ///
    /// Post-order over the whole tree: each directory absorbs its own raw
    /// data and its file children into a synthetic `*.*` child, deletes
    /// the file children, then rolls every remaining (directory) child's
    /// finalized Mapping into its own. Runs once; repeating it would
    /// double-merge Mappings, so a second call is `InvalidState`.
    pub fn finalize(&mut self) -> Result<()> {
        match self.state {
            TreeState::Empty => {
                self.state = TreeState::Finalized;
                return Ok(());
            }
            TreeState::Building => {}
            TreeState::Finalized | TreeState::Closed => {
                return Err(TcError::InvalidState {
                    details: "finalize on an already finalized tree".to_string(),
                });
            }
        }
        let root = self
            .store
            .root_path()
            .map(ToString::to_string)
            .ok_or_else(|| TcError::InvalidState {
                details: "building tree has no root".to_string(),
            })?;

        let mut stack = vec![Frame::Enter(root)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(path) => {
                    let node = self.store.get(&path)?;
                    if !node.is_directory() && !node.has_children() {
                        // File leaf: absorbed and deleted by its parent's
                        // exit step, nothing to do here.
                        continue;
                    }
                    stack.push(Frame::Exit(path));
                    for name in node.child_names() {
                        stack.push(Frame::Enter(node.child_path(name)));
                    }
                }
                Frame::Exit(path) => self.finalize_node(&path)?,
            }
        }
        self.state = TreeState::Finalized;
        Ok(())
    }

    /// Finalize one node; all of its children are already finalized.
    fn finalize_node(&mut self, path: &str) -> Result<()> {
        let mut node = self.store.get(path)?;

        // Residual file-level cost: the node's own raw data plus every
        // non-directory child.
        let mut star_mapping = node.mapping().clone();
        let mut file_children: Vec<String> = Vec::new();
        let mut dir_mappings: Vec<Mapping> = Vec::new();
        for name in node.child_names() {
            let child = self.store.get(&node.child_path(name))?;
            if child.is_directory() {
                dir_mappings.push(child.mapping().clone());
            } else {
                star_mapping.update(child.mapping().clone());
                file_children.push(name.to_string());
            }
        }

        let needs_star = (node.is_directory() && !node.mapping().is_empty())
            || !file_children.is_empty();
        if needs_star {
            let star_path = node.child_path(STAR_NODE_NAME);
            let mut star = Node::new(false, &star_path);
            star.update(star_mapping);
            self.store.set(&star_path, &star)?;
            self.nodes_created += 1;
            for name in &file_children {
                self.store.delete(&node.child_path(name))?;
                node.remove_child(name);
            }
            node.add_child(STAR_NODE_NAME);
        }

        // Directory rollup happens strictly after *.* absorption, so *.*
        // reflects file-level cost only, never cumulative subtree cost.
        for mapping in dir_mappings {
            node.update(mapping);
        }
        self.store.set(path, &node)
    }

    /// Query a subtree as nested JSON.
    ///
    /// Empty or `"/"` resolves to the root. An absent path is a valid
    /// empty answer (an empty JSON object), not an error. Depth 0 emits
    /// the node's own data only; each extra level adds a `child_dirs`
    /// array one level deeper, omitted entirely on childless nodes.
    pub fn format(
        &mut self,
        path: &str,
        depth: u32,
        whitelist: Option<&BTreeSet<String>>,
    ) -> Result<Value> {
        let Some(root) = self.store.root_path().map(ToString::to_string) else {
            return Ok(json!({}));
        };
        let resolved = if path.is_empty() || path == "/" {
            root
        } else {
            path.trim_end_matches('/').to_string()
        };
        match self.store.contains(&resolved) {
            Ok(true) => self.format_node(&resolved, depth, whitelist),
            Ok(false) => Ok(json!({})),
            Err(e) => Err(e),
        }
    }

    fn format_node(
        &mut self,
        path: &str,
        depth: u32,
        whitelist: Option<&BTreeSet<String>>,
    ) -> Result<Value> {
        let node = self.store.get(path)?;
        let mut out = serde_json::Map::new();
        out.insert("name".to_string(), json!(node.name()));
        out.insert("path".to_string(), json!(node.path()));
        out.insert(
            "data".to_string(),
            node.mapping().format(whitelist, self.cost_rate),
        );
        if depth > 0 && node.has_children() {
            let child_paths: Vec<String> = node
                .child_names()
                .map(|name| node.child_path(name))
                .collect();
            let mut child_dirs = Vec::with_capacity(child_paths.len());
            for child_path in child_paths {
                child_dirs.push(self.format_node(&child_path, depth - 1, whitelist)?);
            }
            out.insert("child_dirs".to_string(), Value::Array(child_dirs));
        }
        Ok(Value::Object(out))
    }

    /// Flush and commit the store. Idempotent.
    ///
    /// A `Building` tree cannot be closed: closing marks the store as a
    /// complete build, and a reopened store with that marker is served
    /// read-only as finalized data. Finalize first or discard the store.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            TreeState::Closed => return Ok(()),
            TreeState::Building => {
                return Err(TcError::InvalidState {
                    details: "close on an unfinalized tree".to_string(),
                });
            }
            TreeState::Empty | TreeState::Finalized => {}
        }
        self.store.close()?;
        self.state = TreeState::Closed;
        Ok(())
    }
}
