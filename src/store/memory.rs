//! In-memory node store for small trees and tests.

#![allow(missing_docs)]

use std::collections::HashMap;

use crate::core::errors::{Result, TcError};
use crate::index::node::Node;
use crate::store::NodeStore;

/// Direct path→Node table; nodes are stored unserialized.
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    nodes: HashMap<String, Node>,
    root_path: Option<String>,
}

impl MemoryNodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeStore for MemoryNodeStore {
    fn get(&mut self, path: &str) -> Result<Node> {
        self.nodes
            .get(path)
            .cloned()
            .ok_or_else(|| TcError::NotFound {
                path: path.to_string(),
            })
    }

    fn set(&mut self, path: &str, node: &Node) -> Result<()> {
        self.nodes.insert(path.to_string(), node.clone());
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        self.nodes.remove(path);
        Ok(())
    }

    fn contains(&mut self, path: &str) -> Result<bool> {
        Ok(self.nodes.contains_key(path))
    }

    fn len(&mut self) -> Result<u64> {
        Ok(self.nodes.len() as u64)
    }

    fn root_path(&self) -> Option<&str> {
        self.root_path.as_deref()
    }

    fn set_root_path(&mut self, path: &str) -> Result<()> {
        self.root_path = Some(path.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
