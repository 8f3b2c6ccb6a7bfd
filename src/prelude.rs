//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use treecost::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, TcError};

// Index
pub use crate::index::codec::NodeCodec;
pub use crate::index::mapping::{CostRate, Mapping, Value};
pub use crate::index::node::Node;

// Store
pub use crate::store::NodeStore;
pub use crate::store::disk::{DiskNodeStore, DiskNodeStoreOptions};
pub use crate::store::memory::MemoryNodeStore;

// Tree
pub use crate::tree::{Tree, TreeState};

// Ingest
pub use crate::ingest::{IdentityResolver, NumericIdentity, ScanRecord, TreeBuilder};

// Logger
pub use crate::logger::{BuildLogger, EventType, LogEntry};
