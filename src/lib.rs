#![forbid(unsafe_code)]

//! treecost — hierarchical filesystem cost/usage index.
//!
//! Builds an aggregation tree from filesystem scan dumps: every inode
//! record contributes per-user/per-group/per-category counters (inode
//! count, bytes, and size×age products for the three timestamps) that
//! roll up bottom-up into queryable per-directory totals.
//!
//! Pipeline: [`ingest`] parses scan records and feeds [`tree::Tree`],
//! which persists [`index::node::Node`]s through a [`store::NodeStore`]
//! (in-memory, or transactional disk-backed with write-back caching);
//! `Tree::finalize` runs the one-time bottom-up aggregation pass, after
//! which `Tree::format` serves nested JSON usage reports.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use treecost::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use treecost::store::disk::{DiskNodeStore, DiskNodeStoreOptions};
//! use treecost::tree::Tree;
//! ```

pub mod prelude;

pub mod core;
pub mod index;
pub mod ingest;
pub mod logger;
pub mod store;
pub mod tree;
