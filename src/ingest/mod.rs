//! Scan-record ingestion: parse mpistat-style dump lines, classify paths
//! into reporting categories, and feed the tree.

pub mod builder;
pub mod classify;
pub mod record;

pub use builder::{IdentityResolver, IngestStats, NumericIdentity, TreeBuilder};
pub use classify::CategoryRegistry;
pub use record::{FileType, ScanRecord};
