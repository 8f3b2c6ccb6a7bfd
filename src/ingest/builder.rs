//! Turns parsed scan records into Mappings and streams them into a tree.
//!
//! Owner and group naming stays an external boundary: the builder asks an
//! [`IdentityResolver`] and never touches the system user database itself.
//! Time metrics are accumulated as raw `size × elapsed-seconds` products;
//! the cost constant is applied at format time, so one build serves any
//! pricing.

use std::io::BufRead;

use crate::core::config::IngestConfig;
use crate::core::errors::{Result, TcError};
use crate::index::mapping::Mapping;
use crate::ingest::classify::CategoryRegistry;
use crate::ingest::record::ScanRecord;
use crate::logger::{BuildLogger, EventType, LogEntry};
use crate::store::NodeStore;
use crate::tree::Tree;

/// Resolves numeric uid/gid to report names. Name lookup services (NSS,
/// LDAP caches) plug in from outside; `&mut self` lets implementations
/// memoize.
pub trait IdentityResolver {
    /// Report name for a numeric user id.
    fn user_name(&mut self, uid: u32) -> String;
    /// Report name for a numeric group id.
    fn group_name(&mut self, gid: u32) -> String;
}

/// Pass-through resolver rendering ids as decimal strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericIdentity;

impl IdentityResolver for NumericIdentity {
    fn user_name(&mut self, uid: u32) -> String {
        uid.to_string()
    }

    fn group_name(&mut self, gid: u32) -> String {
        gid.to_string()
    }
}

/// Counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Input lines consumed.
    pub lines: u64,
    /// Records accepted into the tree.
    pub records: u64,
    /// Lines skipped as malformed.
    pub skipped: u64,
}

/// Streams scan records into a [`Tree`].
#[derive(Debug)]
pub struct TreeBuilder<R: IdentityResolver> {
    categories: CategoryRegistry,
    resolver: R,
    progress_interval: u64,
    reference_time: i64,
}

impl<R: IdentityResolver> TreeBuilder<R> {
    /// Builder pricing elapsed time against the current instant.
    pub fn new(resolver: R, config: &IngestConfig) -> Result<Self> {
        Self::with_reference_time(resolver, config, chrono::Utc::now().timestamp())
    }

    /// Builder pricing elapsed time against a fixed reference instant, so
    /// repeated builds over the same dump produce identical trees.
    pub fn with_reference_time(
        resolver: R,
        config: &IngestConfig,
        reference_time: i64,
    ) -> Result<Self> {
        Ok(Self {
            categories: CategoryRegistry::new()?,
            resolver,
            progress_interval: config.progress_interval_lines.max(1),
            reference_time,
        })
    }

    /// Build the Mapping one record contributes: per category, an inode
    /// count, the size, and the three raw time products.
    pub fn record_mapping(&mut self, record: &ScanRecord) -> Mapping {
        let user = self.resolver.user_name(record.uid);
        let group = self.resolver.group_name(record.gid);
        let size = u128::from(record.size);
        let atime_product = size * elapsed_seconds(self.reference_time, record.atime);
        let mtime_product = size * elapsed_seconds(self.reference_time, record.mtime);
        let ctime_product = size * elapsed_seconds(self.reference_time, record.ctime);

        let mut mapping = Mapping::new();
        for category in self.categories.categories(&record.path, record.file_type) {
            mapping.combine("count", &group, &user, &category, 1);
            mapping.combine("size", &group, &user, &category, size);
            mapping.combine("atime", &group, &user, &category, atime_product);
            mapping.combine("mtime", &group, &user, &category, mtime_product);
            mapping.combine("ctime", &group, &user, &category, ctime_product);
        }
        mapping
    }

    /// Consume a whole scan dump. Malformed lines are skipped, counted,
    /// and logged; store and tree failures abort the run.
    pub fn ingest<S: NodeStore, B: BufRead>(
        &mut self,
        tree: &mut Tree<S>,
        input: B,
        logger: &mut BuildLogger,
    ) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        for line in input.lines() {
            let line = line.map_err(|e| TcError::io("<scan input>", e))?;
            stats.lines += 1;
            if line.is_empty() {
                continue;
            }
            match ScanRecord::parse(&line) {
                Ok(record) => {
                    let mapping = self.record_mapping(&record);
                    tree.add_node(&record.path, record.file_type.is_directory(), mapping)?;
                    stats.records += 1;
                }
                Err(e) => {
                    stats.skipped += 1;
                    let mut entry = LogEntry::new(EventType::RecordSkipped);
                    entry.lines = Some(stats.lines);
                    entry.error_code = Some(e.code().to_string());
                    entry.details = Some(e.to_string());
                    logger.log(&entry);
                }
            }
            if stats.lines % self.progress_interval == 0 {
                let mut entry = LogEntry::new(EventType::Progress);
                entry.lines = Some(stats.lines);
                entry.records = Some(stats.records);
                entry.skipped = Some(stats.skipped);
                entry.nodes = Some(tree.node_count());
                logger.log(&entry);
            }
        }
        Ok(stats)
    }
}

/// Seconds between the scan timestamp and the reference instant, clamped
/// at zero for future timestamps (clock skew in dumps happens).
fn elapsed_seconds(reference_time: i64, ts: i64) -> u128 {
    u128::try_from(reference_time.saturating_sub(ts)).unwrap_or(0)
}
