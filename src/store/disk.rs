//! Transactional disk-backed node store.
//!
//! Wraps redb (a transactional, memory-mapped, ordered key-value store)
//! behind the [`NodeStore`] trait. Per-node transactions are far too slow
//! at hundreds of millions of writes, so this backend layers:
//!
//! - a bounded FIFO write-back cache buffering recent `set`s; eviction
//!   flushes the evicted node into the open write transaction;
//! - a bounded FIFO read cache of recently deserialized nodes (every
//!   insertion touches every ancestor up to the root);
//! - transaction batching: one write transaction accumulates a fixed
//!   operation budget before it is committed and a new one opened.
//!
//! `get` consults read cache, then write cache, then the transaction.
//! `contains`/`len` reflect uncommitted in-cache state. `close()` flushes
//! the write cache, persists the root-path key, commits, and flips the
//! store into read-only mode; a store reopened with a persisted root-path
//! key starts read-only (the key is only ever written by a clean close,
//! so its presence marks a complete build).

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::core::config::StoreConfig;
use crate::core::errors::{Result, TcError};
use crate::index::codec::NodeCodec;
use crate::index::node::Node;
use crate::store::cache::FifoCache;
use crate::store::{NodeStore, ROOT_PATH_KEY};

const NODE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Tuning knobs for [`DiskNodeStore`].
#[derive(Debug, Clone)]
pub struct DiskNodeStoreOptions {
    /// Node encoding for stored payloads.
    pub codec: NodeCodec,
    /// Write-back cache capacity in nodes (0 disables buffering).
    pub write_cache_nodes: usize,
    /// Read cache capacity in nodes (0 disables it).
    pub read_cache_nodes: usize,
    /// Flushed operations per write transaction before commit.
    pub txn_batch_ops: usize,
}

impl Default for DiskNodeStoreOptions {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}

impl DiskNodeStoreOptions {
    /// Derive options from the `[store]` configuration section.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            codec: config.codec,
            write_cache_nodes: config.write_cache_nodes,
            read_cache_nodes: config.read_cache_nodes,
            txn_batch_ops: config.txn_batch_ops.max(1),
        }
    }
}

/// Disk-backed node store with write-back/read caching and transaction
/// batching.
pub struct DiskNodeStore {
    // Declared before `db`: struct fields drop in declaration order, and a
    // live `WriteTransaction` must be dropped before its `Database` or the
    // database drop blocks forever waiting on the open transaction.
    txn: Option<redb::WriteTransaction>,
    db: Database,
    codec: NodeCodec,
    write_cache: FifoCache<Node>,
    read_cache: FifoCache<Node>,
    ops_in_txn: usize,
    txn_batch_ops: usize,
    commits: u64,
    root_path: Option<String>,
    closed: bool,
}

impl std::fmt::Debug for DiskNodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskNodeStore")
            .field("codec", &self.codec)
            .field("ops_in_txn", &self.ops_in_txn)
            .field("commits", &self.commits)
            .field("root_path", &self.root_path)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl DiskNodeStore {
    /// Open (creating if absent) the database file at `path`.
    ///
    /// A store carrying a persisted root-path key was closed cleanly and
    /// opens in read-only query mode; anything else opens in build mode
    /// with a fresh write transaction.
    pub fn open(path: &Path, options: DiskNodeStoreOptions) -> Result<Self> {
        let db = Database::create(path).map_err(rerr)?;
        let txn = db.begin_write().map_err(rerr)?;
        let root_path = {
            let table = txn.open_table(NODE_TABLE).map_err(rerr)?;
            match table.get(ROOT_PATH_KEY).map_err(rerr)? {
                Some(guard) => Some(String::from_utf8(guard.value().to_vec()).map_err(|e| {
                    TcError::CorruptData {
                        context: "store",
                        details: format!("root path key is not UTF-8: {e}"),
                    }
                })?),
                None => None,
            }
        };
        let closed = root_path.is_some();
        let txn = if closed {
            // Complete build: serve queries from committed state only.
            txn.abort().map_err(rerr)?;
            None
        } else {
            Some(txn)
        };
        Ok(Self {
            db,
            codec: options.codec,
            write_cache: FifoCache::new(options.write_cache_nodes),
            read_cache: FifoCache::new(options.read_cache_nodes),
            txn,
            ops_in_txn: 0,
            txn_batch_ops: options.txn_batch_ops,
            commits: 0,
            root_path,
            closed,
        })
    }

    /// Number of committed transaction batches so far.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    /// Whether the store has been flipped to read-only query mode.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self, op: &str) -> Result<()> {
        if self.closed {
            return Err(TcError::InvalidState {
                details: format!("{op} on a closed store"),
            });
        }
        Ok(())
    }

    /// Serialize and flush one node into the open write transaction.
    fn flush_node(&mut self, path: &str, node: &Node) -> Result<()> {
        let bytes = self.codec.encode(node)?;
        self.put_raw(path, &bytes)
    }

    fn put_raw(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        {
            let txn = self.txn.as_ref().ok_or_else(|| TcError::InvalidState {
                details: "no open write transaction".to_string(),
            })?;
            let mut table = txn.open_table(NODE_TABLE).map_err(rerr)?;
            table.insert(key, bytes).map_err(rerr)?;
        }
        self.note_op()
    }

    /// Count one flushed operation against the batch budget; commit and
    /// reopen when the budget is spent.
    fn note_op(&mut self) -> Result<()> {
        self.ops_in_txn += 1;
        if self.ops_in_txn >= self.txn_batch_ops {
            self.commit_batch()?;
        }
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.commit().map_err(rerr)?;
            self.commits += 1;
        }
        self.txn = Some(self.db.begin_write().map_err(rerr)?);
        self.ops_in_txn = 0;
        Ok(())
    }

    /// Fetch raw payload bytes from the open transaction, or from a fresh
    /// read snapshot once the store is closed.
    fn load_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(txn) = &self.txn {
            let table = txn.open_table(NODE_TABLE).map_err(rerr)?;
            return Ok(table.get(key).map_err(rerr)?.map(|g| g.value().to_vec()));
        }
        let rtxn = self.db.begin_read().map_err(rerr)?;
        match rtxn.open_table(NODE_TABLE) {
            Ok(table) => Ok(table.get(key).map_err(rerr)?.map(|g| g.value().to_vec())),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(rerr(e)),
        }
    }
}

impl NodeStore for DiskNodeStore {
    fn get(&mut self, path: &str) -> Result<Node> {
        if let Some(node) = self.read_cache.get(path) {
            return Ok(node.clone());
        }
        if let Some(node) = self.write_cache.get(path) {
            return Ok(node.clone());
        }
        match self.load_bytes(path)? {
            Some(bytes) => {
                let node = self.codec.decode(path, &bytes)?;
                // Admission is best-effort; an evicted read-cache entry is
                // simply dropped, the transaction still has the data.
                self.read_cache.insert(path.to_string(), node.clone());
                Ok(node)
            }
            None => Err(TcError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    fn set(&mut self, path: &str, node: &Node) -> Result<()> {
        self.ensure_open("set")?;
        if self.read_cache.contains(path) {
            // Refresh so later gets cannot serve the stale version.
            self.read_cache.insert(path.to_string(), node.clone());
        }
        if let Some((evicted_path, evicted_node)) =
            self.write_cache.insert(path.to_string(), node.clone())
        {
            self.flush_node(&evicted_path, &evicted_node)?;
        }
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        self.ensure_open("delete")?;
        self.write_cache.remove(path);
        self.read_cache.remove(path);
        {
            let txn = self.txn.as_ref().ok_or_else(|| TcError::InvalidState {
                details: "no open write transaction".to_string(),
            })?;
            let mut table = txn.open_table(NODE_TABLE).map_err(rerr)?;
            table.remove(path).map_err(rerr)?;
        }
        self.note_op()
    }

    fn contains(&mut self, path: &str) -> Result<bool> {
        if self.read_cache.contains(path) || self.write_cache.contains(path) {
            return Ok(true);
        }
        Ok(self.load_bytes(path)?.is_some())
    }

    fn len(&mut self) -> Result<u64> {
        // Buffered-but-unflushed entries count too; callers rely on
        // "have I already created this node" mid-ingestion.
        let buffered: Vec<String> = self.write_cache.keys().map(ToString::to_string).collect();
        if let Some(txn) = &self.txn {
            let table = txn.open_table(NODE_TABLE).map_err(rerr)?;
            return count_entries(&table, &buffered);
        }
        let rtxn = self.db.begin_read().map_err(rerr)?;
        match rtxn.open_table(NODE_TABLE) {
            Ok(table) => count_entries(&table, &buffered),
            Err(redb::TableError::TableDoesNotExist(_)) => Ok(buffered.len() as u64),
            Err(e) => Err(rerr(e)),
        }
    }

    fn root_path(&self) -> Option<&str> {
        self.root_path.as_deref()
    }

    fn set_root_path(&mut self, path: &str) -> Result<()> {
        self.ensure_open("set_root_path")?;
        self.root_path = Some(path.to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        for (path, node) in self.write_cache.drain_in_order() {
            self.flush_node(&path, &node)?;
        }
        // The root-path key is written only here: its presence marks a
        // complete, cleanly closed build.
        if let Some(root) = self.root_path.clone() {
            self.put_raw(ROOT_PATH_KEY, root.as_bytes())?;
        }
        if let Some(txn) = self.txn.take() {
            txn.commit().map_err(rerr)?;
            self.commits += 1;
        }
        self.ops_in_txn = 0;
        self.closed = true;
        Ok(())
    }
}

/// Table entries excluding the reserved root-path key, plus buffered
/// write-cache entries not yet present in the table.
fn count_entries<T>(table: &T, buffered: &[String]) -> Result<u64>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut total = table.len().map_err(rerr)?;
    if table.get(ROOT_PATH_KEY).map_err(rerr)?.is_some() {
        total -= 1;
    }
    for key in buffered {
        if table.get(key.as_str()).map_err(rerr)?.is_none() {
            total += 1;
        }
    }
    Ok(total)
}

fn rerr(e: impl Into<redb::Error>) -> TcError {
    TcError::from(e.into())
}
