//! Transaction batching must never change query results: a store built
//! with a tiny commit budget is indistinguishable from one committed in a
//! single batch.

use std::path::Path;

use treecost::index::codec::NodeCodec;
use treecost::index::mapping::Mapping;
use treecost::prelude::*;
use treecost::store::disk::DiskNodeStoreOptions;

fn options(txn_batch_ops: usize, write_cache_nodes: usize) -> DiskNodeStoreOptions {
    DiskNodeStoreOptions {
        codec: NodeCodec::Binary,
        write_cache_nodes,
        read_cache_nodes: 4,
        txn_batch_ops,
    }
}

fn build_store(db_path: &Path, opts: DiskNodeStoreOptions) -> serde_json::Value {
    let reopen_opts = opts.clone();
    let store = DiskNodeStore::open(db_path, opts).expect("open");
    let mut tree = Tree::new(store);
    for i in 0..50u32 {
        let mut mapping = Mapping::new();
        mapping.combine("size", "grp", "usr", "file", u128::from(i) + 1);
        tree.add_node(&format!("/root/d{}/f{i}.txt", i % 5), false, mapping)
            .expect("add");
    }
    tree.finalize().expect("finalize");
    tree.close().expect("close");
    // Release the redb file lock before reopening.
    drop(tree);

    let reopened = DiskNodeStore::open(db_path, reopen_opts).expect("reopen");
    let mut tree = Tree::new(reopened);
    tree.format("", 4, None).expect("format")
}

#[test]
fn commit_batch_size_does_not_change_results() {
    let dir = tempfile::tempdir().expect("tempdir");

    // Tiny budget: commits constantly. Huge budget: everything lands in
    // the final close commit.
    let frequent = build_store(&dir.path().join("frequent.redb"), options(2, 2));
    let single = build_store(&dir.path().join("single.redb"), options(1_000_000, 1_000));
    assert_eq!(frequent, single);
}

#[test]
fn zero_write_cache_still_builds_correctly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let buffered = build_store(&dir.path().join("buffered.redb"), options(16, 64));
    let unbuffered = build_store(&dir.path().join("unbuffered.redb"), options(16, 0));
    assert_eq!(buffered, unbuffered);
}

#[test]
fn uncommitted_batch_is_lost_without_close() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("abandoned.redb");

    {
        let store = DiskNodeStore::open(&db_path, options(1_000_000, 1_000)).expect("open");
        let mut tree = Tree::new(store);
        let mut mapping = Mapping::new();
        mapping.combine("size", "grp", "usr", "file", 1);
        tree.add_node("/root/f.txt", false, mapping).expect("add");
        // Dropped without close(): nothing was ever committed.
    }

    let mut reopened = DiskNodeStore::open(&db_path, options(8, 4)).expect("reopen");
    assert_eq!(reopened.root_path(), None);
    assert_eq!(reopened.len().expect("len"), 0);
}

#[test]
fn json_and_binary_codecs_produce_identical_queries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let binary = build_store(&dir.path().join("binary.redb"), options(8, 4));
    let json = build_store(
        &dir.path().join("json.redb"),
        DiskNodeStoreOptions {
            codec: NodeCodec::Json,
            ..options(8, 4)
        },
    );
    assert_eq!(binary, json);
}
