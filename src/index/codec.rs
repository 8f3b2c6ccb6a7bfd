//! Interchangeable node encodings, selected at store construction time.
//!
//! Two formats back the same `Node`:
//!
//! - **Json** — self-describing, human-readable, stable across versions;
//!   the debugging and migration format.
//! - **Binary** — fixed layout, big-endian: `child_count: u16`, per child
//!   `{len: u16, name bytes}`, `is_directory: u8`, then the Mapping binary
//!   encoding. The hot path for the disk store: snapshot sizes run into
//!   hundreds of millions of nodes and text parsing does not keep up.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::errors::{Result, TcError};
use crate::index::mapping::Mapping;
use crate::index::node::Node;
use crate::index::wire::{Reader, put_str};

const WIRE_CONTEXT: &str = "node";

/// Tagged node encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeCodec {
    /// Self-describing serde_json document.
    Json,
    /// Fixed-layout big-endian encoding.
    #[default]
    Binary,
}

impl NodeCodec {
    /// Encode a node for storage. The node's path is the store key and is
    /// only embedded by the JSON format.
    pub fn encode(self, node: &Node) -> Result<Vec<u8>> {
        match self {
            Self::Json => encode_json(node),
            Self::Binary => encode_binary(node),
        }
    }

    /// Decode a stored payload. `path` is the store key the payload was
    /// found under and becomes the node's path.
    pub fn decode(self, path: &str, bytes: &[u8]) -> Result<Node> {
        match self {
            Self::Json => decode_json(path, bytes),
            Self::Binary => decode_binary(path, bytes),
        }
    }
}

fn encode_json(node: &Node) -> Result<Vec<u8>> {
    let doc = json!({
        "path": node.path(),
        "children": node.child_names().collect::<Vec<_>>(),
        "is_directory": node.is_directory(),
        "mapping": node.mapping().to_json(),
    });
    Ok(serde_json::to_vec(&doc)?)
}

fn decode_json(path: &str, bytes: &[u8]) -> Result<Node> {
    let doc: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| TcError::CorruptData {
            context: WIRE_CONTEXT,
            details: format!("invalid JSON payload: {e}"),
        })?;
    let wire_path = doc
        .get("path")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| corrupt("missing path field"))?;
    if wire_path != path {
        return Err(corrupt(&format!(
            "payload path {wire_path:?} does not match store key {path:?}"
        )));
    }
    let is_directory = doc
        .get("is_directory")
        .and_then(serde_json::Value::as_bool)
        .ok_or_else(|| corrupt("missing is_directory field"))?;
    let children = doc
        .get("children")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| corrupt("missing children field"))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(ToString::to_string)
                .ok_or_else(|| corrupt("non-string child name"))
        })
        .collect::<Result<BTreeSet<String>>>()?;
    let mapping = Mapping::from_json(doc.get("mapping").unwrap_or(&serde_json::Value::Null))?;
    Ok(Node::from_parts(
        path.to_string(),
        is_directory,
        mapping,
        children,
    ))
}

fn encode_binary(node: &Node) -> Result<Vec<u8>> {
    let child_count =
        u16::try_from(node.child_names().count()).map_err(|_| TcError::Serialization {
            context: WIRE_CONTEXT,
            details: "more than 65535 children in one directory".to_string(),
        })?;
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&child_count.to_be_bytes());
    for name in node.child_names() {
        put_str(&mut buf, name, WIRE_CONTEXT)?;
    }
    buf.push(u8::from(node.is_directory()));
    buf.extend_from_slice(&node.mapping().serialize()?);
    Ok(buf)
}

fn decode_binary(path: &str, bytes: &[u8]) -> Result<Node> {
    let mut reader = Reader::new(bytes, WIRE_CONTEXT);
    let child_count = reader.read_u16()?;
    let mut children = BTreeSet::new();
    for _ in 0..child_count {
        children.insert(reader.read_str()?);
    }
    let is_directory = match reader.read_u8()? {
        0 => false,
        1 => true,
        other => return Err(corrupt(&format!("bad is_directory byte {other}"))),
    };
    let mapping = Mapping::read_from(&mut reader)?;
    reader.expect_end()?;
    Ok(Node::from_parts(
        path.to_string(),
        is_directory,
        mapping,
        children,
    ))
}

fn corrupt(details: &str) -> TcError {
    TcError::CorruptData {
        context: WIRE_CONTEXT,
        details: details.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_node() -> Node {
        let mut node = Node::new(true, "/lustre/scratch");
        node.add_child("team");
        node.add_child("old.bam");
        let mut m = Mapping::new();
        m.set("size", "hgi", "ah12", "bam", 1 << 33);
        m.combine("atime", "hgi", "ah12", "*", u128::from(u64::MAX) + 99);
        node.update(m);
        node
    }

    #[test]
    fn binary_roundtrip() {
        let node = sample_node();
        let bytes = NodeCodec::Binary.encode(&node).expect("encode");
        let back = NodeCodec::Binary.decode(node.path(), &bytes).expect("decode");
        assert_eq!(back, node);
    }

    #[test]
    fn json_roundtrip() {
        let node = sample_node();
        let bytes = NodeCodec::Json.encode(&node).expect("encode");
        let back = NodeCodec::Json.decode(node.path(), &bytes).expect("decode");
        assert_eq!(back, node);
    }

    #[test]
    fn roundtrip_without_children_or_mapping() {
        let node = Node::new(false, "/root/f.txt");
        for codec in [NodeCodec::Binary, NodeCodec::Json] {
            let bytes = codec.encode(&node).expect("encode");
            assert_eq!(codec.decode(node.path(), &bytes).expect("decode"), node);
        }
    }

    #[test]
    fn binary_truncation_is_corrupt() {
        let bytes = NodeCodec::Binary.encode(&sample_node()).expect("encode");
        let err = NodeCodec::Binary
            .decode("/lustre/scratch", &bytes[..bytes.len() - 3])
            .unwrap_err();
        assert_eq!(err.code(), "TC-2002");
    }

    #[test]
    fn binary_trailing_bytes_are_corrupt() {
        let mut bytes = NodeCodec::Binary.encode(&sample_node()).expect("encode");
        bytes.push(0x00);
        let err = NodeCodec::Binary
            .decode("/lustre/scratch", &bytes)
            .unwrap_err();
        assert_eq!(err.code(), "TC-2002");
    }

    #[test]
    fn binary_bad_directory_flag_is_corrupt() {
        // No children, flag byte 2, empty mapping.
        let bytes = [0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00];
        let err = NodeCodec::Binary.decode("/root", &bytes).unwrap_err();
        assert_eq!(err.code(), "TC-2002");
    }

    #[test]
    fn json_path_mismatch_is_corrupt() {
        let bytes = NodeCodec::Json.encode(&sample_node()).expect("encode");
        let err = NodeCodec::Json.decode("/other/path", &bytes).unwrap_err();
        assert_eq!(err.code(), "TC-2002");
    }

    proptest! {
        #[test]
        fn prop_binary_roundtrip(
            children in proptest::collection::btree_set("[a-z0-9._-]{1,12}", 0..16),
            is_directory in proptest::bool::ANY,
            size in 0u128..u128::MAX,
        ) {
            let mut node = Node::new(is_directory, "/lustre/x");
            for name in &children {
                node.add_child(name.clone());
            }
            if size > 0 {
                let mut m = Mapping::new();
                m.set("size", "g", "u", "c", size);
                node.update(m);
            }
            let bytes = NodeCodec::Binary.encode(&node).expect("encode");
            prop_assert_eq!(NodeCodec::Binary.decode("/lustre/x", &bytes).expect("decode"), node);
        }
    }
}
