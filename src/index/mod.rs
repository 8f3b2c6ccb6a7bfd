//! Aggregation-tree data model: Mapping accumulator, Node vertex, and the
//! interchangeable node encodings.

pub mod codec;
pub mod mapping;
pub mod node;
pub(crate) mod wire;
