//! Sparse multi-dimensional metric accumulator.
//!
//! A `Mapping` accumulates numeric values keyed by
//! `(metric, group, user, category)`. Insertion fans each write out to the
//! wildcard key variants so "all users", "all groups", and "everyone"
//! totals are queryable without a scan. Absent keys read as zero and zeros
//! are never stored explicitly.
//!
//! Values are `u128`: cost metrics are size×seconds products accumulated
//! over hundreds of millions of inodes, which overflows u64 in realistic
//! deployments. The binary encoding fixes this width (two big-endian u64
//! halves per value).

#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value as JsonValue};

use crate::core::errors::{Result, TcError};
use crate::index::wire::{Reader, put_str};

/// Accumulator value type, fixed for this deployment.
pub type Value = u128;

/// Metrics whose raw accumulators are size×seconds products, rescaled to a
/// cost figure at format time.
const TIME_METRICS: [&str; 3] = ["atime", "mtime", "ctime"];

const WILDCARD: &str = "*";

const WIRE_CONTEXT: &str = "mapping";

/// One fully-qualified accumulator key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub metric: String,
    pub group: String,
    pub user: String,
    pub category: String,
}

impl Key {
    pub fn new(metric: &str, group: &str, user: &str, category: &str) -> Self {
        Self {
            metric: metric.to_string(),
            group: group.to_string(),
            user: user.to_string(),
            category: category.to_string(),
        }
    }
}

/// Runtime-configurable scaling for time metrics.
///
/// Raw accumulators store unscaled size×seconds products, so the rate can
/// change between queries without re-ingesting data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostRate {
    cost_per_tib_year: f64,
}

impl CostRate {
    const ONE_TIB: f64 = (1u64 << 40) as f64;
    const SECONDS_PER_YEAR: f64 = 60.0 * 60.0 * 24.0 * 365.0;

    #[must_use]
    pub const fn new(cost_per_tib_year: f64) -> Self {
        Self { cost_per_tib_year }
    }

    /// Cost per byte per second, applied to raw size×seconds accumulators.
    #[must_use]
    pub fn per_byte_second(self) -> f64 {
        self.cost_per_tib_year / (Self::ONE_TIB * Self::SECONDS_PER_YEAR)
    }
}

impl Default for CostRate {
    fn default() -> Self {
        Self::new(150.0)
    }
}

/// Sparse accumulator keyed by `(metric, group, user, category)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    entries: BTreeMap<Key, Value>,
}

impl Mapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Read a single key; absence means zero.
    #[must_use]
    pub fn get(&self, metric: &str, group: &str, user: &str, category: &str) -> Value {
        self.entries
            .get(&Key::new(metric, group, user, category))
            .copied()
            .unwrap_or(0)
    }

    /// Assign `value` to the key and its three wildcard fan-out variants.
    pub fn set(&mut self, metric: &str, group: &str, user: &str, category: &str, value: Value) {
        self.fan_out(metric, group, user, category, value, |slot, v| *slot = v);
    }

    /// Add `value` into the key and its three wildcard fan-out variants.
    pub fn combine(&mut self, metric: &str, group: &str, user: &str, category: &str, value: Value) {
        self.fan_out(metric, group, user, category, value, |slot, v| *slot += v);
    }

    fn fan_out(
        &mut self,
        metric: &str,
        group: &str,
        user: &str,
        category: &str,
        value: Value,
        apply: impl Fn(&mut Value, Value),
    ) {
        // A literal "*" group or user collapses variants onto the same
        // key; each distinct key is applied exactly once.
        let variants = [
            (WILDCARD, WILDCARD),
            (WILDCARD, user),
            (group, WILDCARD),
            (group, user),
        ];
        for (i, &(g, u)) in variants.iter().enumerate() {
            if variants[..i].contains(&(g, u)) {
                continue;
            }
            let slot = self
                .entries
                .entry(Key::new(metric, g, u, category))
                .or_insert(0);
            apply(slot, value);
            if *slot == 0 {
                self.entries.remove(&Key::new(metric, g, u, category));
            }
        }
    }

    /// Add every key of `other` into self. When self is empty this is a
    /// plain move.
    pub fn update(&mut self, other: Self) {
        if self.entries.is_empty() {
            self.entries = other.entries;
            return;
        }
        for (key, value) in other.entries {
            *self.entries.entry(key).or_insert(0) += value;
        }
    }

    /// Subtract every shared key of `other` from self; keys reaching exactly
    /// zero are removed so sparsity is preserved.
    pub fn subtract(&mut self, other: &Self) {
        for (key, value) in &other.entries {
            if let Some(slot) = self.entries.get_mut(key) {
                *slot = slot.saturating_sub(*value);
                if *slot == 0 {
                    self.entries.remove(key);
                }
            }
        }
    }

    /// Format for query output as nested
    /// `metric → group → user → category → value-string` JSON.
    ///
    /// Time metrics are rescaled by `rate`; all other metrics pass through
    /// unscaled. When a whitelist is supplied, only those categories are
    /// emitted. Values are strings: u128 does not fit in a JSON number.
    #[must_use]
    pub fn format(&self, whitelist: Option<&BTreeSet<String>>, rate: CostRate) -> JsonValue {
        let rendered = self.entries.iter().filter_map(|(key, value)| {
            if let Some(allowed) = whitelist {
                if !allowed.contains(&key.category) {
                    return None;
                }
            }
            let text = if TIME_METRICS.contains(&key.metric.as_str()) {
                #[allow(clippy::cast_precision_loss)]
                let scaled = *value as f64 * rate.per_byte_second();
                format!("{scaled:.3}")
            } else {
                value.to_string()
            };
            Some((key, text))
        });
        nest(rendered)
    }

    /// Binary encoding: big-endian `key_count: u32`, then per entry four
    /// `{len: u16, bytes}` key parts followed by the value as two big-endian
    /// u64 halves (high, then low).
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let count = u32::try_from(self.entries.len()).map_err(|_| TcError::Serialization {
            context: WIRE_CONTEXT,
            details: format!("{} keys exceed u32 count prefix", self.entries.len()),
        })?;
        let mut buf = Vec::with_capacity(4 + self.entries.len() * 48);
        buf.extend_from_slice(&count.to_be_bytes());
        for (key, value) in &self.entries {
            put_str(&mut buf, &key.metric, WIRE_CONTEXT)?;
            put_str(&mut buf, &key.group, WIRE_CONTEXT)?;
            put_str(&mut buf, &key.user, WIRE_CONTEXT)?;
            put_str(&mut buf, &key.category, WIRE_CONTEXT)?;
            #[allow(clippy::cast_possible_truncation)]
            {
                buf.extend_from_slice(&((value >> 64) as u64).to_be_bytes());
                buf.extend_from_slice(&(*value as u64).to_be_bytes());
            }
        }
        Ok(buf)
    }

    /// Inverse of [`Mapping::serialize`]; the payload must be consumed
    /// exactly.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, WIRE_CONTEXT);
        let mapping = Self::read_from(&mut reader)?;
        reader.expect_end()?;
        Ok(mapping)
    }

    /// Read a Mapping from a shared cursor (the node binary encoding embeds
    /// one after its own fields).
    pub(crate) fn read_from(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u32()?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let metric = reader.read_str()?;
            let group = reader.read_str()?;
            let user = reader.read_str()?;
            let category = reader.read_str()?;
            let high = reader.read_u64()?;
            let low = reader.read_u64()?;
            let value = (Value::from(high) << 64) | Value::from(low);
            entries.insert(Key::new(&metric, &group, &user, &category), value);
        }
        Ok(Self { entries })
    }

    /// Self-describing JSON wire form (raw unscaled values as decimal
    /// strings), used by the JSON node codec.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        nest(self.entries.iter().map(|(key, value)| (key, value.to_string())))
    }

    /// Inverse of [`Mapping::to_json`].
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let mut mapping = Self::new();
        let metrics = value.as_object().ok_or_else(|| corrupt("not an object"))?;
        for (metric, groups) in metrics {
            let groups = groups.as_object().ok_or_else(|| corrupt("group level"))?;
            for (group, users) in groups {
                let users = users.as_object().ok_or_else(|| corrupt("user level"))?;
                for (user, categories) in users {
                    let categories = categories
                        .as_object()
                        .ok_or_else(|| corrupt("category level"))?;
                    for (category, raw) in categories {
                        let parsed = parse_json_value(raw)?;
                        if parsed != 0 {
                            mapping
                                .entries
                                .insert(Key::new(metric, group, user, category), parsed);
                        }
                    }
                }
            }
        }
        Ok(mapping)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter()
    }
}

type NestedEntries = BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>>;

/// Build the nested `metric → group → user → category → value` JSON form.
fn nest<'a>(entries: impl Iterator<Item = (&'a Key, String)>) -> JsonValue {
    let mut nested = NestedEntries::new();
    for (key, text) in entries {
        nested
            .entry(key.metric.clone())
            .or_default()
            .entry(key.group.clone())
            .or_default()
            .entry(key.user.clone())
            .or_default()
            .insert(key.category.clone(), text);
    }
    let mut metrics = Map::new();
    for (metric, groups) in nested {
        let mut group_obj = Map::new();
        for (group, users) in groups {
            let mut user_obj = Map::new();
            for (user, categories) in users {
                let cat_obj: Map<String, JsonValue> = categories
                    .into_iter()
                    .map(|(category, text)| (category, JsonValue::String(text)))
                    .collect();
                user_obj.insert(user, JsonValue::Object(cat_obj));
            }
            group_obj.insert(group, JsonValue::Object(user_obj));
        }
        metrics.insert(metric, JsonValue::Object(group_obj));
    }
    JsonValue::Object(metrics)
}

fn parse_json_value(raw: &JsonValue) -> Result<Value> {
    match raw {
        JsonValue::String(s) => s
            .parse::<Value>()
            .map_err(|e| corrupt(&format!("bad value {s:?}: {e}"))),
        JsonValue::Number(n) => n
            .as_u64()
            .map(Value::from)
            .ok_or_else(|| corrupt(&format!("bad numeric value {n}"))),
        other => Err(corrupt(&format!("unexpected value {other}"))),
    }
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

    fn whitelist(categories: &[&str]) -> BTreeSet<String> {
        categories.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn set_fans_out_to_four_variants() {
        let mut m = Mapping::new();
        m.set("size", "hgi", "ah12", "bam", 100);
        assert_eq!(m.get("size", "hgi", "ah12", "bam"), 100);
        assert_eq!(m.get("size", "*", "ah12", "bam"), 100);
        assert_eq!(m.get("size", "hgi", "*", "bam"), 100);
        assert_eq!(m.get("size", "*", "*", "bam"), 100);
        assert_eq!(m.len(), 4);
    }

    #[test]
    fn literal_wildcard_arguments_apply_once() {
        // A "*" group collapses two fan-out variants onto one key; the
        // value must land there once, not twice.
        let mut m = Mapping::new();
        m.combine("size", "*", "ah12", "bam", 5);
        assert_eq!(m.get("size", "*", "*", "bam"), 5);
        assert_eq!(m.get("size", "*", "ah12", "bam"), 5);
        assert_eq!(m.len(), 2);

        let mut m = Mapping::new();
        m.combine("size", "hgi", "*", "bam", 7);
        assert_eq!(m.get("size", "*", "*", "bam"), 7);
        assert_eq!(m.get("size", "hgi", "*", "bam"), 7);
        assert_eq!(m.len(), 2);

        let mut m = Mapping::new();
        m.combine("size", "*", "*", "bam", 3);
        assert_eq!(m.get("size", "*", "*", "bam"), 3);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn combine_accumulates_across_users() {
        let mut m = Mapping::new();
        m.combine("count", "hgi", "ah12", "*", 1);
        m.combine("count", "hgi", "bh7", "*", 1);
        assert_eq!(m.get("count", "hgi", "ah12", "*"), 1);
        assert_eq!(m.get("count", "hgi", "*", "*"), 2);
        assert_eq!(m.get("count", "*", "*", "*"), 2);
    }

    #[test]
    fn missing_key_reads_zero() {
        let m = Mapping::new();
        assert_eq!(m.get("size", "g", "u", "c"), 0);
    }

    #[test]
    fn update_into_empty_is_a_move() {
        let mut a = Mapping::new();
        let mut b = Mapping::new();
        b.set("size", "g", "u", "c", 7);
        a.update(b.clone());
        assert_eq!(a, b);
    }

    #[test]
    fn update_adds_keywise() {
        let mut a = Mapping::new();
        a.set("size", "g", "u", "c", 10);
        let mut b = Mapping::new();
        b.set("size", "g", "u", "c", 5);
        b.set("count", "g", "u", "c", 1);
        a.update(b);
        assert_eq!(a.get("size", "g", "u", "c"), 15);
        assert_eq!(a.get("count", "g", "u", "c"), 1);
    }

    #[test]
    fn subtract_restores_after_update() {
        let mut a = Mapping::new();
        a.set("size", "g", "u", "c", 10);
        a.set("count", "g", "u", "c", 2);
        let original = a.clone();

        let mut b = Mapping::new();
        b.set("size", "g", "u", "c", 4);
        a.update(b.clone());
        a.subtract(&b);
        assert_eq!(a, original);
    }

    #[test]
    fn subtract_removes_keys_reaching_zero() {
        let mut a = Mapping::new();
        a.set("size", "g", "u", "c", 10);
        let b = a.clone();
        a.subtract(&b);
        assert!(a.is_empty(), "shared keys with equal values must vanish");
    }

    #[test]
    fn no_explicit_zero_entries_survive() {
        let mut m = Mapping::new();
        m.combine("size", "g", "u", "c", 0);
        assert!(m.is_empty());
    }

    #[test]
    fn serialize_roundtrip_exact() {
        let mut m = Mapping::new();
        m.set("size", "hgi", "ah12", "bam", 1 << 70);
        m.combine("atime", "hgi", "ah12", "*", u128::from(u64::MAX) + 17);
        let bytes = m.serialize().expect("serialize");
        let back = Mapping::deserialize(&bytes).expect("deserialize");
        assert_eq!(back, m);
    }

    #[test]
    fn deserialize_truncated_is_corrupt() {
        let mut m = Mapping::new();
        m.set("size", "g", "u", "c", 1);
        let bytes = m.serialize().expect("serialize");
        let err = Mapping::deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.code(), "TC-2002");
    }

    #[test]
    fn deserialize_trailing_bytes_is_corrupt() {
        let mut bytes = Mapping::new().serialize().expect("serialize");
        bytes.push(0xff);
        assert_eq!(Mapping::deserialize(&bytes).unwrap_err().code(), "TC-2002");
    }

    #[test]
    fn format_scales_time_metrics_only() {
        let mut m = Mapping::new();
        // One TiB held for one year costs exactly cost_per_tib_year.
        let tib_year: Value = (1 << 40) * 60 * 60 * 24 * 365;
        m.set("atime", "g", "u", "c", tib_year);
        m.set("size", "g", "u", "c", 1 << 40);

        let out = m.format(None, CostRate::new(150.0));
        assert_eq!(out["atime"]["g"]["u"]["c"], "150.000");
        assert_eq!(out["size"]["g"]["u"]["c"], (1u64 << 40).to_string());
    }

    #[test]
    fn format_rate_is_reconfigurable_without_reingest() {
        let mut m = Mapping::new();
        let tib_year: Value = (1 << 40) * 60 * 60 * 24 * 365;
        m.set("mtime", "g", "u", "c", tib_year);
        assert_eq!(m.format(None, CostRate::new(150.0))["mtime"]["g"]["u"]["c"], "150.000");
        assert_eq!(m.format(None, CostRate::new(300.0))["mtime"]["g"]["u"]["c"], "300.000");
    }

    #[test]
    fn format_honors_category_whitelist() {
        let mut m = Mapping::new();
        m.set("size", "g", "u", "bam", 1);
        m.set("size", "g", "u", "cram", 2);
        let out = m.format(Some(&whitelist(&["cram"])), CostRate::default());
        let categories = out["size"]["g"]["u"].as_object().expect("object");
        assert!(categories.contains_key("cram"));
        assert!(!categories.contains_key("bam"));
    }

    #[test]
    fn json_wire_roundtrip() {
        let mut m = Mapping::new();
        m.set("size", "hgi", "ah12", "bam", u128::from(u64::MAX) + 3);
        m.set("count", "hgi", "ah12", "*", 12);
        let back = Mapping::from_json(&m.to_json()).expect("from_json");
        assert_eq!(back, m);
    }

    proptest! {
        #[test]
        fn prop_binary_roundtrip(
            entries in proptest::collection::vec(
                ("[a-z]{1,8}", "[a-z*]{1,8}", "[a-z*]{1,8}", "[a-z*]{1,8}", 1u128..u128::MAX),
                0..24,
            )
        ) {
            let mut m = Mapping::new();
            for (metric, group, user, category, value) in &entries {
                m.combine(metric, group, user, category, *value);
            }
            let bytes = m.serialize().expect("serialize");
            prop_assert_eq!(Mapping::deserialize(&bytes).expect("deserialize"), m);
        }

        #[test]
        fn prop_update_then_subtract_restores(
            base in ("[a-z]{1,4}", 1u128..1_000_000u128),
            delta in ("[a-z]{1,4}", 1u128..1_000_000u128),
        ) {
            let mut a = Mapping::new();
            a.set(&base.0, "g", "u", "c", base.1);
            let original = a.clone();
            let mut b = Mapping::new();
            b.set(&delta.0, "g", "u", "c", delta.1);
            a.update(b.clone());
            a.subtract(&b);
            prop_assert_eq!(a, original);
        }
    }
}
