//! Configuration system: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TcError};
use crate::index::codec::NodeCodec;

/// Full treecost configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub cost: CostConfig,
    pub ingest: IngestConfig,
}

/// Disk store tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Node encoding used by the disk backend.
    pub codec: NodeCodec,
    /// Write-back cache capacity in nodes (0 disables the cache).
    pub write_cache_nodes: usize,
    /// Read cache capacity in nodes (0 disables the cache).
    pub read_cache_nodes: usize,
    /// Operations flushed into one write transaction before commit.
    ///
    /// Too large risks the backend's transaction-size limits, too small
    /// thrashes commit overhead.
    pub txn_batch_ops: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            codec: NodeCodec::Binary,
            write_cache_nodes: 4096,
            read_cache_nodes: 4096,
            txn_batch_ops: 10_000,
        }
    }
}

/// Cost model applied at format time.
///
/// Raw accumulators store unscaled size×seconds products, so this can change
/// between queries without re-ingesting data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CostConfig {
    /// Cost to store 1 TiB for 1 year.
    pub cost_per_tib_year: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            cost_per_tib_year: 150.0,
        }
    }
}

/// Ingestion pipeline knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestConfig {
    /// Emit a progress log event every N input lines (0 disables).
    pub progress_interval_lines: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            progress_interval_lines: 100_000,
        }
    }
}

impl Config {
    /// Load configuration from an explicit TOML file, or defaults when
    /// `path` is `None`. Env overrides are applied either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(TcError::MissingConfig {
                        path: p.to_path_buf(),
                    });
                }
                let raw = fs::read_to_string(p).map_err(|e| TcError::io(p, e))?;
                toml::from_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `TREECOST_*` environment overrides for the store knobs.
    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_usize("TREECOST_WRITE_CACHE_NODES") {
            self.store.write_cache_nodes = v;
        }
        if let Some(v) = env_usize("TREECOST_READ_CACHE_NODES") {
            self.store.read_cache_nodes = v;
        }
        if let Some(v) = env_usize("TREECOST_TXN_BATCH_OPS") {
            self.store.txn_batch_ops = v;
        }
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.store.txn_batch_ops == 0 {
            return Err(TcError::InvalidConfig {
                details: "store.txn_batch_ops must be at least 1".to_string(),
            });
        }
        if !self.cost.cost_per_tib_year.is_finite() || self.cost.cost_per_tib_year < 0.0 {
            return Err(TcError::InvalidConfig {
                details: format!(
                    "cost.cost_per_tib_year must be a non-negative number, got {}",
                    self.cost.cost_per_tib_year
                ),
            });
        }
        Ok(())
    }
}

fn env_usize(name: &str) -> Option<usize> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.codec, NodeCodec::Binary);
        assert_eq!(config.store.txn_batch_ops, 10_000);
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let err = Config::load(Some(Path::new("/nonexistent/treecost.toml"))).unwrap_err();
        assert_eq!(err.code(), "TC-1002");
    }

    #[test]
    fn load_partial_toml_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("treecost.toml");
        let mut file = std::fs::File::create(&path).expect("create config");
        writeln!(
            file,
            "[store]\ntxn_batch_ops = 50\n\n[cost]\ncost_per_tib_year = 42.5"
        )
        .expect("write config");

        let config = Config::load(Some(&path)).expect("load should succeed");
        assert_eq!(config.store.txn_batch_ops, 50);
        assert!((config.cost.cost_per_tib_year - 42.5).abs() < f64::EPSILON);
        // Untouched sections keep defaults.
        assert_eq!(config.store.write_cache_nodes, 4096);
        assert_eq!(config.ingest.progress_interval_lines, 100_000);
    }

    #[test]
    fn zero_batch_ops_is_rejected() {
        let config = Config {
            store: StoreConfig {
                txn_batch_ops: 0,
                ..StoreConfig::default()
            },
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "TC-1001");
    }

    #[test]
    fn negative_cost_is_rejected() {
        let config = Config {
            cost: CostConfig {
                cost_per_tib_year: -1.0,
            },
            ..Config::default()
        };
        assert_eq!(config.validate().unwrap_err().code(), "TC-1001");
    }

    #[test]
    fn toml_roundtrip() {
        let config = Config::default();
        let raw = toml::to_string_pretty(&config).expect("serialize");
        let parsed: Config = toml::from_str(&raw).expect("parse");
        assert_eq!(parsed, config);
    }
}
