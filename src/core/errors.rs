//! TC-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TcError>;

/// Top-level error type for treecost.
#[derive(Debug, Error)]
pub enum TcError {
    #[error("[TC-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[TC-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[TC-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[TC-2001] node not found: {path}")]
    NotFound { path: String },

    #[error("[TC-2002] corrupt data in {context}: {details}")]
    CorruptData {
        context: &'static str,
        details: String,
    },

    #[error("[TC-2003] storage exhausted: {details}")]
    StorageExhausted { details: String },

    #[error("[TC-2101] storage backend failure: {details}")]
    Storage { details: String },

    #[error("[TC-2102] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[TC-3001] invalid tree state: {details}")]
    InvalidState { details: String },

    #[error("[TC-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TC-3101] malformed scan record: {details}")]
    MalformedRecord { details: String },
}

impl TcError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "TC-1001",
            Self::MissingConfig { .. } => "TC-1002",
            Self::ConfigParse { .. } => "TC-1003",
            Self::NotFound { .. } => "TC-2001",
            Self::CorruptData { .. } => "TC-2002",
            Self::StorageExhausted { .. } => "TC-2003",
            Self::Storage { .. } => "TC-2101",
            Self::Serialization { .. } => "TC-2102",
            Self::InvalidState { .. } => "TC-3001",
            Self::Io { .. } => "TC-3002",
            Self::MalformedRecord { .. } => "TC-3101",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// Corruption, exhausted storage, and state-machine misuse are final;
    /// plain IO and backend hiccups may clear up.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Storage { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<redb::Error> for TcError {
    fn from(value: redb::Error) -> Self {
        if let redb::Error::Io(source) = &value {
            if matches!(
                source.kind(),
                std::io::ErrorKind::StorageFull | std::io::ErrorKind::QuotaExceeded
            ) {
                return Self::StorageExhausted {
                    details: source.to_string(),
                };
            }
        }
        Self::Storage {
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for TcError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for TcError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
