//! One scan-dump line: tab-separated
//! `base64(path) size uid gid atime mtime ctime type [ino nlink dev]`.

#![allow(missing_docs)]

use std::fmt::Display;
use std::str::FromStr;

use data_encoding::BASE64;

use crate::core::errors::{Result, TcError};

/// Inode type marker from the scan dump's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Directory,
    File,
    Link,
    /// Any other single-character marker (sockets, fifos, devices...).
    Other(char),
}

impl FileType {
    fn from_token(token: &str) -> Result<Self> {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some('d'), None) => Ok(Self::Directory),
            (Some('f'), None) => Ok(Self::File),
            (Some('l'), None) => Ok(Self::Link),
            (Some(c), None) => Ok(Self::Other(c)),
            _ => Err(malformed(format!("bad type field {token:?}"))),
        }
    }

    #[must_use]
    pub fn is_directory(self) -> bool {
        self == Self::Directory
    }

    /// Reporting category for this type.
    #[must_use]
    pub fn category(self) -> String {
        match self {
            Self::Directory => "directory".to_string(),
            Self::File => "file".to_string(),
            Self::Link => "link".to_string(),
            Self::Other(c) => format!("type_{c}"),
        }
    }
}

/// One parsed scan record. Timestamps are seconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub path: String,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub file_type: FileType,
}

impl ScanRecord {
    /// Parse one dump line. Any defect is a `MalformedRecord` the caller
    /// can skip and count without aborting the build.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
        if fields.len() < 8 {
            return Err(malformed(format!(
                "expected at least 8 tab-separated fields, got {}",
                fields.len()
            )));
        }

        let raw = BASE64
            .decode(fields[0].as_bytes())
            .map_err(|e| malformed(format!("path is not valid base64: {e}")))?;
        let path = String::from_utf8(raw)
            .map_err(|e| malformed(format!("decoded path is not UTF-8: {e}")))?;
        let path = path.trim_end_matches('/');
        if !path.starts_with('/') || path == "/" {
            return Err(malformed(format!(
                "path must be absolute and below the root, got {path:?}"
            )));
        }

        Ok(Self {
            path: path.to_string(),
            size: number(fields[1], "size")?,
            uid: number(fields[2], "uid")?,
            gid: number(fields[3], "gid")?,
            atime: number(fields[4], "atime")?,
            mtime: number(fields[5], "mtime")?,
            ctime: number(fields[6], "ctime")?,
            file_type: FileType::from_token(fields[7])?,
        })
    }
}

fn number<T>(field: &str, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    field
        .parse()
        .map_err(|e| malformed(format!("bad {name} field {field:?}: {e}")))
}

fn malformed(details: String) -> TcError {
    TcError::MalformedRecord { details }
}
