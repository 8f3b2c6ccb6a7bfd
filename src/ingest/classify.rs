//! Path-to-category classification: regex classes over file names, a
//! fallback class, the `*` wildcard, and the inode-type class.

use regex::Regex;

use crate::core::errors::{Result, TcError};
use crate::ingest::record::FileType;

/// Name → pattern pairs for the extension classes. A path can land in
/// several classes at once (`foo.tmp.gz` is both temporary and
/// compressed).
const PATTERN_SOURCES: [(&str, &str); 7] = [
    ("cram", r"(?i)\.cram$"),
    ("bam", r"(?i)\.bam$"),
    ("index", r"(?i)\.(crai|bai|sai|fai|csi)$"),
    ("compressed", r"(?i)\.(bzip2|gz|tgz|zip|xz|bgz|bcf)$"),
    (
        "uncompressed",
        r"(?i)(\.sam|\.fasta|\.fastq|\.fa|\.fq|\.vcf|\.csv|\.tsv|\.txt|\.text|readme|\.o|\.e|\.oe|\.dat)$",
    ),
    ("checkpoint", r"(?i)jobstate\.context$"),
    ("temporary", r"(?i)(tmp|temp)"),
];

/// Compiled category patterns.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    patterns: Vec<(&'static str, Regex)>,
}

impl CategoryRegistry {
    /// Compile the built-in pattern set.
    pub fn new() -> Result<Self> {
        let mut patterns = Vec::with_capacity(PATTERN_SOURCES.len());
        for (name, source) in PATTERN_SOURCES {
            let regex = Regex::new(source).map_err(|e| TcError::InvalidConfig {
                details: format!("category pattern {name}: {e}"),
            })?;
            patterns.push((name, regex));
        }
        Ok(Self { patterns })
    }

    /// Every category this record accumulates under: matching extension
    /// classes (or `other` when none match), the `*` wildcard, and the
    /// inode-type class.
    #[must_use]
    pub fn categories(&self, path: &str, file_type: FileType) -> Vec<String> {
        let mut out: Vec<String> = self
            .patterns
            .iter()
            .filter(|(_, regex)| regex.is_match(path))
            .map(|(name, _)| (*name).to_string())
            .collect();
        if out.is_empty() {
            out.push("other".to_string());
        }
        out.push("*".to_string());
        out.push(file_type.category());
        out
    }
}
