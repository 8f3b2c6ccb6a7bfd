//! JSONL build-event logger: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object, assembled in memory and
//! written with a single `write_all` so a tailing process never sees a
//! partial line. Fallback chain: primary file → stderr with a
//! `[TREECOST]` prefix → silent discard. A build must never fail because
//! its progress log did.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Build lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    BuildStarted,
    Progress,
    RecordSkipped,
    FinalizeStarted,
    FinalizeCompleted,
    StoreClosed,
    Error,
}

/// One JSONL entry — `ts` and `event` always present, the rest optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    /// Input lines consumed so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<u64>,
    /// Records accepted so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<u64>,
    /// Records skipped as malformed so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u64>,
    /// Nodes created so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u64>,
    /// Affected path, when one applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Error code, for `record_skipped` and `error` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create an entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            lines: None,
            records: None,
            skipped: None,
            nodes: None,
            path: None,
            error_code: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Disabled,
}

/// Append-only JSONL writer with a stderr fallback. Logging never fails.
pub struct BuildLogger {
    writer: Option<BufWriter<File>>,
    state: WriterState,
}

impl BuildLogger {
    /// Open `path` for appending; on failure, degrade to stderr.
    pub fn open(path: &Path) -> Self {
        match open_append(path) {
            Ok(file) => Self {
                writer: Some(BufWriter::new(file)),
                state: WriterState::Normal,
            },
            Err(e) => {
                let _ = writeln!(
                    io::stderr(),
                    "[TREECOST] cannot open log file {}: {e}, using stderr",
                    path.display()
                );
                Self::stderr()
            }
        }
    }

    /// Log straight to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: None,
            state: WriterState::Stderr,
        }
    }

    /// Discard everything (tests, library embedding).
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            writer: None,
            state: WriterState::Disabled,
        }
    }

    /// Write one entry as one line. Degrades to stderr on write failure.
    pub fn log(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[TREECOST] serialize error: {e}");
                return;
            }
        };
        match self.state {
            WriterState::Normal => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_ok() {
                        return;
                    }
                }
                self.writer = None;
                self.state = WriterState::Stderr;
                let _ = write!(io::stderr(), "[TREECOST] {line}");
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[TREECOST] {line}");
            }
            WriterState::Disabled => {}
        }
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state, for diagnostics.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Disabled => "disabled",
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_land_as_one_json_line_each() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("build.jsonl");
        let mut logger = BuildLogger::open(&path);

        let mut entry = LogEntry::new(EventType::Progress);
        entry.lines = Some(100_000);
        entry.nodes = Some(42);
        logger.log(&entry);
        logger.log(&LogEntry::new(EventType::FinalizeStarted));
        logger.flush();

        let contents = fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(parsed["event"], "progress");
        assert_eq!(parsed["lines"], 100_000);
        // None-valued fields never appear.
        assert!(!lines[0].contains("\"skipped\""));
    }

    #[test]
    fn unwritable_path_degrades_to_stderr() {
        let logger = BuildLogger::open(Path::new("/proc/no_such_dir_treecost/x.jsonl"));
        assert_eq!(logger.state(), "stderr");
    }

    #[test]
    fn disabled_logger_drops_silently() {
        let mut logger = BuildLogger::disabled();
        logger.log(&LogEntry::new(EventType::Error));
        assert_eq!(logger.state(), "disabled");
    }
}
