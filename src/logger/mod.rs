//! Build-event logging.

pub mod jsonl;

pub use jsonl::{BuildLogger, EventType, LogEntry};
