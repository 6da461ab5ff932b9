use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

const ERROR_MARKER: &str = "[ERROR]";
const WARNING_MARKER: &str = "[WARNING]";

/// Reasons a line is rejected. Callers drop the line and continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedLine {
    #[error("line is blank")]
    Blank,

    #[error("line contains undecodable bytes")]
    InvalidEncoding,

    #[error("leading timestamp '{0}' does not fit in 64 bits")]
    TimestampOverflow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        f.pad(label)
    }
}

/// One classified log line. Never mutated after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub content: String,
    pub timestamp: i64,
    pub severity: Severity,
    /// SHA-256 of `content`, hex encoded. Identity for display only.
    pub fingerprint: String,
}

/// Turns raw lines into [`LogRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineClassifier;

impl LineClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a single line (without its trailing newline).
    ///
    /// `now_millis` is used as the timestamp when the line carries no leading
    /// numeric timestamp. Replayed lines therefore get the classification time,
    /// not their original event time.
    pub fn classify(&self, line: &str, now_millis: i64) -> Result<LogRecord, MalformedLine> {
        if line.trim().is_empty() {
            return Err(MalformedLine::Blank);
        }

        if line.contains(char::REPLACEMENT_CHARACTER) {
            return Err(MalformedLine::InvalidEncoding);
        }

        let timestamp = match leading_digits(line) {
            Some(digits) => digits
                .parse::<i64>()
                .map_err(|_| MalformedLine::TimestampOverflow(digits.to_string()))?,
            None => now_millis,
        };

        Ok(LogRecord {
            content: line.to_string(),
            timestamp,
            severity: severity_of(line),
            fingerprint: fingerprint(line),
        })
    }
}

/// `[ERROR]` wins over `[WARNING]` regardless of position in the line.
pub fn severity_of(line: &str) -> Severity {
    if line.contains(ERROR_MARKER) {
        Severity::Error
    } else if line.contains(WARNING_MARKER) {
        Severity::Warning
    } else {
        Severity::Info
    }
}

pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn leading_digits(line: &str) -> Option<&str> {
    let end = line
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(line.len());

    if end == 0 {
        None
    } else {
        Some(&line[..end])
    }
}
