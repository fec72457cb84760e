use chrono::{DateTime, Utc};

/// Severity inferred from the text of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Classifies a message by case-insensitive substring: `error` wins over `warn`.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("error") {
            Severity::Error
        } else if lower.contains("warn") {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// Output stream a log line was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdin,
    Stdout,
    Stderr,
    /// Unframed output (TTY containers) does not say which stream it came from.
    Unknown,
}

impl LogStream {
    pub(super) fn from_header_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(LogStream::Stdin),
            1 => Some(LogStream::Stdout),
            2 => Some(LogStream::Stderr),
            _ => None,
        }
    }

    pub(super) fn header_byte(self) -> u8 {
        match self {
            LogStream::Stdin => 0,
            LogStream::Stdout | LogStream::Unknown => 1,
            LogStream::Stderr => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LogRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub message: String,
    pub severity: Severity,
    pub stream: LogStream,
}

impl LogRecord {
    /// Builds a record from one line of engine output.
    ///
    /// A leading RFC 3339 timestamp (as added by `timestamps=1`) is split off.
    /// Returns `None` for lines without any non-whitespace message.
    pub fn from_line(line: &str, stream: LogStream) -> Option<Self> {
        let (timestamp, message) = split_timestamp(line);
        let message = message.trim_end();
        if message.trim().is_empty() {
            return None;
        }
        Some(Self {
            timestamp,
            message: message.to_owned(),
            severity: Severity::classify(message),
            stream,
        })
    }
}

/// Splits the engine's timestamp prefix from a line.
///
/// Lines whose first token is not a timestamp are returned whole.
pub(super) fn split_timestamp(line: &str) -> (Option<DateTime<Utc>>, &str) {
    if let Some((prefix, rest)) = line.split_once(' ') {
        if let Ok(timestamp) = DateTime::parse_from_rfc3339(prefix) {
            return (Some(timestamp.with_timezone(&Utc)), rest);
        }
    }
    (None, line)
}
