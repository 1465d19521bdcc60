//! Log line types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// LogSource
// ============================================================================

/// Which producer a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    /// Child standard output
    Stdout,
    /// Child standard error
    Stderr,
    /// Lines synthesized by the engine (launch, exit, watcher notices)
    System,
    /// Lines tailed from an on-disk log file
    File,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Stdout => "stdout",
            LogSource::Stderr => "stderr",
            LogSource::System => "system",
            LogSource::File => "file",
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LogLevel
// ============================================================================

/// Severity parsed from the line text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    /// Maps the spellings agents commonly print (`WARN`, `FATAL`, ...).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            "critical" | "fatal" => Some(LogLevel::Critical),
            _ => None,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::from_label(s)
            .ok_or_else(|| crate::Error::InvalidInput(format!("unknown log level '{}'", s)))
    }
}

// ============================================================================
// LogLine
// ============================================================================

/// One buffered line of a project's log stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    /// Per-project append sequence, strictly increasing, never reused
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub source: LogSource,
    pub level: LogLevel,
    pub text: String,
}

impl LogLine {
    /// Rendering used by text exports and the plain-text log endpoint.
    pub fn format_plain(&self) -> String {
        match self.source {
            LogSource::Stderr => format!("[stderr] {}", self.text),
            _ => self.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_labels() {
        assert_eq!(LogLevel::from_label("WARN"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::from_label("fatal"), Some(LogLevel::Critical));
        assert_eq!(LogLevel::from_label("trace"), None);
        assert_eq!("Error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_line_serialization() {
        let line = LogLine {
            seq: 7,
            timestamp: Utc::now(),
            source: LogSource::Stderr,
            level: LogLevel::Warning,
            text: "disk almost full".into(),
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["source"], "stderr");
        assert_eq!(json["level"], "warning");
        assert_eq!(line.format_plain(), "[stderr] disk almost full");
    }
}
