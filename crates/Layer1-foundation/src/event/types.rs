//! Broadcast types - channels, hub items and wire messages

use crate::core::LogLine;
use crate::metrics::{MetricsSample, SystemMetrics};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Channel
// ============================================================================

const LOGS_PREFIX: &str = "logs:";

/// Logical broadcast topic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Host metrics, backed by the metrics ring
    Metrics,
    /// One project's log stream, backed by its log buffer
    Logs(String),
}

/// Channel family, used to pick backlog source and overflow policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Metrics,
    Logs,
}

impl Channel {
    pub fn logs(project: impl Into<String>) -> Self {
        Channel::Logs(project.into())
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::Metrics => ChannelKind::Metrics,
            Channel::Logs(_) => ChannelKind::Logs,
        }
    }

    pub fn project(&self) -> Option<&str> {
        match self {
            Channel::Metrics => None,
            Channel::Logs(project) => Some(project),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Metrics => f.write_str("metrics"),
            Channel::Logs(project) => write!(f, "{}{}", LOGS_PREFIX, project),
        }
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "metrics" {
            return Ok(Channel::Metrics);
        }
        match s.strip_prefix(LOGS_PREFIX) {
            Some(project) if !project.is_empty() => Ok(Channel::Logs(project.to_string())),
            _ => Err(Error::InvalidChannel(s.to_string())),
        }
    }
}

// ============================================================================
// Notice
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// The supervised process exited (any reason)
    ProcessExited,
    /// A watched log file disappeared; the watcher keeps retrying
    WatcherLostFile,
    /// The session fell behind and was dropped; reattach after the backoff
    Overloaded,
}

/// Out-of-band event on a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl Notice {
    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            project: None,
            message: message.into(),
            state: None,
            exit_code: None,
            path: None,
            retry_after_ms: None,
        }
    }

    pub fn process_exited(project: &str, state: &str, exit_code: Option<i32>) -> Self {
        let message = match exit_code {
            Some(code) => format!("Process exited with code {}", code),
            None => "Process terminated by signal".to_string(),
        };
        Self {
            project: Some(project.to_string()),
            state: Some(state.to_string()),
            exit_code,
            ..Self::new(NoticeKind::ProcessExited, message)
        }
    }

    pub fn watcher_lost_file(project: &str, path: &str) -> Self {
        Self {
            project: Some(project.to_string()),
            path: Some(path.to_string()),
            ..Self::new(
                NoticeKind::WatcherLostFile,
                format!("Log file disappeared: {}", path),
            )
        }
    }

    pub fn overloaded(channel: &Channel, retry_after_ms: u64) -> Self {
        Self {
            project: channel.project().map(str::to_string),
            retry_after_ms: Some(retry_after_ms),
            ..Self::new(
                NoticeKind::Overloaded,
                format!("Subscriber on '{}' fell behind and was dropped", channel),
            )
        }
    }
}

// ============================================================================
// HubItem
// ============================================================================

/// What producers publish
#[derive(Debug, Clone, PartialEq)]
pub enum HubItem {
    Line(LogLine),
    Metrics(MetricsSample),
    Notice(Notice),
}

impl HubItem {
    /// Ordering key used to drop live items already covered by the backlog.
    /// Notices carry none and are never deduplicated.
    pub fn seq(&self) -> Option<u64> {
        match self {
            HubItem::Line(line) => Some(line.seq),
            HubItem::Metrics(sample) => Some(sample.seq),
            HubItem::Notice(_) => None,
        }
    }
}

// ============================================================================
// StreamMessage
// ============================================================================

/// Frame delivered to a subscriber, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Backlog replay for a log channel, always the first frame
    LogHistory { project: String, lines: Vec<LogLine> },
    /// Live batch of lines appended since the previous delivery tick
    Log { project: String, lines: Vec<LogLine> },
    /// Backlog replay for the metrics channel, always the first frame
    MetricsHistory { samples: Vec<SystemMetrics> },
    /// One live sample
    Metrics { data: SystemMetrics },
    Notice(Notice),
    /// Reply to a client keepalive
    Pong,
}

impl StreamMessage {
    pub fn is_backlog(&self) -> bool {
        matches!(
            self,
            StreamMessage::LogHistory { .. } | StreamMessage::MetricsHistory { .. }
        )
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_parse_and_display() {
        assert_eq!("metrics".parse::<Channel>().unwrap(), Channel::Metrics);
        let logs: Channel = "logs:demo".parse().unwrap();
        assert_eq!(logs, Channel::logs("demo"));
        assert_eq!(logs.to_string(), "logs:demo");
        assert_eq!(logs.project(), Some("demo"));
        assert!("logs:".parse::<Channel>().is_err());
        assert!("events".parse::<Channel>().is_err());
    }

    #[test]
    fn test_message_tags() {
        let pong = serde_json::to_value(StreamMessage::Pong).unwrap();
        assert_eq!(pong, serde_json::json!({ "type": "pong" }));

        let notice = StreamMessage::Notice(Notice::process_exited("demo", "completed", Some(0)));
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["type"], "notice");
        assert_eq!(json["kind"], "process_exited");
        assert_eq!(json["exit_code"], 0);
        assert!(json.get("retry_after_ms").is_none());

        let overloaded = Notice::overloaded(&Channel::Metrics, 2000);
        assert_eq!(overloaded.retry_after_ms, Some(2000));
        assert!(overloaded.project.is_none());
    }
}
