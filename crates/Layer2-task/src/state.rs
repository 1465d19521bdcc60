//! Project state machine

use serde::{Deserialize, Serialize};

/// Lifecycle state of a supervised project
///
/// ```text
/// idle ──launch──► running ──pause──► paused
///                   │  ▲                │
///                   │  └────resume──────┤
///                   ▼                   ▼
///        completed | error | stopped ◄──┘ (stop / exit)
/// ```
///
/// Terminal states only lead back to `running` through a fresh launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectState {
    /// Never launched in this engine
    Idle,

    /// Process alive and scheduled
    Running,

    /// Process alive but suspended
    Paused,

    /// Process exited with code 0
    Completed,

    /// Process exited non-zero, was killed, or failed to spawn
    Error,

    /// Process terminated on request
    Stopped,
}

impl ProjectState {
    /// A live handle owns an OS process.
    pub fn is_live(&self) -> bool {
        matches!(self, ProjectState::Running | ProjectState::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProjectState::Completed | ProjectState::Error | ProjectState::Stopped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectState::Idle => "idle",
            ProjectState::Running => "running",
            ProjectState::Paused => "paused",
            ProjectState::Completed => "completed",
            ProjectState::Error => "error",
            ProjectState::Stopped => "stopped",
        }
    }
}

impl Default for ProjectState {
    fn default() -> Self {
        ProjectState::Idle
    }
}

impl std::fmt::Display for ProjectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
