//! Process handle - in-memory record of one supervised process

use crate::state::ProjectState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Options passed through to the agent command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchOptions {
    pub max_iterations: u32,
    pub headless: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            headless: false,
            model: None,
            agent: None,
        }
    }
}

/// Point-in-time view of a project's process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub project: String,
    pub state: ProjectState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl ProcessStatus {
    pub fn idle(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            state: ProjectState::Idle,
            pid: None,
            started_at: None,
            exit_code: None,
            last_error: None,
            command: None,
        }
    }
}

/// One launch of a project. Replaced wholesale by the next launch.
#[derive(Debug)]
pub struct ProcessHandle {
    pub project: String,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub options: LaunchOptions,
    /// Resolved command line, shell-quoted
    pub command: String,
    pub state: ProjectState,
    pub exit_code: Option<i32>,
    pub last_error: Option<String>,
    /// Set by `stop` so the exit waiter records `stopped`
    pub(crate) stop_requested: bool,
    /// Asks the exit waiter to force-kill the child
    pub(crate) kill_tx: Option<watch::Sender<bool>>,
    /// Flips to `true` once the exit waiter has recorded the exit
    pub(crate) exit_rx: Option<watch::Receiver<bool>>,
}

impl ProcessHandle {
    pub(crate) fn running(
        project: &str,
        pid: Option<u32>,
        options: LaunchOptions,
        command: String,
        kill_tx: watch::Sender<bool>,
        exit_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            project: project.to_string(),
            pid,
            started_at: Utc::now(),
            options,
            command,
            state: ProjectState::Running,
            exit_code: None,
            last_error: None,
            stop_requested: false,
            kill_tx: Some(kill_tx),
            exit_rx: Some(exit_rx),
        }
    }

    /// A launch that never produced a process.
    pub(crate) fn failed(
        project: &str,
        options: LaunchOptions,
        command: String,
        error: String,
    ) -> Self {
        Self {
            project: project.to_string(),
            pid: None,
            started_at: Utc::now(),
            options,
            command,
            state: ProjectState::Error,
            exit_code: None,
            last_error: Some(error),
            stop_requested: false,
            kill_tx: None,
            exit_rx: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    pub(crate) fn request_kill(&self) {
        if let Some(tx) = &self.kill_tx {
            let _ = tx.send(true);
        }
    }

    pub fn status(&self) -> ProcessStatus {
        ProcessStatus {
            project: self.project.clone(),
            state: self.state,
            pid: self.pid,
            started_at: Some(self.started_at),
            exit_code: self.exit_code,
            last_error: self.last_error.clone(),
            command: Some(self.command.clone()),
        }
    }
}
