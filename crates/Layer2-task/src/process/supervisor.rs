//! Process supervisor - launch, pause, resume and stop per project
//!
//! Each project has a slot holding its current [`ProcessHandle`]. Control
//! operations on one project are serialized by the slot's async lock, so two
//! concurrent launches cannot both observe a non-live state. The handle
//! itself sits behind a short synchronous lock shared with the exit waiter.
//!
//! Per launch three background tasks run: one reader per output pipe and one
//! exit waiter. The waiter gives the readers `reader_drain` to reach
//! end-of-stream before recording the exit, so the `[EXIT]` line closes the
//! run unless a descendant still holds a pipe. Such readers are detached, not
//! cancelled, and keep appending until end-of-stream.

use super::handle::{LaunchOptions, ProcessHandle, ProcessStatus};
use super::signal::{ProcessSignal, SignalControl};
use crate::command::CommandBuilder;
use crate::log::{decode_line, LogBuffer, LogStore};
use crate::state::ProjectState;
use parking_lot::{Mutex, RwLock};
use ralph_foundation::{DashboardConfig, Error, LogSource, Notice, Result};
use std::collections::HashMap;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Time between SIGTERM and SIGKILL on stop
    pub stop_grace: Duration,
    /// Time to wait for the exit after SIGKILL
    pub kill_wait: Duration,
    /// Time the exit waiter gives the pipe readers after the process exits
    pub reader_drain: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(5),
            kill_wait: Duration::from_secs(2),
            reader_drain: Duration::from_secs(1),
        }
    }
}

impl From<&DashboardConfig> for SupervisorConfig {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            stop_grace: config.stop_grace(),
            kill_wait: config.kill_wait(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Slots
// ============================================================================

#[derive(Default)]
struct ProjectSlot {
    /// Serializes control operations on the project
    control: tokio::sync::Mutex<()>,
    handle: Mutex<Option<ProcessHandle>>,
}

impl ProjectSlot {
    fn status(&self, project: &str) -> ProcessStatus {
        self.handle
            .lock()
            .as_ref()
            .map(ProcessHandle::status)
            .unwrap_or_else(|| ProcessStatus::idle(project))
    }

    fn request_kill(&self) {
        if let Some(handle) = self.handle.lock().as_ref() {
            handle.request_kill();
        }
    }
}

// ============================================================================
// ProcessSupervisor
// ============================================================================

/// Owns the state machine of every project's process
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    logs: Arc<LogStore>,
    commands: Arc<dyn CommandBuilder>,
    signals: SignalControl,
    slots: RwLock<HashMap<String, Arc<ProjectSlot>>>,
}

impl ProcessSupervisor {
    pub fn new(
        config: SupervisorConfig,
        logs: Arc<LogStore>,
        commands: Arc<dyn CommandBuilder>,
    ) -> Self {
        Self {
            config,
            logs,
            commands,
            signals: SignalControl::detect(),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Override the detected signal capability.
    pub fn with_signals(mut self, signals: SignalControl) -> Self {
        self.signals = signals;
        self
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn signals(&self) -> SignalControl {
        self.signals
    }

    pub fn logs(&self) -> &Arc<LogStore> {
        &self.logs
    }

    fn slot(&self, project: &str) -> Arc<ProjectSlot> {
        if let Some(slot) = self.slots.read().get(project) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(project.to_string()).or_default())
    }

    fn existing_slot(&self, project: &str) -> Option<Arc<ProjectSlot>> {
        self.slots.read().get(project).cloned()
    }

    // ========================================================================
    // Launch
    // ========================================================================

    /// Start the agent for `project` in `workdir`.
    ///
    /// Fails with `AlreadyRunning` while a previous launch is running or
    /// paused. A command that cannot start leaves the project in `error`.
    pub async fn launch(
        &self,
        project: &str,
        workdir: &Path,
        options: LaunchOptions,
    ) -> Result<ProcessStatus> {
        let slot = self.slot(project);
        let _control = slot.control.lock().await;

        if slot.handle.lock().as_ref().map_or(false, ProcessHandle::is_live) {
            return Err(Error::AlreadyRunning(project.to_string()));
        }

        let spec = self.commands.build(project, workdir, &options)?;
        let command = spec.display();
        let buffer = self.logs.buffer(project);

        let mut cmd = spec.to_command();
        #[cfg(unix)]
        cmd.process_group(0);

        debug!("Launching {}: {}", project, command);
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = e.to_string();
                error!("Failed to launch {}: {}", project, message);
                buffer.append_system(format!(
                    "[LOG ERROR] Failed to start {}: {}",
                    command, message
                ));
                *slot.handle.lock() = Some(ProcessHandle::failed(
                    project,
                    options,
                    command,
                    message.clone(),
                ));
                return Err(Error::spawn_failed(project, message));
            }
        };

        let pid = child.id();
        buffer.append_system(match pid {
            Some(pid) => format!("[LAUNCH] {} (pid {})", command, pid),
            None => format!("[LAUNCH] {}", command),
        });

        let (kill_tx, kill_rx) = watch::channel(false);
        let (exit_tx, exit_rx) = watch::channel(false);
        let handle = ProcessHandle::running(project, pid, options, command, kill_tx, exit_rx);
        let status = handle.status();
        *slot.handle.lock() = Some(handle);

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, LogSource::Stdout, Arc::clone(&buffer)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, LogSource::Stderr, Arc::clone(&buffer)));
        }

        tokio::spawn(supervise_exit(ExitWatch {
            project: project.to_string(),
            child,
            readers,
            slot: Arc::clone(&slot),
            buffer,
            kill_rx,
            exit_tx,
            drain: self.config.reader_drain,
        }));

        info!("Launched {} (pid {:?})", project, pid);
        Ok(status)
    }

    // ========================================================================
    // Stop
    // ========================================================================

    /// Terminate the project's process: SIGTERM, then SIGKILL after the grace
    /// period. Stopping a project that already exited returns its status.
    pub async fn stop(&self, project: &str) -> Result<ProcessStatus> {
        let slot = self
            .existing_slot(project)
            .ok_or_else(|| Error::NotRunning(project.to_string()))?;
        let _control = slot.control.lock().await;

        let (pid, paused, exit_rx) = {
            let mut guard = slot.handle.lock();
            let handle = guard
                .as_mut()
                .ok_or_else(|| Error::NotRunning(project.to_string()))?;
            if !handle.is_live() {
                return Ok(handle.status());
            }
            handle.stop_requested = true;
            (
                handle.pid,
                handle.state == ProjectState::Paused,
                handle.exit_rx.clone(),
            )
        };
        let Some(mut exit_rx) = exit_rx else {
            return Ok(slot.status(project));
        };

        let buffer = self.logs.buffer(project);
        buffer.append_system("[STOP] Stopping process (SIGTERM)");

        let terminated = match pid {
            Some(pid) => match self.signals.send(pid, ProcessSignal::Terminate) {
                Ok(()) => {
                    // A stopped process only acts on SIGTERM once continued.
                    if paused {
                        let _ = self.signals.send(pid, ProcessSignal::Continue);
                    }
                    true
                }
                Err(e) => {
                    debug!("SIGTERM to {} failed: {}", project, e);
                    false
                }
            },
            None => false,
        };
        if !terminated {
            slot.request_kill();
        }

        if !wait_exited(&mut exit_rx, self.config.stop_grace).await {
            warn!(
                "{} did not exit within {:?}, sending SIGKILL",
                project, self.config.stop_grace
            );
            buffer.append_system("[STOP] Grace period expired, sending SIGKILL");
            if let Some(pid) = pid {
                if let Err(e) = self.signals.send(pid, ProcessSignal::Kill) {
                    debug!("SIGKILL to {} failed: {}", project, e);
                }
            }
            slot.request_kill();

            if !wait_exited(&mut exit_rx, self.config.kill_wait).await {
                error!("{} survived SIGKILL", project);
                return Err(Error::Internal(format!(
                    "Process of {} did not exit after SIGKILL",
                    project
                )));
            }
        }

        info!("Stopped {}", project);
        Ok(slot.status(project))
    }

    // ========================================================================
    // Pause / Resume
    // ========================================================================

    /// Suspend the process group. Valid only while running.
    pub async fn pause(&self, project: &str) -> Result<ProcessStatus> {
        let slot = self
            .existing_slot(project)
            .ok_or_else(|| Error::NotRunning(project.to_string()))?;
        let _control = slot.control.lock().await;

        let pid = Self::live_pid(&slot, project, ProjectState::Running)
            .ok_or_else(|| Error::NotRunning(project.to_string()))?;
        self.signals.send(pid, ProcessSignal::Suspend)?;

        if !Self::transition(&slot, ProjectState::Running, ProjectState::Paused) {
            return Err(Error::NotRunning(project.to_string()));
        }
        self.logs
            .buffer(project)
            .append_system("[PAUSE] Process paused (SIGSTOP)");
        info!("Paused {}", project);
        Ok(slot.status(project))
    }

    /// Continue a paused process group. Valid only while paused.
    pub async fn resume(&self, project: &str) -> Result<ProcessStatus> {
        let slot = self
            .existing_slot(project)
            .ok_or_else(|| Error::NotPaused(project.to_string()))?;
        let _control = slot.control.lock().await;

        let pid = Self::live_pid(&slot, project, ProjectState::Paused)
            .ok_or_else(|| Error::NotPaused(project.to_string()))?;
        self.signals.send(pid, ProcessSignal::Continue)?;

        if !Self::transition(&slot, ProjectState::Paused, ProjectState::Running) {
            return Err(Error::NotPaused(project.to_string()));
        }
        self.logs
            .buffer(project)
            .append_system("[RESUME] Process resumed (SIGCONT)");
        info!("Resumed {}", project);
        Ok(slot.status(project))
    }

    fn live_pid(slot: &ProjectSlot, project: &str, expected: ProjectState) -> Option<u32> {
        let guard = slot.handle.lock();
        let handle = guard.as_ref()?;
        if handle.state != expected {
            return None;
        }
        if handle.pid.is_none() {
            warn!("{} is {} without a pid", project, expected);
        }
        handle.pid
    }

    /// The exit waiter may have recorded an exit while the signal was sent.
    fn transition(slot: &ProjectSlot, from: ProjectState, to: ProjectState) -> bool {
        match slot.handle.lock().as_mut() {
            Some(handle) if handle.state == from => {
                handle.state = to;
                true
            }
            _ => false,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current status; `idle` for projects never launched.
    pub fn status(&self, project: &str) -> ProcessStatus {
        match self.existing_slot(project) {
            Some(slot) => slot.status(project),
            None => ProcessStatus::idle(project),
        }
    }

    pub fn state(&self, project: &str) -> ProjectState {
        self.status(project).state
    }

    /// Statuses of every project that has been launched, sorted by name.
    pub fn statuses(&self) -> Vec<ProcessStatus> {
        let slots: Vec<(String, Arc<ProjectSlot>)> = self
            .slots
            .read()
            .iter()
            .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
            .collect();
        let mut statuses: Vec<ProcessStatus> = slots
            .iter()
            .map(|(name, slot)| slot.status(name))
            .filter(|status| status.state != ProjectState::Idle)
            .collect();
        statuses.sort_by(|a, b| a.project.cmp(&b.project));
        statuses
    }

    /// Projects whose process is running or paused.
    pub fn list_active(&self) -> Vec<String> {
        self.statuses()
            .into_iter()
            .filter(|status| status.state.is_live())
            .map(|status| status.project)
            .collect()
    }

    /// Wait until the current launch of `project` has exited. Returns the
    /// final status, or `None` on timeout.
    pub async fn wait_for_exit(&self, project: &str, timeout: Duration) -> Option<ProcessStatus> {
        let slot = self.existing_slot(project)?;
        let exit_rx = slot.handle.lock().as_ref().and_then(|h| h.exit_rx.clone());
        if let Some(mut exit_rx) = exit_rx {
            if !wait_exited(&mut exit_rx, timeout).await {
                return None;
            }
        }
        Some(slot.status(project))
    }

    /// Stop every live project.
    pub async fn shutdown_all(&self) {
        let active = self.list_active();
        if active.is_empty() {
            return;
        }
        info!("Stopping {} running project(s)", active.len());
        let results = futures::future::join_all(active.iter().map(|p| self.stop(p))).await;
        for (project, result) in active.iter().zip(results) {
            if let Err(e) = result {
                warn!("Failed to stop {} on shutdown: {}", project, e);
            }
        }
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("config", &self.config)
            .field("signals", &self.signals)
            .field("projects", &self.slots.read().len())
            .finish()
    }
}

/// `true` once the exit waiter has recorded the exit.
async fn wait_exited(exit_rx: &mut watch::Receiver<bool>, timeout: Duration) -> bool {
    // A closed channel means the waiter is gone, which only happens after exit.
    tokio::time::timeout(timeout, exit_rx.wait_for(|exited| *exited))
        .await
        .is_ok()
}

// ============================================================================
// Background tasks
// ============================================================================

fn spawn_reader<R>(reader: R, source: LogSource, buffer: Arc<LogBuffer>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    buffer.append(source, decode_line(&raw));
                }
                Err(e) => {
                    buffer.append_system(format!(
                        "[LOG ERROR] Failed to read {}: {}",
                        source.as_str(),
                        e
                    ));
                    break;
                }
            }
        }
    })
}

struct ExitWatch {
    project: String,
    child: Child,
    readers: Vec<JoinHandle<()>>,
    slot: Arc<ProjectSlot>,
    buffer: Arc<LogBuffer>,
    kill_rx: watch::Receiver<bool>,
    exit_tx: watch::Sender<bool>,
    drain: Duration,
}

async fn supervise_exit(exit: ExitWatch) {
    let ExitWatch {
        project,
        mut child,
        readers,
        slot,
        buffer,
        mut kill_rx,
        exit_tx,
        drain,
    } = exit;

    let waited = loop {
        tokio::select! {
            status = child.wait() => break status,
            changed = kill_rx.changed() => match changed {
                Ok(()) => {
                    if *kill_rx.borrow_and_update() {
                        if let Err(e) = child.start_kill() {
                            warn!("Failed to kill {}: {}", project, e);
                        }
                    }
                }
                Err(_) => break child.wait().await,
            },
        }
    };

    for mut reader in readers {
        if tokio::time::timeout(drain, &mut reader).await.is_err() {
            // A descendant still holds the pipe; the reader runs on to EOF.
            debug!("Output of {} still open after exit, detaching reader", project);
        }
    }

    let (exit_code, failure) = match &waited {
        Ok(status) => describe_exit(status),
        Err(e) => (None, Some(format!("Failed to wait for process: {}", e))),
    };

    let state = {
        let mut guard = slot.handle.lock();
        match guard.as_mut() {
            Some(handle) => {
                handle.state = if handle.stop_requested {
                    ProjectState::Stopped
                } else if exit_code == Some(0) {
                    ProjectState::Completed
                } else {
                    ProjectState::Error
                };
                handle.exit_code = exit_code;
                if handle.state == ProjectState::Error {
                    handle.last_error = failure.clone();
                }
                handle.kill_tx = None;
                handle.state
            }
            None => ProjectState::Error,
        }
    };

    buffer.append_system(match (state, exit_code) {
        (ProjectState::Stopped, Some(code)) => format!("[EXIT] Process stopped (code {})", code),
        (ProjectState::Stopped, None) => "[EXIT] Process stopped".to_string(),
        (_, Some(code)) => format!("[EXIT] Process exited with code {}", code),
        (_, None) => format!(
            "[EXIT] {}",
            failure.as_deref().unwrap_or("Process exited")
        ),
    });
    buffer.notify(Notice::process_exited(&project, state.as_str(), exit_code));
    exit_tx.send_replace(true);

    info!("{} exited: {} (code {:?})", project, state, exit_code);
}

/// Exit code and failure description. Signal deaths report `-signo`.
fn describe_exit(status: &ExitStatus) -> (Option<i32>, Option<String>) {
    if let Some(code) = status.code() {
        let failure = (code != 0).then(|| format!("Exited with code {}", code));
        return (Some(code), failure);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signo) = status.signal() {
            return (Some(-signo), Some(format!("Terminated by signal {}", signo)));
        }
    }
    (None, Some("Terminated abnormally".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_dashboard() {
        let dashboard = DashboardConfig {
            stop_grace_ms: 1500,
            kill_wait_ms: 300,
            ..DashboardConfig::default()
        };
        let config = SupervisorConfig::from(&dashboard);
        assert_eq!(config.stop_grace, Duration::from_millis(1500));
        assert_eq!(config.kill_wait, Duration::from_millis(300));
        assert_eq!(config.reader_drain, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_unknown_project_queries() {
        let supervisor = ProcessSupervisor::new(
            SupervisorConfig::default(),
            Arc::new(LogStore::default()),
            Arc::new(crate::command::RalphCommandBuilder::default()),
        );

        assert_eq!(supervisor.state("ghost"), ProjectState::Idle);
        assert!(supervisor.statuses().is_empty());
        assert!(matches!(supervisor.stop("ghost").await, Err(Error::NotRunning(_))));
        assert!(matches!(supervisor.pause("ghost").await, Err(Error::NotRunning(_))));
        assert!(matches!(supervisor.resume("ghost").await, Err(Error::NotPaused(_))));
        assert!(supervisor
            .wait_for_exit("ghost", Duration::from_millis(10))
            .await
            .is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_describe_exit() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(describe_exit(&ExitStatus::from_raw(0)), (Some(0), None));
        let (code, failure) = describe_exit(&ExitStatus::from_raw(3 << 8));
        assert_eq!(code, Some(3));
        assert_eq!(failure.as_deref(), Some("Exited with code 3"));
        let (code, failure) = describe_exit(&ExitStatus::from_raw(9));
        assert_eq!(code, Some(-9));
        assert_eq!(failure.as_deref(), Some("Terminated by signal 9"));
    }
}
