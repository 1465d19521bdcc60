//! Signal capability
//!
//! Suspend and continue have no Windows equivalent, so job control is a
//! capability the supervisor queries instead of a silent no-op.

use ralph_foundation::{Error, Result};

/// Signals the supervisor sends to a project's process group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    Suspend,
    Continue,
    Terminate,
    Kill,
}

impl ProcessSignal {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessSignal::Suspend => "SIGSTOP",
            ProcessSignal::Continue => "SIGCONT",
            ProcessSignal::Terminate => "SIGTERM",
            ProcessSignal::Kill => "SIGKILL",
        }
    }
}

impl std::fmt::Display for ProcessSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How this platform delivers process signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalControl {
    /// POSIX `kill(2)` on the process group
    Posix,
    /// No signal delivery; callers fall back to forced termination
    Unsupported,
}

impl SignalControl {
    pub fn detect() -> Self {
        if cfg!(unix) {
            SignalControl::Posix
        } else {
            SignalControl::Unsupported
        }
    }

    /// Deliver `signal` to the process group led by `pid`.
    pub fn send(&self, pid: u32, signal: ProcessSignal) -> Result<()> {
        match self {
            SignalControl::Posix => send_posix(pid, signal),
            SignalControl::Unsupported => Err(Error::NotSupported(format!(
                "{} requires POSIX signals",
                signal
            ))),
        }
    }
}

impl Default for SignalControl {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(unix)]
fn send_posix(pid: u32, signal: ProcessSignal) -> Result<()> {
    let signo = match signal {
        ProcessSignal::Suspend => libc::SIGSTOP,
        ProcessSignal::Continue => libc::SIGCONT,
        ProcessSignal::Terminate => libc::SIGTERM,
        ProcessSignal::Kill => libc::SIGKILL,
    };
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| Error::Signal(format!("pid {} out of range", pid)))?;

    // Children are spawned as group leaders, so -pid reaches the whole tree.
    // SAFETY: kill(2) has no memory-safety preconditions.
    if unsafe { libc::kill(-pid, signo) } == 0 {
        return Ok(());
    }
    let group_err = std::io::Error::last_os_error();
    if group_err.raw_os_error() != Some(libc::ESRCH) {
        return Err(Error::Signal(format!(
            "Failed to send {} to group {}: {}",
            signal, pid, group_err
        )));
    }

    // SAFETY: as above.
    if unsafe { libc::kill(pid, signo) } == 0 {
        return Ok(());
    }
    Err(Error::Signal(format!(
        "Failed to send {} to {}: {}",
        signal,
        pid,
        std::io::Error::last_os_error()
    )))
}

#[cfg(not(unix))]
fn send_posix(_pid: u32, signal: ProcessSignal) -> Result<()> {
    Err(Error::NotSupported(format!("{} requires POSIX signals", signal)))
}
