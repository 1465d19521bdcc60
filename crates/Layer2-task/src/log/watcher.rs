//! Log file watcher - polling tail of an on-disk log
//!
//! Polls at a fixed interval instead of relying on file-change
//! notifications, which keeps it portable and lets it follow files that do
//! not exist yet, are truncated, or are replaced by log rotation.

use super::buffer::LogBuffer;
use super::parse::decode_line;
use ralph_foundation::{DashboardConfig, Error, LogSource, Notice, Result};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Largest chunk read from the file in one poll
const MAX_READ_PER_POLL: u64 = 1 << 20;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    /// Replay existing content instead of starting at the current end
    pub from_start: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            from_start: false,
        }
    }
}

impl From<&DashboardConfig> for WatcherConfig {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            poll_interval: config.watcher_poll(),
            from_start: false,
        }
    }
}

// ============================================================================
// Tail
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
enum TailStatus {
    Present,
    Missing,
}

/// Read position within one file, independent of the polling loop
#[derive(Debug)]
struct Tail {
    path: PathBuf,
    pos: u64,
    file_id: Option<u64>,
    /// Bytes after the last newline, held until the line is complete
    partial: Vec<u8>,
    /// Whether the file has been seen at least once
    opened: bool,
    from_start: bool,
}

impl Tail {
    fn new(path: PathBuf, from_start: bool) -> Self {
        Self {
            path,
            pos: 0,
            file_id: None,
            partial: Vec::new(),
            opened: false,
            from_start,
        }
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.partial.clear();
    }

    /// Append every complete line written since the last poll.
    async fn poll(&mut self, buffer: &LogBuffer) -> Result<TailStatus> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Whatever shows up at this path next is new content.
                self.file_id = None;
                self.reset();
                self.opened = true;
                return Ok(TailStatus::Missing);
            }
            Err(e) => return Err(e.into()),
        };

        let len = meta.len();
        let id = file_id(&meta);

        if !self.opened {
            self.opened = true;
            self.file_id = id;
            self.pos = if self.from_start { 0 } else { len };
        } else if self.file_id != id {
            debug!("{} was replaced, reading from the start", self.path.display());
            self.file_id = id;
            self.reset();
        } else if len < self.pos {
            debug!("{} was truncated, reading from the start", self.path.display());
            self.reset();
        }

        if len > self.pos {
            self.read_new(buffer, len).await?;
        }
        Ok(TailStatus::Present)
    }

    async fn read_new(&mut self, buffer: &LogBuffer, len: u64) -> Result<()> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.pos)).await?;

        let mut chunk = Vec::new();
        let wanted = (len - self.pos).min(MAX_READ_PER_POLL);
        let read = file.take(wanted).read_to_end(&mut chunk).await?;
        self.pos += read as u64;

        self.partial.extend_from_slice(&chunk);
        let Some(last_newline) = self.partial.iter().rposition(|b| *b == b'\n') else {
            return Ok(());
        };
        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);

        for raw in complete.split(|b| *b == b'\n') {
            if raw.is_empty() {
                continue;
            }
            buffer.append(LogSource::File, decode_line(raw));
        }
        Ok(())
    }
}

#[cfg(unix)]
fn file_id(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn file_id(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}

// ============================================================================
// LogFileWatcher
// ============================================================================

/// Background tail of one file into a project's log buffer
pub struct LogFileWatcher {
    project: String,
    path: PathBuf,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LogFileWatcher {
    pub fn spawn(path: impl Into<PathBuf>, buffer: Arc<LogBuffer>, config: WatcherConfig) -> Self {
        let path = path.into();
        let project = buffer.project().to_string();
        let (stop_tx, stop_rx) = watch::channel(false);

        debug!("Watching {} for {}", path.display(), project);
        let handle = tokio::spawn(watch_loop(path.clone(), buffer, config, stop_rx));

        Self {
            project,
            path,
            stop_tx,
            handle,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop polling and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!("Watcher for {} ended abnormally: {}", self.path.display(), e);
        }
    }
}

async fn watch_loop(
    path: PathBuf,
    buffer: Arc<LogBuffer>,
    config: WatcherConfig,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut tail = Tail::new(path.clone(), config.from_start);
    let mut waiting = false;
    let mut seen = false;
    let mut last_error: Option<String> = None;

    loop {
        if *stop_rx.borrow() {
            break;
        }

        match tail.poll(&buffer).await {
            Ok(TailStatus::Present) => {
                waiting = false;
                seen = true;
                last_error = None;
            }
            Ok(TailStatus::Missing) => {
                if seen {
                    let err = Error::WatcherFileMissing(path.clone());
                    debug!("{}", err);
                    buffer.append_system(format!("[LOG] {}, waiting for it to return", err));
                    buffer.notify(Notice::watcher_lost_file(
                        buffer.project(),
                        &path.display().to_string(),
                    ));
                    seen = false;
                    waiting = true;
                } else if !waiting {
                    buffer.append_system(format!("[LOG] Waiting for log file: {}", path.display()));
                    waiting = true;
                }
            }
            Err(e) => {
                let message = e.to_string();
                if last_error.as_deref() != Some(message.as_str()) {
                    warn!("Failed to watch {}: {}", path.display(), message);
                    buffer.append_system(format!(
                        "[LOG ERROR] Failed to watch {}: {}",
                        path.display(),
                        message
                    ));
                    last_error = Some(message);
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.poll_interval) => {}
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Stopped watching {}", path.display());
}
