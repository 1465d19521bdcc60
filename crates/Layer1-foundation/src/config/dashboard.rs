//! Dashboard Config - server, engine and alert settings

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Config file name inside the global store
pub const CONFIG_FILE: &str = "config.json";

// ============================================================================
// DashboardConfig
// ============================================================================

/// Dashboard settings
///
/// Unknown keys are ignored and missing keys take their defaults, so an
/// older config file keeps loading after new knobs are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Agent CLI executable
    pub ralph_tui_command: String,
    /// Root directory scanned for projects (`~` is expanded)
    pub projects_dir: String,
    /// Metrics sampling interval
    pub refresh_interval_ms: u64,
    pub theme: String,
    /// Per-project log buffer capacity
    pub log_max_lines: usize,
    /// Metrics ring capacity in samples
    pub metrics_history: usize,
    pub host: String,
    pub port: u16,

    // ------------------------------------------------------------------------
    // Process supervision
    // ------------------------------------------------------------------------
    /// Time between SIGTERM and SIGKILL on stop
    pub stop_grace_ms: u64,
    /// How long to wait for the kernel to reap after SIGKILL
    pub kill_wait_ms: u64,

    // ------------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------------
    /// File watcher poll interval
    pub watcher_poll_ms: u64,
    /// Bound of each subscriber's outbound queue
    pub subscriber_queue: usize,
    /// Coalescing window for live log batches (0 = deliver immediately)
    pub delivery_tick_ms: u64,
    /// Lines replayed to a log subscriber on attach
    pub log_backlog_lines: usize,
    /// Delay clients wait before reattaching after being dropped
    pub reconnect_backoff_ms: u64,

    // ------------------------------------------------------------------------
    // Alerts (evaluated by the browser)
    // ------------------------------------------------------------------------
    pub alert_cpu_threshold: f64,
    pub alert_memory_threshold: f64,
    pub alert_gpu_threshold: f64,
    pub alert_disk_threshold: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            ralph_tui_command: "ralph-tui".to_string(),
            projects_dir: "~/Projects".to_string(),
            refresh_interval_ms: 1000,
            theme: "dark".to_string(),
            log_max_lines: 10_000,
            metrics_history: 3600,
            host: "127.0.0.1".to_string(),
            port: 8420,
            stop_grace_ms: 5000,
            kill_wait_ms: 2000,
            watcher_poll_ms: 250,
            subscriber_queue: 512,
            delivery_tick_ms: 100,
            log_backlog_lines: 200,
            reconnect_backoff_ms: 2000,
            alert_cpu_threshold: 90.0,
            alert_memory_threshold: 85.0,
            alert_gpu_threshold: 95.0,
            alert_disk_threshold: 90.0,
        }
    }
}

impl DashboardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// Load from the global store.
    ///
    /// A missing file yields defaults. A file that cannot be parsed is
    /// reported and replaced by defaults rather than aborting startup.
    pub fn load() -> Result<Self> {
        let store = JsonStore::global()?;
        Ok(Self::load_from_store(&store))
    }

    pub fn load_from_store(store: &JsonStore) -> Self {
        match store.load_optional::<DashboardConfig>(CONFIG_FILE) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Ignoring unreadable dashboard config: {}", e);
                Self::default()
            }
        }
    }

    /// Load an explicit file; `.toml` files are parsed as TOML, anything
    /// else as JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        if is_toml {
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
        }
    }

    pub fn save(&self) -> Result<()> {
        let store = JsonStore::global()?;
        self.save_to_store(&store)
    }

    pub fn save_to_store(&self, store: &JsonStore) -> Result<()> {
        store.save(CONFIG_FILE, self)
    }

    // ========================================================================
    // Validation
    // ========================================================================

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("log_max_lines", self.log_max_lines as u64),
            ("metrics_history", self.metrics_history as u64),
            ("refresh_interval_ms", self.refresh_interval_ms),
            ("watcher_poll_ms", self.watcher_poll_ms),
            ("subscriber_queue", self.subscriber_queue as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        if self.ralph_tui_command.trim().is_empty() {
            return Err(Error::Config("ralph_tui_command must not be empty".into()));
        }
        Ok(())
    }

    // ========================================================================
    // Derived values
    // ========================================================================

    /// Projects root with a leading `~` expanded to the home directory.
    pub fn projects_dir(&self) -> PathBuf {
        expand_home(&self.projects_dir)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn kill_wait(&self) -> Duration {
        Duration::from_millis(self.kill_wait_ms)
    }

    pub fn watcher_poll(&self) -> Duration {
        Duration::from_millis(self.watcher_poll_ms)
    }

    pub fn delivery_tick(&self) -> Duration {
        Duration::from_millis(self.delivery_tick_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    match raw.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(raw),
        },
        None => PathBuf::from(raw),
    }
}
