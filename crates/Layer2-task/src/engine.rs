//! Engine - wires supervision, log aggregation and the broadcast hub
//!
//! The transport layer talks to nothing but the [`Engine`]: control calls go
//! to the supervisor, queries to the log store and metrics ring, and
//! streaming clients attach through the hub.

use crate::command::{CommandBuilder, RalphCommandBuilder};
use crate::feed::MetricsFeed;
use crate::log::{self, LogFileWatcher, LogStore, WatcherConfig};
use crate::process::{LaunchOptions, ProcessStatus, ProcessSupervisor, SupervisorConfig};
use crate::registry::{DirectoryRegistry, ProjectRegistry};
use parking_lot::Mutex;
use ralph_foundation::{
    BroadcastHub, Channel, ChannelKind, DashboardConfig, Error, HubConfig, LogLevel, LogLine,
    MetricsHistory, MetricsRing, MetricsSample, MetricsSampler, Result, Subscription,
    SystemMetrics, DEFAULT_METRICS_CAPACITY,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub supervisor: SupervisorConfig,
    pub watcher: WatcherConfig,
    pub hub: HubConfig,
    pub log_max_lines: usize,
    pub metrics_capacity: usize,
    pub metrics_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            supervisor: SupervisorConfig::default(),
            watcher: WatcherConfig::default(),
            hub: HubConfig::default(),
            log_max_lines: log::DEFAULT_MAX_LINES,
            metrics_capacity: DEFAULT_METRICS_CAPACITY,
            metrics_interval: Duration::from_secs(1),
        }
    }
}

impl From<&DashboardConfig> for EngineConfig {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            supervisor: SupervisorConfig::from(config),
            watcher: WatcherConfig::from(config),
            hub: HubConfig::from(config),
            log_max_lines: config.log_max_lines,
            metrics_capacity: config.metrics_history,
            metrics_interval: config.refresh_interval(),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct Engine {
    config: EngineConfig,
    hub: Arc<BroadcastHub>,
    logs: Arc<LogStore>,
    metrics: Arc<MetricsRing>,
    supervisor: ProcessSupervisor,
    registry: Arc<dyn ProjectRegistry>,
    watchers: Mutex<HashMap<String, Vec<LogFileWatcher>>>,
    feed: Mutex<Option<MetricsFeed>>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        registry: Arc<dyn ProjectRegistry>,
        commands: Arc<dyn CommandBuilder>,
    ) -> Self {
        let hub = Arc::new(BroadcastHub::new(config.hub.clone()));
        let logs = Arc::new(LogStore::new(config.log_max_lines).with_hub(Arc::clone(&hub)));
        let metrics =
            Arc::new(MetricsRing::new(config.metrics_capacity).with_hub(Arc::clone(&hub)));

        hub.register_source(ChannelKind::Logs, &logs);
        hub.register_source(ChannelKind::Metrics, &metrics);

        let supervisor =
            ProcessSupervisor::new(config.supervisor.clone(), Arc::clone(&logs), commands);

        Self {
            config,
            hub,
            logs,
            metrics,
            supervisor,
            registry,
            watchers: Mutex::new(HashMap::new()),
            feed: Mutex::new(None),
        }
    }

    /// Engine over `projects_dir`, launching `ralph_tui_command`.
    pub fn from_config(config: &DashboardConfig) -> Self {
        let registry = Arc::new(DirectoryRegistry::new(config.projects_dir()));
        let commands = Arc::new(RalphCommandBuilder::new(config.ralph_tui_command.clone()));
        Self::new(EngineConfig::from(config), registry, commands)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn logs(&self) -> &Arc<LogStore> {
        &self.logs
    }

    pub fn metrics(&self) -> &Arc<MetricsRing> {
        &self.metrics
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn registry(&self) -> &Arc<dyn ProjectRegistry> {
        &self.registry
    }

    pub fn projects(&self) -> Result<Vec<String>> {
        self.registry.list()
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Launch the project and tail the log files it already has.
    pub async fn launch(&self, project: &str, options: LaunchOptions) -> Result<ProcessStatus> {
        let workdir = self.registry.resolve(project)?;
        let status = self.supervisor.launch(project, &workdir, options).await?;

        // Watchers of a previous run would duplicate lines.
        self.stop_watchers(project).await;
        for path in log::find_log_files(&workdir) {
            self.spawn_watcher(project, path);
        }
        Ok(status)
    }

    /// Stop the project's process and its file watchers.
    pub async fn stop(&self, project: &str) -> Result<ProcessStatus> {
        let status = self.supervisor.stop(project).await?;
        self.stop_watchers(project).await;
        Ok(status)
    }

    pub async fn pause(&self, project: &str) -> Result<ProcessStatus> {
        self.supervisor.pause(project).await
    }

    pub async fn resume(&self, project: &str) -> Result<ProcessStatus> {
        self.supervisor.resume(project).await
    }

    pub fn status(&self, project: &str) -> ProcessStatus {
        self.supervisor.status(project)
    }

    pub fn statuses(&self) -> Vec<ProcessStatus> {
        self.supervisor.statuses()
    }

    pub fn list_active(&self) -> Vec<String> {
        self.supervisor.list_active()
    }

    // ========================================================================
    // Logs
    // ========================================================================

    pub fn get_lines(
        &self,
        project: &str,
        count: usize,
        keyword: Option<&str>,
        level: Option<LogLevel>,
    ) -> Vec<LogLine> {
        self.logs.get_lines(project, count, keyword, level)
    }

    pub fn snapshot(&self, project: &str, max_lines: usize, offset: usize) -> Vec<LogLine> {
        self.logs.snapshot(project, max_lines, offset)
    }

    pub fn clear_logs(&self, project: &str) -> bool {
        self.logs.clear(project)
    }

    /// Log files found in the project directory.
    pub fn log_files(&self, project: &str) -> Result<Vec<PathBuf>> {
        let workdir = self.registry.resolve(project)?;
        Ok(log::find_log_files(&workdir))
    }

    /// Read a window of a log file. `path` may be relative to the project
    /// directory and must resolve inside it.
    pub async fn read_log_file(
        &self,
        project: &str,
        path: &Path,
        max_lines: usize,
        offset: usize,
    ) -> Result<Vec<String>> {
        let workdir = self.registry.resolve(project)?;
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            workdir.join(path)
        };

        let real = match tokio::fs::canonicalize(&candidate).await {
            Ok(real) => real,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let root = tokio::fs::canonicalize(&workdir).await?;
        if !real.starts_with(&root) {
            return Err(Error::InvalidInput(format!(
                "{} is outside project {}",
                path.display(),
                project
            )));
        }
        log::read_log_file(&real, max_lines, offset).await
    }

    /// Tail `path` into the project's buffer, e.g. for a process started
    /// outside the dashboard. Watching the same path twice is a no-op.
    pub fn watch_file(&self, project: &str, path: impl Into<PathBuf>) -> Result<()> {
        if !self.is_known(project) {
            return Err(Error::ProjectNotFound(project.to_string()));
        }
        let path = path.into();
        let already = self
            .watchers
            .lock()
            .get(project)
            .map_or(false, |ws| ws.iter().any(|w| w.path() == path));
        if already {
            debug!("{} already watched for {}", path.display(), project);
            return Ok(());
        }
        self.spawn_watcher(project, path);
        Ok(())
    }

    fn spawn_watcher(&self, project: &str, path: PathBuf) {
        debug!("Watching {} for {}", path.display(), project);
        let watcher =
            LogFileWatcher::spawn(path, self.logs.buffer(project), self.config.watcher.clone());
        self.watchers
            .lock()
            .entry(project.to_string())
            .or_default()
            .push(watcher);
    }

    /// Stop every watcher of `project`. Returns how many were stopped.
    pub async fn stop_watchers(&self, project: &str) -> usize {
        let watchers = self.watchers.lock().remove(project).unwrap_or_default();
        let count = watchers.len();
        for watcher in watchers {
            watcher.stop().await;
        }
        if count > 0 {
            debug!("Stopped {} watcher(s) of {}", count, project);
        }
        count
    }

    pub fn watched_files(&self, project: &str) -> Vec<PathBuf> {
        self.watchers
            .lock()
            .get(project)
            .map(|ws| ws.iter().map(|w| w.path().to_path_buf()).collect())
            .unwrap_or_default()
    }

    fn is_known(&self, project: &str) -> bool {
        self.logs.contains(project) || self.registry.contains(project)
    }

    // ========================================================================
    // Streaming
    // ========================================================================

    /// Attach a streaming session. Log channels must name a known project.
    pub fn attach(&self, channel: Channel) -> Result<Subscription> {
        if let Channel::Logs(project) = &channel {
            if !self.is_known(project) {
                return Err(Error::ProjectNotFound(project.clone()));
            }
        }
        Ok(self.hub.attach(channel))
    }

    /// Parse `name` as a channel and attach to it.
    pub fn attach_named(&self, name: &str) -> Result<Subscription> {
        self.attach(name.parse()?)
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    /// Start sampling with `sampler`, replacing any running feed.
    pub async fn start_metrics_feed<S>(&self, sampler: S)
    where
        S: MetricsSampler + 'static,
    {
        let previous = self.feed.lock().take();
        if let Some(previous) = previous {
            previous.stop().await;
        }
        let feed = MetricsFeed::spawn(
            sampler,
            Arc::clone(&self.metrics),
            self.config.metrics_interval,
        );
        *self.feed.lock() = Some(feed);
    }

    pub fn metrics_feed_running(&self) -> bool {
        self.feed.lock().as_ref().map_or(false, MetricsFeed::is_running)
    }

    pub fn record_metrics(&self, metrics: SystemMetrics) -> MetricsSample {
        self.metrics.push(metrics)
    }

    pub fn latest_metrics(&self) -> Option<SystemMetrics> {
        self.metrics.latest()
    }

    pub fn metrics_history(&self, window: Duration) -> MetricsHistory {
        self.metrics.history(window)
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Stop every process, watcher and the metrics feed, then close all
    /// streaming sessions.
    pub async fn shutdown(&self) {
        info!("Shutting down engine");
        self.supervisor.shutdown_all().await;

        let projects: Vec<String> = self.watchers.lock().keys().cloned().collect();
        for project in projects {
            self.stop_watchers(&project).await;
        }

        let feed = self.feed.lock().take();
        if let Some(feed) = feed {
            feed.stop().await;
        }

        self.hub.close_all();
        if !self.list_active().is_empty() {
            warn!("Processes still active after shutdown: {:?}", self.list_active());
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("supervisor", &self.supervisor)
            .field("projects", &self.logs.projects())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ralph_foundation::{LogSource, StreamMessage};

    fn engine() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("demo/.ralph-tui/logs")).unwrap();
        let registry = Arc::new(DirectoryRegistry::new(dir.path()));
        let engine = Engine::new(
            EngineConfig::default(),
            registry,
            Arc::new(RalphCommandBuilder::default()),
        );
        (dir, engine)
    }

    #[test]
    fn test_config_from_dashboard() {
        let dashboard = DashboardConfig {
            log_max_lines: 50,
            metrics_history: 60,
            refresh_interval_ms: 500,
            ..DashboardConfig::default()
        };
        let config = EngineConfig::from(&dashboard);
        assert_eq!(config.log_max_lines, 50);
        assert_eq!(config.metrics_capacity, 60);
        assert_eq!(config.metrics_interval, Duration::from_millis(500));
        assert_eq!(config.hub.metrics_backlog, 60);
    }

    #[tokio::test]
    async fn test_attach_validates_project() {
        let (_dir, engine) = engine();

        assert!(engine.attach(Channel::Metrics).is_ok());
        assert!(engine.attach(Channel::logs("demo")).is_ok());
        assert!(matches!(
            engine.attach(Channel::logs("ghost")),
            Err(Error::ProjectNotFound(_))
        ));
        assert!(matches!(
            engine.attach_named("bogus"),
            Err(Error::InvalidChannel(_))
        ));
    }

    #[tokio::test]
    async fn test_attach_replays_buffer() {
        let (_dir, engine) = engine();
        engine.logs().append("demo", LogSource::System, "first");
        engine.logs().append("demo", LogSource::Stdout, "second");

        let mut sub = engine.attach_named("logs:demo").unwrap();
        match sub.next().await {
            Some(StreamMessage::LogHistory { lines, .. }) => {
                let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
                assert_eq!(texts, vec!["first", "second"]);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_log_file_stays_in_project() {
        let (dir, engine) = engine();
        let log = dir.path().join("demo/.ralph-tui/logs/run.log");
        std::fs::write(&log, "a\nb\nc\n").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "nope\n").unwrap();

        let lines = engine
            .read_log_file("demo", Path::new(".ralph-tui/logs/run.log"), 2, 1)
            .await
            .unwrap();
        assert_eq!(lines, vec!["b", "c"]);

        assert!(matches!(
            engine
                .read_log_file("demo", Path::new("../secret.txt"), 10, 0)
                .await,
            Err(Error::InvalidInput(_))
        ));
        assert!(engine
            .read_log_file("demo", Path::new("missing.log"), 10, 0)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(engine.log_files("demo").unwrap(), vec![log]);
    }

    #[tokio::test]
    async fn test_watch_file_dedup_and_stop() {
        let (dir, engine) = engine();
        let path = dir.path().join("demo/external.log");

        engine.watch_file("demo", &path).unwrap();
        engine.watch_file("demo", &path).unwrap();
        assert_eq!(engine.watched_files("demo"), vec![path]);
        assert!(matches!(
            engine.watch_file("ghost", dir.path().join("x.log")),
            Err(Error::ProjectNotFound(_))
        ));

        assert_eq!(engine.stop_watchers("demo").await, 1);
        assert!(engine.watched_files("demo").is_empty());
    }

    #[tokio::test]
    async fn test_record_metrics_and_history() {
        let (_dir, engine) = engine();
        assert!(engine.latest_metrics().is_none());
        engine.record_metrics(SystemMetrics::now());
        engine.record_metrics(SystemMetrics::now());

        assert!(engine.latest_metrics().is_some());
        assert_eq!(engine.metrics_history(Duration::from_secs(60)).len(), 2);
        assert!(!engine.metrics_feed_running());
    }
}
