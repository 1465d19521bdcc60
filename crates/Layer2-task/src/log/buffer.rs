//! Log buffers - bounded per-project line stores

use super::parse::parse_level;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use ralph_foundation::{
    BacklogSource, BroadcastHub, Channel, HubItem, LogLevel, LogLine, LogSource, Notice,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Maximum lines kept per project
pub const DEFAULT_MAX_LINES: usize = 10_000;

#[derive(Debug)]
struct BufferState {
    lines: VecDeque<LogLine>,
    next_seq: u64,
}

/// Log buffer for a single project.
///
/// Producers (pipe readers, file watchers, the supervisor) append
/// concurrently. Sequence numbers are assigned under the buffer lock and the
/// line is published to `logs:{project}` before the lock is released, so the
/// buffer order, the sequence order and the publish order are the same.
pub struct LogBuffer {
    project: String,
    channel: Channel,
    max_lines: usize,
    state: Mutex<BufferState>,
    hub: Option<Arc<BroadcastHub>>,
}

impl LogBuffer {
    pub fn new(project: impl Into<String>, max_lines: usize) -> Self {
        let project = project.into();
        let max_lines = max_lines.max(1);
        Self {
            channel: Channel::logs(project.clone()),
            project,
            max_lines,
            state: Mutex::new(BufferState {
                lines: VecDeque::with_capacity(max_lines.min(1024)),
                next_seq: 1,
            }),
            hub: None,
        }
    }

    pub fn with_hub(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Add a line, evicting the oldest one when full.
    pub fn append(&self, source: LogSource, text: impl Into<String>) -> LogLine {
        let text = text.into();
        let level = match source {
            LogSource::System if text.starts_with("[LOG ERROR]") => LogLevel::Error,
            _ => parse_level(&text),
        };

        let mut state = self.state.lock();
        let line = LogLine {
            seq: state.next_seq,
            timestamp: Utc::now(),
            source,
            level,
            text,
        };
        state.next_seq += 1;

        if state.lines.len() >= self.max_lines {
            state.lines.pop_front();
        }
        state.lines.push_back(line.clone());

        if let Some(hub) = &self.hub {
            hub.publish(&self.channel, HubItem::Line(line.clone()));
        }
        line
    }

    /// Add system message
    pub fn append_system(&self, text: impl Into<String>) -> LogLine {
        self.append(LogSource::System, text)
    }

    /// Forward an out-of-band notice to this project's subscribers.
    pub fn notify(&self, notice: Notice) {
        if let Some(hub) = &self.hub {
            // Taken under the buffer lock so the notice is ordered with lines.
            let _state = self.state.lock();
            hub.publish(&self.channel, HubItem::Notice(notice));
        }
    }

    /// Up to `max_lines` lines ending `offset` lines before the most recent
    /// one, oldest first.
    pub fn snapshot(&self, max_lines: usize, offset: usize) -> Vec<LogLine> {
        let state = self.state.lock();
        let end = state.lines.len().saturating_sub(offset);
        let start = end.saturating_sub(max_lines);
        state.lines.range(start..end).cloned().collect()
    }

    /// Most recent `count` lines (`0` = all), oldest first.
    pub fn recent(&self, count: usize) -> Vec<LogLine> {
        if count == 0 {
            return self.all();
        }
        self.snapshot(count, 0)
    }

    pub fn all(&self) -> Vec<LogLine> {
        self.state.lock().lines.iter().cloned().collect()
    }

    /// Drop buffered lines. Sequence numbers keep increasing afterwards.
    pub fn clear(&self) {
        self.state.lock().lines.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().lines.is_empty()
    }
}

impl std::fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBuffer")
            .field("project", &self.project)
            .field("max_lines", &self.max_lines)
            .field("len", &self.len())
            .finish()
    }
}

// ============================================================================
// LogStore
// ============================================================================

/// Log buffers for every project, created on first use
pub struct LogStore {
    buffers: RwLock<HashMap<String, Arc<LogBuffer>>>,
    max_lines: usize,
    hub: Option<Arc<BroadcastHub>>,
}

impl LogStore {
    pub fn new(max_lines: usize) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            max_lines,
            hub: None,
        }
    }

    pub fn with_hub(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Get or create the buffer of `project`.
    pub fn buffer(&self, project: &str) -> Arc<LogBuffer> {
        if let Some(buffer) = self.buffers.read().get(project) {
            return Arc::clone(buffer);
        }
        let mut buffers = self.buffers.write();
        let buffer = buffers.entry(project.to_string()).or_insert_with(|| {
            let buffer = LogBuffer::new(project, self.max_lines);
            Arc::new(match &self.hub {
                Some(hub) => buffer.with_hub(Arc::clone(hub)),
                None => buffer,
            })
        });
        Arc::clone(buffer)
    }

    pub fn get(&self, project: &str) -> Option<Arc<LogBuffer>> {
        self.buffers.read().get(project).cloned()
    }

    pub fn contains(&self, project: &str) -> bool {
        self.buffers.read().contains_key(project)
    }

    pub fn append(&self, project: &str, source: LogSource, text: impl Into<String>) -> LogLine {
        self.buffer(project).append(source, text)
    }

    pub fn snapshot(&self, project: &str, max_lines: usize, offset: usize) -> Vec<LogLine> {
        self.get(project)
            .map(|b| b.snapshot(max_lines, offset))
            .unwrap_or_default()
    }

    /// Filtered view of a project's lines, oldest first.
    ///
    /// The most recent `count` lines are taken first (`0` = whole buffer),
    /// then narrowed by a case-insensitive keyword and by level.
    pub fn get_lines(
        &self,
        project: &str,
        count: usize,
        keyword: Option<&str>,
        level: Option<LogLevel>,
    ) -> Vec<LogLine> {
        let Some(buffer) = self.get(project) else {
            return Vec::new();
        };
        let keyword = keyword
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase);

        buffer
            .recent(count)
            .into_iter()
            .filter(|line| match &keyword {
                Some(k) => line.text.to_lowercase().contains(k.as_str()),
                None => true,
            })
            .filter(|line| level.map_or(true, |l| line.level == l))
            .collect()
    }

    pub fn clear(&self, project: &str) -> bool {
        match self.get(project) {
            Some(buffer) => {
                buffer.clear();
                true
            }
            None => false,
        }
    }

    pub fn projects(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buffers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

impl BacklogSource for LogStore {
    fn backlog(&self, channel: &Channel, limit: usize) -> Vec<HubItem> {
        match channel {
            Channel::Logs(project) => self
                .snapshot(project, limit, 0)
                .into_iter()
                .map(HubItem::Line)
                .collect(),
            Channel::Metrics => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ralph_foundation::{ChannelKind, HubConfig, StreamMessage};
    use std::time::Duration;

    fn texts(lines: &[LogLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_ring_eviction() {
        let buffer = LogBuffer::new("demo", 3);
        for text in ["A", "B", "C", "D"] {
            buffer.append(LogSource::Stdout, text);
        }
        assert_eq!(texts(&buffer.all()), vec!["B", "C", "D"]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_eviction_keeps_most_recent_in_order() {
        let buffer = LogBuffer::new("demo", 100);
        for i in 0..1000 {
            buffer.append(LogSource::Stdout, i.to_string());
        }
        let lines = buffer.all();
        assert_eq!(lines.len(), 100);
        assert_eq!(lines.first().unwrap().text, "900");
        assert_eq!(lines.last().unwrap().text, "999");
        assert!(lines.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[test]
    fn test_snapshot_offset_from_recent_end() {
        let buffer = LogBuffer::new("demo", 10);
        for i in 1..=8 {
            buffer.append(LogSource::Stdout, format!("l{}", i));
        }
        assert_eq!(texts(&buffer.snapshot(3, 0)), vec!["l6", "l7", "l8"]);
        assert_eq!(texts(&buffer.snapshot(3, 2)), vec!["l4", "l5", "l6"]);
        assert_eq!(texts(&buffer.snapshot(5, 6)), vec!["l1", "l2"]);
        assert!(buffer.snapshot(3, 20).is_empty());
    }

    #[test]
    fn test_clear_keeps_sequence() {
        let buffer = LogBuffer::new("demo", 10);
        buffer.append(LogSource::Stdout, "a");
        buffer.append(LogSource::Stdout, "b");
        buffer.clear();
        assert!(buffer.is_empty());
        let next = buffer.append(LogSource::Stdout, "c");
        assert_eq!(next.seq, 3);
    }

    #[test]
    fn test_concurrent_producers_get_unique_ordered_seqs() {
        let buffer = Arc::new(LogBuffer::new("demo", 10_000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        buffer.append(LogSource::Stdout, format!("{}-{}", t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let lines = buffer.all();
        assert_eq!(lines.len(), 1000);
        let seqs: Vec<u64> = lines.iter().map(|l| l.seq).collect();
        assert_eq!(seqs, (1..=1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_get_lines_filters() {
        let store = LogStore::new(100);
        store.append("demo", LogSource::Stdout, "[INFO] starting worker");
        store.append("demo", LogSource::Stdout, "[ERROR] Worker crashed");
        store.append("demo", LogSource::Stderr, "[ERROR] disk full");
        store.append("demo", LogSource::Stdout, "[INFO] worker restarted");

        let errors = store.get_lines("demo", 0, None, Some(LogLevel::Error));
        assert_eq!(errors.len(), 2);

        let worker = store.get_lines("demo", 0, Some("WORKER"), None);
        assert_eq!(worker.len(), 3);

        // Count applies before the filters.
        let recent = store.get_lines("demo", 2, Some("worker"), None);
        assert_eq!(texts(&recent), vec!["[INFO] worker restarted"]);

        assert!(store.get_lines("unknown", 10, None, None).is_empty());
    }

    #[test]
    fn test_store_clear_and_projects() {
        let store = LogStore::new(10);
        store.append("b", LogSource::Stdout, "x");
        store.append("a", LogSource::Stdout, "y");
        assert_eq!(store.projects(), vec!["a", "b"]);
        assert!(store.clear("a"));
        assert!(!store.clear("missing"));
        assert!(store.snapshot("a", 10, 0).is_empty());
        assert_eq!(store.snapshot("b", 10, 0).len(), 1);
    }

    #[tokio::test]
    async fn test_append_publishes_to_project_channel() {
        let hub = Arc::new(BroadcastHub::new(HubConfig {
            delivery_tick: Duration::ZERO,
            ..HubConfig::default()
        }));
        let store = Arc::new(LogStore::new(10).with_hub(Arc::clone(&hub)));
        hub.register_source(ChannelKind::Logs, &store);

        store.append("demo", LogSource::Stdout, "before attach");
        let mut sub = hub.attach(Channel::logs("demo"));
        let mut other = hub.attach(Channel::logs("other"));
        store.append("demo", LogSource::Stdout, "after attach");

        match sub.next().await.unwrap() {
            StreamMessage::LogHistory { lines, .. } => {
                assert_eq!(texts(&lines), vec!["before attach"])
            }
            other => panic!("unexpected frame {:?}", other),
        }
        match sub.next().await.unwrap() {
            StreamMessage::Log { lines, .. } => assert_eq!(texts(&lines), vec!["after attach"]),
            other => panic!("unexpected frame {:?}", other),
        }

        assert!(other.try_next().unwrap().is_backlog());
        assert!(other.try_next().is_none());
    }
}
