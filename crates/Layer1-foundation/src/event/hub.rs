//! Broadcast Hub - per-channel fan-out to subscriber sessions
//!
//! Producers call [`BroadcastHub::publish`] synchronously; it never awaits and
//! never blocks on a slow consumer. Each attached session owns a bounded
//! queue. The transport drives a [`Subscription`] to pull frames off it.

use super::types::{Channel, ChannelKind, HubItem, Notice, StreamMessage};
use crate::config::DashboardConfig;
use crate::core::LogLine;
use crate::metrics::DEFAULT_METRICS_CAPACITY;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

// ============================================================================
// BacklogSource
// ============================================================================

/// Buffer a channel replays from when a session attaches
pub trait BacklogSource: Send + Sync {
    /// Up to `limit` most recent items of `channel`, oldest first.
    fn backlog(&self, channel: &Channel, limit: usize) -> Vec<HubItem>;
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Bound of each session's outbound queue
    pub queue_capacity: usize,
    /// Coalescing window for live log batches
    pub delivery_tick: Duration,
    /// Lines replayed on attach to a log channel
    pub log_backlog: usize,
    /// Samples replayed on attach to the metrics channel
    pub metrics_backlog: usize,
    /// Advertised to dropped sessions as the reattach delay
    pub reconnect_backoff: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 512,
            delivery_tick: Duration::from_millis(100),
            log_backlog: 200,
            metrics_backlog: DEFAULT_METRICS_CAPACITY,
            reconnect_backoff: Duration::from_secs(2),
        }
    }
}

impl From<&DashboardConfig> for HubConfig {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            queue_capacity: config.subscriber_queue.max(1),
            delivery_tick: config.delivery_tick(),
            log_backlog: config.log_backlog_lines,
            metrics_backlog: config.metrics_history,
            reconnect_backoff: Duration::from_millis(config.reconnect_backoff_ms),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Why a session stopped receiving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Detached,
    Overloaded,
    Shutdown,
}

#[derive(Debug, Default)]
struct SessionState {
    queue: VecDeque<HubItem>,
    /// Items evicted since the consumer last drained the queue
    evicted: usize,
    closed: Option<CloseReason>,
    /// Highest sequence included in the backlog replay
    replay_until: Option<u64>,
}

enum Offer {
    Queued,
    Closed,
    Overloaded,
}

/// State shared between the hub (weakly) and the subscription (strongly)
struct SessionShared {
    id: SessionId,
    channel: Channel,
    attached_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    notify: Notify,
}

impl SessionShared {
    fn offer(&self, item: HubItem, capacity: usize) -> Offer {
        let mut state = self.state.lock();
        if state.closed.is_some() {
            return Offer::Closed;
        }

        if state.queue.len() >= capacity {
            let stalled = match self.channel.kind() {
                ChannelKind::Logs => {
                    state.queue.pop_front();
                    state.evicted += 1;
                    state.evicted >= capacity
                }
                ChannelKind::Metrics => true,
            };
            if stalled {
                state.queue.clear();
                state.closed = Some(CloseReason::Overloaded);
                drop(state);
                self.notify.notify_one();
                return Offer::Overloaded;
            }
        }

        state.queue.push_back(item);
        drop(state);
        self.notify.notify_one();
        Offer::Queued
    }

    /// First reason wins; later closes are no-ops.
    fn close(&self, reason: CloseReason) -> bool {
        let mut state = self.state.lock();
        if state.closed.is_some() {
            return false;
        }
        state.closed = Some(reason);
        state.queue.clear();
        drop(state);
        self.notify.notify_one();
        true
    }
}

// ============================================================================
// BroadcastHub
// ============================================================================

/// Registry of subscriber sessions per channel.
///
/// Holds sessions weakly: a session that is dropped without detaching is
/// pruned on the next publish to its channel, and an empty channel entry is
/// removed with it.
pub struct BroadcastHub {
    config: HubConfig,
    channels: RwLock<HashMap<Channel, HashMap<SessionId, Weak<SessionShared>>>>,
    sources: RwLock<HashMap<ChannelKind, Weak<dyn BacklogSource>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            channels: RwLock::new(HashMap::new()),
            sources: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Set the buffer that backs every channel of `kind`.
    pub fn register_source<S: BacklogSource + 'static>(&self, kind: ChannelKind, source: &Arc<S>) {
        let weak: Weak<S> = Arc::downgrade(source);
        let weak: Weak<dyn BacklogSource> = weak;
        self.sources.write().insert(kind, weak);
    }

    /// Attach a new session to `channel`.
    ///
    /// The session is registered before the backlog snapshot is taken, and
    /// live items whose sequence is covered by the snapshot are discarded on
    /// delivery. The backlog frame is always the first one the subscription
    /// yields, so no line is lost, repeated or reordered across the seam.
    pub fn attach(self: &Arc<Self>, channel: Channel) -> Subscription {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let shared = Arc::new(SessionShared {
            id,
            channel: channel.clone(),
            attached_at: Utc::now(),
            state: Mutex::new(SessionState::default()),
            notify: Notify::new(),
        });

        self.channels
            .write()
            .entry(channel.clone())
            .or_default()
            .insert(id, Arc::downgrade(&shared));

        let items = self.backlog_items(&channel);
        shared.state.lock().replay_until = items.iter().filter_map(HubItem::seq).max();
        let backlog = backlog_message(&channel, items);

        debug!("{} attached to {}", id, channel);

        Subscription {
            shared,
            hub: Arc::downgrade(self),
            backlog: Some(backlog),
            pending: VecDeque::new(),
            delivery_tick: self.config.delivery_tick,
            reconnect_backoff: self.config.reconnect_backoff,
            finished: false,
            close_reason: None,
        }
    }

    fn backlog_items(&self, channel: &Channel) -> Vec<HubItem> {
        let source = self
            .sources
            .read()
            .get(&channel.kind())
            .and_then(Weak::upgrade);
        let limit = match channel.kind() {
            ChannelKind::Logs => self.config.log_backlog,
            ChannelKind::Metrics => self.config.metrics_backlog,
        };
        match source {
            Some(source) => source.backlog(channel, limit),
            None => Vec::new(),
        }
    }

    /// Offer `item` to every session of `channel`. Returns how many sessions
    /// queued it.
    pub fn publish(&self, channel: &Channel, item: HubItem) -> usize {
        let (targets, mut stale) = {
            let channels = self.channels.read();
            let Some(sessions) = channels.get(channel) else {
                return 0;
            };
            let mut targets = Vec::with_capacity(sessions.len());
            let mut stale = Vec::new();
            for (id, weak) in sessions {
                match weak.upgrade() {
                    Some(session) => targets.push(session),
                    None => stale.push(*id),
                }
            }
            (targets, stale)
        };

        let mut delivered = 0;
        for session in targets {
            match session.offer(item.clone(), self.config.queue_capacity) {
                Offer::Queued => delivered += 1,
                Offer::Closed => stale.push(session.id),
                Offer::Overloaded => {
                    warn!("{} on {} fell behind, dropping it", session.id, channel);
                    stale.push(session.id);
                }
            }
        }

        if !stale.is_empty() {
            self.remove_sessions(channel, &stale);
        }
        delivered
    }

    fn remove_sessions(&self, channel: &Channel, ids: &[SessionId]) {
        let mut channels = self.channels.write();
        if let Some(sessions) = channels.get_mut(channel) {
            for id in ids {
                sessions.remove(id);
            }
            if sessions.is_empty() {
                channels.remove(channel);
            }
        }
    }

    /// Remove a session from the registry. Idempotent.
    pub fn detach(&self, channel: &Channel, id: SessionId) -> bool {
        let removed = {
            let mut channels = self.channels.write();
            let removed = channels.get_mut(channel).and_then(|s| s.remove(&id));
            if channels.get(channel).map_or(false, HashMap::is_empty) {
                channels.remove(channel);
            }
            removed
        };

        match removed {
            Some(weak) => {
                if let Some(session) = weak.upgrade() {
                    session.close(CloseReason::Detached);
                }
                debug!("{} detached from {}", id, channel);
                true
            }
            None => false,
        }
    }

    /// Live sessions on `channel`.
    pub fn session_count(&self, channel: &Channel) -> usize {
        self.channels
            .read()
            .get(channel)
            .map(|s| s.values().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.channels.read().keys().cloned().collect()
    }

    /// Close every session; their subscriptions end after this.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.channels.write().drain().collect();
        let mut closed = 0;
        for (_, sessions) in drained {
            for session in sessions.values().filter_map(Weak::upgrade) {
                if session.close(CloseReason::Shutdown) {
                    closed += 1;
                }
            }
        }
        debug!("Broadcast hub closed {} sessions", closed);
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// The consumer end of one session, owned by the transport.
///
/// Dropping it detaches the session.
pub struct Subscription {
    shared: Arc<SessionShared>,
    hub: Weak<BroadcastHub>,
    backlog: Option<StreamMessage>,
    pending: VecDeque<StreamMessage>,
    delivery_tick: Duration,
    reconnect_backoff: Duration,
    finished: bool,
    close_reason: Option<CloseReason>,
}

impl Subscription {
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn channel(&self) -> &Channel {
        &self.shared.channel
    }

    pub fn attached_at(&self) -> DateTime<Utc> {
        self.shared.attached_at
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    /// `Err(SubscriberOverloaded)` once the hub has dropped this session for
    /// falling behind.
    pub fn health(&self) -> Result<()> {
        let overloaded = self.close_reason == Some(CloseReason::Overloaded)
            || self.shared.state.lock().closed == Some(CloseReason::Overloaded);
        if overloaded {
            Err(Error::SubscriberOverloaded(self.shared.channel.to_string()))
        } else {
            Ok(())
        }
    }

    /// Next frame: the backlog first, then live batches. `None` once the
    /// session is closed and everything deliverable has been yielded.
    pub async fn next(&mut self) -> Option<StreamMessage> {
        if let Some(backlog) = self.backlog.take() {
            return Some(backlog);
        }
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Some(message);
            }
            if self.finished {
                return None;
            }
            if self.collect() {
                continue;
            }

            self.shared.notify.notified().await;
            if !self.delivery_tick.is_zero() && self.shared.channel.kind() == ChannelKind::Logs {
                tokio::time::sleep(self.delivery_tick).await;
            }
        }
    }

    /// Non-blocking variant of [`next`](Self::next).
    pub fn try_next(&mut self) -> Option<StreamMessage> {
        if let Some(backlog) = self.backlog.take() {
            return Some(backlog);
        }
        if self.pending.is_empty() && !self.finished {
            self.collect();
        }
        self.pending.pop_front()
    }

    fn collect(&mut self) -> bool {
        let (items, replay_until, closed) = {
            let mut state = self.shared.state.lock();
            if state.queue.is_empty() && state.closed.is_none() {
                return false;
            }
            state.evicted = 0;
            (
                std::mem::take(&mut state.queue),
                state.replay_until,
                state.closed,
            )
        };

        self.pending
            .extend(coalesce(&self.shared.channel, items, replay_until));

        if let Some(reason) = closed {
            self.finished = true;
            self.close_reason = Some(reason);
            if reason == CloseReason::Overloaded {
                let retry_after_ms = self.reconnect_backoff.as_millis() as u64;
                self.pending.push_back(StreamMessage::Notice(Notice::overloaded(
                    &self.shared.channel,
                    retry_after_ms,
                )));
            }
        }
        true
    }

    /// Stop receiving and leave the hub. Idempotent.
    pub fn detach(&mut self) -> bool {
        self.backlog = None;
        self.pending.clear();
        self.finished = true;
        if self.shared.close(CloseReason::Detached) {
            self.close_reason = Some(CloseReason::Detached);
        }
        match self.hub.upgrade() {
            Some(hub) => hub.detach(&self.shared.channel, self.shared.id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.shared.id)
            .field("channel", &self.shared.channel)
            .field("finished", &self.finished)
            .finish()
    }
}

fn backlog_message(channel: &Channel, items: Vec<HubItem>) -> StreamMessage {
    match channel {
        Channel::Logs(project) => StreamMessage::LogHistory {
            project: project.clone(),
            lines: items
                .into_iter()
                .filter_map(|item| match item {
                    HubItem::Line(line) => Some(line),
                    _ => None,
                })
                .collect(),
        },
        Channel::Metrics => StreamMessage::MetricsHistory {
            samples: items
                .into_iter()
                .filter_map(|item| match item {
                    HubItem::Metrics(sample) => Some(sample.metrics),
                    _ => None,
                })
                .collect(),
        },
    }
}

/// Turn queued items into frames, merging consecutive lines into one batch.
fn coalesce(
    channel: &Channel,
    items: VecDeque<HubItem>,
    replay_until: Option<u64>,
) -> Vec<StreamMessage> {
    let project = channel.project().unwrap_or_default();
    let mut frames = Vec::new();
    let mut batch: Vec<LogLine> = Vec::new();

    let flush = |frames: &mut Vec<StreamMessage>, batch: &mut Vec<LogLine>| {
        if !batch.is_empty() {
            frames.push(StreamMessage::Log {
                project: project.to_string(),
                lines: std::mem::take(batch),
            });
        }
    };

    for item in items {
        if let (Some(seq), Some(until)) = (item.seq(), replay_until) {
            if seq <= until {
                continue;
            }
        }
        match item {
            HubItem::Line(line) => batch.push(line),
            HubItem::Metrics(sample) => {
                flush(&mut frames, &mut batch);
                frames.push(StreamMessage::Metrics {
                    data: sample.metrics,
                });
            }
            HubItem::Notice(notice) => {
                flush(&mut frames, &mut batch);
                frames.push(StreamMessage::Notice(notice));
            }
        }
    }
    flush(&mut frames, &mut batch);
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogLevel, LogSource};
    use crate::event::NoticeKind;
    use crate::metrics::{MetricsSample, SystemMetrics};

    fn line(seq: u64, text: &str) -> LogLine {
        LogLine {
            seq,
            timestamp: Utc::now(),
            source: LogSource::Stdout,
            level: LogLevel::Info,
            text: text.to_string(),
        }
    }

    fn test_hub(capacity: usize) -> Arc<BroadcastHub> {
        Arc::new(BroadcastHub::new(HubConfig {
            queue_capacity: capacity,
            delivery_tick: Duration::ZERO,
            ..HubConfig::default()
        }))
    }

    struct FixedSource(Vec<HubItem>);

    impl BacklogSource for FixedSource {
        fn backlog(&self, _channel: &Channel, limit: usize) -> Vec<HubItem> {
            let skip = self.0.len().saturating_sub(limit);
            self.0.iter().skip(skip).cloned().collect()
        }
    }

    fn live_texts(sub: &mut Subscription) -> Vec<String> {
        let mut texts = Vec::new();
        while let Some(message) = sub.try_next() {
            if let StreamMessage::Log { lines, .. } = message {
                texts.extend(lines.into_iter().map(|l| l.text));
            }
        }
        texts
    }

    #[tokio::test]
    async fn test_two_subscribers_same_order() {
        let hub = test_hub(64);
        let channel = Channel::logs("demo");
        let mut a = hub.attach(channel.clone());
        let mut b = hub.attach(channel.clone());

        for seq in 1..=5 {
            assert_eq!(hub.publish(&channel, HubItem::Line(line(seq, &format!("l{}", seq)))), 2);
        }

        for sub in [&mut a, &mut b] {
            let backlog = sub.next().await.unwrap();
            assert_eq!(
                backlog,
                StreamMessage::LogHistory {
                    project: "demo".into(),
                    lines: vec![]
                }
            );
            match sub.next().await.unwrap() {
                StreamMessage::Log { lines, .. } => {
                    let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
                    assert_eq!(texts, vec!["l1", "l2", "l3", "l4", "l5"]);
                }
                other => panic!("unexpected frame {:?}", other),
            }
        }
    }

    #[test]
    fn test_fan_out_is_per_channel() {
        let hub = test_hub(64);
        let mut a = hub.attach(Channel::logs("a"));
        let mut b = hub.attach(Channel::logs("b"));
        let mut metrics = hub.attach(Channel::Metrics);

        hub.publish(&Channel::logs("a"), HubItem::Line(line(1, "only for a")));

        assert_eq!(live_texts(&mut a), vec!["only for a"]);
        assert!(live_texts(&mut b).is_empty());
        assert!(matches!(
            metrics.try_next(),
            Some(StreamMessage::MetricsHistory { .. })
        ));
        assert!(metrics.try_next().is_none());
    }

    #[test]
    fn test_backlog_then_live_without_duplicates() {
        let hub = test_hub(64);
        let source = Arc::new(FixedSource(vec![
            HubItem::Line(line(1, "one")),
            HubItem::Line(line(2, "two")),
            HubItem::Line(line(3, "three")),
        ]));
        hub.register_source(ChannelKind::Logs, &source);

        let channel = Channel::logs("demo");
        let mut sub = hub.attach(channel.clone());

        // Line 3 raced the snapshot: it is both in the backlog and queued live.
        hub.publish(&channel, HubItem::Line(line(3, "three")));
        hub.publish(&channel, HubItem::Line(line(4, "four")));

        match sub.try_next() {
            Some(StreamMessage::LogHistory { lines, .. }) => {
                let seqs: Vec<u64> = lines.iter().map(|l| l.seq).collect();
                assert_eq!(seqs, vec![1, 2, 3]);
            }
            other => panic!("expected backlog first, got {:?}", other),
        }
        assert_eq!(live_texts(&mut sub), vec!["four"]);
    }

    #[test]
    fn test_backlog_respects_limit() {
        let hub = Arc::new(BroadcastHub::new(HubConfig {
            log_backlog: 2,
            ..HubConfig::default()
        }));
        let source = Arc::new(FixedSource(
            (1..=5).map(|i| HubItem::Line(line(i, "x"))).collect(),
        ));
        hub.register_source(ChannelKind::Logs, &source);

        let mut sub = hub.attach(Channel::logs("demo"));
        match sub.try_next() {
            Some(StreamMessage::LogHistory { lines, .. }) => {
                assert_eq!(lines.iter().map(|l| l.seq).collect::<Vec<_>>(), vec![4, 5]);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_stalled_subscriber_is_dropped_without_blocking_others() {
        let hub = test_hub(4);
        let channel = Channel::logs("demo");
        let mut slow = hub.attach(channel.clone());
        let mut fast = hub.attach(channel.clone());
        fast.try_next();

        let mut received = Vec::new();
        for seq in 1..=20 {
            hub.publish(&channel, HubItem::Line(line(seq, &seq.to_string())));
            received.extend(live_texts(&mut fast));
        }

        assert_eq!(received.len(), 20);
        assert_eq!(hub.session_count(&channel), 1);

        assert!(matches!(
            slow.try_next(),
            Some(StreamMessage::LogHistory { .. })
        ));
        match slow.try_next() {
            Some(StreamMessage::Notice(notice)) => {
                assert_eq!(notice.kind, NoticeKind::Overloaded);
                assert_eq!(notice.retry_after_ms, Some(2000));
            }
            other => panic!("expected overloaded notice, got {:?}", other),
        }
        assert!(slow.try_next().is_none());
        assert_eq!(slow.close_reason(), Some(CloseReason::Overloaded));
        assert!(matches!(slow.health(), Err(Error::SubscriberOverloaded(_))));
        assert!(fast.health().is_ok());
    }

    #[test]
    fn test_log_overflow_drops_oldest_before_stalling() {
        let hub = test_hub(4);
        let channel = Channel::logs("demo");
        let mut sub = hub.attach(channel.clone());
        sub.try_next();

        for seq in 1..=6 {
            hub.publish(&channel, HubItem::Line(line(seq, &seq.to_string())));
        }

        assert_eq!(live_texts(&mut sub), vec!["3", "4", "5", "6"]);
        assert!(sub.health().is_ok());
        assert_eq!(hub.session_count(&channel), 1);
    }

    #[test]
    fn test_metrics_overflow_drops_session() {
        let hub = test_hub(2);
        let mut sub = hub.attach(Channel::Metrics);

        for seq in 1..=3 {
            hub.publish(
                &Channel::Metrics,
                HubItem::Metrics(MetricsSample {
                    seq,
                    metrics: SystemMetrics::now(),
                }),
            );
        }

        assert_eq!(hub.session_count(&Channel::Metrics), 0);
        sub.try_next();
        assert!(matches!(
            sub.try_next(),
            Some(StreamMessage::Notice(Notice {
                kind: NoticeKind::Overloaded,
                ..
            }))
        ));
    }

    #[test]
    fn test_detach_is_idempotent_and_drop_detaches() {
        let hub = test_hub(8);
        let channel = Channel::logs("demo");

        let mut sub = hub.attach(channel.clone());
        let id = sub.id();
        assert!(sub.detach());
        assert!(!sub.detach());
        assert!(!hub.detach(&channel, id));
        assert_eq!(hub.publish(&channel, HubItem::Line(line(1, "late"))), 0);
        assert!(sub.try_next().is_none());

        let dropped = hub.attach(channel.clone());
        assert_eq!(hub.session_count(&channel), 1);
        drop(dropped);
        assert_eq!(hub.session_count(&channel), 0);
        assert!(hub.channels().is_empty());
    }

    #[tokio::test]
    async fn test_close_all_ends_subscriptions() {
        let hub = test_hub(8);
        let mut sub = hub.attach(Channel::Metrics);
        assert!(sub.next().await.unwrap().is_backlog());

        hub.close_all();
        let next = tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .unwrap();
        assert!(next.is_none());
        assert_eq!(sub.close_reason(), Some(CloseReason::Shutdown));
    }

    #[tokio::test]
    async fn test_next_wakes_on_publish() {
        let hub = test_hub(8);
        let channel = Channel::logs("demo");
        let mut sub = hub.attach(channel.clone());
        sub.next().await;

        let publisher = {
            let hub = Arc::clone(&hub);
            let channel = channel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                hub.publish(&channel, HubItem::Line(line(1, "wake")));
            })
        };

        let frame = tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .unwrap()
            .unwrap();
        publisher.await.unwrap();
        assert!(matches!(frame, StreamMessage::Log { ref lines, .. } if lines[0].text == "wake"));
    }
}
