//! Metrics Ring - bounded sample history

use super::types::{MetricsHistory, MetricsSample, SystemMetrics};
use crate::event::{BacklogSource, BroadcastHub, Channel, HubItem};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// One hour at the default 1s sampling interval
pub const DEFAULT_METRICS_CAPACITY: usize = 3600;

#[derive(Debug)]
struct RingState {
    samples: VecDeque<MetricsSample>,
    next_seq: u64,
}

/// Fixed-capacity ring of host samples.
///
/// Timestamps never go backwards: a sample older than the newest one is
/// clamped to the newest timestamp. Every push is republished on the
/// `metrics` channel while the ring lock is held, so subscribers observe
/// samples in sequence order.
pub struct MetricsRing {
    capacity: usize,
    state: Mutex<RingState>,
    hub: Option<Arc<BroadcastHub>>,
}

impl MetricsRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(RingState {
                samples: VecDeque::with_capacity(capacity.min(DEFAULT_METRICS_CAPACITY)),
                next_seq: 1,
            }),
            hub: None,
        }
    }

    /// Publish every pushed sample through `hub`.
    pub fn with_hub(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&self, mut metrics: SystemMetrics) -> MetricsSample {
        let mut state = self.state.lock();

        if let Some(newest) = state.samples.back() {
            if metrics.timestamp < newest.metrics.timestamp {
                warn!(
                    "Metrics sample timestamp {} is older than {}, clamping",
                    metrics.timestamp, newest.metrics.timestamp
                );
                metrics.timestamp = newest.metrics.timestamp;
            }
        }

        let sample = MetricsSample {
            seq: state.next_seq,
            metrics,
        };
        state.next_seq += 1;

        if state.samples.len() >= self.capacity {
            state.samples.pop_front();
        }
        state.samples.push_back(sample.clone());

        if let Some(hub) = &self.hub {
            hub.publish(&Channel::Metrics, HubItem::Metrics(sample.clone()));
        }

        sample
    }

    pub fn len(&self) -> usize {
        self.state.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().samples.is_empty()
    }

    pub fn latest(&self) -> Option<SystemMetrics> {
        self.state.lock().samples.back().map(|s| s.metrics.clone())
    }

    /// Up to `limit` most recent samples, oldest first.
    pub fn snapshot(&self, limit: usize) -> Vec<MetricsSample> {
        let state = self.state.lock();
        let skip = state.samples.len().saturating_sub(limit);
        state.samples.iter().skip(skip).cloned().collect()
    }

    /// Column view of the samples taken within `window` of now.
    pub fn history(&self, window: Duration) -> MetricsHistory {
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| Utc::now().checked_sub_signed(w));

        let state = self.state.lock();
        let mut history = MetricsHistory::default();
        for sample in state.samples.iter() {
            if cutoff.map_or(true, |c| sample.metrics.timestamp >= c) {
                history.push(&sample.metrics);
            }
        }
        history
    }
}

impl Default for MetricsRing {
    fn default() -> Self {
        Self::new(DEFAULT_METRICS_CAPACITY)
    }
}

impl BacklogSource for MetricsRing {
    fn backlog(&self, channel: &Channel, limit: usize) -> Vec<HubItem> {
        match channel {
            Channel::Metrics => self.snapshot(limit).into_iter().map(HubItem::Metrics).collect(),
            Channel::Logs(_) => Vec::new(),
        }
    }
}
