//! Metrics feed - drives a sampler into the metrics ring

use ralph_foundation::{MetricsRing, MetricsSampler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Background task sampling the host once per interval.
///
/// A failed sample skips that tick. A panicking sampler ends the feed only;
/// log channels and processes are unaffected.
pub struct MetricsFeed {
    sampler: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MetricsFeed {
    pub fn spawn<S>(mut sampler: S, ring: Arc<MetricsRing>, interval: Duration) -> Self
    where
        S: MetricsSampler + 'static,
    {
        let name = sampler.name().to_string();
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let interval = interval.max(Duration::from_millis(10));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut failures = 0u32;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                match sampler.sample().await {
                    Ok(metrics) => {
                        failures = 0;
                        ring.push(metrics);
                    }
                    Err(e) => {
                        failures += 1;
                        // Only the first of a run of failures is worth a warning.
                        if failures == 1 {
                            warn!("Metrics sampler {} failed: {}", sampler.name(), e);
                        } else {
                            debug!("Metrics sampler {} failed ({}x): {}", sampler.name(), failures, e);
                        }
                    }
                }
            }
            debug!("Metrics feed {} stopped", sampler.name());
        });

        info!("Metrics feed started: {} every {:?}", name, interval);
        Self {
            sampler: name,
            stop_tx,
            task,
        }
    }

    pub fn sampler(&self) -> &str {
        &self.sampler
    }

    /// `false` once stopped or after the sampler panicked.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        match self.task.await {
            Ok(()) => {}
            Err(e) if e.is_panic() => warn!("Metrics feed {} had panicked", self.sampler),
            Err(e) => debug!("Metrics feed {} join error: {}", self.sampler, e),
        }
    }
}

impl std::fmt::Debug for MetricsFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsFeed")
            .field("sampler", &self.sampler)
            .field("running", &self.is_running())
            .finish()
    }
}
