//! Host metrics - sample model, bounded history ring and sampler seam
//!
//! The engine never measures anything itself: a [`MetricsSampler`] yields one
//! [`SystemMetrics`] per tick, the feed pushes it into the [`MetricsRing`], and
//! the ring republishes it on the `metrics` channel.

pub mod ring;
pub mod sampler;
pub mod types;

pub use ring::{MetricsRing, DEFAULT_METRICS_CAPACITY};
pub use sampler::MetricsSampler;
pub use types::{
    CpuMetrics, DiskMetrics, GpuMetrics, MemoryMetrics, MetricsHistory, MetricsSample,
    SystemMetrics,
};
