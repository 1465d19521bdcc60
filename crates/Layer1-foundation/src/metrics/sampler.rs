//! Sampler seam

use super::types::SystemMetrics;
use crate::Result;
use async_trait::async_trait;

/// Produces one host sample per tick.
///
/// Implementations live outside the engine (the binary ships a `/proc`
/// reader). A sampler that errors skips one tick; one that panics ends the
/// metrics feed without touching any log channel.
#[async_trait]
pub trait MetricsSampler: Send {
    fn name(&self) -> &str;

    async fn sample(&mut self) -> Result<SystemMetrics>;
}
