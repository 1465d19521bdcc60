//! # ralph-foundation
//!
//! Foundation layer for Ralph Dashboard:
//! - Error: one error taxonomy for every layer
//! - Config: DashboardConfig persisted through JsonStore
//! - Core: log line model
//! - Metrics: host sample model, MetricsRing, sampler seam
//! - Event: BroadcastHub and subscriber sessions
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  ralph-dashboard (axum transport, /proc sampler)        │
//! │                     │                                   │
//! │                     ▼                                   │
//! │  ralph-task (supervisor, log buffers, file watchers)    │
//! │                     │                                   │
//! │                     ▼                                   │
//! │  ralph-foundation (hub, ring, config, errors)           │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod metrics;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Core
// ============================================================================
pub use self::core::{LogLevel, LogLine, LogSource};

// ============================================================================
// Config
// ============================================================================
pub use config::{DashboardConfig, CONFIG_FILE};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;

// ============================================================================
// Metrics
// ============================================================================
pub use metrics::{
    CpuMetrics, DiskMetrics, GpuMetrics, MemoryMetrics, MetricsHistory, MetricsRing,
    MetricsSample, MetricsSampler, SystemMetrics, DEFAULT_METRICS_CAPACITY,
};

// ============================================================================
// Event
// ============================================================================
pub use event::{
    BacklogSource, BroadcastHub, Channel, ChannelKind, CloseReason, HubConfig, HubItem, Notice,
    NoticeKind, SessionId, StreamMessage, Subscription,
};
