//! # ralph-task
//!
//! Process lifecycle and streaming engine for Ralph Dashboard.
//! Supervises agent processes per project, aggregates their output and log
//! files, and feeds the broadcast hub that streams both to dashboard clients.
//!
//! ## Features
//!
//! - launch / pause / resume / stop state machine per project
//! - bounded per-project log buffers fed by stdout, stderr and tailed files
//! - log file tailing that survives truncation, rotation and deletion
//! - host metrics feed into a fixed-size ring
//! - **one [`Engine`] facade for the transport layer**

pub mod command;
pub mod engine;
pub mod feed;
pub mod log;
pub mod process;
pub mod registry;
pub mod state;

// Engine
pub use engine::{Engine, EngineConfig};
pub use feed::MetricsFeed;

// Process system
pub use command::{CommandBuilder, CommandSpec, RalphCommandBuilder};
pub use process::{
    LaunchOptions, ProcessHandle, ProcessSignal, ProcessStatus, ProcessSupervisor, SignalControl,
    SupervisorConfig,
};
pub use registry::{DirectoryRegistry, ProjectRegistry};
pub use state::ProjectState;

// Log system
pub use log::{
    find_log_files, parse_level, read_log_file, LogBuffer, LogFileWatcher, LogStore,
    WatcherConfig,
};
