//! Core data model shared by the engine and the transport
//!
//! - `types.rs` - log line, source and level

pub mod types;

pub use types::{LogLevel, LogLine, LogSource};
