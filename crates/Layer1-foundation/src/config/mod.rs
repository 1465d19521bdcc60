//! Config - dashboard settings
//!
//! - `dashboard.rs` - DashboardConfig, persisted through JsonStore

mod dashboard;

pub use dashboard::{DashboardConfig, CONFIG_FILE};
