//! Storage module for Ralph Dashboard
//!
//! - `json`: JSON file load/save for dashboard settings

mod json;

pub use json::JsonStore;
