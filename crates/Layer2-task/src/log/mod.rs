//! Log aggregation
//!
//! Process output and tailed log files land in one bounded [`LogBuffer`] per
//! project. Every append is published to the project's `logs:{project}`
//! channel on the broadcast hub.

mod buffer;
mod file;
mod parse;
mod watcher;

pub use buffer::{LogBuffer, LogStore, DEFAULT_MAX_LINES};
pub use file::{find_log_files, read_log_file};
pub use parse::{decode_line, parse_level};
pub use watcher::{LogFileWatcher, WatcherConfig};
