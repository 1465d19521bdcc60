//! Process supervision
//!
//! - [`ProcessSupervisor`]: per-project launch/pause/resume/stop state machine
//! - [`ProcessHandle`]: in-memory record of one launch
//! - [`SignalControl`]: POSIX signal capability, `Unsupported` elsewhere

mod handle;
mod signal;
mod supervisor;

pub use handle::{LaunchOptions, ProcessHandle, ProcessStatus};
pub use signal::{ProcessSignal, SignalControl};
pub use supervisor::{ProcessSupervisor, SupervisorConfig};
