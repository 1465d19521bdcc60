//! Event System - channel broadcast to subscriber sessions
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        BroadcastHub                          │
//! │                                                              │
//! │  LogBuffer.append ──┐                 ┌── Session (logs:a)   │
//! │                     ├─ publish(ch) ──►├── Session (logs:a)   │
//! │  MetricsRing.push ──┘                 └── Session (metrics)  │
//! │                                                              │
//! │  attach(ch): register ─► backlog snapshot ─► live delivery   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each session has a bounded queue. Log channels drop the oldest queued
//! item on overflow and drop the whole session once it has lost a full
//! queue without draining; the metrics channel drops the session on the
//! first overflow.

pub mod hub;
pub mod types;

pub use hub::{BacklogSource, BroadcastHub, CloseReason, HubConfig, SessionId, Subscription};
pub use types::{Channel, ChannelKind, HubItem, Notice, NoticeKind, StreamMessage};
