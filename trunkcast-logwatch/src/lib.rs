//! Control channel log tailing for trunkcast
//!
//! The decoder writes free-text log lines describing control channel activity.
//! This crate turns those lines into typed [`ControlChannelEvent`]s:
//!
//! - [`parser::parse_line`] is a pure line → event mapping
//! - [`LogWatcher`] follows a growing (and possibly rotating) log file and
//!   emits parsed events in file order
//!
//! ```text
//! log file ──> LogWatcher (tail loop) ──> parse_line ──> LogEvents
//!                 ▲      │
//!          notify │      └── reopen on missing/rotated file
//! ```

pub mod error;
pub mod event;
pub mod parser;
pub mod watcher;

pub use error::{LogWatchError, Result};
pub use event::{ControlChannelEvent, EventKind};
pub use parser::parse_line;
pub use watcher::{LogEvents, LogWatcher, LogWatcherConfig, WatcherState};
