//! trunkcast daemon
//!
//! Wires the ingestion components (decoder log tail, status channel, spectrum
//! replayer) to the consumers (viewer hub, call store, dispatch console), and
//! exposes a Unix socket for replay and capture control.

pub mod capture;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod ipc;
pub mod routing;

pub use capture::{CaptureStatus, SpectrumCapture};
pub use config::DaemonConfig;
pub use daemon::{Daemon, DaemonStatus};
pub use dispatch::{DispatchBridge, DispatchCommand};
pub use ipc::{IpcCommand, IpcServer};
pub use routing::EventRouter;
