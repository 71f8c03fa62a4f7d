//! Status channel listener for trunkcast
//!
//! The decoding process dials in over a WebSocket and pushes JSON status
//! messages (`call_start`, `call_end`, `calls_active`, `rates`, `systems`,
//! `recorders`). Exactly one producer is served at a time; every recognized
//! message becomes a normalized [`StatusEvent`].
//!
//! # Example Usage
//!
//! ```no_run
//! use trunkcast_status::{server, StatusChannelListener};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (listener, mut events) = StatusChannelListener::new();
//!     tokio::spawn(server::serve("127.0.0.1:3010".parse()?, listener));
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod listener;
pub mod messages;
pub mod server;

pub use error::{Result, StatusError};
pub use listener::{ProducerSession, StatusChannelListener, StatusEvent};
pub use messages::{DecodeError, StatusMessage};
