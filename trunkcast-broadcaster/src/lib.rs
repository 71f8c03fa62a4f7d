//! Real-time call and spectrum broadcaster for trunkcast viewers
//!
//! Maintains the set of connected viewer clients and delivers filtered,
//! framed messages to each of them without letting a slow client hold up
//! anyone else.
//!
//! # Features
//!
//! - WebSocket server (`/ws`) via axum
//! - Per-client talkgroup subscriptions (empty set = every talkgroup)
//! - Audio/spectrum opt-in per client
//! - JSON control messages encoded once per broadcast
//! - Length-prefixed binary frames for audio and FFT data
//! - New client catch-up (last `callsActive` and `rates`)
//!
//! # Delivery Policy
//!
//! | Message | Talkgroup filter | Needs audio opt-in |
//! |---------|------------------|--------------------|
//! | `callStart` / `callEnd` | yes | no |
//! | `newRecording` | yes | yes |
//! | `callsActive` / `rates` | no | no |
//! | audio frame | yes | yes |
//! | FFT frame | no | yes |
//!
//! # Example Usage
//!
//! ```no_run
//! use trunkcast_broadcaster::{BroadcastHub, HubMessage, HubServer};
//! use trunkcast_model::Call;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = BroadcastHub::new(256);
//!     let server = HubServer::new("0.0.0.0:3000".parse()?, hub.clone());
//!     server.start().await?;
//!
//!     let call = Call::new("0_3219_1700000000", 3219, 771_356_250, chrono::Utc::now());
//!     hub.broadcast(&HubMessage::CallStart { call })?;
//!
//!     println!("{} viewers", hub.connection_count());
//!     server.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod events;
pub mod frame;
pub mod hub;
pub mod server;
pub mod subscriber;

// Re-exports
pub use error::{BroadcasterError, Result};
pub use events::{ClientMessage, Delivery, HubMessage};
pub use frame::{decode_binary_frame, encode_binary_frame};
pub use hub::{BroadcastHub, Connection, DeliveryStats};
pub use server::HubServer;
pub use subscriber::{ClientId, Frame, SubscriberInfo, TalkgroupFilter};
