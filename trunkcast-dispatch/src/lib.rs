//! Legacy dispatch console protocol
//!
//! Lets third-party dispatch consoles follow the same call stream the
//! viewers see. Two independent channels are produced:
//!
//! - **Metadata** (TCP): 16-byte header + ENDPOINT_INFO / ENDPOINT_UPDATE
//!   payloads with TLV descriptors ([`metadata`])
//! - **Audio** (UDP): 12-byte RTP header + G.711 mu-law payload
//!   ([`rtp`], [`mulaw`])
//!
//! The encoders are pure functions over bytes. [`DispatchSession`] owns the
//! sockets and the per-call session/sequence counters.
//!
//! # Example Usage
//!
//! ```no_run
//! use trunkcast_dispatch::{DispatchConfig, DispatchSession};
//! use trunkcast_model::{AudioPacket, Call};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = DispatchSession::new(DispatchConfig {
//!         host: "10.0.0.20".into(),
//!         port: 5000,
//!         endpoint_name: "Scanner".into(),
//!         audio_direction: Default::default(),
//!     });
//!     session.connect().await?;
//!
//!     let call = Call::new("0_3219_1700000000", 3219, 771_356_250, chrono::Utc::now());
//!     session.call_start(&call, Some(1234567)).await?;
//!     session.send_audio(&AudioPacket::new(3219, vec![0; 320])).await?;
//!     session.call_end(&call.id);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod metadata;
pub mod mulaw;
pub mod rtp;
pub mod session;

pub use error::{DispatchError, Result};
pub use metadata::{
    encode_message, AudioDirection, EndpointInfo, EndpointUpdate, MessageType, MetadataHeader,
    MetadataPayload, UpdateType,
};
pub use mulaw::{encode_pcm16le, encode_samples, linear_to_mulaw};
pub use rtp::{encode_packet, PayloadType, RtpHeader};
pub use session::{DispatchConfig, DispatchSession, SAMPLES_PER_FRAME};
