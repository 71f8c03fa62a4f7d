//! Spectrum capture and replay for trunkcast
//!
//! - [`SpectrumRecorder`] captures live FFT packets into a [`Recording`]
//! - [`RecordingStore`] keeps recordings as JSON files on disk
//! - [`SpectrumReplayer`] plays a recording back as live packets with the
//!   original timing, with pause/resume/loop
//!
//! # Example Usage
//!
//! ```no_run
//! use trunkcast_spectrum::{RecordingStore, ReplayEvent, SpectrumReplayer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RecordingStore::new("/var/lib/trunkcast/spectrum");
//!     let (replayer, mut events) = SpectrumReplayer::new(store, 0);
//!
//!     replayer.start_replay("demo", true).await?;
//!     while let Some(event) = events.recv().await {
//!         if let ReplayEvent::Packet(packet) = event {
//!             println!("{} bins", packet.magnitudes.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod recorder;
pub mod recording;
pub mod replayer;

pub use error::{Result, SpectrumError};
pub use recorder::SpectrumRecorder;
pub use recording::{Recording, RecordingMetadata, RecordingStore, RecordingSummary, Snapshot};
pub use replayer::{ReplayEvent, ReplayState, SpectrumReplayer, PROGRESS_INTERVAL};
