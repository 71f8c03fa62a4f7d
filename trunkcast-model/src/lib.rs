//! Shared data model for trunkcast
//!
//! Types that cross component boundaries: calls reported by the decoder,
//! per-system decode rates, and the ephemeral audio/spectrum packets that are
//! fanned out to viewers and legacy consoles.

pub mod call;
pub mod hz;
pub mod packet;
pub mod store;

pub use call::{AudioType, Call, DecodeRate};
pub use packet::{AudioPacket, FftPacket, PCM_SAMPLE_RATE};
pub use store::{CallStore, MemoryCallStore};

/// Talkgroup identifier as used by the radio system.
pub type TalkgroupId = u32;
