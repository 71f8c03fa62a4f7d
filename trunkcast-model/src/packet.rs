//! Ephemeral audio and spectrum packets.
//!
//! Packets live for one fan-out or encode operation and are never persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TalkgroupId;

/// Sample rate of decoded call audio (Hz, mono, 16-bit linear)
pub const PCM_SAMPLE_RATE: u32 = 8000;

/// A chunk of decoded call audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPacket {
    pub talkgroup_id: TalkgroupId,
    pub samples: Vec<i16>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl AudioPacket {
    pub fn new(talkgroup_id: TalkgroupId, samples: Vec<i16>) -> Self {
        Self {
            talkgroup_id,
            samples,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Samples as little-endian 16-bit PCM bytes
    pub fn pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// One spectrum snapshot from an SDR source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FftPacket {
    pub source_index: u32,
    /// Center frequency in Hz
    pub center_frequency: u64,
    pub sample_rate: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub fft_size: u32,
    /// Lower bound of the displayed band in Hz
    pub min_frequency: u64,
    /// Upper bound of the displayed band in Hz
    pub max_frequency: u64,
    /// One magnitude per bin, lowest frequency first
    pub magnitudes: Vec<f32>,
}

impl FftPacket {
    /// Magnitudes as little-endian `f32` bytes
    pub fn magnitude_bytes(&self) -> Vec<u8> {
        self.magnitudes.iter().flat_map(|m| m.to_le_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_bytes_little_endian() {
        let packet = AudioPacket::new(7, vec![1, -2, 0x1234]);
        assert_eq!(packet.pcm_bytes(), vec![0x01, 0x00, 0xFE, 0xFF, 0x34, 0x12]);
    }

    #[test]
    fn test_metadata_builder() {
        let packet = AudioPacket::new(7, vec![]).with_metadata("unit", 1234);
        assert_eq!(packet.metadata["unit"], 1234);
    }

    #[test]
    fn test_magnitude_bytes() {
        let packet = FftPacket {
            source_index: 0,
            center_frequency: 851_000_000,
            sample_rate: 2_400_000,
            timestamp: Utc::now(),
            fft_size: 2,
            min_frequency: 849_800_000,
            max_frequency: 852_200_000,
            magnitudes: vec![1.0, -0.5],
        };
        let bytes = packet.magnitude_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-0.5f32).to_le_bytes());
    }
}
