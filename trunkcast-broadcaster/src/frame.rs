//! Binary frame format for audio and spectrum data.
//!
//! ```text
//! +----------------+----------------------+------------------+
//! | header_len u32 | JSON header          | raw payload      |
//! | little-endian  | (header_len bytes)   | (rest of frame)  |
//! +----------------+----------------------+------------------+
//! ```
//!
//! There is no trailing delimiter; the receiver reads the length first to
//! find where the header ends and the payload begins.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use trunkcast_model::{AudioPacket, FftPacket, TalkgroupId, PCM_SAMPLE_RATE};

use crate::error::{BroadcasterError, Result};

/// Size of the length prefix
pub const LENGTH_PREFIX: usize = 4;

/// Header of an audio frame. Payload is 16-bit little-endian PCM.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AudioHeader<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub talkgroup_id: TalkgroupId,
    pub sample_rate: u32,
    pub sample_count: usize,
    pub metadata: &'a BTreeMap<String, serde_json::Value>,
}

/// Header of a spectrum frame. Payload is little-endian `f32` magnitudes.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FftHeader {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub source_index: u32,
    pub center_frequency: u64,
    pub sample_rate: u32,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub fft_size: u32,
    pub min_frequency: u64,
    pub max_frequency: u64,
}

impl<'a> AudioHeader<'a> {
    pub fn for_packet(packet: &'a AudioPacket) -> Self {
        Self {
            kind: "audio",
            talkgroup_id: packet.talkgroup_id,
            sample_rate: PCM_SAMPLE_RATE,
            sample_count: packet.samples.len(),
            metadata: &packet.metadata,
        }
    }
}

impl FftHeader {
    pub fn for_packet(packet: &FftPacket) -> Self {
        Self {
            kind: "fft",
            source_index: packet.source_index,
            center_frequency: packet.center_frequency,
            sample_rate: packet.sample_rate,
            timestamp: packet.timestamp.timestamp_millis(),
            fft_size: packet.fft_size,
            min_frequency: packet.min_frequency,
            max_frequency: packet.max_frequency,
        }
    }
}

/// Build a length-prefixed binary frame
pub fn encode_binary_frame<H: Serialize>(header: &H, payload: &[u8]) -> Result<Bytes> {
    let header = serde_json::to_vec(header)?;
    let header_len =
        u32::try_from(header.len()).map_err(|_| BroadcasterError::HeaderTooLarge(header.len()))?;

    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX + header.len() + payload.len());
    frame.put_u32_le(header_len);
    frame.put_slice(&header);
    frame.put_slice(payload);
    Ok(frame.freeze())
}

/// Encode an audio packet as a binary frame
pub fn audio_frame(packet: &AudioPacket) -> Result<Bytes> {
    encode_binary_frame(&AudioHeader::for_packet(packet), &packet.pcm_bytes())
}

/// Encode a spectrum packet as a binary frame
pub fn fft_frame(packet: &FftPacket) -> Result<Bytes> {
    encode_binary_frame(&FftHeader::for_packet(packet), &packet.magnitude_bytes())
}

/// Split a binary frame into its parsed header and raw payload
pub fn decode_binary_frame(frame: &[u8]) -> Result<(serde_json::Value, &[u8])> {
    if frame.len() < LENGTH_PREFIX {
        return Err(BroadcasterError::MalformedFrame(format!(
            "frame is {} bytes, shorter than the length prefix",
            frame.len()
        )));
    }

    let mut prefix = [0u8; LENGTH_PREFIX];
    prefix.copy_from_slice(&frame[..LENGTH_PREFIX]);
    let header_len = u32::from_le_bytes(prefix) as usize;

    let body = &frame[LENGTH_PREFIX..];
    if header_len > body.len() {
        return Err(BroadcasterError::MalformedFrame(format!(
            "header length {} exceeds remaining {} bytes",
            header_len,
            body.len()
        )));
    }

    let (header, payload) = body.split_at(header_len);
    Ok((serde_json::from_slice(header)?, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_audio_frame_layout() {
        let packet = AudioPacket::new(3219, vec![0, 1, -1]).with_metadata("srcId", 1234);
        let frame = audio_frame(&packet).unwrap();

        let header_len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(frame.len(), LENGTH_PREFIX + header_len + 6);

        let (header, payload) = decode_binary_frame(&frame).unwrap();
        assert_eq!(header["type"], "audio");
        assert_eq!(header["talkgroupId"], 3219);
        assert_eq!(header["sampleRate"], 8000);
        assert_eq!(header["metadata"]["srcId"], 1234);
        assert_eq!(payload, &[0x00, 0x00, 0x01, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn test_fft_frame_layout() {
        let packet = FftPacket {
            source_index: 1,
            center_frequency: 851_000_000,
            sample_rate: 2_400_000,
            timestamp: chrono::Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            fft_size: 4,
            min_frequency: 849_800_000,
            max_frequency: 852_200_000,
            magnitudes: vec![-90.0, -80.5, -70.25, -60.0],
        };
        let frame = fft_frame(&packet).unwrap();
        let (header, payload) = decode_binary_frame(&frame).unwrap();

        assert_eq!(header["type"], "fft");
        assert_eq!(header["fftSize"], 4);
        assert_eq!(header["timestamp"], 1_700_000_000_123i64);
        assert_eq!(payload.len(), 16);
        assert_eq!(&payload[4..8], &(-80.5f32).to_le_bytes());
    }

    #[test]
    fn test_empty_payload() {
        let frame = encode_binary_frame(&serde_json::json!({"type": "fft"}), &[]).unwrap();
        let (header, payload) = decode_binary_frame(&frame).unwrap();
        assert_eq!(header["type"], "fft");
        assert!(payload.is_empty());
    }

    #[test]
    fn test_truncated_frame_rejected() {
        assert!(decode_binary_frame(&[1, 0]).is_err());
        assert!(decode_binary_frame(&[10, 0, 0, 0, b'{']).is_err());
    }
}
