//! Metadata channel framing.
//!
//! Every message is a 16-byte header followed by its payload:
//!
//! ```text
//! offset  size  field
//! 0       2     magic 0x50 0x4D
//! 2       2     reserved (0)
//! 4       4     session id (LE)
//! 8       2     reserved (0)
//! 10      2     sequence number (LE)
//! 12      2     message type (LE)
//! 14      2     payload length (LE)
//! ```
//!
//! Payload descriptors are TLV encoded: 1-byte id, 1-byte length, value.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

pub const MAGIC: [u8; 2] = [0x50, 0x4D];
pub const HEADER_LEN: usize = 16;

/// Fixed width of the endpoint name field, terminator included
pub const ENDPOINT_NAME_LEN: usize = 32;

/// Descriptor ids
pub mod descriptor {
    pub const SOURCE_UNIT_ID: u8 = 0x01;
    pub const AUDIO_DIRECTION: u8 = 0x02;
    pub const TALKGROUP: u8 = 0x03;
    pub const EMERGENCY: u8 = 0x04;
    pub const DIGITAL: u8 = 0x05;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageType {
    /// Call start
    EndpointInfo = 0x0008,
    /// Mid-call change
    EndpointUpdate = 0x000A,
}

impl MessageType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0008 => Some(Self::EndpointInfo),
            0x000A => Some(Self::EndpointUpdate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AudioDirection {
    #[default]
    Incoming = 0,
    Outgoing = 1,
    Both = 2,
}

/// Kind of change carried by an ENDPOINT_UPDATE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateType {
    /// Talking unit changed
    SourceUnit = 0x01,
    /// Direction changed
    AudioDirection = 0x02,
}

/// Decoded metadata header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataHeader {
    pub session_id: u32,
    pub sequence: u16,
    /// Raw type; see [`MessageType::from_u16`]
    pub message_type: u16,
    pub payload_len: u16,
}

impl MetadataHeader {
    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_slice(&MAGIC);
        buf.put_u16_le(0);
        buf.put_u32_le(self.session_id);
        buf.put_u16_le(0);
        buf.put_u16_le(self.sequence);
        buf.put_u16_le(self.message_type);
        buf.put_u16_le(self.payload_len);
    }

    /// Parse a header; `None` if too short or the magic is wrong
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN || bytes[..2] != MAGIC {
            return None;
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        Some(Self {
            session_id: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            sequence: u16_at(10),
            message_type: u16_at(12),
            payload_len: u16_at(14),
        })
    }
}

/// A message body that can follow a metadata header
pub trait MetadataPayload {
    const MESSAGE_TYPE: MessageType;

    fn write_payload(&self, buf: &mut BytesMut) -> Result<()>;
}

/// ENDPOINT_INFO, sent when a call starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub endpoint_name: String,
    pub source_unit_id: Option<String>,
    pub audio_direction: AudioDirection,
    pub talkgroup: Option<String>,
    pub emergency: bool,
}

impl MetadataPayload for EndpointInfo {
    const MESSAGE_TYPE: MessageType = MessageType::EndpointInfo;

    fn write_payload(&self, buf: &mut BytesMut) -> Result<()> {
        write_endpoint_name(buf, &self.endpoint_name);
        if let Some(unit) = &self.source_unit_id {
            write_tlv(buf, descriptor::SOURCE_UNIT_ID, unit.as_bytes())?;
        }
        write_tlv(buf, descriptor::AUDIO_DIRECTION, &[self.audio_direction as u8])?;
        if let Some(talkgroup) = &self.talkgroup {
            write_tlv(buf, descriptor::TALKGROUP, talkgroup.as_bytes())?;
        }
        write_tlv(buf, descriptor::EMERGENCY, &[self.emergency as u8])?;
        write_tlv(buf, descriptor::DIGITAL, &[1])?;
        Ok(())
    }
}

/// ENDPOINT_UPDATE, sent on a mid-call change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUpdate {
    pub update_type: UpdateType,
    pub source_unit_id: Option<String>,
    pub audio_direction: Option<AudioDirection>,
}

impl MetadataPayload for EndpointUpdate {
    const MESSAGE_TYPE: MessageType = MessageType::EndpointUpdate;

    fn write_payload(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(self.update_type as u8);
        if let Some(unit) = &self.source_unit_id {
            write_tlv(buf, descriptor::SOURCE_UNIT_ID, unit.as_bytes())?;
        }
        if let Some(direction) = self.audio_direction {
            write_tlv(buf, descriptor::AUDIO_DIRECTION, &[direction as u8])?;
        }
        Ok(())
    }
}

/// Encode a complete metadata message: header plus payload
pub fn encode_message<P: MetadataPayload>(
    session_id: u32,
    sequence: u16,
    payload: &P,
) -> Result<Bytes> {
    let mut body = BytesMut::new();
    payload.write_payload(&mut body)?;
    let payload_len =
        u16::try_from(body.len()).map_err(|_| DispatchError::PayloadTooLarge(body.len()))?;

    let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
    MetadataHeader {
        session_id,
        sequence,
        message_type: P::MESSAGE_TYPE as u16,
        payload_len,
    }
    .write(&mut frame);
    frame.put_slice(&body);
    Ok(frame.freeze())
}

/// Name truncated to 31 bytes on a char boundary, then null padded to 32
fn write_endpoint_name(buf: &mut BytesMut, name: &str) {
    let mut end = name.len().min(ENDPOINT_NAME_LEN - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    buf.put_slice(&name.as_bytes()[..end]);
    buf.put_bytes(0, ENDPOINT_NAME_LEN - end);
}

fn write_tlv(buf: &mut BytesMut, id: u8, value: &[u8]) -> Result<()> {
    let len = u8::try_from(value.len())
        .map_err(|_| DispatchError::DescriptorTooLong { id, len: value.len() })?;
    buf.put_u8(id);
    buf.put_u8(len);
    buf.put_slice(value);
    Ok(())
}
