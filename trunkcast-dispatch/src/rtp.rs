use bytes::{BufMut, Bytes, BytesMut};

pub const RTP_HEADER_LEN: usize = 12;

/// Version 2, no padding, no extension, no CSRC
const VERSION_BYTE: u8 = 0x80;
const MARKER_BIT: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadType {
    /// G.711 mu-law
    Pcmu = 0,
    /// G.711 A-law
    Pcma = 8,
    /// 16-bit linear mono
    L16 = 11,
}

/// Fixed 12-byte audio transport header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub marker: bool,
    pub payload_type: PayloadType,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_u8(VERSION_BYTE);
        let marker = if self.marker { MARKER_BIT } else { 0 };
        buf.put_u8(marker | self.payload_type as u8);
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
    }
}

/// Header plus payload as one datagram
pub fn encode_packet(header: &RtpHeader, payload: &[u8]) -> Bytes {
    let mut packet = BytesMut::with_capacity(RTP_HEADER_LEN + payload.len());
    header.write(&mut packet);
    packet.put_slice(payload);
    packet.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = RtpHeader {
            marker: true,
            payload_type: PayloadType::Pcmu,
            sequence: 0x0102,
            timestamp: 0x0A0B_0C0D,
            ssrc: 0xDEAD_BEEF,
        };
        let packet = encode_packet(&header, &[0xFF; 3]);

        assert_eq!(packet.len(), RTP_HEADER_LEN + 3);
        assert_eq!(
            &packet[..RTP_HEADER_LEN],
            &[0x80, 0x80, 0x01, 0x02, 0x0A, 0x0B, 0x0C, 0x0D, 0xDE, 0xAD, 0xBE, 0xEF]
        );
        assert_eq!(&packet[RTP_HEADER_LEN..], &[0xFF; 3]);
    }

    #[test]
    fn test_payload_type_without_marker() {
        let header = RtpHeader {
            marker: false,
            payload_type: PayloadType::L16,
            sequence: 0,
            timestamp: 0,
            ssrc: 1,
        };
        let packet = encode_packet(&header, &[]);
        assert_eq!(packet[1], 11);
        assert_eq!(
            encode_packet(&RtpHeader { payload_type: PayloadType::Pcma, ..header }, &[])[1],
            8
        );
    }
}
