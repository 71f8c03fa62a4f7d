use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use trunkcast_model::{AudioPacket, Call, TalkgroupId};

use crate::error::{DispatchError, Result};
use crate::metadata::{encode_message, AudioDirection, EndpointInfo, EndpointUpdate, UpdateType};
use crate::mulaw;
use crate::rtp::{encode_packet, PayloadType, RtpHeader};

/// 20 ms of 8 kHz audio
pub const SAMPLES_PER_FRAME: usize = 160;

/// Where and as whom to talk to the dispatch console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_endpoint_name")]
    pub endpoint_name: String,
    #[serde(default)]
    pub audio_direction: AudioDirection,
}

fn default_endpoint_name() -> String {
    "trunkcast".to_string()
}

struct CallSession {
    session_id: u32,
    talkgroup_id: TalkgroupId,
    source_unit: Option<u32>,
    sequence: u16,
    rtp_sequence: u16,
    rtp_timestamp: u32,
    audio_started: bool,
}

impl CallSession {
    fn next_sequence(&mut self) -> u16 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }
}

/// Sender for one dispatch console.
///
/// Metadata goes over TCP, audio over UDP, both to the same host and port.
/// Each call gets its own session id and counters.
pub struct DispatchSession {
    config: DispatchConfig,
    metadata: Option<TcpStream>,
    audio: Option<UdpSocket>,
    calls: HashMap<String, CallSession>,
    next_session_id: u32,
}

impl DispatchSession {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            metadata: None,
            audio: None,
            calls: HashMap::new(),
            next_session_id: 1,
        }
    }

    /// Open the metadata connection and the audio socket
    pub async fn connect(&mut self) -> Result<()> {
        let target = (self.config.host.as_str(), self.config.port);

        let metadata = TcpStream::connect(target).await?;
        metadata.set_nodelay(true)?;

        let audio = UdpSocket::bind(("0.0.0.0", 0)).await?;
        audio.connect(target).await?;

        tracing::info!(
            "Connected to dispatch console at {}:{}",
            self.config.host,
            self.config.port
        );
        self.metadata = Some(metadata);
        self.audio = Some(audio);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.metadata.is_some() && self.audio.is_some()
    }

    pub fn session_id(&self, call_id: &str) -> Option<u32> {
        self.calls.get(call_id).map(|c| c.session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.calls.len()
    }

    /// Announce a call with ENDPOINT_INFO. A call already announced keeps
    /// its session and nothing is sent.
    pub async fn call_start(&mut self, call: &Call, source_unit: Option<u32>) -> Result<u32> {
        if let Some(existing) = self.session_id(&call.id) {
            return Ok(existing);
        }
        if !self.is_connected() {
            return Err(DispatchError::NotConnected);
        }

        let session_id = self.allocate_session_id();
        let mut session = CallSession {
            session_id,
            talkgroup_id: call.talkgroup_id,
            source_unit,
            sequence: 0,
            rtp_sequence: 0,
            rtp_timestamp: 0,
            audio_started: false,
        };

        let info = EndpointInfo {
            endpoint_name: self.config.endpoint_name.clone(),
            source_unit_id: source_unit.map(|u| u.to_string()),
            audio_direction: self.config.audio_direction,
            talkgroup: Some(call.talkgroup_id.to_string()),
            emergency: call.emergency,
        };
        let frame = encode_message(session_id, session.next_sequence(), &info)?;
        self.send_metadata(&frame).await?;

        tracing::debug!(
            "Dispatch session {} opened for call {} (TG {})",
            session_id,
            call.id,
            call.talkgroup_id
        );
        self.calls.insert(call.id.clone(), session);
        Ok(session_id)
    }

    /// Report a new talking unit with ENDPOINT_UPDATE.
    ///
    /// Returns `false` if the call is unknown or the unit did not change.
    pub async fn call_update(&mut self, call_id: &str, source_unit: u32) -> Result<bool> {
        let Some(session) = self.calls.get_mut(call_id) else {
            return Ok(false);
        };
        if session.source_unit == Some(source_unit) {
            return Ok(false);
        }
        session.source_unit = Some(source_unit);

        let update = EndpointUpdate {
            update_type: UpdateType::SourceUnit,
            source_unit_id: Some(source_unit.to_string()),
            audio_direction: None,
        };
        let frame = encode_message(session.session_id, session.next_sequence(), &update)?;
        self.send_metadata(&frame).await?;
        Ok(true)
    }

    /// Transcode and send audio for whichever call is live on the packet's
    /// talkgroup. Returns the number of RTP frames sent.
    pub async fn send_audio(&mut self, packet: &AudioPacket) -> Result<usize> {
        let Some(session) = self
            .calls
            .values_mut()
            .find(|c| c.talkgroup_id == packet.talkgroup_id)
        else {
            return Ok(0);
        };
        let audio = self.audio.as_ref().ok_or(DispatchError::NotConnected)?;

        let encoded = mulaw::encode_samples(&packet.samples);
        let mut sent = 0;
        for chunk in encoded.chunks(SAMPLES_PER_FRAME) {
            let header = RtpHeader {
                marker: !session.audio_started,
                payload_type: PayloadType::Pcmu,
                sequence: session.rtp_sequence,
                timestamp: session.rtp_timestamp,
                ssrc: session.session_id,
            };
            audio.send(&encode_packet(&header, chunk)).await?;

            session.audio_started = true;
            session.rtp_sequence = session.rtp_sequence.wrapping_add(1);
            session.rtp_timestamp = session.rtp_timestamp.wrapping_add(chunk.len() as u32);
            sent += 1;
        }
        Ok(sent)
    }

    /// Forget a finished call. Returns `false` if it was never announced.
    pub fn call_end(&mut self, call_id: &str) -> bool {
        match self.calls.remove(call_id) {
            Some(session) => {
                tracing::debug!("Dispatch session {} closed", session.session_id);
                true
            }
            None => false,
        }
    }

    fn allocate_session_id(&mut self) -> u32 {
        let id = self.next_session_id;
        // 0 is never handed out
        self.next_session_id = self.next_session_id.wrapping_add(1).max(1);
        id
    }

    async fn send_metadata(&mut self, frame: &[u8]) -> Result<()> {
        let stream = self.metadata.as_mut().ok_or(DispatchError::NotConnected)?;
        if let Err(e) = stream.write_all(frame).await {
            tracing::warn!("Dispatch metadata connection lost: {}", e);
            self.metadata = None;
            self.audio = None;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DispatchConfig {
        DispatchConfig {
            host: "127.0.0.1".to_string(),
            port: 9,
            endpoint_name: "test".to_string(),
            audio_direction: AudioDirection::Incoming,
        }
    }

    #[test]
    fn test_session_ids_skip_zero() {
        let mut session = DispatchSession::new(config());
        session.next_session_id = u32::MAX;
        assert_eq!(session.allocate_session_id(), u32::MAX);
        assert_eq!(session.allocate_session_id(), 1);
    }

    #[test]
    fn test_config_defaults() {
        let parsed: DispatchConfig =
            serde_json::from_str(r#"{"host":"10.0.0.5","port":5000}"#).unwrap();
        assert_eq!(parsed.endpoint_name, "trunkcast");
        assert_eq!(parsed.audio_direction, AudioDirection::Incoming);
    }

    #[tokio::test]
    async fn test_not_connected() {
        let mut session = DispatchSession::new(config());
        let call = Call::new("c1", 5, 851_000_000, chrono::Utc::now());
        assert!(matches!(
            session.call_start(&call, None).await,
            Err(DispatchError::NotConnected)
        ));
        assert_eq!(session.send_audio(&AudioPacket::new(5, vec![0; 10])).await.unwrap(), 0);
        assert!(!session.call_end("c1"));
    }
}
