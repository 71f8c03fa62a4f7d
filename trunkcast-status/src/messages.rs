use serde::Deserialize;
use thiserror::Error;
use trunkcast_model::{Call, DecodeRate};

/// Inbound messages from the decoder's status channel
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusMessage {
    CallStart {
        call: Call,
    },
    CallEnd {
        call: Call,
    },
    CallsActive {
        #[serde(default)]
        calls: Vec<Call>,
    },
    Rates {
        #[serde(default)]
        rates: Vec<DecodeRate>,
    },
    /// Informational only
    Systems {
        #[serde(default)]
        systems: serde_json::Value,
    },
    /// Informational only
    Recorders {
        #[serde(default)]
        recorders: serde_json::Value,
    },
}

/// Message type discriminators this channel understands
pub const KNOWN_TYPES: &[&str] = &[
    "call_start",
    "call_end",
    "calls_active",
    "rates",
    "systems",
    "recorders",
];

/// Why a single inbound message was dropped
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("message has no type field")]
    MissingType,

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StatusMessage {
    /// Decode one text frame.
    ///
    /// Unknown discriminators and bad payloads are reported separately so
    /// the caller can log them differently.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(DecodeError::Json)?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(DecodeError::MissingType)?
            .to_string();

        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Err(DecodeError::UnknownType(kind));
        }

        serde_json::from_value(value).map_err(|source| DecodeError::Malformed { kind, source })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StatusMessage::CallStart { .. } => "call_start",
            StatusMessage::CallEnd { .. } => "call_end",
            StatusMessage::CallsActive { .. } => "calls_active",
            StatusMessage::Rates { .. } => "rates",
            StatusMessage::Systems { .. } => "systems",
            StatusMessage::Recorders { .. } => "recorders",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_call_start() {
        let text = r#"{"type":"call_start","instance_id":"tr-1",
            "call":{"id":"0_3219_1700000000","talkgroup":3219,"freq":771356250,
                    "startTime":1700000000,"encrypted":false}}"#;
        match StatusMessage::decode(text).unwrap() {
            StatusMessage::CallStart { call } => {
                assert_eq!(call.talkgroup_id, 3219);
                assert_eq!(call.frequency, 771_356_250);
            }
            other => panic!("expected call_start, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_rates() {
        let text = r#"{"type":"rates","rates":[{"id":0,"decoderate":40.1}]}"#;
        match StatusMessage::decode(text).unwrap() {
            StatusMessage::Rates { rates } => {
                assert_eq!(rates.len(), 1);
                assert_eq!(rates[0].decoderate, 40.1);
            }
            other => panic!("expected rates, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_systems_is_opaque() {
        let text = r#"{"type":"systems","systems":[{"sys_num":0,"type":"p25"}]}"#;
        let msg = StatusMessage::decode(text).unwrap();
        assert_eq!(msg.kind(), "systems");
    }

    #[test]
    fn test_decode_errors_are_classified() {
        assert!(matches!(
            StatusMessage::decode("{not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            StatusMessage::decode(r#"{"call":{}}"#),
            Err(DecodeError::MissingType)
        ));
        assert!(matches!(
            StatusMessage::decode(r#"{"type":"plugin_status"}"#),
            Err(DecodeError::UnknownType(t)) if t == "plugin_status"
        ));
        assert!(matches!(
            StatusMessage::decode(r#"{"type":"call_start","call":{"id":1}}"#),
            Err(DecodeError::Malformed { .. })
        ));
    }
}
