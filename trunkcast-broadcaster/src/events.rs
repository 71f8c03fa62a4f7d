use serde::{Deserialize, Serialize};
use trunkcast_model::{Call, DecodeRate, TalkgroupId};

/// JSON control messages sent to viewer clients
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HubMessage {
    /// First frame on every connection
    Connected {
        #[serde(rename = "clientId")]
        client_id: String,
    },

    CallStart {
        call: Call,
    },

    CallEnd {
        call: Call,
    },

    /// A finished call's audio is available
    NewRecording {
        call: Call,
    },

    CallsActive {
        calls: Vec<Call>,
    },

    Rates {
        rates: Vec<DecodeRate>,
    },
}

/// Who may receive a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Talkgroup the message is scoped to; `None` bypasses subscriptions
    pub talkgroup: Option<TalkgroupId>,
    /// Only clients that enabled audio get it
    pub requires_audio: bool,
}

impl Delivery {
    /// Binary audio frame for a talkgroup
    pub fn audio(talkgroup: TalkgroupId) -> Self {
        Self {
            talkgroup: Some(talkgroup),
            requires_audio: true,
        }
    }

    /// Binary spectrum frame
    pub fn fft() -> Self {
        Self {
            talkgroup: None,
            requires_audio: true,
        }
    }
}

impl HubMessage {
    /// Delivery rule for this message type
    pub fn delivery(&self) -> Delivery {
        match self {
            HubMessage::CallStart { call } | HubMessage::CallEnd { call } => Delivery {
                talkgroup: Some(call.talkgroup_id),
                requires_audio: false,
            },
            HubMessage::NewRecording { call } => Delivery {
                talkgroup: Some(call.talkgroup_id),
                requires_audio: true,
            },
            HubMessage::Connected { .. }
            | HubMessage::CallsActive { .. }
            | HubMessage::Rates { .. } => Delivery {
                talkgroup: None,
                requires_audio: false,
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages viewer clients send to the hub
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Subscribe {
        #[serde(default)]
        talkgroups: Vec<TalkgroupId>,
    },
    Unsubscribe {
        #[serde(default)]
        talkgroups: Vec<TalkgroupId>,
    },
    SubscribeAll,
    EnableAudio {
        enabled: bool,
    },
}

impl ClientMessage {
    /// Parse a client frame; anything unrecognized is `None`
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
