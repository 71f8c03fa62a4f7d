//! Call lifecycle entity and decoder status payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TalkgroupId;

/// How a call's audio was carried on air
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioType {
    Analog,
    Digital,
    #[serde(rename = "digital tdma")]
    DigitalTdma,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A single call on a talkgroup.
///
/// Created on a grant/`call_start`, updated while active, closed on
/// end/`call_end`. Once closed, stop time and duration never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub id: String,

    #[serde(alias = "talkgroup")]
    pub talkgroup_id: TalkgroupId,

    /// Frequency in Hz
    #[serde(alias = "freq", deserialize_with = "crate::hz::deserialize")]
    pub frequency: u64,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,

    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub stop_time: Option<DateTime<Utc>>,

    /// Duration in seconds
    #[serde(default, alias = "length", skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    #[serde(default)]
    pub emergency: bool,

    #[serde(default)]
    pub encrypted: bool,

    /// Reference into the historical audio store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<String>,

    #[serde(default)]
    pub audio_type: AudioType,
}

impl Call {
    pub fn new(
        id: impl Into<String>,
        talkgroup_id: TalkgroupId,
        frequency: u64,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            talkgroup_id,
            frequency,
            start_time,
            stop_time: None,
            duration: None,
            emergency: false,
            encrypted: false,
            audio_file: None,
            audio_type: AudioType::Unknown,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stop_time.is_some()
    }

    /// Close the call, fixing stop time and duration.
    ///
    /// Returns `false` (and changes nothing) if the call was already closed.
    pub fn close(&mut self, stop_time: DateTime<Utc>) -> bool {
        if self.is_closed() {
            return false;
        }
        let elapsed = stop_time.signed_duration_since(self.start_time);
        self.stop_time = Some(stop_time);
        self.duration = Some((elapsed.num_milliseconds().max(0) as f64) / 1000.0);
        true
    }
}

/// Control channel decode rate for one monitored system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeRate {
    #[serde(alias = "id")]
    pub sys_num: u32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sys_name: String,

    /// Messages per second
    pub decoderate: f64,

    #[serde(
        default,
        deserialize_with = "crate::hz::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub control_channel: Option<u64>,

    /// Fields we pass through to viewers untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
