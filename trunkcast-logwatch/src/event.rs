use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use trunkcast_model::TalkgroupId;

/// A typed control channel event parsed from one log line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlChannelEvent {
    /// Wall-clock time from the line's `[YYYY-MM-DD HH:MM:SS.mmm]` prefix.
    ///
    /// `None` when the prefix is absent or malformed; the rest of the event
    /// is still valid.
    pub timestamp: Option<NaiveDateTime>,

    #[serde(flatten)]
    pub kind: EventKind,
}

/// Event-specific fields. Frequencies are integer Hz.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Grant {
        talkgroup_id: TalkgroupId,
        frequency: u64,
        recorder: Option<u32>,
        tdma: Option<bool>,
        slot: Option<u8>,
        unit_id: Option<u32>,
    },
    Update {
        talkgroup_id: TalkgroupId,
        frequency: u64,
        recorder: Option<u32>,
        tdma: Option<bool>,
        slot: Option<u8>,
        unit_id: Option<u32>,
    },
    End {
        talkgroup_id: TalkgroupId,
        frequency: Option<u64>,
        recorder: Option<u32>,
    },
    Encrypted {
        talkgroup_id: TalkgroupId,
        frequency: Option<u64>,
    },
    OutOfBand {
        talkgroup_id: TalkgroupId,
        frequency: Option<u64>,
    },
    NoRecorder {
        talkgroup_id: TalkgroupId,
        frequency: Option<u64>,
    },
    DecodeRate {
        /// Messages per second
        rate: f64,
    },
    SystemInfo {
        system_id: Option<u32>,
        wacn: Option<String>,
        nac: Option<String>,
        rfss: Option<u32>,
        site_id: Option<u32>,
    },
    Unit {
        unit_id: u32,
        talkgroup_id: Option<TalkgroupId>,
    },
}

impl EventKind {
    /// Snake-case name of the variant, as it appears in the `type` field
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Grant { .. } => "grant",
            EventKind::Update { .. } => "update",
            EventKind::End { .. } => "end",
            EventKind::Encrypted { .. } => "encrypted",
            EventKind::OutOfBand { .. } => "out_of_band",
            EventKind::NoRecorder { .. } => "no_recorder",
            EventKind::DecodeRate { .. } => "decode_rate",
            EventKind::SystemInfo { .. } => "system_info",
            EventKind::Unit { .. } => "unit",
        }
    }

    /// Talkgroup the event concerns, if it is talkgroup-scoped
    pub fn talkgroup_id(&self) -> Option<TalkgroupId> {
        match self {
            EventKind::Grant { talkgroup_id, .. }
            | EventKind::Update { talkgroup_id, .. }
            | EventKind::End { talkgroup_id, .. }
            | EventKind::Encrypted { talkgroup_id, .. }
            | EventKind::OutOfBand { talkgroup_id, .. }
            | EventKind::NoRecorder { talkgroup_id, .. } => Some(*talkgroup_id),
            EventKind::Unit { talkgroup_id, .. } => *talkgroup_id,
            EventKind::DecodeRate { .. } | EventKind::SystemInfo { .. } => None,
        }
    }
}

impl ControlChannelEvent {
    /// Event time in UTC, interpreting the log prefix as local time.
    ///
    /// Falls back to `observed_at` when the line carried no usable timestamp.
    pub fn timestamp_or(&self, observed_at: DateTime<Utc>) -> DateTime<Utc> {
        self.timestamp
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or(observed_at)
    }
}
