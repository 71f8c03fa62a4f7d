//! Log line grammars.
//!
//! Each grammar is keyed on a distinctive literal and then pulls its fields
//! out with small regexes. Grammars are tried in a fixed order and the first
//! match wins; a line nothing recognizes yields `None`.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use trunkcast_model::hz::mhz_to_hz;

use crate::event::{ControlChannelEvent, EventKind};

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("valid regex"));
static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\[(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)?)\]").expect("valid regex")
});
static TALKGROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"TG:\s*(\d+)").expect("valid regex"));
static FREQUENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Freq:\s*(\d+(?:\.\d+)?)\s*MHz").expect("valid regex"));
static RECORDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Recorder Num:?\s*\[?\s*(\d+)\s*\]?").expect("valid regex"));
static TDMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)TDMA:\s*(true|false)").expect("valid regex"));
static SLOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"Slot:\s*(\d+)").expect("valid regex"));
static SOURCE_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:Src|Source|ext):\s*(\d+)").expect("valid regex"));
static DECODE_RATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Decode Rate:\s*(\d+(?:\.\d+)?)").expect("valid regex"));
static SYSTEM_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"System ID\s+(\d+)").expect("valid regex"));
static WACN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"WACN:\s*([0-9A-Fa-f]+)").expect("valid regex"));
static NAC: Lazy<Regex> = Lazy::new(|| Regex::new(r"NAC:\s*([0-9A-Fa-f]+)").expect("valid regex"));
static RFSS: Lazy<Regex> = Lazy::new(|| Regex::new(r"RFSS:\s*(\d+)").expect("valid regex"));
static SITE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)SITE ID:\s*(\d+)").expect("valid regex"));

type Grammar = fn(&str) -> Option<EventKind>;

/// Grammars in match order
const GRAMMARS: &[Grammar] = &[
    recorder_start,
    recorder_stop,
    encrypted,
    out_of_band,
    no_recorder,
    decode_rate,
    system_info,
    unit,
];

/// Parse one raw log line into an event.
///
/// ANSI color codes are stripped first, so colorized and plain lines parse
/// identically. Unrecognized lines return `None`.
pub fn parse_line(line: &str) -> Option<ControlChannelEvent> {
    let clean = strip_ansi(line);
    let kind = GRAMMARS.iter().find_map(|grammar| grammar(&clean))?;

    Some(ControlChannelEvent {
        timestamp: parse_timestamp(&clean),
        kind,
    })
}

/// Remove ANSI escape sequences
pub fn strip_ansi(line: &str) -> std::borrow::Cow<'_, str> {
    ANSI_ESCAPE.replace_all(line, "")
}

/// Parse the bracketed `[YYYY-MM-DD HH:MM:SS.mmm]` prefix
pub fn parse_timestamp(line: &str) -> Option<NaiveDateTime> {
    let raw = TIMESTAMP.captures(line)?.get(1)?.as_str();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok()
}

fn capture<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    re.captures(line)?.get(1).map(|m| m.as_str())
}

fn capture_num<T: std::str::FromStr>(re: &Regex, line: &str) -> Option<T> {
    capture(re, line)?.parse().ok()
}

fn capture_hz(line: &str) -> Option<u64> {
    let mhz: f64 = capture_num(&FREQUENCY, line)?;
    Some(mhz_to_hz(mhz))
}

fn capture_hex(re: &Regex, line: &str) -> Option<String> {
    capture(re, line).map(|s| s.to_ascii_uppercase())
}

fn recorder_start(line: &str) -> Option<EventKind> {
    if !line.contains("Starting P25 Recorder") {
        return None;
    }

    let talkgroup_id = capture_num(&TALKGROUP, line)?;
    let frequency = capture_hz(line)?;
    let recorder = capture_num(&RECORDER, line);
    let tdma = capture(&TDMA, line).map(|s| s.eq_ignore_ascii_case("true"));
    let slot = capture_num(&SLOT, line);
    let unit_id = capture_num(&SOURCE_UNIT, line);

    if line.contains("UPDATE") {
        Some(EventKind::Update {
            talkgroup_id,
            frequency,
            recorder,
            tdma,
            slot,
            unit_id,
        })
    } else {
        Some(EventKind::Grant {
            talkgroup_id,
            frequency,
            recorder,
            tdma,
            slot,
            unit_id,
        })
    }
}

fn recorder_stop(line: &str) -> Option<EventKind> {
    if !line.contains("Stopping P25 Recorder") && !line.contains("Concluding Recorded Call") {
        return None;
    }

    Some(EventKind::End {
        talkgroup_id: capture_num(&TALKGROUP, line)?,
        frequency: capture_hz(line),
        recorder: capture_num(&RECORDER, line),
    })
}

fn encrypted(line: &str) -> Option<EventKind> {
    if !line.contains("ENCRYPTED") {
        return None;
    }

    Some(EventKind::Encrypted {
        talkgroup_id: capture_num(&TALKGROUP, line)?,
        frequency: capture_hz(line),
    })
}

fn out_of_band(line: &str) -> Option<EventKind> {
    if !line.contains("Not Recording") {
        return None;
    }

    Some(EventKind::OutOfBand {
        talkgroup_id: capture_num(&TALKGROUP, line)?,
        frequency: capture_hz(line),
    })
}

fn no_recorder(line: &str) -> Option<EventKind> {
    if !line.contains("No Digital Recorders Available") {
        return None;
    }

    Some(EventKind::NoRecorder {
        talkgroup_id: capture_num(&TALKGROUP, line)?,
        frequency: capture_hz(line),
    })
}

fn decode_rate(line: &str) -> Option<EventKind> {
    if !line.contains("Control Channel Message Decode Rate") {
        return None;
    }

    Some(EventKind::DecodeRate {
        rate: capture_num(&DECODE_RATE, line)?,
    })
}

fn system_info(line: &str) -> Option<EventKind> {
    if !line.contains("Decoding System ID") && !line.contains("Decoding System Site") {
        return None;
    }

    let event = EventKind::SystemInfo {
        system_id: capture_num(&SYSTEM_ID, line),
        wacn: capture_hex(&WACN, line),
        nac: capture_hex(&NAC, line),
        rfss: capture_num(&RFSS, line),
        site_id: capture_num(&SITE_ID, line),
    };

    let empty = matches!(
        event,
        EventKind::SystemInfo {
            system_id: None,
            wacn: None,
            nac: None,
            rfss: None,
            site_id: None,
        }
    );
    (!empty).then_some(event)
}

fn unit(line: &str) -> Option<EventKind> {
    if !line.contains("Unit ID set via Control Channel") {
        return None;
    }

    Some(EventKind::Unit {
        unit_id: capture_num(&SOURCE_UNIT, line)?,
        talkgroup_id: capture_num(&TALKGROUP, line),
    })
}
