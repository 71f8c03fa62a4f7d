use chrono::{DateTime, Utc};
use trunkcast_model::FftPacket;

use crate::recording::{Recording, RecordingMetadata, Snapshot};

/// Captures live spectrum packets into a [`Recording`].
///
/// Offsets are measured from the first packet's timestamp and never go
/// backwards, even if the source clock does.
pub struct SpectrumRecorder {
    id: String,
    start: Option<DateTime<Utc>>,
    metadata: Option<RecordingMetadata>,
    snapshots: Vec<Snapshot>,
    max_snapshots: Option<usize>,
}

impl SpectrumRecorder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start: None,
            metadata: None,
            snapshots: Vec::new(),
            max_snapshots: None,
        }
    }

    /// Stop accepting packets after `max` snapshots
    pub fn with_limit(mut self, max: usize) -> Self {
        self.max_snapshots = Some(max);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.max_snapshots.is_some_and(|max| self.snapshots.len() >= max)
    }

    /// Add one packet. Returns `false` once the limit is reached.
    pub fn push(&mut self, packet: &FftPacket) -> bool {
        if self.is_full() {
            return false;
        }

        let start = *self.start.get_or_insert(packet.timestamp);
        let metadata = self.metadata.get_or_insert_with(|| RecordingMetadata {
            source_index: packet.source_index,
            center_frequency: packet.center_frequency,
            sample_rate: packet.sample_rate,
            fft_size: packet.fft_size,
            min_frequency: packet.min_frequency,
            max_frequency: packet.max_frequency,
            duration_ms: 0,
        });

        let elapsed = (packet.timestamp - start).num_milliseconds().max(0) as u64;
        let previous = self.snapshots.last().map_or(0, |s| s.offset_ms);
        let offset_ms = elapsed.max(previous);
        metadata.duration_ms = offset_ms;

        self.snapshots.push(Snapshot {
            timestamp: packet.timestamp,
            offset_ms,
            magnitudes: packet.magnitudes.clone(),
        });
        true
    }

    /// Finish capturing. `None` if nothing was recorded.
    pub fn finish(self) -> Option<Recording> {
        let metadata = self.metadata?;
        Some(Recording {
            id: self.id,
            metadata,
            snapshots: self.snapshots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn packet(ms: i64, level: f32) -> FftPacket {
        FftPacket {
            source_index: 1,
            center_frequency: 771_000_000,
            sample_rate: 2_400_000,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap(),
            fft_size: 1,
            min_frequency: 769_800_000,
            max_frequency: 772_200_000,
            magnitudes: vec![level],
        }
    }

    #[test]
    fn test_offsets_relative_to_first_packet() {
        let mut recorder = SpectrumRecorder::new("cap");
        for (ms, level) in [(0, -90.0), (50, -80.0), (120, -70.0)] {
            assert!(recorder.push(&packet(ms, level)));
        }

        let recording = recorder.finish().unwrap();
        let offsets: Vec<_> = recording.snapshots.iter().map(|s| s.offset_ms).collect();
        assert_eq!(offsets, vec![0, 50, 120]);
        assert_eq!(recording.metadata.duration_ms, 120);
        assert_eq!(recording.metadata.source_index, 1);
    }

    #[test]
    fn test_clock_going_backwards() {
        let mut recorder = SpectrumRecorder::new("cap");
        recorder.push(&packet(100, -90.0));
        recorder.push(&packet(200, -90.0));
        recorder.push(&packet(150, -90.0));
        recorder.push(&packet(50, -90.0));

        let offsets: Vec<_> = recorder
            .finish()
            .unwrap()
            .snapshots
            .iter()
            .map(|s| s.offset_ms)
            .collect();
        assert_eq!(offsets, vec![0, 100, 100, 100]);
    }

    #[test]
    fn test_limit() {
        let mut recorder = SpectrumRecorder::new("cap").with_limit(2);
        assert!(recorder.push(&packet(0, -90.0)));
        assert!(recorder.push(&packet(10, -90.0)));
        assert!(recorder.is_full());
        assert!(!recorder.push(&packet(20, -90.0)));
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn test_empty_recorder_finishes_to_none() {
        assert!(SpectrumRecorder::new("cap").finish().is_none());
    }
}
