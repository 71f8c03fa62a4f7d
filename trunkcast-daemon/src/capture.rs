//! Spectrum capture tapped off the router's FFT path.
//!
//! At most one capture runs at a time. It is saved to the recording store
//! when it reaches its snapshot limit or when `record stop` arrives.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};
use trunkcast_model::FftPacket;
use trunkcast_spectrum::{Recording, RecordingStore, RecordingSummary, SpectrumRecorder};

/// Capture in progress, as reported by `status`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatus {
    pub recording_id: String,
    pub snapshots: usize,
}

pub struct SpectrumCapture {
    store: RecordingStore,
    active: Mutex<Option<SpectrumRecorder>>,
}

impl SpectrumCapture {
    pub fn new(store: RecordingStore) -> Self {
        Self {
            store,
            active: Mutex::new(None),
        }
    }

    /// Begin capturing into `id`, stopping by itself after `max` snapshots
    pub fn start(&self, id: &str, max: Option<usize>) -> Result<()> {
        let mut active = self.active.lock();
        if let Some(recorder) = active.as_ref() {
            anyhow::bail!("Already recording {}", recorder.id());
        }
        if !valid_id(id) {
            anyhow::bail!("Invalid recording id: {:?}", id);
        }

        let mut recorder = SpectrumRecorder::new(id);
        if let Some(max) = max {
            recorder = recorder.with_limit(max);
        }
        *active = Some(recorder);
        info!("⏺️ Spectrum capture started: {} (limit: {:?})", id, max);
        Ok(())
    }

    /// Feed one packet to the running capture, if any
    pub fn push(&self, packet: &FftPacket) {
        let finished = {
            let mut active = self.active.lock();
            let Some(recorder) = active.as_mut() else {
                return;
            };
            recorder.push(packet);
            if !recorder.is_full() {
                return;
            }
            active.take().and_then(SpectrumRecorder::finish)
        };

        if let Some(recording) = finished {
            self.save_in_background(recording);
        }
    }

    /// Stop the running capture and save what it holds
    pub async fn stop(&self) -> Result<Option<RecordingSummary>> {
        let Some(recorder) = self.active.lock().take() else {
            return Ok(None);
        };
        let Some(recording) = recorder.finish() else {
            info!("Spectrum capture stopped with no packets");
            return Ok(None);
        };

        let summary = recording.summary();
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.save(&recording))
            .await
            .context("Recording save task failed")??;
        Ok(Some(summary))
    }

    pub fn status(&self) -> Option<CaptureStatus> {
        self.active.lock().as_ref().map(|recorder| CaptureStatus {
            recording_id: recorder.id().to_string(),
            snapshots: recorder.len(),
        })
    }

    fn save_in_background(&self, recording: Recording) {
        let store = self.store.clone();
        let save = move || {
            if let Err(e) = store.save(&recording) {
                warn!("Failed to save spectrum recording {}: {}", recording.id, e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(save);
            }
            Err(_) => save(),
        }
    }
}

/// Same id rules the store applies to file names
fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn packet(ms: i64) -> FftPacket {
        FftPacket {
            source_index: 0,
            center_frequency: 851_000_000,
            sample_rate: 2_400_000,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap(),
            fft_size: 1,
            min_frequency: 849_800_000,
            max_frequency: 852_200_000,
            magnitudes: vec![-90.0],
        }
    }

    #[test]
    fn test_packets_ignored_until_started() {
        let dir = TempDir::new().unwrap();
        let capture = SpectrumCapture::new(RecordingStore::new(dir.path()));

        capture.push(&packet(0));
        assert!(capture.status().is_none());

        capture.start("scan", None).unwrap();
        capture.push(&packet(0));
        capture.push(&packet(40));
        assert_eq!(
            capture.status(),
            Some(CaptureStatus {
                recording_id: "scan".into(),
                snapshots: 2
            })
        );
    }

    #[test]
    fn test_start_rejects_second_capture_and_bad_ids() {
        let dir = TempDir::new().unwrap();
        let capture = SpectrumCapture::new(RecordingStore::new(dir.path()));

        assert!(capture.start("../escape", None).is_err());
        assert!(capture.start(".hidden", None).is_err());
        capture.start("first", None).unwrap();
        assert!(capture.start("second", None).is_err());
    }

    #[test]
    fn test_limit_saves_outside_runtime() {
        let dir = TempDir::new().unwrap();
        let store = RecordingStore::new(dir.path());
        let capture = SpectrumCapture::new(store.clone());

        capture.start("burst", Some(2)).unwrap();
        capture.push(&packet(0));
        capture.push(&packet(25));
        capture.push(&packet(50));

        assert!(capture.status().is_none());
        let recording = store.load("burst").unwrap();
        assert_eq!(recording.len(), 2);
        assert_eq!(recording.metadata.duration_ms, 25);
    }

    #[tokio::test]
    async fn test_stop_saves_partial_capture() {
        let dir = TempDir::new().unwrap();
        let store = RecordingStore::new(dir.path());
        let capture = SpectrumCapture::new(store.clone());

        assert_eq!(capture.stop().await.unwrap(), None);

        capture.start("partial", Some(100)).unwrap();
        capture.push(&packet(0));
        capture.push(&packet(30));
        let summary = capture.stop().await.unwrap().unwrap();
        assert_eq!(summary.id, "partial");
        assert_eq!(summary.snapshots, 2);
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(capture.status().is_none());
    }
}
