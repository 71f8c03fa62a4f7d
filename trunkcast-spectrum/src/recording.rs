use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trunkcast_model::FftPacket;

use crate::error::{Result, SpectrumError};

/// Shape shared by every snapshot in a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    pub source_index: u32,
    pub center_frequency: u64,
    pub sample_rate: u32,
    pub fft_size: u32,
    pub min_frequency: u64,
    pub max_frequency: u64,
    /// Offset of the last snapshot
    pub duration_ms: u64,
}

/// One captured magnitude set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// When it was captured
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Milliseconds after the first snapshot
    pub offset_ms: u64,
    pub magnitudes: Vec<f32>,
}

/// A captured spectrum sequence, immutable once loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: String,
    pub metadata: RecordingMetadata,
    /// Ordered by `offset_ms`
    pub snapshots: Vec<Snapshot>,
}

impl Recording {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Offset of snapshot `index` from the start of the recording
    pub fn offset(&self, index: usize) -> Option<Duration> {
        self.snapshots
            .get(index)
            .map(|s| Duration::from_millis(s.offset_ms))
    }

    /// Snapshot `index` as a live packet stamped with `now`
    pub fn packet_at(&self, index: usize, now: DateTime<Utc>, source_index: u32) -> Option<FftPacket> {
        let snapshot = self.snapshots.get(index)?;
        Some(FftPacket {
            source_index,
            center_frequency: self.metadata.center_frequency,
            sample_rate: self.metadata.sample_rate,
            timestamp: now,
            fft_size: self.metadata.fft_size,
            min_frequency: self.metadata.min_frequency,
            max_frequency: self.metadata.max_frequency,
            magnitudes: snapshot.magnitudes.clone(),
        })
    }

    pub fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            id: self.id.clone(),
            snapshots: self.len(),
            duration_ms: self.metadata.duration_ms,
            center_frequency: self.metadata.center_frequency,
        }
    }
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub id: String,
    pub snapshots: usize,
    pub duration_ms: u64,
    pub center_frequency: u64,
}

/// Recordings stored as `<id>.json` in one directory
#[derive(Debug, Clone)]
pub struct RecordingStore {
    dir: PathBuf,
}

impl RecordingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load(&self, id: &str) -> Result<Recording> {
        let path = self.path_for(id)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SpectrumError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write a recording, replacing any existing one with the same id
    pub fn save(&self, recording: &Recording) -> Result<PathBuf> {
        let path = self.path_for(&recording.id)?;
        fs::create_dir_all(&self.dir)?;

        // Write then rename
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(recording)?)?;
        fs::rename(&tmp, &path)?;

        tracing::info!(
            "Saved spectrum recording {} ({} snapshots)",
            recording.id,
            recording.len()
        );
        Ok(path)
    }

    /// All readable recordings, sorted by id. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<RecordingSummary>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load(id) {
                Ok(recording) => summaries.push(recording.summary()),
                Err(e) => tracing::warn!("Skipping unreadable recording {:?}: {}", path, e),
            }
        }
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !id.starts_with('.');
        if !valid {
            return Err(SpectrumError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}
