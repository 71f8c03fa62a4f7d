//! Control context behind the IPC socket

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::info;
use trunkcast_broadcaster::BroadcastHub;
use trunkcast_model::CallStore;
use trunkcast_spectrum::{ReplayState, SpectrumReplayer};
use trunkcast_status::StatusChannelListener;

use crate::capture::{CaptureStatus, SpectrumCapture};

/// Snapshot returned by the `status` command
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStatus {
    pub replay: ReplayState,
    pub viewers: usize,
    pub active_calls: usize,
    pub status_channel_connected: bool,
    pub capture: Option<CaptureStatus>,
}

pub struct Daemon {
    replayer: SpectrumReplayer,
    hub: BroadcastHub,
    status: StatusChannelListener,
    calls: Arc<dyn CallStore>,
    capture: Option<Arc<SpectrumCapture>>,
}

impl Daemon {
    pub fn new(
        replayer: SpectrumReplayer,
        hub: BroadcastHub,
        status: StatusChannelListener,
        calls: Arc<dyn CallStore>,
    ) -> Self {
        Self {
            replayer,
            hub,
            status,
            calls,
            capture: None,
        }
    }

    pub fn with_capture(mut self, capture: Arc<SpectrumCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub async fn replay(&self, id: &str, looping: bool) -> Result<String> {
        info!("▶️ Replay requested: {} (loop: {})", id, looping);
        self.replayer.start_replay(id, looping).await?;
        Ok(format!("Replaying {}", id))
    }

    pub async fn pause(&self) -> Result<String> {
        if self.replayer.pause_replay().await? {
            info!("⏸️ Replay paused");
            Ok("Replay paused".to_string())
        } else {
            Ok("Nothing to pause".to_string())
        }
    }

    pub async fn resume(&self) -> Result<String> {
        if self.replayer.resume_replay().await? {
            info!("▶️ Replay resumed");
            Ok("Replay resumed".to_string())
        } else {
            Ok("Nothing to resume".to_string())
        }
    }

    pub async fn stop(&self) -> Result<String> {
        self.replayer.stop_replay().await?;
        Ok("Replay stopped".to_string())
    }

    pub fn record(&self, id: &str, max: Option<usize>) -> Result<String> {
        self.capture()?.start(id, max)?;
        Ok(format!("Recording {}", id))
    }

    pub async fn record_stop(&self) -> Result<String> {
        match self.capture()?.stop().await? {
            Some(summary) => {
                info!("💾 Spectrum capture saved: {}", summary.id);
                Ok(format!(
                    "Saved {} ({} snapshots)",
                    summary.id, summary.snapshots
                ))
            }
            None => Ok("Nothing recorded".to_string()),
        }
    }

    pub async fn status(&self) -> Result<String> {
        let status = DaemonStatus {
            replay: self.replayer.state().await?,
            viewers: self.hub.connection_count(),
            active_calls: self.calls.active_calls().len(),
            status_channel_connected: self.status.is_connected(),
            capture: self.capture.as_ref().and_then(|capture| capture.status()),
        };
        Ok(serde_json::to_string(&status)?)
    }

    pub async fn recordings(&self) -> Result<String> {
        let recordings = self.replayer.recordings().await?;
        Ok(serde_json::to_string(&recordings)?)
    }

    fn capture(&self) -> Result<&SpectrumCapture> {
        self.capture
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Spectrum capture is not enabled"))
    }

    pub fn clients(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.hub.subscriber_info())?)
    }
}
