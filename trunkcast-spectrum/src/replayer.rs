//! Timed replay of spectrum recordings.
//!
//! The replayer is a single task that owns the playback state. Handles talk
//! to it over a command channel, and it reports packets, progress and
//! completion on an event channel. At most one timer is pending at a time:
//! the wait for the next packet's deadline, which any command preempts.
//!
//! Each packet's deadline is `virtual_start + offset`, so the wait is
//! `max(0, offset - elapsed)`. Pausing freezes the cursor; resuming moves
//! `virtual_start` forward by the pause length so the remaining offsets
//! still line up.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use trunkcast_model::FftPacket;

use crate::error::{Result, SpectrumError};
use crate::recording::{Recording, RecordingStore, RecordingSummary};

/// A progress notice goes out every this many packets
pub const PROGRESS_INTERVAL: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ReplayState {
    Idle,
    Replaying {
        #[serde(rename = "recordingId")]
        recording_id: String,
    },
    Paused {
        #[serde(rename = "recordingId")]
        recording_id: String,
    },
}

impl fmt::Display for ReplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayState::Idle => write!(f, "idle"),
            ReplayState::Replaying { recording_id } => write!(f, "replaying {recording_id}"),
            ReplayState::Paused { recording_id } => write!(f, "paused {recording_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayEvent {
    /// A snapshot due now, restamped as a live packet
    Packet(FftPacket),
    Progress {
        recording_id: String,
        /// 0.0 to 1.0 through the current pass
        progress: f64,
        packets_sent: usize,
        total_packets: usize,
    },
    /// A non-looping replay reached its end
    Completed { recording_id: String },
}

enum Command {
    Start {
        recording: Arc<Recording>,
        looping: bool,
        reply: oneshot::Sender<()>,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    State {
        reply: oneshot::Sender<ReplayState>,
    },
}

/// Handle to the replay task. Cloning shares the same task; it exits when
/// the last handle is dropped.
#[derive(Clone)]
pub struct SpectrumReplayer {
    commands: mpsc::Sender<Command>,
    store: Arc<RecordingStore>,
}

impl SpectrumReplayer {
    /// Spawn the replay task. Packets carry `source_index`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        store: RecordingStore,
        source_index: u32,
    ) -> (Self, mpsc::UnboundedReceiver<ReplayEvent>) {
        let (commands, command_rx) = mpsc::channel(16);
        let (events, event_rx) = mpsc::unbounded_channel();

        let actor = ReplayTask {
            commands: command_rx,
            events,
            source_index,
            playback: None,
        };
        tokio::spawn(actor.run());

        let replayer = Self {
            commands,
            store: Arc::new(store),
        };
        (replayer, event_rx)
    }

    /// Replay a stored recording from its beginning, replacing any replay
    /// in progress. An unknown id fails with `NotFound` and changes nothing.
    pub async fn start_replay(&self, id: &str, looping: bool) -> Result<()> {
        let store = Arc::clone(&self.store);
        let id = id.to_string();
        let recording = Arc::new(blocking(move || store.load(&id)).await?);
        self.request(|reply| Command::Start {
            recording,
            looping,
            reply,
        })
        .await
    }

    /// Summaries of every stored recording, read off the async workers
    pub async fn recordings(&self) -> Result<Vec<RecordingSummary>> {
        let store = Arc::clone(&self.store);
        blocking(move || store.list()).await
    }

    /// Returns `false` if nothing was replaying
    pub async fn pause_replay(&self) -> Result<bool> {
        self.request(|reply| Command::Pause { reply }).await
    }

    /// Returns `false` if nothing was paused
    pub async fn resume_replay(&self) -> Result<bool> {
        self.request(|reply| Command::Resume { reply }).await
    }

    /// Always leaves the replayer idle. Safe to call repeatedly.
    pub async fn stop_replay(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn state(&self) -> Result<ReplayState> {
        self.request(|reply| Command::State { reply }).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| SpectrumError::ShutDown)?;
        rx.await.map_err(|_| SpectrumError::ShutDown)
    }
}

/// Run store I/O on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SpectrumError::Io(std::io::Error::other(e)))?
}

struct Playback {
    recording: Arc<Recording>,
    looping: bool,
    cursor: usize,
    virtual_start: Instant,
    paused_at: Option<Instant>,
}

impl Playback {
    /// When the packet under the cursor is due; `None` while paused
    fn deadline(&self) -> Option<Instant> {
        if self.paused_at.is_some() {
            return None;
        }
        self.recording
            .offset(self.cursor)
            .map(|offset| self.virtual_start + offset)
    }

    fn state(&self) -> ReplayState {
        let recording_id = self.recording.id.clone();
        if self.paused_at.is_some() {
            ReplayState::Paused { recording_id }
        } else {
            ReplayState::Replaying { recording_id }
        }
    }
}

struct ReplayTask {
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedSender<ReplayEvent>,
    source_index: u32,
    playback: Option<Playback>,
}

impl ReplayTask {
    async fn run(mut self) {
        loop {
            let deadline = self.playback.as_ref().and_then(Playback::deadline);

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },

                _ = async {
                    match deadline {
                        Some(deadline) => sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => self.emit_next(),
            }
        }
        tracing::debug!("Spectrum replay task stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start {
                recording,
                looping,
                reply,
            } => {
                if let Some(previous) = self.playback.take() {
                    tracing::info!("Replacing replay of {}", previous.recording.id);
                }
                tracing::info!(
                    "Replaying spectrum recording {} ({} snapshots, loop: {})",
                    recording.id,
                    recording.len(),
                    looping
                );
                if recording.is_empty() {
                    self.emit(ReplayEvent::Completed {
                        recording_id: recording.id.clone(),
                    });
                } else {
                    self.playback = Some(Playback {
                        recording,
                        looping,
                        cursor: 0,
                        virtual_start: Instant::now(),
                        paused_at: None,
                    });
                }
                let _ = reply.send(());
            }
            Command::Pause { reply } => {
                let paused = match &mut self.playback {
                    Some(playback) if playback.paused_at.is_none() => {
                        playback.paused_at = Some(Instant::now());
                        tracing::info!(
                            "Paused replay of {} at snapshot {}",
                            playback.recording.id,
                            playback.cursor
                        );
                        true
                    }
                    _ => false,
                };
                let _ = reply.send(paused);
            }
            Command::Resume { reply } => {
                let resumed = match &mut self.playback {
                    Some(playback) => match playback.paused_at.take() {
                        Some(paused_at) => {
                            playback.virtual_start += paused_at.elapsed();
                            tracing::info!("Resumed replay of {}", playback.recording.id);
                            true
                        }
                        None => false,
                    },
                    None => false,
                };
                let _ = reply.send(resumed);
            }
            Command::Stop { reply } => {
                if let Some(playback) = self.playback.take() {
                    tracing::info!("Stopped replay of {}", playback.recording.id);
                }
                let _ = reply.send(());
            }
            Command::State { reply } => {
                let state = self
                    .playback
                    .as_ref()
                    .map_or(ReplayState::Idle, Playback::state);
                let _ = reply.send(state);
            }
        }
    }

    /// Send the packet under the cursor and advance
    fn emit_next(&mut self) {
        let Some(playback) = self.playback.as_mut() else {
            return;
        };
        let recording = Arc::clone(&playback.recording);
        let total = recording.len();

        if let Some(packet) = recording.packet_at(playback.cursor, chrono::Utc::now(), self.source_index)
        {
            let _ = self.events.send(ReplayEvent::Packet(packet));
        }
        playback.cursor += 1;

        let sent = playback.cursor;
        if sent % PROGRESS_INTERVAL == 0 {
            let _ = self.events.send(ReplayEvent::Progress {
                recording_id: recording.id.clone(),
                progress: sent as f64 / total as f64,
                packets_sent: sent,
                total_packets: total,
            });
        }

        if sent < total {
            return;
        }
        if playback.looping {
            playback.cursor = 0;
            playback.virtual_start = Instant::now();
            tracing::debug!("Looping replay of {}", recording.id);
        } else {
            self.playback = None;
            tracing::info!("Replay of {} completed", recording.id);
            self.emit(ReplayEvent::Completed {
                recording_id: recording.id.clone(),
            });
        }
    }

    fn emit(&self, event: ReplayEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Replay event receiver dropped");
        }
    }
}
