//! Bridge from call events to the legacy dispatch console.
//!
//! The console connection lives in its own task so a slow or absent console
//! never holds up viewer fan-out. Commands that do not fit in the queue are
//! dropped.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trunkcast_dispatch::{DispatchConfig, DispatchError, DispatchSession};
use trunkcast_model::{AudioPacket, Call};

const QUEUE_DEPTH: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchCommand {
    CallStart {
        call: Call,
        source_unit: Option<u32>,
    },
    CallUpdate {
        call_id: String,
        source_unit: u32,
    },
    Audio(AudioPacket),
    CallEnd {
        call_id: String,
    },
}

/// Sending side of the bridge
#[derive(Clone)]
pub struct DispatchBridge {
    tx: mpsc::Sender<DispatchCommand>,
}

impl DispatchBridge {
    /// Spawn the console task
    pub fn spawn(config: DispatchConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let task = tokio::spawn(run(DispatchSession::new(config), rx));
        (Self { tx }, task)
    }

    /// Bridge over an existing channel
    pub fn from_sender(tx: mpsc::Sender<DispatchCommand>) -> Self {
        Self { tx }
    }

    /// Queue a command without waiting
    pub fn send(&self, command: DispatchCommand) {
        if let Err(e) = self.tx.try_send(command) {
            debug!("Dispatch queue unavailable, dropping command: {}", e);
        }
    }
}

async fn run(mut session: DispatchSession, mut rx: mpsc::Receiver<DispatchCommand>) {
    while let Some(command) = rx.recv().await {
        if let DispatchCommand::CallStart { .. } = command {
            if !session.is_connected() {
                if let Err(e) = session.connect().await {
                    warn!("Dispatch console unreachable: {}", e);
                    continue;
                }
            }
        }

        let result = match command {
            DispatchCommand::CallStart { call, source_unit } => {
                session.call_start(&call, source_unit).await.map(|_| ())
            }
            DispatchCommand::CallUpdate {
                call_id,
                source_unit,
            } => session.call_update(&call_id, source_unit).await.map(|_| ()),
            DispatchCommand::Audio(packet) => session.send_audio(&packet).await.map(|_| ()),
            DispatchCommand::CallEnd { call_id } => {
                session.call_end(&call_id);
                Ok(())
            }
        };

        match result {
            Ok(()) | Err(DispatchError::NotConnected) => {}
            Err(e) => warn!("Dispatch console error: {}", e),
        }
    }
    info!("Dispatch bridge stopped");
}
