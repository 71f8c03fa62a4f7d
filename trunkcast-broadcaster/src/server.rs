//! WebSocket front end for the broadcast hub.
//!
//! | Path  | Description |
//! |-------|-------------|
//! | `/ws` | Viewer WebSocket: JSON control messages and binary frames out, subscription commands in |

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, Utf8Bytes, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::error::{BroadcasterError, Result};
use crate::hub::{BroadcastHub, Connection};
use crate::subscriber::Frame;

#[derive(Clone)]
struct ViewerState {
    hub: BroadcastHub,
    shutdown: watch::Receiver<bool>,
}

/// Router serving the viewer endpoint.
///
/// Open viewer sockets are closed once `shutdown` turns `true` or its
/// sender goes away.
pub fn router(hub: BroadcastHub, shutdown: watch::Receiver<bool>) -> Router {
    Router::new()
        .route("/ws", get(handle_upgrade))
        .with_state(ViewerState { hub, shutdown })
}

/// Viewer-facing server bound to a TCP address
pub struct HubServer {
    addr: SocketAddr,
    hub: BroadcastHub,
    task: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown: watch::Sender<bool>,
}

impl HubServer {
    pub fn new(addr: SocketAddr, hub: BroadcastHub) -> Self {
        Self {
            addr,
            hub,
            task: Mutex::new(None),
            local_addr: Mutex::new(None),
            shutdown: watch::Sender::new(false),
        }
    }

    /// Bind and start accepting viewers
    pub async fn start(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return Err(BroadcasterError::AlreadyRunning);
        }

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        let bound = listener.local_addr()?;
        *self.local_addr.lock().await = Some(bound);
        tracing::info!("Broadcast hub listening on ws://{}/ws", bound);

        self.shutdown.send_replace(false);
        let app = router(self.hub.clone(), self.shutdown.subscribe());
        *task = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Broadcast hub server failed: {}", e);
            }
            tracing::info!("Broadcast hub server stopped");
        }));

        Ok(())
    }

    /// Stop accepting viewers and close the ones already connected
    pub async fn stop(&self) -> Result<()> {
        let task = self
            .task
            .lock()
            .await
            .take()
            .ok_or(BroadcasterError::NotStarted)?;
        task.abort();
        self.shutdown.send_replace(true);
        *self.local_addr.lock().await = None;

        tracing::info!("Broadcast hub stopped");
        Ok(())
    }

    /// Address actually bound, once started
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }
}

async fn handle_upgrade(ws: WebSocketUpgrade, State(state): State<ViewerState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        match state.hub.connect() {
            Ok(connection) => run_viewer(socket, state, connection).await,
            Err(e) => tracing::error!("Failed to register viewer: {}", e),
        }
    })
}

/// Pump one viewer connection until either side goes away or the server stops
async fn run_viewer(mut socket: WebSocket, state: ViewerState, mut connection: Connection) {
    let ViewerState { hub, mut shutdown } = state;
    let mut stopping = *shutdown.borrow_and_update();

    while !stopping {
        tokio::select! {
            changed = shutdown.changed() => {
                stopping = changed.is_err() || *shutdown.borrow_and_update();
            }
            frame = connection.frames.recv() => {
                let Some(frame) = frame else { break };
                let Some(message) = to_message(frame) else { continue };
                if socket.send(message).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        hub.handle_client_message(&connection.id, text.as_str());
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if stopping {
        let _ = socket.send(Message::Close(None)).await;
    }
    hub.disconnect(&connection.id);
}

fn to_message(frame: Frame) -> Option<Message> {
    match frame {
        Frame::Text(bytes) => match Utf8Bytes::try_from(bytes) {
            Ok(text) => Some(Message::Text(text)),
            Err(e) => {
                tracing::warn!("Dropping non-UTF-8 text frame: {}", e);
                None
            }
        },
        Frame::Binary(bytes) => Some(Message::Binary(bytes)),
    }
}
