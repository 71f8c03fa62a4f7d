//! WebSocket endpoint the decoder dials into.
//!
//! | Path | Description |
//! |------|-------------|
//! | `/`  | Status producer WebSocket (one connection at a time, 409 otherwise) |

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::listener::{ProducerSession, StatusChannelListener};

/// Router serving the producer endpoint
pub fn router(listener: StatusChannelListener) -> Router {
    Router::new()
        .route("/", get(handle_upgrade))
        .with_state(listener)
}

/// Bind `addr` and serve the status channel until the task is dropped
pub async fn serve(addr: SocketAddr, listener: StatusChannelListener) -> Result<()> {
    let tcp = TcpListener::bind(addr).await?;
    serve_listener(tcp, listener).await
}

/// Serve the status channel on an already bound socket
pub async fn serve_listener(tcp: TcpListener, listener: StatusChannelListener) -> Result<()> {
    info!("Status channel listening on ws://{}", tcp.local_addr()?);
    axum::serve(tcp, router(listener)).await?;
    Ok(())
}

async fn handle_upgrade(
    ws: WebSocketUpgrade,
    State(listener): State<StatusChannelListener>,
) -> Response {
    match listener.try_accept() {
        Ok(session) => ws.on_upgrade(move |socket| run_producer(socket, session)),
        Err(e) => {
            warn!("Refusing status connection: {}", e);
            (StatusCode::CONFLICT, e.to_string()).into_response()
        }
    }
}

/// Pump one producer connection until it closes
async fn run_producer(mut socket: WebSocket, mut session: ProducerSession) {
    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => {
                session.handle_message(text.as_str());
            }
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => {
                    session.handle_message(text);
                }
                Err(_) => debug!("Dropping non-UTF-8 binary status frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Status connection error: {}", e);
                break;
            }
        }
    }
    // Dropping the session emits Disconnected
}
