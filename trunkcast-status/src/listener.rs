use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use trunkcast_model::{Call, DecodeRate};

use crate::error::{Result, StatusError};
use crate::messages::{DecodeError, StatusMessage};

/// Normalized events emitted by the status channel
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// A producer connected
    Connected,
    /// The producer went away; a new one may connect later
    Disconnected,
    CallStart(Call),
    CallEnd(Call),
    CallsActive(Vec<Call>),
    Rates(Vec<DecodeRate>),
}

impl StatusEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StatusEvent::Connected => "connected",
            StatusEvent::Disconnected => "disconnected",
            StatusEvent::CallStart(_) => "callStart",
            StatusEvent::CallEnd(_) => "callEnd",
            StatusEvent::CallsActive(_) => "callsActive",
            StatusEvent::Rates(_) => "rates",
        }
    }
}

struct Shared {
    connected: AtomicBool,
    events: mpsc::UnboundedSender<StatusEvent>,
}

impl Shared {
    fn emit(&self, event: StatusEvent) {
        if self.events.send(event).is_err() {
            debug!("Status event receiver dropped");
        }
    }
}

/// Accepts one trusted producer at a time and normalizes its messages
#[derive(Clone)]
pub struct StatusChannelListener {
    shared: Arc<Shared>,
}

impl StatusChannelListener {
    /// Create the listener and the receiving end of its event stream
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let listener = Self {
            shared: Arc::new(Shared {
                connected: AtomicBool::new(false),
                events,
            }),
        };
        (listener, rx)
    }

    /// Claim the producer slot for a new connection.
    ///
    /// Emits [`StatusEvent::Connected`]. Fails while another producer holds
    /// the slot.
    pub fn try_accept(&self) -> Result<ProducerSession> {
        if self
            .shared
            .connected
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StatusError::ProducerConnected);
        }

        info!("Status producer connected");
        self.shared.emit(StatusEvent::Connected);

        Ok(ProducerSession {
            shared: Arc::clone(&self.shared),
            forwarded: 0,
            dropped: 0,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }
}

/// One connected producer. Dropping it emits [`StatusEvent::Disconnected`]
/// and frees the slot.
pub struct ProducerSession {
    shared: Arc<Shared>,
    forwarded: u64,
    dropped: u64,
}

impl ProducerSession {
    /// Handle one inbound text message.
    ///
    /// Returns `true` if it produced an event. Bad or unknown messages are
    /// logged and dropped; the session stays usable.
    pub fn handle_message(&mut self, text: &str) -> bool {
        let message = match StatusMessage::decode(text) {
            Ok(message) => message,
            Err(DecodeError::UnknownType(kind)) => {
                debug!("Ignoring unknown status message type: {}", kind);
                self.dropped += 1;
                return false;
            }
            Err(e) => {
                warn!("Dropping malformed status message: {}", e);
                self.dropped += 1;
                return false;
            }
        };

        let event = match message {
            StatusMessage::CallStart { call } => StatusEvent::CallStart(call),
            StatusMessage::CallEnd { call } => StatusEvent::CallEnd(call),
            StatusMessage::CallsActive { calls } => StatusEvent::CallsActive(calls),
            StatusMessage::Rates { rates } => StatusEvent::Rates(rates),
            StatusMessage::Systems { .. } | StatusMessage::Recorders { .. } => {
                debug!("Received {} update", message.kind());
                return false;
            }
        };

        self.forwarded += 1;
        self.shared.emit(event);
        true
    }

    /// Messages turned into events so far
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Messages dropped as malformed or unknown
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Drop for ProducerSession {
    fn drop(&mut self) {
        info!(
            "Status producer disconnected ({} forwarded, {} dropped)",
            self.forwarded, self.dropped
        );
        self.shared.connected.store(false, Ordering::Release);
        self.shared.emit(StatusEvent::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_producer_slot() {
        let (listener, _rx) = StatusChannelListener::new();
        let first = listener.try_accept().unwrap();
        assert!(listener.is_connected());
        assert!(matches!(
            listener.try_accept(),
            Err(StatusError::ProducerConnected)
        ));

        drop(first);
        assert!(!listener.is_connected());
        assert!(listener.try_accept().is_ok());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(StatusEvent::CallsActive(vec![]).name(), "callsActive");
        assert_eq!(StatusEvent::Disconnected.name(), "disconnected");
    }
}
