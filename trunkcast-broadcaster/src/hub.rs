use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use trunkcast_model::{AudioPacket, FftPacket};

use crate::error::Result;
use crate::events::{ClientMessage, Delivery, HubMessage};
use crate::frame::{audio_frame, fft_frame};
use crate::subscriber::{ClientId, Frame, SendOutcome, Subscriber, SubscriberInfo};

/// Frames queued ahead of the regular traffic on every new connection
const GREETING_FRAMES: usize = 3;

/// Result of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Clients the frame was queued for
    pub delivered: usize,
    /// Matching clients whose queue was full
    pub skipped: usize,
}

/// A registered viewer: its id and the queue its writer drains
#[derive(Debug)]
pub struct Connection {
    pub id: ClientId,
    pub frames: mpsc::Receiver<Frame>,
}

impl Connection {
    pub async fn recv(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<ClientId, Subscriber>,
    last_calls_active: Option<Bytes>,
    last_rates: Option<Bytes>,
}

/// Registry of viewer clients and the fan-out over them.
///
/// Every client gets its own bounded queue. Broadcasting never waits on a
/// client: a full queue means that client misses the frame.
#[derive(Clone)]
pub struct BroadcastHub {
    registry: Arc<Mutex<Registry>>,
    buffer: usize,
}

impl BroadcastHub {
    /// Create a hub whose clients each buffer up to `buffer` frames
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            buffer: buffer.max(GREETING_FRAMES),
        }
    }

    /// Register a new client.
    ///
    /// Its queue starts with the `connected` greeting followed by the last
    /// `callsActive` and `rates` snapshots, if any.
    pub fn connect(&self) -> Result<Connection> {
        let id = uuid::Uuid::new_v4().to_string();
        let greeting = encode_text(&HubMessage::Connected {
            client_id: id.clone(),
        })?;

        let (tx, frames) = mpsc::channel(self.buffer);
        let mut subscriber = Subscriber::new(id.clone(), tx);

        let mut registry = self.registry.lock();
        subscriber.try_deliver(greeting);
        for cached in [&registry.last_calls_active, &registry.last_rates]
            .into_iter()
            .flatten()
        {
            subscriber.try_deliver(Frame::Text(cached.clone()));
        }
        registry.subscribers.insert(id.clone(), subscriber);
        let total = registry.subscribers.len();
        drop(registry);

        tracing::info!("Client {} connected. Total clients: {}", id, total);
        Ok(Connection { id, frames })
    }

    /// Forget a client. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: &str) -> bool {
        let mut registry = self.registry.lock();
        let removed = registry.subscribers.remove(id).is_some();
        if removed {
            tracing::info!(
                "Client {} disconnected. Remaining: {}",
                id,
                registry.subscribers.len()
            );
        }
        removed
    }

    /// Apply a subscription or audio toggle sent by a client.
    ///
    /// Unrecognized input is ignored and returns `false`.
    pub fn handle_client_message(&self, id: &str, text: &str) -> bool {
        let Some(message) = ClientMessage::parse(text) else {
            tracing::debug!("Ignoring unrecognized message from client {}", id);
            return false;
        };

        let mut registry = self.registry.lock();
        let Some(subscriber) = registry.subscribers.get_mut(id) else {
            return false;
        };

        match message {
            ClientMessage::Subscribe { talkgroups } => subscriber.filter.add(talkgroups),
            ClientMessage::Unsubscribe { talkgroups } => subscriber.filter.remove(talkgroups),
            ClientMessage::SubscribeAll => subscriber.filter.clear(),
            ClientMessage::EnableAudio { enabled } => subscriber.audio_enabled = enabled,
        }
        tracing::debug!(
            "Client {} now on {:?} (audio: {})",
            id,
            subscriber.filter.talkgroups(),
            subscriber.audio_enabled
        );
        true
    }

    /// Send a JSON control message to every client its delivery rule allows
    pub fn broadcast(&self, message: &HubMessage) -> Result<DeliveryStats> {
        let frame = encode_text(message)?;

        let mut registry = self.registry.lock();
        match message {
            HubMessage::CallsActive { .. } => {
                registry.last_calls_active = Some(frame.as_bytes().clone())
            }
            HubMessage::Rates { .. } => registry.last_rates = Some(frame.as_bytes().clone()),
            _ => {}
        }
        Ok(fan_out(&mut registry, frame, &message.delivery()))
    }

    /// Send an audio frame to audio-enabled clients subscribed to its talkgroup
    pub fn broadcast_audio(&self, packet: &AudioPacket) -> Result<DeliveryStats> {
        let frame = Frame::Binary(audio_frame(packet)?);
        let mut registry = self.registry.lock();
        Ok(fan_out(
            &mut registry,
            frame,
            &Delivery::audio(packet.talkgroup_id),
        ))
    }

    /// Send a spectrum frame to every audio-enabled client
    pub fn broadcast_fft(&self, packet: &FftPacket) -> Result<DeliveryStats> {
        let frame = Frame::Binary(fft_frame(packet)?);
        let mut registry = self.registry.lock();
        Ok(fan_out(&mut registry, frame, &Delivery::fft()))
    }

    pub fn connection_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }

    /// Snapshot of connected clients, oldest first
    pub fn subscriber_info(&self) -> Vec<SubscriberInfo> {
        let mut info: Vec<_> = self
            .registry
            .lock()
            .subscribers
            .values()
            .map(Subscriber::info)
            .collect();
        info.sort_by_key(|i| i.connected_at);
        info
    }
}

fn encode_text(message: &HubMessage) -> Result<Frame> {
    Ok(Frame::Text(Bytes::from(serde_json::to_vec(message)?)))
}

fn fan_out(registry: &mut Registry, frame: Frame, delivery: &Delivery) -> DeliveryStats {
    let mut stats = DeliveryStats::default();
    let mut closed = Vec::new();

    for subscriber in registry.subscribers.values_mut() {
        if !subscriber.wants(delivery) {
            continue;
        }
        match subscriber.try_deliver(frame.clone()) {
            SendOutcome::Sent => stats.delivered += 1,
            SendOutcome::Full => {
                stats.skipped += 1;
                tracing::debug!("Client {} queue full, skipping frame", subscriber.id);
            }
            SendOutcome::Closed => closed.push(subscriber.id.clone()),
        }
    }

    for id in closed {
        registry.subscribers.remove(&id);
        tracing::info!(
            "Removed closed client {}. Remaining: {}",
            id,
            registry.subscribers.len()
        );
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_create() {
        let hub = BroadcastHub::new(16);
        assert_eq!(hub.connection_count(), 0);
        assert!(hub.subscriber_info().is_empty());
    }

    #[test]
    fn test_buffer_fits_greeting() {
        let hub = BroadcastHub::new(0);
        assert_eq!(hub.buffer, GREETING_FRAMES);
    }

    #[tokio::test]
    async fn test_closed_client_is_pruned() {
        let hub = BroadcastHub::new(4);
        let conn = hub.connect().unwrap();
        drop(conn);

        let stats = hub.broadcast(&HubMessage::Rates { rates: vec![] }).unwrap();
        assert_eq!(stats, DeliveryStats::default());
        assert_eq!(hub.connection_count(), 0);
    }
}
