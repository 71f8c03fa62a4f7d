use std::collections::HashSet;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use trunkcast_model::TalkgroupId;

use crate::events::Delivery;

/// Opaque identifier handed to each viewer on connect
pub type ClientId = String;

/// Talkgroup subscription set. Empty means every talkgroup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TalkgroupFilter {
    talkgroups: HashSet<TalkgroupId>,
}

impl TalkgroupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The one place the "empty means all" rule lives
    pub fn matches(&self, talkgroup: TalkgroupId) -> bool {
        self.talkgroups.is_empty() || self.talkgroups.contains(&talkgroup)
    }

    pub fn add(&mut self, talkgroups: impl IntoIterator<Item = TalkgroupId>) {
        self.talkgroups.extend(talkgroups);
    }

    pub fn remove(&mut self, talkgroups: impl IntoIterator<Item = TalkgroupId>) {
        for tg in talkgroups {
            self.talkgroups.remove(&tg);
        }
    }

    pub fn clear(&mut self) {
        self.talkgroups.clear();
    }

    pub fn is_all(&self) -> bool {
        self.talkgroups.is_empty()
    }

    /// Sorted copy of the explicit subscriptions
    pub fn talkgroups(&self) -> Vec<TalkgroupId> {
        let mut tgs: Vec<_> = self.talkgroups.iter().copied().collect();
        tgs.sort_unstable();
        tgs
    }
}

/// One encoded outbound frame, shared between all recipients
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 JSON control message
    Text(Bytes),
    /// Length-prefixed audio or FFT frame
    Binary(Bytes),
}

impl Frame {
    pub fn is_binary(&self) -> bool {
        matches!(self, Frame::Binary(_))
    }

    pub fn as_bytes(&self) -> &Bytes {
        match self {
            Frame::Text(b) | Frame::Binary(b) => b,
        }
    }
}

/// Outcome of a non-blocking delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendOutcome {
    Sent,
    /// Queue full; the frame is skipped for this client only
    Full,
    /// Connection task is gone
    Closed,
}

pub(crate) struct Subscriber {
    pub(crate) id: ClientId,
    pub(crate) filter: TalkgroupFilter,
    pub(crate) audio_enabled: bool,
    pub(crate) connected_at: DateTime<Utc>,
    pub(crate) skipped: u64,
    tx: mpsc::Sender<Frame>,
}

impl Subscriber {
    pub(crate) fn new(id: ClientId, tx: mpsc::Sender<Frame>) -> Self {
        Self {
            id,
            filter: TalkgroupFilter::new(),
            audio_enabled: false,
            connected_at: Utc::now(),
            skipped: 0,
            tx,
        }
    }

    /// Whether this client should see a message with the given delivery rule
    pub(crate) fn wants(&self, delivery: &Delivery) -> bool {
        if delivery.requires_audio && !self.audio_enabled {
            return false;
        }
        match delivery.talkgroup {
            Some(tg) => self.filter.matches(tg),
            None => true,
        }
    }

    /// Enqueue without waiting
    pub(crate) fn try_deliver(&mut self, frame: Frame) -> SendOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => SendOutcome::Sent,
            Err(TrySendError::Full(_)) => {
                self.skipped += 1;
                SendOutcome::Full
            }
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    pub(crate) fn info(&self) -> SubscriberInfo {
        SubscriberInfo {
            client_id: self.id.clone(),
            talkgroups: self.filter.talkgroups(),
            audio_enabled: self.audio_enabled,
            connected_at: self.connected_at,
            skipped: self.skipped,
        }
    }
}

/// Snapshot of a connected client for status reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberInfo {
    pub client_id: ClientId,
    /// Empty means subscribed to everything
    pub talkgroups: Vec<TalkgroupId>,
    pub audio_enabled: bool,
    pub connected_at: DateTime<Utc>,
    /// Frames skipped because the client's queue was full
    pub skipped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = TalkgroupFilter::new();
        assert!(filter.is_all());
        assert!(filter.matches(1));
        assert!(filter.matches(u32::MAX));
    }

    #[test]
    fn test_filter_add_remove() {
        let mut filter = TalkgroupFilter::new();
        filter.add([5, 9]);
        assert!(filter.matches(5));
        assert!(!filter.matches(7));

        filter.remove([5]);
        assert!(!filter.matches(5));
        assert!(filter.matches(9));

        // Removing the last one falls back to "all"
        filter.remove([9]);
        assert!(filter.matches(7));
    }

    #[test]
    fn test_wants_respects_audio_opt_in() {
        let (tx, _rx) = mpsc::channel(1);
        let mut sub = Subscriber::new("a".into(), tx);
        assert!(!sub.wants(&Delivery::fft()));
        assert!(!sub.wants(&Delivery::audio(5)));

        sub.audio_enabled = true;
        sub.filter.add([5]);
        assert!(sub.wants(&Delivery::fft()));
        assert!(sub.wants(&Delivery::audio(5)));
        assert!(!sub.wants(&Delivery::audio(6)));
    }

    #[test]
    fn test_try_deliver_full_and_closed() {
        let (tx, rx) = mpsc::channel(1);
        let mut sub = Subscriber::new("a".into(), tx);
        let frame = Frame::Text(Bytes::from_static(b"{}"));

        assert_eq!(sub.try_deliver(frame.clone()), SendOutcome::Sent);
        assert_eq!(sub.try_deliver(frame.clone()), SendOutcome::Full);
        assert_eq!(sub.skipped, 1);

        drop(rx);
        assert_eq!(sub.try_deliver(frame), SendOutcome::Closed);
    }
}
