//! Active call tracking collaborator.
//!
//! The persistent call store lives outside trunkcast; this is the interface
//! the daemon drives, plus an in-memory implementation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{Call, TalkgroupId};

/// Upsert/close/list operations on tracked calls
pub trait CallStore: Send + Sync {
    /// Insert or update an active call. Updates to a closed call are ignored.
    ///
    /// Returns the stored state.
    fn upsert_call(&self, call: Call) -> Call;

    /// Close an active call. Returns the closed call, or `None` if unknown.
    fn close_call(&self, id: &str, stop_time: DateTime<Utc>) -> Option<Call>;

    /// Active call currently on a talkgroup, if any
    fn active_on_talkgroup(&self, talkgroup_id: TalkgroupId) -> Option<Call>;

    /// All calls not yet closed
    fn active_calls(&self) -> Vec<Call>;
}

/// In-memory call store keyed by call id
#[derive(Default)]
pub struct MemoryCallStore {
    active: Mutex<HashMap<String, Call>>,
}

impl MemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CallStore for MemoryCallStore {
    fn upsert_call(&self, call: Call) -> Call {
        let mut active = self.active.lock();

        if call.is_closed() {
            // A closed call coming in from a producer ends tracking
            active.remove(&call.id);
            return call;
        }

        let stored = active
            .entry(call.id.clone())
            .and_modify(|existing| {
                existing.frequency = call.frequency;
                existing.emergency = call.emergency;
                existing.encrypted = call.encrypted;
                existing.audio_type = call.audio_type;
                if call.audio_file.is_some() {
                    existing.audio_file = call.audio_file.clone();
                }
            })
            .or_insert_with(|| call.clone());
        stored.clone()
    }

    fn close_call(&self, id: &str, stop_time: DateTime<Utc>) -> Option<Call> {
        let mut call = self.active.lock().remove(id)?;
        call.close(stop_time);
        tracing::debug!("Closed call {} after {:?}s", call.id, call.duration);
        Some(call)
    }

    fn active_on_talkgroup(&self, talkgroup_id: TalkgroupId) -> Option<Call> {
        self.active
            .lock()
            .values()
            .find(|c| c.talkgroup_id == talkgroup_id)
            .cloned()
    }

    fn active_calls(&self) -> Vec<Call> {
        let mut calls: Vec<Call> = self.active.lock().values().cloned().collect();
        calls.sort_by_key(|c| c.start_time);
        calls
    }
}
