//! Event routing between the ingestion sources and the consumers.
//!
//! ```text
//! log watcher ─┐                  ┌─> broadcast hub (viewers)
//! status chan ─┼─> EventRouter ───┼─> call store
//! replayer ────┘                  └─> dispatch bridge (console)
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use trunkcast_broadcaster::{BroadcastHub, HubMessage};
use trunkcast_logwatch::{ControlChannelEvent, EventKind};
use trunkcast_model::{AudioPacket, AudioType, Call, CallStore, DecodeRate, FftPacket, TalkgroupId};
use trunkcast_spectrum::ReplayEvent;
use trunkcast_status::StatusEvent;

use crate::capture::SpectrumCapture;
use crate::dispatch::{DispatchBridge, DispatchCommand};

/// Fans normalized events out to the hub, the call store and the console
#[derive(Clone)]
pub struct EventRouter {
    calls: Arc<dyn CallStore>,
    hub: BroadcastHub,
    dispatch: Option<DispatchBridge>,
    capture: Option<Arc<SpectrumCapture>>,
}

impl EventRouter {
    pub fn new(calls: Arc<dyn CallStore>, hub: BroadcastHub) -> Self {
        Self {
            calls,
            hub,
            dispatch: None,
            capture: None,
        }
    }

    pub fn with_dispatch(mut self, dispatch: DispatchBridge) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Tap spectrum frames into `capture` as they pass through
    pub fn with_capture(mut self, capture: Arc<SpectrumCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Apply one parsed log event
    pub fn handle_control_event(&self, event: ControlChannelEvent, observed_at: DateTime<Utc>) {
        let at = event.timestamp_or(observed_at);

        match event.kind {
            EventKind::Grant {
                talkgroup_id,
                frequency,
                tdma,
                unit_id,
                ..
            } => self.grant(talkgroup_id, frequency, tdma, unit_id, at),
            EventKind::Update {
                talkgroup_id,
                frequency,
                tdma,
                unit_id,
                ..
            } => match self.calls.active_on_talkgroup(talkgroup_id) {
                Some(mut call) => {
                    call.frequency = frequency;
                    let call = self.calls.upsert_call(call);
                    if let Some(unit) = unit_id {
                        self.dispatch(DispatchCommand::CallUpdate {
                            call_id: call.id,
                            source_unit: unit,
                        });
                    }
                }
                // Missed the grant; treat the update as the start
                None => self.grant(talkgroup_id, frequency, tdma, unit_id, at),
            },
            EventKind::End { talkgroup_id, .. } => self.end_on_talkgroup(talkgroup_id, at),
            EventKind::Encrypted { talkgroup_id, .. } => {
                if let Some(mut call) = self.calls.active_on_talkgroup(talkgroup_id) {
                    call.encrypted = true;
                    self.calls.upsert_call(call);
                }
                debug!("TG {} is encrypted", talkgroup_id);
            }
            EventKind::Unit {
                unit_id,
                talkgroup_id: Some(talkgroup_id),
            } => {
                if let Some(call) = self.calls.active_on_talkgroup(talkgroup_id) {
                    self.dispatch(DispatchCommand::CallUpdate {
                        call_id: call.id,
                        source_unit: unit_id,
                    });
                }
            }
            EventKind::DecodeRate { rate } => {
                let rates = vec![DecodeRate {
                    sys_num: 0,
                    sys_name: String::new(),
                    decoderate: rate,
                    control_channel: None,
                    extra: Default::default(),
                }];
                self.broadcast(&HubMessage::Rates { rates });
            }
            EventKind::OutOfBand { talkgroup_id, .. } => {
                debug!("TG {} granted outside the monitored band", talkgroup_id)
            }
            EventKind::NoRecorder { talkgroup_id, .. } => {
                warn!("No recorder available for TG {}", talkgroup_id)
            }
            EventKind::SystemInfo {
                system_id,
                wacn,
                nac,
                ..
            } => info!(
                "Control channel system: id {:?}, WACN {:?}, NAC {:?}",
                system_id, wacn, nac
            ),
            EventKind::Unit {
                talkgroup_id: None, ..
            } => {}
        }
    }

    /// Apply one status channel event
    pub fn handle_status_event(&self, event: StatusEvent) {
        match event {
            StatusEvent::Connected => info!("Decoder status channel up"),
            StatusEvent::Disconnected => info!("Decoder status channel down"),
            StatusEvent::CallStart(call) => {
                let call = self.calls.upsert_call(call);
                self.broadcast(&HubMessage::CallStart { call: call.clone() });
                self.dispatch(DispatchCommand::CallStart {
                    call,
                    source_unit: None,
                });
            }
            StatusEvent::CallEnd(call) => {
                let call = self.close_status_call(call);
                self.broadcast(&HubMessage::CallEnd { call: call.clone() });
                if call.audio_file.is_some() {
                    self.broadcast(&HubMessage::NewRecording { call: call.clone() });
                }
                self.dispatch(DispatchCommand::CallEnd { call_id: call.id });
            }
            StatusEvent::CallsActive(calls) => {
                for call in &calls {
                    self.calls.upsert_call(call.clone());
                }
                self.broadcast(&HubMessage::CallsActive { calls });
            }
            StatusEvent::Rates(rates) => self.broadcast(&HubMessage::Rates { rates }),
        }
    }

    /// Apply one spectrum replay event
    pub fn handle_replay_event(&self, event: ReplayEvent) {
        match event {
            ReplayEvent::Packet(packet) => self.handle_fft(&packet),
            ReplayEvent::Progress {
                recording_id,
                packets_sent,
                total_packets,
                ..
            } => debug!(
                "Replay {}: {}/{} packets",
                recording_id, packets_sent, total_packets
            ),
            ReplayEvent::Completed { recording_id } => {
                info!("Replay of {} finished", recording_id)
            }
        }
    }

    pub fn handle_fft(&self, packet: &FftPacket) {
        if let Some(capture) = &self.capture {
            capture.push(packet);
        }
        if let Err(e) = self.hub.broadcast_fft(packet) {
            warn!("Failed to broadcast spectrum frame: {}", e);
        }
    }

    /// Live call audio goes to viewers and the console
    pub fn handle_audio(&self, packet: AudioPacket) {
        if let Err(e) = self.hub.broadcast_audio(&packet) {
            warn!("Failed to broadcast audio frame: {}", e);
        }
        self.dispatch(DispatchCommand::Audio(packet));
    }

    fn grant(
        &self,
        talkgroup_id: TalkgroupId,
        frequency: u64,
        tdma: Option<bool>,
        unit_id: Option<u32>,
        at: DateTime<Utc>,
    ) {
        if let Some(existing) = self.calls.active_on_talkgroup(talkgroup_id) {
            if existing.frequency == frequency {
                debug!("Repeated grant for TG {}", talkgroup_id);
                return;
            }
            // Moved to another channel: the old call is over
            self.end_on_talkgroup(talkgroup_id, at);
        }

        let mut call = Call::new(
            format!("{}_{}", talkgroup_id, at.timestamp()),
            talkgroup_id,
            frequency,
            at,
        );
        call.audio_type = match tdma {
            Some(true) => AudioType::DigitalTdma,
            _ => AudioType::Digital,
        };

        let call = self.calls.upsert_call(call);
        info!("Call start: TG {} on {} Hz", talkgroup_id, frequency);
        self.broadcast(&HubMessage::CallStart { call: call.clone() });
        self.dispatch(DispatchCommand::CallStart {
            call,
            source_unit: unit_id,
        });
    }

    /// Close a call the decoder reported as ended, tracked or not
    fn close_status_call(&self, mut ended: Call) -> Call {
        let stop_time = ended.stop_time.unwrap_or_else(Utc::now);
        if let Some(tracked) = self.calls.close_call(&ended.id, stop_time) {
            ended.encrypted |= tracked.encrypted;
            ended.emergency |= tracked.emergency;
        }
        // The decoder may send a stop time without a length
        if ended.duration.is_none() {
            ended.stop_time = None;
        }
        ended.close(stop_time);
        ended
    }

    fn end_on_talkgroup(&self, talkgroup_id: TalkgroupId, at: DateTime<Utc>) {
        let Some(active) = self.calls.active_on_talkgroup(talkgroup_id) else {
            debug!("End for TG {} with no active call", talkgroup_id);
            return;
        };
        let Some(call) = self.calls.close_call(&active.id, at) else {
            return;
        };
        info!(
            "Call end: TG {} after {:.1}s",
            talkgroup_id,
            call.duration.unwrap_or_default()
        );
        self.broadcast(&HubMessage::CallEnd { call: call.clone() });
        self.dispatch(DispatchCommand::CallEnd { call_id: call.id });
    }

    fn broadcast(&self, message: &HubMessage) {
        if let Err(e) = self.hub.broadcast(message) {
            warn!("Failed to broadcast {:?}: {}", message_name(message), e);
        }
    }

    fn dispatch(&self, command: DispatchCommand) {
        if let Some(bridge) = &self.dispatch {
            bridge.send(command);
        }
    }
}

fn message_name(message: &HubMessage) -> &'static str {
    match message {
        HubMessage::Connected { .. } => "connected",
        HubMessage::CallStart { .. } => "callStart",
        HubMessage::CallEnd { .. } => "callEnd",
        HubMessage::NewRecording { .. } => "newRecording",
        HubMessage::CallsActive { .. } => "callsActive",
        HubMessage::Rates { .. } => "rates",
    }
}
