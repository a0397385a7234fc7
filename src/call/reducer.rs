//! Reine Transition-Funktion der Call-State-Machine
//!
//! `reduce(session, event, ctx)` liefert die neue Session plus eine Liste
//! von Effekten. Hier passiert keine I/O; Effekte führt der
//! `CallSessionController` über seine Kollaborateure aus.
//!
//! | Von | Event | Nach |
//! |---|---|---|
//! | NONE | callTo / joinCall / IncomingCall | LOADING / LOADING / AWAITING |
//! | LOADING | RoomCreated | AWAITING |
//! | LOADING | Error / Loading-Timeout | FAILED_TO_CONNECT |
//! | AWAITING | CallStarted | ACTIVE |
//! | AWAITING | IncomingCallTimeout / Ring-Timeout | NO_RESPONSE |
//! | AWAITING | CallEnded(reason) | Terminal-Zustand laut reason |
//! | ACTIVE | ConnectionLost | RECONNECTING |
//! | RECONNECTING | ConnectionRestored | ACTIVE |
//! | RECONNECTING | ReconnectTimeout | FAILED_TO_CONNECT |
//! | ACTIVE / RECONNECTING | CallEnded | ENDED |
//! | nicht-terminal | leaveCall | ENDED |
//! | ENDED | CallEnded | NONE |
//! | terminal | DisplayWindow-Timeout | NONE |
//!
//! Alles andere ist ein No-op.

use super::events::{CallNotification, ConnectionEvent, Intent, MediaEvent, TimerKind};
use crate::error::{ConnectionError, IntentError, StateTransitionError};
use crate::session::{
    ButtonsBlock, CallSession, CallState, CallType, MediaKind, ParticipantPatch,
    ParticipantStatus, PendingIncoming, TrackHandle,
};
use crate::signaling::{EndReason, OutboundMessage, ParticipantInfo, SignalingEvent};
use std::time::Duration;

// ============================================================================
// TYPES
// ============================================================================

/// Eingabe des Reducers (Timer sind hier schon als gültig geprüft)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Intent(Intent),
    Signal(SignalingEvent),
    Connection(ConnectionEvent),
    TimerExpired(TimerKind),
    Media(MediaEvent),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Intent(intent) => intent.name(),
            SessionEvent::Signal(event) => event.name(),
            SessionEvent::Connection(ConnectionEvent::ConnectionLost) => "ConnectionLost",
            SessionEvent::Connection(ConnectionEvent::ConnectionRestored) => "ConnectionRestored",
            SessionEvent::Connection(ConnectionEvent::ReconnectTimeout) => "ReconnectTimeout",
            SessionEvent::TimerExpired(TimerKind::Loading) => "LoadingTimeout",
            SessionEvent::TimerExpired(TimerKind::Ring) => "RingTimeout",
            SessionEvent::TimerExpired(TimerKind::Reconnect) => "ReconnectTimeout",
            SessionEvent::TimerExpired(TimerKind::ButtonsUnblock) => "ButtonsUnblock",
            SessionEvent::TimerExpired(TimerKind::DisplayWindow) => "DisplayWindowExpired",
            SessionEvent::Media(MediaEvent::TrackAdded { .. }) => "TrackAdded",
        }
    }
}

/// Änderungen am Roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterUpdate {
    Upsert { id: String, patch: ParticipantPatch },
    Remove(String),
    /// Alle anderen IDs entfernen
    Retain(Vec<String>),
    AttachTrack { id: String, track: TrackHandle },
}

/// Aufträge an den `MediaDeviceCoordinator`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    ToggleMute(MediaKind),
    SetMuted(MediaKind, bool),
    Select { kind: MediaKind, device_id: String },
    StartScreenShare,
    StopScreenShare,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(OutboundMessage),
    Roster(RosterUpdate),
    Device(DeviceCommand),
    ArmTimer(TimerKind, Duration),
    CancelTimer(TimerKind),
    /// Alle Timer abbrechen, Roster leeren, Bildschirmfreigabe stoppen
    Teardown,
    Notify(CallNotification),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Event passt nicht zum Zustand (No-op)
    Ignored(StateTransitionError),
    /// Intent abgewiesen (No-op)
    Rejected(IntentError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub session: CallSession,
    pub effects: Vec<Effect>,
    pub outcome: Outcome,
}

impl Step {
    fn unchanged(session: &CallSession, outcome: Outcome) -> Self {
        Self {
            session: session.clone(),
            effects: Vec::new(),
            outcome,
        }
    }

    fn ignored(session: &CallSession, event: &SessionEvent) -> Self {
        Self::unchanged(
            session,
            Outcome::Ignored(StateTransitionError {
                state: session.state,
                event: event.name(),
            }),
        )
    }
}

/// Alles, was der Reducer außer Session und Event braucht
#[derive(Debug, Clone, Copy)]
pub struct ReduceContext<'a> {
    pub now_ms: i64,
    pub local_user_id: &'a str,
    pub loading_timeout: Duration,
    pub ring_timeout: Duration,
    pub display_window: Duration,
    pub buttons_block_window: Duration,
    pub reconnect_timeout: Duration,
}

// ============================================================================
// REDUCER
// ============================================================================

pub fn reduce(session: &CallSession, event: &SessionEvent, ctx: &ReduceContext<'_>) -> Step {
    match event {
        SessionEvent::Intent(intent) => reduce_intent(session, intent, event, ctx),
        SessionEvent::Signal(signal) => reduce_signal(session, signal, event, ctx),
        SessionEvent::Connection(connection) => reduce_connection(session, *connection, event, ctx),
        SessionEvent::TimerExpired(kind) => reduce_timer(session, *kind, event, ctx),
        SessionEvent::Media(MediaEvent::TrackAdded {
            participant_id,
            track,
        }) => {
            if session.state.is_live() && session.participants.contains_key(participant_id) {
                applied(
                    session.clone(),
                    vec![Effect::Roster(RosterUpdate::AttachTrack {
                        id: participant_id.clone(),
                        track: track.clone(),
                    })],
                )
            } else {
                Step::ignored(session, event)
            }
        }
    }
}

fn applied(session: CallSession, effects: Vec<Effect>) -> Step {
    Step {
        session,
        effects,
        outcome: Outcome::Applied,
    }
}

/// Wechsel in einen Terminal-Zustand: alles abbauen, Anzeige-Timer starten
fn terminate(
    mut session: CallSession,
    to: CallState,
    mut effects: Vec<Effect>,
    ctx: &ReduceContext<'_>,
) -> Step {
    debug_assert!(to.is_terminal());
    session.state = to;
    session.pending_incoming = None;
    session.buttons_blocked = ButtonsBlock::default();
    effects.push(Effect::Teardown);
    effects.push(Effect::ArmTimer(TimerKind::DisplayWindow, ctx.display_window));
    applied(session, effects)
}

fn reduce_intent(
    session: &CallSession,
    intent: &Intent,
    event: &SessionEvent,
    ctx: &ReduceContext<'_>,
) -> Step {
    let state = session.state;

    if intent.is_blockable() && session.buttons_blocked.blocked {
        return Step::unchanged(session, Outcome::Rejected(IntentError::ButtonsBlocked));
    }

    match intent {
        Intent::CallTo { target, call_type } => {
            if state != CallState::None {
                return Step::unchanged(session, Outcome::Rejected(IntentError::AlreadyInCall(state)));
            }
            let mut next = CallSession::reset_from(session);
            next.state = CallState::Loading;
            next.call_type = *call_type;
            next.room_id = Some(target.clone());
            applied(
                next,
                vec![
                    Effect::Device(DeviceCommand::SetMuted(
                        MediaKind::Video,
                        *call_type == CallType::Audio,
                    )),
                    Effect::Send(OutboundMessage::Call {
                        room_id: target.clone(),
                        call_type: *call_type,
                    }),
                    Effect::ArmTimer(TimerKind::Loading, ctx.loading_timeout),
                ],
            )
        }

        Intent::JoinCall {
            room_id,
            video_muted,
            audio_muted,
        } => {
            if state != CallState::None {
                return Step::unchanged(session, Outcome::Rejected(IntentError::AlreadyInCall(state)));
            }
            let mut next = CallSession::reset_from(session);
            next.state = CallState::Loading;
            next.call_type = if *video_muted {
                CallType::Audio
            } else {
                CallType::Video
            };
            next.room_id = Some(room_id.clone());
            applied(
                next,
                vec![
                    Effect::Device(DeviceCommand::SetMuted(MediaKind::Audio, *audio_muted)),
                    Effect::Device(DeviceCommand::SetMuted(MediaKind::Video, *video_muted)),
                    Effect::Send(OutboundMessage::JoinCall {
                        room_id: room_id.clone(),
                        video_muted: *video_muted,
                        audio_muted: *audio_muted,
                    }),
                    Effect::ArmTimer(TimerKind::Loading, ctx.loading_timeout),
                ],
            )
        }

        Intent::AcceptIncoming => {
            let Some(pending) = session.pending_incoming.as_ref().filter(|_| state == CallState::Awaiting)
            else {
                return Step::unchanged(session, Outcome::Rejected(IntentError::NoPendingIncomingCall));
            };
            let video_muted = pending.call_type == CallType::Audio || session.local_media.video_muted;
            let message = OutboundMessage::AcceptCall {
                room_id: session.room_id.clone(),
                from: pending.from.clone(),
                video_muted,
                audio_muted: session.local_media.audio_muted,
            };
            let mut next = session.clone();
            next.pending_incoming = None;
            applied(
                next,
                vec![
                    Effect::Device(DeviceCommand::SetMuted(MediaKind::Video, video_muted)),
                    Effect::Send(message),
                    Effect::ArmTimer(TimerKind::Ring, ctx.ring_timeout),
                ],
            )
        }

        Intent::DeclineIncoming => {
            let Some(pending) = session.pending_incoming.as_ref().filter(|_| state == CallState::Awaiting)
            else {
                return Step::unchanged(session, Outcome::Rejected(IntentError::NoPendingIncomingCall));
            };
            let message = OutboundMessage::DeclineCall {
                room_id: session.room_id.clone(),
                from: pending.from.clone(),
                busy: false,
            };
            applied(
                CallSession::reset_from(session),
                vec![Effect::Send(message), Effect::Teardown],
            )
        }

        Intent::LeaveCall => {
            if !state.is_live() {
                return Step::ignored(session, event);
            }
            let mut effects = Vec::new();
            match (&session.pending_incoming, &session.room_id) {
                // Nie angenommen: ablehnen statt verlassen
                (Some(pending), room_id) => effects.push(Effect::Send(OutboundMessage::DeclineCall {
                    room_id: room_id.clone(),
                    from: pending.from.clone(),
                    busy: false,
                })),
                (None, Some(room_id)) => effects.push(Effect::Send(OutboundMessage::LeaveCall {
                    room_id: room_id.clone(),
                })),
                (None, None) => {}
            }
            terminate(session.clone(), CallState::Ended, effects, ctx)
        }

        Intent::ToggleMute(kind) => applied(
            session.clone(),
            vec![Effect::Device(DeviceCommand::ToggleMute(*kind))],
        ),

        Intent::SwitchDevice { kind, device_id } => applied(
            session.clone(),
            vec![Effect::Device(DeviceCommand::Select {
                kind: *kind,
                device_id: device_id.clone(),
            })],
        ),

        Intent::StartScreenShare => {
            if !matches!(state, CallState::Active | CallState::Reconnecting) {
                return Step::ignored(session, event);
            }
            applied(
                session.clone(),
                vec![Effect::Device(DeviceCommand::StartScreenShare)],
            )
        }

        Intent::StopScreenShare => applied(
            session.clone(),
            vec![Effect::Device(DeviceCommand::StopScreenShare)],
        ),

        Intent::InviteUser { user_id } => match (&session.room_id, state) {
            (Some(room_id), CallState::Awaiting | CallState::Active)
                if session.pending_incoming.is_none() =>
            {
                applied(
                    session.clone(),
                    vec![Effect::Send(OutboundMessage::InviteUser {
                        room_id: room_id.clone(),
                        user_id: user_id.clone(),
                    })],
                )
            }
            _ => Step::ignored(session, event),
        },

        Intent::SetConnectionQuality(score) => {
            let mut next = session.clone();
            next.connection_quality_score = (*score).min(4);
            applied(next, Vec::new())
        }

        Intent::RefreshDevices => applied(
            session.clone(),
            vec![Effect::Device(DeviceCommand::Refresh)],
        ),
    }
}

fn reduce_signal(
    session: &CallSession,
    signal: &SignalingEvent,
    event: &SessionEvent,
    ctx: &ReduceContext<'_>,
) -> Step {
    let state = session.state;

    // Raumverzeichnis und eingehende Anrufe hängen nicht am gebundenen Raum
    match signal {
        SignalingEvent::LiveRoomsInfo { room_id, ids } => {
            return reduce_live_rooms(session, room_id, ids, ctx);
        }
        SignalingEvent::IncomingCall {
            from,
            call_type,
            room_id,
        } => {
            let repeated = session
                .pending_incoming
                .as_ref()
                .map_or(false, |pending| pending.from == *from)
                && session.room_id == *room_id;
            if repeated {
                return Step::ignored(session, event);
            }
            if state != CallState::None {
                tracing::info!(from = %from, state = %state, "Already in a call, auto-declining as busy");
                return applied(
                    session.clone(),
                    vec![Effect::Send(OutboundMessage::DeclineCall {
                        room_id: room_id.clone(),
                        from: from.clone(),
                        busy: true,
                    })],
                );
            }
            let mut next = CallSession::reset_from(session);
            next.state = CallState::Awaiting;
            next.call_type = *call_type;
            next.room_id = room_id.clone();
            next.pending_incoming = Some(PendingIncoming {
                from: from.clone(),
                call_type: *call_type,
            });
            return applied(next, vec![Effect::ArmTimer(TimerKind::Ring, ctx.ring_timeout)]);
        }
        _ => {}
    }

    if let Some(room_id) = signal.room_id() {
        if !session.matches_room(room_id) {
            return Step::ignored(session, event);
        }
    }

    match (state, signal) {
        (
            CallState::Loading,
            SignalingEvent::RoomCreated {
                room_id,
                participants,
            },
        ) => {
            let mut next = session.clone();
            next.room_id.get_or_insert_with(|| room_id.clone());
            let mut effects = upsert_all(participants, ctx);
            effects.push(Effect::CancelTimer(TimerKind::Loading));
            effects.push(Effect::ArmTimer(TimerKind::Ring, ctx.ring_timeout));
            next.state = CallState::Awaiting;
            applied(next, effects)
        }

        (CallState::Loading, SignalingEvent::Error { message, .. }) => terminate(
            session.clone(),
            CallState::FailedToConnect,
            vec![Effect::Notify(CallNotification::RemoteError {
                message: message.clone(),
            })],
            ctx,
        ),

        (
            CallState::Awaiting,
            SignalingEvent::CallStarted {
                room_id,
                participants,
                start_time,
            },
        ) => {
            let mut next = session.clone();
            next.room_id.get_or_insert_with(|| room_id.clone());
            next.state = CallState::Active;
            next.pending_incoming = None;
            next.start_time.get_or_insert(*start_time);
            let mut effects = upsert_all(participants, ctx);
            effects.push(Effect::CancelTimer(TimerKind::Ring));
            effects.push(Effect::CancelTimer(TimerKind::Loading));
            applied(next, effects)
        }

        (CallState::Awaiting, SignalingEvent::IncomingCallTimeout { .. }) => terminate(
            session.clone(),
            CallState::NoResponse,
            vec![Effect::Notify(CallNotification::RemoteNoResponse)],
            ctx,
        ),

        (CallState::Awaiting, SignalingEvent::CallEnded { reason, .. }) => {
            let (to, notification) = match reason {
                EndReason::Declined => (CallState::Declined, Some(CallNotification::RemoteDeclined)),
                EndReason::Busy => (CallState::Busy, Some(CallNotification::RemoteBusy)),
                EndReason::NoResponse => {
                    (CallState::NoResponse, Some(CallNotification::RemoteNoResponse))
                }
                EndReason::FailedToConnect => {
                    (CallState::FailedToConnect, Some(CallNotification::FailedToConnect))
                }
                EndReason::Ended => (CallState::Ended, None),
            };
            terminate(
                session.clone(),
                to,
                notification.map(Effect::Notify).into_iter().collect(),
                ctx,
            )
        }

        (CallState::Active | CallState::Reconnecting, SignalingEvent::CallEnded { .. }) => {
            terminate(session.clone(), CallState::Ended, Vec::new(), ctx)
        }

        // Bestätigung unseres eigenen leaveCall: Anzeige abkürzen
        (CallState::Ended, SignalingEvent::CallEnded { .. }) if session.room_id.is_some() => {
            applied(CallSession::reset_from(session), vec![Effect::Teardown])
        }

        (
            CallState::Awaiting | CallState::Active | CallState::Reconnecting,
            SignalingEvent::UserAdded { user_id, .. },
        ) => {
            if user_id == ctx.local_user_id || session.participants.contains_key(user_id) {
                return Step::ignored(session, event);
            }
            applied(
                session.clone(),
                vec![Effect::Roster(RosterUpdate::Upsert {
                    id: user_id.clone(),
                    patch: ParticipantPatch::status(ParticipantStatus::Awaiting),
                })],
            )
        }

        (
            CallState::Awaiting | CallState::Active | CallState::Reconnecting,
            SignalingEvent::LeaveCall { id, .. },
        ) => {
            if !session.participants.contains_key(id) {
                return Step::ignored(session, event);
            }
            applied(
                session.clone(),
                vec![Effect::Roster(RosterUpdate::Remove(id.clone()))],
            )
        }

        (state, SignalingEvent::ButtonsBlockState { are_blocked, .. }) if state.is_live() => {
            let mut next = session.clone();
            if *are_blocked {
                next.buttons_blocked = ButtonsBlock {
                    blocked: true,
                    expires_at: Some(ctx.now_ms + ctx.buttons_block_window.as_millis() as i64),
                };
                applied(
                    next,
                    vec![Effect::ArmTimer(
                        TimerKind::ButtonsUnblock,
                        ctx.buttons_block_window,
                    )],
                )
            } else {
                next.buttons_blocked = ButtonsBlock::default();
                applied(next, vec![Effect::CancelTimer(TimerKind::ButtonsUnblock)])
            }
        }

        _ => Step::ignored(session, event),
    }
}

/// Roster-Upserts für eine Teilnehmerliste vom Server, ohne uns selbst
fn upsert_all(participants: &[ParticipantInfo], ctx: &ReduceContext<'_>) -> Vec<Effect> {
    participants
        .iter()
        .filter(|p| p.id != ctx.local_user_id)
        .map(|p| {
            Effect::Roster(RosterUpdate::Upsert {
                id: p.id.clone(),
                patch: ParticipantPatch::status(p.status),
            })
        })
        .collect()
}

fn reduce_live_rooms(
    session: &CallSession,
    room_id: &str,
    ids: &[String],
    ctx: &ReduceContext<'_>,
) -> Step {
    let mut next = session.clone();
    if ids.is_empty() {
        next.live_rooms.remove(room_id);
    } else {
        next.live_rooms.insert(room_id.to_string(), ids.to_vec());
    }

    let bound_here = session.room_id.as_deref() == Some(room_id);
    let in_call = matches!(
        session.state,
        CallState::Awaiting | CallState::Active | CallState::Reconnecting
    );
    if !(bound_here && in_call) {
        return applied(next, Vec::new());
    }

    let remote: Vec<String> = ids
        .iter()
        .filter(|id| id.as_str() != ctx.local_user_id)
        .cloned()
        .collect();
    let mut effects = vec![Effect::Roster(RosterUpdate::Retain(remote.clone()))];
    effects.extend(
        remote
            .into_iter()
            .filter(|id| !session.participants.contains_key(id))
            .map(|id| {
                Effect::Roster(RosterUpdate::Upsert {
                    id,
                    patch: ParticipantPatch::status(ParticipantStatus::Loading),
                })
            }),
    );
    applied(next, effects)
}

fn reduce_connection(
    session: &CallSession,
    connection: ConnectionEvent,
    event: &SessionEvent,
    ctx: &ReduceContext<'_>,
) -> Step {
    match (session.state, connection) {
        (CallState::Active, ConnectionEvent::ConnectionLost) => {
            let mut next = session.clone();
            next.state = CallState::Reconnecting;
            applied(next, Vec::new())
        }
        (CallState::Reconnecting, ConnectionEvent::ConnectionRestored) => {
            let mut next = session.clone();
            next.state = CallState::Active;
            applied(next, Vec::new())
        }
        (CallState::Reconnecting, ConnectionEvent::ReconnectTimeout) => terminate(
            session.clone(),
            CallState::FailedToConnect,
            vec![Effect::Notify(CallNotification::Connection(
                ConnectionError::TimedOut(ctx.reconnect_timeout.as_millis() as u64),
            ))],
            ctx,
        ),
        _ => Step::ignored(session, event),
    }
}

fn reduce_timer(
    session: &CallSession,
    kind: TimerKind,
    event: &SessionEvent,
    ctx: &ReduceContext<'_>,
) -> Step {
    match (session.state, kind) {
        (CallState::Loading, TimerKind::Loading) => terminate(
            session.clone(),
            CallState::FailedToConnect,
            vec![Effect::Notify(CallNotification::FailedToConnect)],
            ctx,
        ),
        (CallState::Awaiting, TimerKind::Ring) => terminate(
            session.clone(),
            CallState::NoResponse,
            vec![Effect::Notify(CallNotification::RemoteNoResponse)],
            ctx,
        ),
        (_, TimerKind::Reconnect) => reduce_connection(
            session,
            ConnectionEvent::ReconnectTimeout,
            event,
            ctx,
        ),
        (_, TimerKind::ButtonsUnblock) if session.buttons_blocked.blocked => {
            let mut next = session.clone();
            next.buttons_blocked = ButtonsBlock::default();
            applied(next, Vec::new())
        }
        (state, TimerKind::DisplayWindow) if state.is_terminal() => {
            applied(CallSession::reset_from(session), vec![Effect::Teardown])
        }
        _ => Step::ignored(session, event),
    }
}
