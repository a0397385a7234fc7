//! CallSessionController - einziger Schreiber der Session
//!
//! Nimmt ein [`Input`] nach dem anderen, lässt den Reducer entscheiden
//! und führt die Effekte über Signaling-Kanal, Roster, Geräte, Timer und
//! Supervisor aus. Danach wird der Snapshot aus den Kollaborateuren
//! aufgefrischt.

use super::events::{CallNotification, ConnectionEvent, Input, Intent, TimerKind};
use super::reducer::{
    reduce, DeviceCommand, Effect, Outcome, ReduceContext, RosterUpdate, SessionEvent,
};
use super::timers::SessionTimers;
use crate::config::CoordinatorConfig;
use crate::devices::MediaDeviceCoordinator;
use crate::participants::ParticipantRegistry;
use crate::reconnect::ReconnectionSupervisor;
use crate::session::{CallSession, CallState};
use crate::signaling::SignalingChannel;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Kapazität des Notification-Broadcasts
pub const NOTIFICATION_CAPACITY: usize = 100;

pub struct CallSessionController {
    session: CallSession,
    config: CoordinatorConfig,
    channel: SignalingChannel,
    registry: ParticipantRegistry,
    devices: MediaDeviceCoordinator,
    timers: Arc<SessionTimers>,
    supervisor: Arc<ReconnectionSupervisor>,
    notifications: broadcast::Sender<CallNotification>,
}

impl CallSessionController {
    pub fn new(
        config: CoordinatorConfig,
        channel: SignalingChannel,
        registry: ParticipantRegistry,
        devices: MediaDeviceCoordinator,
        timers: Arc<SessionTimers>,
        supervisor: Arc<ReconnectionSupervisor>,
    ) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let mut controller = Self {
            session: CallSession::idle(),
            config,
            channel,
            registry,
            devices,
            timers,
            supervisor,
            notifications,
        };
        controller.sync_snapshot();
        controller
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallNotification> {
        self.notifications.subscribe()
    }

    /// Sender-Klon, damit Handles nach dem Spawn noch abonnieren können
    pub fn notification_sender(&self) -> broadcast::Sender<CallNotification> {
        self.notifications.clone()
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn state(&self) -> CallState {
        self.session.state
    }

    /// Verarbeitet genau ein Input und gibt den neuen Snapshot zurück
    pub fn handle(&mut self, input: Input) -> &CallSession {
        if let Some(event) = self.to_session_event(input) {
            self.apply(event);
        }
        &self.session
    }

    /// Rohe Inputs auf Reducer-Events abbilden; `None` heißt verwerfen
    fn to_session_event(&self, input: Input) -> Option<SessionEvent> {
        match input {
            Input::Intent(intent) => Some(SessionEvent::Intent(intent)),
            Input::Frame(frame) => self.channel.on_message(&frame).map(SessionEvent::Signal),
            Input::Signal(event) => Some(SessionEvent::Signal(event)),
            Input::Connection(event) => Some(SessionEvent::Connection(event)),
            Input::Media(event) => Some(SessionEvent::Media(event)),
            Input::DevicesChanged => Some(SessionEvent::Intent(Intent::RefreshDevices)),
            Input::Timer(fired) => {
                if !self.timers.take_if_current(&fired) {
                    tracing::trace!(kind = ?fired.kind, id = fired.id, "Dropping stale timer expiry");
                    return None;
                }
                Some(match fired.kind {
                    TimerKind::Reconnect => {
                        SessionEvent::Connection(ConnectionEvent::ReconnectTimeout)
                    }
                    kind => SessionEvent::TimerExpired(kind),
                })
            }
        }
    }

    fn apply(&mut self, event: SessionEvent) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let ctx = ReduceContext {
            now_ms,
            local_user_id: &self.config.local_user_id,
            loading_timeout: self.config.loading_timeout,
            ring_timeout: self.config.ring_timeout,
            display_window: self.config.terminal_display_window,
            buttons_block_window: self.config.buttons_block_window,
            reconnect_timeout: self.config.reconnect_timeout,
        };
        let step = reduce(&self.session, &event, &ctx);

        let from = self.session.state;
        match &step.outcome {
            Outcome::Applied => {
                if from != step.session.state {
                    tracing::info!(
                        session = %step.session.session_id,
                        room = step.session.room_id.as_deref().unwrap_or("-"),
                        "Call state {} -> {} ({})",
                        from,
                        step.session.state,
                        event.name()
                    );
                }
            }
            Outcome::Ignored(e) => {
                tracing::debug!(session = %self.session.session_id, "Ignoring event: {}", e);
            }
            Outcome::Rejected(e) => {
                tracing::info!(session = %self.session.session_id, "Intent rejected: {}", e);
            }
        }

        self.session = step.session;
        for effect in step.effects {
            self.run_effect(effect);
        }
        self.sync_snapshot();
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Send(message) => {
                // Fehler sind schon geloggt; Zustand ändert sich dadurch nicht
                let _ = self.channel.send(&message);
            }
            Effect::Roster(update) => self.apply_roster(update),
            Effect::Device(command) => self.apply_device(command),
            Effect::ArmTimer(kind, delay) => {
                self.timers.arm(kind, delay);
            }
            Effect::CancelTimer(kind) => {
                self.timers.cancel(kind);
            }
            Effect::Teardown => {
                self.timers.cancel_all();
                self.supervisor.on_session_teardown();
                self.registry.clear();
                self.devices.stop_screen_share();
                tracing::debug!(session = %self.session.session_id, "Session resources released");
            }
            Effect::Notify(notification) => self.notify(notification),
        }
    }

    fn apply_roster(&mut self, update: RosterUpdate) {
        match update {
            RosterUpdate::Upsert { id, patch } => {
                self.registry.upsert(&id, &patch);
            }
            RosterUpdate::Remove(id) => {
                self.registry.remove(&id);
            }
            RosterUpdate::Retain(ids) => self.registry.retain_ids(&ids),
            RosterUpdate::AttachTrack { id, track } => {
                if !self.registry.attach_track(&id, track) {
                    tracing::debug!(participant = %id, "Track for unknown participant dropped");
                }
            }
        }
    }

    fn apply_device(&mut self, command: DeviceCommand) {
        match command {
            DeviceCommand::ToggleMute(kind) => {
                let muted = self.devices.toggle_mute(kind);
                tracing::debug!(%kind, muted, "Local mute toggled");
            }
            DeviceCommand::SetMuted(kind, muted) => self.devices.set_muted(kind, muted),
            DeviceCommand::Select { kind, device_id } => {
                if let Err(e) = self.devices.select(kind, &device_id) {
                    self.notify(CallNotification::MediaDevice(e));
                }
            }
            DeviceCommand::StartScreenShare => self.devices.start_screen_share(),
            DeviceCommand::StopScreenShare => self.devices.stop_screen_share(),
            DeviceCommand::Refresh => {
                for e in self.devices.refresh() {
                    self.notify(CallNotification::MediaDevice(e));
                }
            }
        }
    }

    fn notify(&self, notification: CallNotification) {
        tracing::debug!(?notification, "Call notification");
        // Ohne Abonnenten geht die Meldung verloren
        let _ = self.notifications.send(notification);
    }

    fn sync_snapshot(&mut self) {
        self.session.participants = self.registry.snapshot();
        self.session.users_amount = self.registry.users_amount();
        self.session.local_media = self.devices.local_media().clone();
        self.session.devices = self.devices.available();
    }
}

impl std::fmt::Debug for CallSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSessionController")
            .field("session_id", &self.session.session_id)
            .field("state", &self.session.state)
            .field("registry", &self.registry)
            .field("armed_timers", &self.timers.armed_count())
            .finish()
    }
}
