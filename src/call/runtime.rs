//! Laufzeit: eine Task, eine Queue
//!
//! [`CallCoordinator::spawn`] baut Controller, Timer und Supervisor auf
//! und startet die Event-Schleife. Alle Eingaben (UI, Transport, Timer,
//! Engine) laufen über das [`CoordinatorHandle`] in dieselbe Queue; der
//! aktuelle Snapshot liegt in einem `watch`-Kanal.

use super::controller::CallSessionController;
use super::events::{CallNotification, Input, Intent, MediaEvent};
use super::timers::SessionTimers;
use crate::config::CoordinatorConfig;
use crate::devices::{DeviceEnumerator, MediaDeviceCoordinator};
use crate::engine::MediaEngine;
use crate::participants::ParticipantRegistry;
use crate::reconnect::ReconnectionSupervisor;
use crate::session::{CallSession, TrackHandle};
use crate::signaling::SignalingChannel;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

pub struct CallCoordinator;

impl CallCoordinator {
    /// Startet die Event-Schleife.
    ///
    /// Gibt das Handle und den Empfänger der ausgehenden Frames zurück;
    /// letzterer gehört dem Transport. Muss in einer Tokio-Runtime
    /// aufgerufen werden.
    pub fn spawn(
        config: CoordinatorConfig,
        engine: Arc<dyn MediaEngine>,
        enumerator: Arc<dyn DeviceEnumerator>,
    ) -> (CoordinatorHandle, mpsc::Receiver<String>) {
        let (inputs_tx, mut inputs_rx) = mpsc::unbounded_channel();
        let (channel, outbound_rx) = SignalingChannel::new();

        let timers = Arc::new(SessionTimers::new(inputs_tx.clone()));
        let supervisor = Arc::new(ReconnectionSupervisor::new(
            inputs_tx.clone(),
            timers.clone(),
            config.reconnect_timeout,
        ));

        tracing::info!(user = %config.local_user_id, "Starting call coordinator");

        let mut controller = CallSessionController::new(
            config,
            channel,
            ParticipantRegistry::new(engine.clone()),
            MediaDeviceCoordinator::new(enumerator, engine),
            timers,
            supervisor.clone(),
        );
        // Geräte einmal einlesen, bevor die UI den ersten Snapshot sieht
        controller.handle(Input::DevicesChanged);

        let (snapshot_tx, snapshot_rx) = watch::channel(controller.session().clone());
        let notifications = controller.notification_sender();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = task_cancel.cancelled() => break,
                    input = inputs_rx.recv() => {
                        let Some(input) = input else { break };
                        let session = controller.handle(input);
                        snapshot_tx.send_if_modified(|current| {
                            if *current != *session {
                                *current = session.clone();
                                true
                            } else {
                                false
                            }
                        });
                    }
                }
            }

            // Laufenden Anruf sauber verlassen
            if controller.state().is_live() {
                let session = controller.handle(Input::Intent(Intent::LeaveCall));
                snapshot_tx.send_replace(session.clone());
            }
            tracing::info!("Call coordinator stopped");
        });

        let handle = CoordinatorHandle {
            inputs: inputs_tx,
            supervisor,
            snapshot: snapshot_rx,
            notifications,
            cancel,
        };
        (handle, outbound_rx)
    }
}

/// Zugang zur laufenden Event-Schleife; beliebig klonbar
#[derive(Clone)]
pub struct CoordinatorHandle {
    inputs: mpsc::UnboundedSender<Input>,
    supervisor: Arc<ReconnectionSupervisor>,
    snapshot: watch::Receiver<CallSession>,
    notifications: broadcast::Sender<CallNotification>,
    cancel: CancellationToken,
}

impl CoordinatorHandle {
    /// Lokale Absicht einreihen
    pub fn dispatch(&self, intent: Intent) {
        self.push(Input::Intent(intent));
    }

    /// Rohen Frame vom Transport einreihen
    pub fn deliver_frame(&self, frame: impl Into<String>) {
        self.push(Input::Frame(frame.into()));
    }

    /// Vom Transport bei Verbindungsänderung aufgerufen
    pub fn connectivity_changed(&self, connected: bool) {
        self.supervisor.connectivity_changed(connected);
    }

    /// Hot-Plug: Geräteliste neu einlesen
    pub fn devices_changed(&self) {
        self.push(Input::DevicesChanged);
    }

    /// Neuer Track von der Media-Engine
    pub fn track_added(&self, participant_id: impl Into<String>, track: TrackHandle) {
        self.push(Input::Media(MediaEvent::TrackAdded {
            participant_id: participant_id.into(),
            track,
        }));
    }

    /// Letzter veröffentlichter Snapshot
    pub fn session(&self) -> CallSession {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<CallSession> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallNotification> {
        self.notifications.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stoppt die Schleife; ein laufender Anruf wird vorher verlassen
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn push(&self, input: Input) {
        if self.inputs.send(input).is_err() {
            tracing::debug!("Call coordinator stopped, dropping input");
        }
    }
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle")
            .field("state", &self.snapshot.borrow().state)
            .field("running", &self.is_running())
            .finish()
    }
}
