//! Call Coordinator - clientseitige Steuerung einer Call-Session
//!
//! Hält genau eine Session zwischen UI, Signaling-Server und Media-Engine:
//! - Signaling über WebSocket (`{method, data}`-Frames)
//! - State-Machine mit Timern für Laden, Klingeln und Reconnect
//! - Roster der entfernten Teilnehmer inkl. Track-Lebenszyklus
//! - lokale Geräteauswahl, Mute und Bildschirmfreigabe

pub mod call;
pub mod config;
pub mod devices;
pub mod engine;
pub mod error;
pub mod logging;
pub mod participants;
pub mod reconnect;
pub mod session;
pub mod signaling;

pub use call::{CallCoordinator, CallNotification, CoordinatorHandle, Intent};
pub use config::CoordinatorConfig;
pub use devices::{DeviceEnumerator, MediaDeviceInfo, StaticDeviceEnumerator};
pub use engine::{MediaEngine, NullMediaEngine};
pub use session::{CallSession, CallState, CallType, MediaKind};

use signaling::SignalingClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ============================================================================
// APPLICATION
// ============================================================================

/// Maximale Wartezeit beim Herunterfahren des Transports
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Coordinator plus WebSocket-Transport in einem Paket
pub struct CallApp {
    handle: CoordinatorHandle,
    transport: JoinHandle<anyhow::Result<()>>,
    cancel: CancellationToken,
}

impl CallApp {
    /// Startet Event-Schleife und Transport.
    ///
    /// Muss in einer Tokio-Runtime aufgerufen werden.
    pub fn start(
        config: CoordinatorConfig,
        engine: Arc<dyn MediaEngine>,
        enumerator: Arc<dyn DeviceEnumerator>,
    ) -> anyhow::Result<Self> {
        tracing::info!("Initializing call coordinator...");

        let (handle, outbound) = CallCoordinator::spawn(config.clone(), engine, enumerator);
        let client = match SignalingClient::new(&config, handle.clone()) {
            Ok(client) => client,
            Err(e) => {
                handle.shutdown();
                return Err(e);
            }
        };
        tracing::info!("Signaling endpoint: {}", client.url());

        let cancel = CancellationToken::new();
        let transport = tokio::spawn(client.run(outbound, cancel.clone()));

        Ok(Self {
            handle,
            transport,
            cancel,
        })
    }

    /// Wie `start`, Konfiguration aus der Umgebung, Logging an
    pub fn from_env(
        engine: Arc<dyn MediaEngine>,
        enumerator: Arc<dyn DeviceEnumerator>,
    ) -> anyhow::Result<Self> {
        logging::init_logging();
        let config = CoordinatorConfig::from_env()?;
        Self::start(config, engine, enumerator)
    }

    pub fn handle(&self) -> &CoordinatorHandle {
        &self.handle
    }

    /// Verlässt einen laufenden Anruf und stoppt den Transport.
    ///
    /// Der Transport schreibt die Queue noch leer (z.B. `LeaveCall`) und
    /// endet, wenn sie geschlossen ist; spätestens nach
    /// [`SHUTDOWN_GRACE`] wird er abgebrochen.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        self.handle.shutdown();
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut self.transport).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!("Transport did not drain in time, cancelling");
                self.cancel.cancel();
                self.transport.await?
            }
        }
    }
}

impl std::fmt::Debug for CallApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallApp")
            .field("handle", &self.handle)
            .field("transport_finished", &self.transport.is_finished())
            .finish()
    }
}
