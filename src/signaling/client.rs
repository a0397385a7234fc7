//! WebSocket-Transport für den Signaling-Kanal
//!
//! Hält die Verbindung zum Signaling-Server:
//! - Verbindungsaufbau mit exponentiellem Backoff
//! - ausgehende Frames aus der Queue des `SignalingChannel` schreiben
//! - eingehende Text-Frames an den Coordinator weiterreichen
//! - Verbindungsänderungen an den `ReconnectionSupervisor` melden

use crate::call::CoordinatorHandle;
use crate::config::CoordinatorConfig;
use crate::error::SignalingError;
use crate::reconnect::BackoffPolicy;
use anyhow::{anyhow, Context};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

// ============================================================================
// CLIENT STATE
// ============================================================================

#[derive(Debug, Clone, Default)]
struct ClientState {
    is_connected: bool,
    /// Fehlgeschlagene Versuche seit der letzten stabilen Verbindung
    attempts: u32,
}

/// Wie eine einzelne Verbindung geendet hat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    /// Server hat geschlossen oder Stream ist zu Ende
    Closed,
    /// Shutdown angefordert
    Cancelled,
}

// ============================================================================
// SIGNALING CLIENT
// ============================================================================

/// WebSocket Client für den Signaling-Server
pub struct SignalingClient {
    ws_url: Url,
    backoff: BackoffPolicy,
    handle: CoordinatorHandle,
    state: Arc<RwLock<ClientState>>,
}

impl SignalingClient {
    /// Erstellt einen neuen SignalingClient; `http(s)` wird zu `ws(s)`
    pub fn new(config: &CoordinatorConfig, handle: CoordinatorHandle) -> anyhow::Result<Self> {
        let ws_url = ws_url(&config.signaling_url)
            .with_context(|| format!("invalid signaling URL '{}'", config.signaling_url))?;

        Ok(Self {
            ws_url,
            backoff: config.backoff,
            handle,
            state: Arc::new(RwLock::new(ClientState::default())),
        })
    }

    pub fn url(&self) -> &Url {
        &self.ws_url
    }

    /// Prüft ob verbunden
    pub fn is_connected(&self) -> bool {
        self.state.read().is_connected
    }

    /// Verbindet, liest und schreibt bis `cancel` ausgelöst wird.
    ///
    /// Ausgehende Frames, die während einer Unterbrechung anfallen,
    /// werden verworfen.
    pub async fn run(
        self,
        mut outbound: mpsc::Receiver<String>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            tracing::info!("Connecting to signaling server: {}", self.ws_url);
            match self.connect_once(&mut outbound, &cancel).await {
                Ok(ConnectionEnd::Cancelled) => break,
                Ok(ConnectionEnd::Closed) => tracing::info!("WebSocket closed by server"),
                Err(e) => tracing::error!("WebSocket error: {}", e),
            }
            self.set_connected(false);

            let delay = {
                let mut state = self.state.write();
                let delay = self.backoff.delay(state.attempts);
                state.attempts = state.attempts.saturating_add(1);
                delay
            };
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return Ok(()),
                    () = &mut sleep => break,
                    frame = outbound.recv() => match frame {
                        Some(_) => tracing::warn!("Not connected, dropping outbound frame"),
                        None => return Ok(()),
                    },
                }
            }
        }

        tracing::info!("Signaling client stopped");
        Ok(())
    }

    async fn connect_once(
        &self,
        outbound: &mut mpsc::Receiver<String>,
        cancel: &CancellationToken,
    ) -> Result<ConnectionEnd, SignalingError> {
        let (ws_stream, _) = tokio::select! {
            () = cancel.cancelled() => return Ok(ConnectionEnd::Cancelled),
            result = connect_async(self.ws_url.as_str()) => {
                result.map_err(|e| SignalingError::ConnectionFailed(e.to_string()))?
            }
        };
        let (mut write, mut read) = ws_stream.split();

        self.set_connected(true);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(ConnectionEnd::Cancelled);
                }
                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        return Ok(ConnectionEnd::Cancelled);
                    };
                    write
                        .send(Message::Text(frame))
                        .await
                        .map_err(|e| SignalingError::SendFailed(e.to_string()))?;
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle.deliver_frame(text),
                    Some(Ok(Message::Close(_))) | None => return Ok(ConnectionEnd::Closed),
                    Some(Err(e)) => return Err(SignalingError::ConnectionFailed(e.to_string())),
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    fn set_connected(&self, connected: bool) {
        {
            let mut state = self.state.write();
            if state.is_connected == connected {
                return;
            }
            state.is_connected = connected;
            if connected {
                state.attempts = 0;
            }
        }
        self.handle.connectivity_changed(connected);
    }
}

impl std::fmt::Debug for SignalingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingClient")
            .field("url", &self.ws_url.as_str())
            .field("state", &*self.state.read())
            .finish()
    }
}

/// `http(s)://` → `ws(s)://`, andere Schemata bleiben
pub fn ws_url(raw: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw)?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => return Ok(url),
        other => return Err(anyhow!("unsupported scheme '{}'", other)),
    };
    url.set_scheme(scheme)
        .map_err(|()| anyhow!("cannot switch scheme to '{}'", scheme))?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_upgrades_http() {
        assert_eq!(
            ws_url("https://signal.example.org/ws").unwrap().as_str(),
            "wss://signal.example.org/ws"
        );
        assert_eq!(
            ws_url("http://127.0.0.1:8787/ws").unwrap().as_str(),
            "ws://127.0.0.1:8787/ws"
        );
        assert_eq!(
            ws_url("ws://127.0.0.1:8787/ws").unwrap().as_str(),
            "ws://127.0.0.1:8787/ws"
        );
    }

    #[test]
    fn test_ws_url_rejects_other_schemes() {
        assert!(ws_url("ftp://example.org").is_err());
        assert!(ws_url("no url").is_err());
    }
}
