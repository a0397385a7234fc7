//! Typisierter Signaling-Kanal
//!
//! Dünne Schicht über einem rohen, geordneten Nachrichtenkanal:
//! ausgehend serialisieren + `try_send`, eingehend parsen + validieren.
//! Retry ist nicht Aufgabe des Kanals, das macht der
//! `ReconnectionSupervisor` bzw. der Transport.

use super::messages::{parse_frame, OutboundMessage, SignalingEvent};
use crate::error::SignalingError;
use tokio::sync::mpsc;

/// Kapazität der ausgehenden Queue
pub const OUTBOUND_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct SignalingChannel {
    tx: mpsc::Sender<String>,
}

impl SignalingChannel {
    /// Erstellt Kanal plus Empfänger für den Transport
    pub fn new() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (Self { tx }, rx)
    }

    /// Fire-and-forget. Fehler werden geloggt und zurückgegeben,
    /// der Aufrufer muss nichts damit tun.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), SignalingError> {
        let frame = message.to_frame()?;

        let result = self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => SignalingError::NotConnected,
            mpsc::error::TrySendError::Full(_) => {
                SignalingError::SendFailed("outbound queue full".to_string())
            }
        });

        match &result {
            Ok(()) => tracing::debug!(method = message.method(), "Signaling message queued"),
            Err(e) => tracing::warn!(method = message.method(), "Dropping outbound message: {}", e),
        }
        result
    }

    /// Parst einen eingehenden Frame. Unbekannte Methoden und kaputte
    /// Frames ergeben `None`; letztere werden geloggt.
    pub fn on_message(&self, frame: &str) -> Option<SignalingEvent> {
        match parse_frame(frame) {
            Ok(Some(event)) => Some(event),
            Ok(None) => {
                tracing::debug!("Ignoring frame with unknown method");
                None
            }
            Err(e) => {
                tracing::warn!("Dropping signaling frame: {}", e);
                None
            }
        }
    }
}
