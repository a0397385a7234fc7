//! Fehler-Taxonomie
//!
//! Kein Fehler hier darf die Session in einen undefinierten Zustand
//! bringen: Signaling- und Transition-Fehler werden lokal geschluckt,
//! Geräte-Fehler landen als Notification in der UI.

use crate::session::{CallState, MediaKind};
use thiserror::Error;

// ============================================================================
// SIGNALING
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalingError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Missing field '{field}' in {method}")]
    MissingField { method: String, field: &'static str },

    #[error("Invalid payload for {method}: {reason}")]
    InvalidField { method: String, reason: String },

    #[error("Not connected to signaling server")]
    NotConnected,

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),
}

// ============================================================================
// STATE MACHINE
// ============================================================================

/// Event passt nicht zum aktuellen Zustand; wird als No-op behandelt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Event {event} not valid in state {state}")]
pub struct StateTransitionError {
    pub state: CallState,
    pub event: &'static str,
}

/// Lokaler Intent wurde abgewiesen
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    #[error("Already in a call ({0})")]
    AlreadyInCall(CallState),

    #[error("No pending incoming call")]
    NoPendingIncomingCall,

    #[error("Buttons are blocked")]
    ButtonsBlocked,
}

// ============================================================================
// MEDIA DEVICES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaDeviceError {
    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    #[error("Permission denied for {0} devices")]
    PermissionDenied(MediaKind),

    #[error("Selected {kind} device '{device_id}' vanished, falling back to default")]
    DeviceVanished { kind: MediaKind, device_id: String },

    #[error("Unknown {kind} device '{device_id}'")]
    UnknownDevice { kind: MediaKind, device_id: String },
}

// ============================================================================
// CONNECTION / CONFIG
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Reconnect budget of {0} ms exhausted")]
    TimedOut(u64),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Invalid signaling URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
