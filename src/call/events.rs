//! Eingaben der Event-Pipeline
//!
//! Alles, was die Session verändern kann, kommt als [`Input`] in genau
//! eine Queue und wird strikt in Ankunftsreihenfolge verarbeitet.

use crate::error::{ConnectionError, MediaDeviceError};
use crate::session::{CallType, MediaKind, TrackHandle};
use crate::signaling::SignalingEvent;

/// Lokale Absicht aus der UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Ausgehender Anruf; `target` ist die Raum-/Ziel-ID
    CallTo { target: String, call_type: CallType },
    JoinCall {
        room_id: String,
        video_muted: bool,
        audio_muted: bool,
    },
    AcceptIncoming,
    DeclineIncoming,
    LeaveCall,
    ToggleMute(MediaKind),
    SwitchDevice { kind: MediaKind, device_id: String },
    StartScreenShare,
    StopScreenShare,
    InviteUser { user_id: String },
    /// Qualität 0..=4, wird geklemmt
    SetConnectionQuality(u8),
    RefreshDevices,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::CallTo { .. } => "callTo",
            Intent::JoinCall { .. } => "joinCall",
            Intent::AcceptIncoming => "acceptIncoming",
            Intent::DeclineIncoming => "declineIncoming",
            Intent::LeaveCall => "leaveCall",
            Intent::ToggleMute(_) => "toggleMute",
            Intent::SwitchDevice { .. } => "switchDevice",
            Intent::StartScreenShare => "startScreenShare",
            Intent::StopScreenShare => "stopScreenShare",
            Intent::InviteUser { .. } => "inviteUser",
            Intent::SetConnectionQuality(_) => "setConnectionQuality",
            Intent::RefreshDevices => "refreshDevices",
        }
    }

    /// Schnelle Aktionen, die während `buttonsBlocked` abgewiesen werden
    pub fn is_blockable(&self) -> bool {
        matches!(
            self,
            Intent::ToggleMute(_)
                | Intent::SwitchDevice { .. }
                | Intent::StartScreenShare
                | Intent::StopScreenShare
                | Intent::InviteUser { .. }
        )
    }
}

/// Synthetische Events des `ReconnectionSupervisor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectionLost,
    ConnectionRestored,
    ReconnectTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Raum erstellen / betreten
    Loading,
    /// Klingeln ohne Antwort
    Ring,
    Reconnect,
    ButtonsUnblock,
    /// Anzeigedauer eines Terminal-Zustands
    DisplayWindow,
}

/// Abgelaufener Timer; `id` unterscheidet Neu-Starts derselben Art
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub id: u64,
}

/// Meldungen der Media-Engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    TrackAdded {
        participant_id: String,
        track: TrackHandle,
    },
}

/// Alles, was in die Pipeline kommt
#[derive(Debug, Clone)]
pub enum Input {
    Intent(Intent),
    /// Roher Signaling-Frame, wird in der Pipeline geparst
    Frame(String),
    Signal(SignalingEvent),
    Connection(ConnectionEvent),
    Timer(TimerFired),
    Media(MediaEvent),
    DevicesChanged,
}

/// Nicht-fatale, für den Nutzer sichtbare Meldungen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallNotification {
    MediaDevice(MediaDeviceError),
    RemoteBusy,
    RemoteDeclined,
    RemoteNoResponse,
    FailedToConnect,
    RemoteError { message: String },
    Connection(ConnectionError),
}
