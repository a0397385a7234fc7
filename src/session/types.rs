//! Datenmodell einer Call-Session
//!
//! Alle Typen hier sind reine Werte: der `CallSessionController` erzeugt
//! nach jedem Event einen neuen Snapshot, die UI liest ihn nur.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// ENUMS
// ============================================================================

/// Lebenszyklus-Status einer Session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    /// Keine Session
    None,
    /// Raum wird erstellt / betreten
    Loading,
    /// Warten auf Gegenseite (ausgehend klingelt oder eingehend wartet)
    Awaiting,
    /// Anruf aktiv
    Active,
    /// Signaling weg, Session läuft weiter
    Reconnecting,
    Ended,
    Declined,
    Busy,
    FailedToConnect,
    NoResponse,
}

impl CallState {
    pub const ALL: [CallState; 10] = [
        CallState::None,
        CallState::Loading,
        CallState::Awaiting,
        CallState::Active,
        CallState::Reconnecting,
        CallState::Ended,
        CallState::Declined,
        CallState::Busy,
        CallState::FailedToConnect,
        CallState::NoResponse,
    ];

    /// Terminal: die Session kann ohne neuen Anruf nicht weiterlaufen
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallState::Ended
                | CallState::Declined
                | CallState::Busy
                | CallState::FailedToConnect
                | CallState::NoResponse
        )
    }

    /// Läuft gerade ein Anrufversuch?
    pub fn is_live(self) -> bool {
        !self.is_terminal() && self != CallState::None
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CallState::None => "NONE",
            CallState::Loading => "LOADING",
            CallState::Awaiting => "AWAITING",
            CallState::Active => "ACTIVE",
            CallState::Reconnecting => "RECONNECTING",
            CallState::Ended => "ENDED",
            CallState::Declined => "DECLINED",
            CallState::Busy => "BUSY",
            CallState::FailedToConnect => "FAILED_TO_CONNECT",
            CallState::NoResponse => "NO_RESPONSE",
        };
        f.write_str(s)
    }
}

/// Art des Anrufs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    #[default]
    #[serde(alias = "AUDIO")]
    Audio,
    #[serde(alias = "VIDEO")]
    Video,
}

/// Medienart für Mute, Geräte und Tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// Status eines entfernten Teilnehmers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantStatus {
    #[serde(alias = "disconnected")]
    Disconnected,
    #[default]
    #[serde(alias = "awaiting")]
    Awaiting,
    #[serde(alias = "loading")]
    Loading,
    #[serde(alias = "active")]
    Active,
}

// ============================================================================
// PARTICIPANTS
// ============================================================================

/// Handle auf einen Track der Media-Engine.
///
/// Der Track selbst gehört der Engine; hier liegt nur die ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackHandle {
    pub id: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantTracks {
    pub video: Vec<TrackHandle>,
    pub audio: Vec<TrackHandle>,
}

impl ParticipantTracks {
    pub fn iter(&self) -> impl Iterator<Item = &TrackHandle> {
        self.video.iter().chain(self.audio.iter())
    }
}

/// Entfernter Teilnehmer im Roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallParticipant {
    pub id: String,
    pub status: ParticipantStatus,
    pub is_video_muted: bool,
    pub is_audio_muted: bool,
    pub is_screen_sharing_active: bool,
    pub has_video_been_activated: bool,
    pub has_audio_been_activated: bool,
    pub tracks: ParticipantTracks,
}

impl CallParticipant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ParticipantStatus::default(),
            is_video_muted: true,
            is_audio_muted: true,
            is_screen_sharing_active: false,
            has_video_been_activated: false,
            has_audio_been_activated: false,
            tracks: ParticipantTracks::default(),
        }
    }

    /// Wendet ein Teil-Update an. `has_*_been_activated` rastet ein,
    /// sobald die jeweilige Spur einmal unmuted war.
    pub fn apply(&mut self, patch: &ParticipantPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(muted) = patch.is_video_muted {
            self.is_video_muted = muted;
        }
        if let Some(muted) = patch.is_audio_muted {
            self.is_audio_muted = muted;
        }
        if let Some(sharing) = patch.is_screen_sharing_active {
            self.is_screen_sharing_active = sharing;
        }
        self.has_video_been_activated |= !self.is_video_muted;
        self.has_audio_been_activated |= !self.is_audio_muted;
    }
}

/// Teil-Update für `ParticipantRegistry::upsert`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantPatch {
    pub status: Option<ParticipantStatus>,
    pub is_video_muted: Option<bool>,
    pub is_audio_muted: Option<bool>,
    pub is_screen_sharing_active: Option<bool>,
}

impl ParticipantPatch {
    pub fn status(status: ParticipantStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Ergebnis von `usersAmount`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersAmount {
    pub active: usize,
    pub total: usize,
}

// ============================================================================
// LOCAL MEDIA
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMedia {
    pub audio_muted: bool,
    pub video_muted: bool,
    pub selected_audio_device_id: Option<String>,
    pub selected_video_device_id: Option<String>,
    pub screen_sharing_active: bool,
}

/// Eintrag für die Geräteauswahl in der UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    pub label: String,
}

/// Wählbare Geräte pro Medienart, ohne `"screen"`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableDevices {
    pub audio: Vec<DeviceEntry>,
    pub video: Vec<DeviceEntry>,
}

/// Kurze UI-Sperre nach schnellen Aktionen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonsBlock {
    pub blocked: bool,
    /// Unix-Millis, ab wann die Sperre aufgehoben ist
    pub expires_at: Option<i64>,
}

/// Eingehender Anruf, der noch nicht angenommen/abgelehnt wurde
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingIncoming {
    pub from: String,
    pub call_type: CallType,
}

// ============================================================================
// CALL SESSION
// ============================================================================

/// Snapshot der aktuellen Session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    /// Korrelations-ID für Logs, neu pro Session
    pub session_id: Uuid,
    pub state: CallState,
    pub call_type: CallType,
    pub room_id: Option<String>,
    /// Unix-Millis des ersten Eintritts in `ACTIVE`
    pub start_time: Option<i64>,
    pub participants: HashMap<String, CallParticipant>,
    pub local_media: LocalMedia,
    /// Gültige IDs für `switchDevice`
    pub devices: AvailableDevices,
    /// 0..=4, nur Anzeige
    pub connection_quality_score: u8,
    pub buttons_blocked: ButtonsBlock,
    pub pending_incoming: Option<PendingIncoming>,
    /// Beitretbare Räume: roomId -> live Teilnehmer
    pub live_rooms: HashMap<String, Vec<String>>,
    pub users_amount: UsersAmount,
}

impl CallSession {
    /// Leere Session im Zustand `NONE`
    pub fn idle() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: CallState::None,
            call_type: CallType::default(),
            room_id: None,
            start_time: None,
            participants: HashMap::new(),
            local_media: LocalMedia::default(),
            devices: AvailableDevices::default(),
            connection_quality_score: 0,
            buttons_blocked: ButtonsBlock::default(),
            pending_incoming: None,
            live_rooms: HashMap::new(),
            users_amount: UsersAmount::default(),
        }
    }

    /// Neue Session nach Reset; Raumverzeichnis und Geräte bleiben
    pub fn reset_from(previous: &CallSession) -> Self {
        Self {
            live_rooms: previous.live_rooms.clone(),
            local_media: previous.local_media.clone(),
            devices: previous.devices.clone(),
            ..Self::idle()
        }
    }

    /// Gehört das Event zum gebundenen Raum? Ungebunden passt alles.
    pub fn matches_room(&self, room_id: &str) -> bool {
        self.room_id.as_deref().map_or(true, |bound| bound == room_id)
    }
}

impl Default for CallSession {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<_> = CallState::ALL
            .iter()
            .copied()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![
                CallState::Ended,
                CallState::Declined,
                CallState::Busy,
                CallState::FailedToConnect,
                CallState::NoResponse
            ]
        );
        assert!(!CallState::None.is_live());
        assert!(CallState::Reconnecting.is_live());
    }

    #[test]
    fn test_activation_flags_latch() {
        let mut p = CallParticipant::new("u1");
        p.apply(&ParticipantPatch {
            is_video_muted: Some(false),
            ..Default::default()
        });
        p.apply(&ParticipantPatch {
            is_video_muted: Some(true),
            ..Default::default()
        });
        assert!(p.is_video_muted);
        assert!(p.has_video_been_activated);
        assert!(!p.has_audio_been_activated);
    }

    #[test]
    fn test_participant_status_is_case_insensitive() {
        let upper: ParticipantStatus = serde_json::from_str("\"ACTIVE\"").unwrap();
        let lower: ParticipantStatus = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(upper, ParticipantStatus::Active);
        assert_eq!(lower, ParticipantStatus::Active);
    }

    #[test]
    fn test_reset_keeps_room_directory() {
        let mut s = CallSession::idle();
        s.live_rooms.insert("room-9".into(), vec!["u5".into()]);
        s.room_id = Some("room-1".into());
        let reset = CallSession::reset_from(&s);
        assert_ne!(reset.session_id, s.session_id);
        assert_eq!(reset.room_id, None);
        assert_eq!(reset.live_rooms.len(), 1);
    }
}
