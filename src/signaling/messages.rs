//! Message Types für das Signaling-Protokoll
//!
//! Jeder Frame hat die Form `{ "method": <string>, "data": <object> }`.
//! Eingehend wird `method` gegen die geschlossene Menge in
//! [`InboundMethod`] gematcht, ausgehend serialisiert serde den Tag direkt.

use crate::error::SignalingError;
use crate::session::{CallType, ParticipantStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// CLIENT → SERVER MESSAGES
// ============================================================================

/// Alle ausgehenden Nachrichten
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", content = "data")]
pub enum OutboundMessage {
    #[serde(rename_all = "camelCase")]
    InviteUser { room_id: String, user_id: String },

    Call {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "type")]
        call_type: CallType,
    },

    #[serde(rename_all = "camelCase")]
    DeclineCall {
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        from: String,
        /// Automatische Ablehnung, weil schon ein Anruf läuft
        busy: bool,
    },

    #[serde(rename_all = "camelCase")]
    AcceptCall {
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        from: String,
        video_muted: bool,
        audio_muted: bool,
    },

    #[serde(rename_all = "camelCase")]
    JoinCall {
        room_id: String,
        video_muted: bool,
        audio_muted: bool,
    },

    #[serde(rename_all = "camelCase")]
    LeaveCall { room_id: String },
}

impl OutboundMessage {
    pub fn method(&self) -> &'static str {
        match self {
            OutboundMessage::InviteUser { .. } => "InviteUser",
            OutboundMessage::Call { .. } => "Call",
            OutboundMessage::DeclineCall { .. } => "DeclineCall",
            OutboundMessage::AcceptCall { .. } => "AcceptCall",
            OutboundMessage::JoinCall { .. } => "JoinCall",
            OutboundMessage::LeaveCall { .. } => "LeaveCall",
        }
    }

    pub fn room_id(&self) -> Option<&str> {
        match self {
            OutboundMessage::InviteUser { room_id, .. }
            | OutboundMessage::Call { room_id, .. }
            | OutboundMessage::JoinCall { room_id, .. }
            | OutboundMessage::LeaveCall { room_id } => Some(room_id),
            OutboundMessage::DeclineCall { room_id, .. }
            | OutboundMessage::AcceptCall { room_id, .. } => room_id.as_deref(),
        }
    }

    pub fn to_frame(&self) -> Result<String, SignalingError> {
        serde_json::to_string(self).map_err(|e| SignalingError::SendFailed(e.to_string()))
    }
}

// ============================================================================
// SERVER → CLIENT MESSAGES
// ============================================================================

/// Bekannte eingehende Methoden
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMethod {
    IncomingCall,
    CallStarted,
    CallEnded,
    IncomingCallTimeout,
    RoomCreated,
    LiveRoomsInfo,
    LeaveCall,
    ButtonsBlockState,
    Error,
    UserAdded,
}

impl FromStr for InboundMethod {
    type Err = ();

    /// Case-sensitiv; unbekannte Methoden sind kein Fehler, nur `Err(())`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "IncomingCall" => InboundMethod::IncomingCall,
            "CallStarted" => InboundMethod::CallStarted,
            "CallEnded" => InboundMethod::CallEnded,
            "IncomingCallTimeout" => InboundMethod::IncomingCallTimeout,
            "RoomCreated" => InboundMethod::RoomCreated,
            "LiveRoomsInfo" => InboundMethod::LiveRoomsInfo,
            "LeaveCall" => InboundMethod::LeaveCall,
            "ButtonsBlockState" => InboundMethod::ButtonsBlockState,
            "Error" => InboundMethod::Error,
            "UserAdded" => InboundMethod::UserAdded,
            _ => return Err(()),
        })
    }
}

impl InboundMethod {
    pub fn requires_room_id(self) -> bool {
        !matches!(self, InboundMethod::IncomingCall)
    }
}

/// Grund für `CallEnded`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    Busy,
    Ended,
    Declined,
    FailedToConnect,
    NoResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: String,
    pub status: ParticipantStatus,
}

/// Typisierte eingehende Events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    IncomingCall {
        from: String,
        call_type: CallType,
        room_id: Option<String>,
    },
    CallStarted {
        room_id: String,
        participants: Vec<ParticipantInfo>,
        start_time: i64,
    },
    CallEnded {
        room_id: String,
        reason: EndReason,
    },
    IncomingCallTimeout {
        room_id: String,
    },
    RoomCreated {
        room_id: String,
        participants: Vec<ParticipantInfo>,
    },
    LiveRoomsInfo {
        room_id: String,
        ids: Vec<String>,
    },
    LeaveCall {
        room_id: String,
        id: String,
    },
    ButtonsBlockState {
        room_id: String,
        are_blocked: bool,
    },
    Error {
        room_id: String,
        message: String,
    },
    UserAdded {
        room_id: String,
        user_id: String,
    },
}

impl SignalingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SignalingEvent::IncomingCall { .. } => "IncomingCall",
            SignalingEvent::CallStarted { .. } => "CallStarted",
            SignalingEvent::CallEnded { .. } => "CallEnded",
            SignalingEvent::IncomingCallTimeout { .. } => "IncomingCallTimeout",
            SignalingEvent::RoomCreated { .. } => "RoomCreated",
            SignalingEvent::LiveRoomsInfo { .. } => "LiveRoomsInfo",
            SignalingEvent::LeaveCall { .. } => "LeaveCall",
            SignalingEvent::ButtonsBlockState { .. } => "ButtonsBlockState",
            SignalingEvent::Error { .. } => "Error",
            SignalingEvent::UserAdded { .. } => "UserAdded",
        }
    }

    pub fn room_id(&self) -> Option<&str> {
        match self {
            SignalingEvent::IncomingCall { room_id, .. } => room_id.as_deref(),
            SignalingEvent::CallStarted { room_id, .. }
            | SignalingEvent::CallEnded { room_id, .. }
            | SignalingEvent::IncomingCallTimeout { room_id }
            | SignalingEvent::RoomCreated { room_id, .. }
            | SignalingEvent::LiveRoomsInfo { room_id, .. }
            | SignalingEvent::LeaveCall { room_id, .. }
            | SignalingEvent::ButtonsBlockState { room_id, .. }
            | SignalingEvent::Error { room_id, .. }
            | SignalingEvent::UserAdded { room_id, .. } => Some(room_id),
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

#[derive(Deserialize)]
struct RawFrame {
    method: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct IncomingCallData {
    from: String,
    #[serde(rename = "type")]
    call_type: CallType,
    #[serde(rename = "roomId", default)]
    room_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallStartedData {
    #[serde(default)]
    participants: Vec<ParticipantInfo>,
    start_time: i64,
}

#[derive(Deserialize)]
struct CallEndedData {
    reason: EndReason,
}

#[derive(Deserialize)]
struct RoomCreatedData {
    #[serde(default)]
    participants: Vec<ParticipantInfo>,
}

#[derive(Deserialize)]
struct LiveRoomsInfoData {
    ids: Vec<String>,
}

#[derive(Deserialize)]
struct LeaveCallData {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ButtonsBlockStateData {
    are_blocked: bool,
}

#[derive(Deserialize)]
struct ErrorData {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserAddedData {
    user_id: String,
}

/// Parst einen rohen Frame.
///
/// `Ok(None)` für unbekannte Methoden (vorwärtskompatibel), `Err` für
/// kaputtes JSON oder fehlende Pflichtfelder.
pub fn parse_frame(frame: &str) -> Result<Option<SignalingEvent>, SignalingError> {
    let raw: RawFrame =
        serde_json::from_str(frame).map_err(|e| SignalingError::Malformed(e.to_string()))?;

    let Ok(method) = raw.method.parse::<InboundMethod>() else {
        return Ok(None);
    };

    if !raw.data.is_object() {
        return Err(SignalingError::InvalidField {
            method: raw.method,
            reason: "data must be an object".to_string(),
        });
    }

    let room_id = match raw.data.get("roomId").and_then(|v| v.as_str()) {
        Some(id) => Some(id.to_string()),
        None if method.requires_room_id() => {
            return Err(SignalingError::MissingField {
                method: raw.method,
                field: "roomId",
            })
        }
        None => None,
    };
    // requires_room_id() garantiert Some für alle Zweige außer IncomingCall
    let room = || room_id.clone().unwrap_or_default();

    let event = match method {
        InboundMethod::IncomingCall => {
            let d: IncomingCallData = decode(&raw.method, raw.data)?;
            SignalingEvent::IncomingCall {
                from: d.from,
                call_type: d.call_type,
                room_id: d.room_id,
            }
        }
        InboundMethod::CallStarted => {
            let d: CallStartedData = decode(&raw.method, raw.data)?;
            SignalingEvent::CallStarted {
                room_id: room(),
                participants: d.participants,
                start_time: d.start_time,
            }
        }
        InboundMethod::CallEnded => {
            let d: CallEndedData = decode(&raw.method, raw.data)?;
            SignalingEvent::CallEnded {
                room_id: room(),
                reason: d.reason,
            }
        }
        InboundMethod::IncomingCallTimeout => SignalingEvent::IncomingCallTimeout { room_id: room() },
        InboundMethod::RoomCreated => {
            let d: RoomCreatedData = decode(&raw.method, raw.data)?;
            SignalingEvent::RoomCreated {
                room_id: room(),
                participants: d.participants,
            }
        }
        InboundMethod::LiveRoomsInfo => {
            let d: LiveRoomsInfoData = decode(&raw.method, raw.data)?;
            SignalingEvent::LiveRoomsInfo {
                room_id: room(),
                ids: d.ids,
            }
        }
        InboundMethod::LeaveCall => {
            let d: LeaveCallData = decode(&raw.method, raw.data)?;
            SignalingEvent::LeaveCall {
                room_id: room(),
                id: d.id,
            }
        }
        InboundMethod::ButtonsBlockState => {
            let d: ButtonsBlockStateData = decode(&raw.method, raw.data)?;
            SignalingEvent::ButtonsBlockState {
                room_id: room(),
                are_blocked: d.are_blocked,
            }
        }
        InboundMethod::Error => {
            let d: ErrorData = decode(&raw.method, raw.data)?;
            SignalingEvent::Error {
                room_id: room(),
                message: d.message,
            }
        }
        InboundMethod::UserAdded => {
            let d: UserAddedData = decode(&raw.method, raw.data)?;
            SignalingEvent::UserAdded {
                room_id: room(),
                user_id: d.user_id,
            }
        }
    };

    Ok(Some(event))
}

fn decode<T: DeserializeOwned>(method: &str, data: serde_json::Value) -> Result<T, SignalingError> {
    serde_json::from_value(data).map_err(|e| SignalingError::InvalidField {
        method: method.to_string(),
        reason: e.to_string(),
    })
}
