//! Signaling Module - typisierter Kanal zum Signaling-Server
//!
//! Dieses Modul verwaltet die Kommunikation mit dem Signaling-Server:
//! - Frames parsen und validieren (`messages`)
//! - Nachrichten fire-and-forget einreihen (`channel`)
//! - WebSocket-Verbindung aufbauen und halten (`client`)

mod channel;
mod client;
mod messages;

pub use channel::{SignalingChannel, OUTBOUND_CAPACITY};
pub use client::{ws_url, SignalingClient};
pub use messages::*;
