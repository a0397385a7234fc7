//! Schnittstelle zur Media-Engine
//!
//! Capture, Encoding und Transport liegen komplett in der Engine.
//! Der Coordinator sagt ihr nur, wann Tracks an-/abgehängt, gemutet oder
//! auf ein anderes Gerät umgeschaltet werden.

use crate::session::{MediaKind, TrackHandle};

pub trait MediaEngine: Send + Sync {
    /// Track eines entfernten Teilnehmers für die Anzeige anhängen
    fn attach_track(&self, participant_id: &str, track: &TrackHandle);

    /// Track abhängen; die Engine gibt ihn danach frei
    fn detach_track(&self, participant_id: &str, track: &TrackHandle);

    /// Lokale Spur muten/unmuten
    fn set_muted(&self, kind: MediaKind, muted: bool);

    /// Lokale Quelle umschalten; `None` heißt System-Default
    fn use_device(&self, kind: MediaKind, device_id: Option<&str>);

    fn set_screen_share(&self, active: bool);
}

/// Engine ohne Wirkung, z.B. für reine Signaling-Clients
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMediaEngine;

impl MediaEngine for NullMediaEngine {
    fn attach_track(&self, _participant_id: &str, _track: &TrackHandle) {}
    fn detach_track(&self, _participant_id: &str, _track: &TrackHandle) {}
    fn set_muted(&self, _kind: MediaKind, _muted: bool) {}
    fn use_device(&self, _kind: MediaKind, _device_id: Option<&str>) {}
    fn set_screen_share(&self, _active: bool) {}
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use parking_lot::Mutex;

    /// Zeichnet alle Engine-Aufrufe auf
    #[derive(Debug, Default)]
    pub struct RecordingEngine {
        pub calls: Mutex<Vec<String>>,
    }

    impl RecordingEngine {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        pub fn detached(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| c.starts_with("detach:"))
                .collect()
        }
    }

    impl MediaEngine for RecordingEngine {
        fn attach_track(&self, participant_id: &str, track: &TrackHandle) {
            self.calls
                .lock()
                .push(format!("attach:{}:{}", participant_id, track.id));
        }

        fn detach_track(&self, participant_id: &str, track: &TrackHandle) {
            self.calls
                .lock()
                .push(format!("detach:{}:{}", participant_id, track.id));
        }

        fn set_muted(&self, kind: MediaKind, muted: bool) {
            self.calls.lock().push(format!("mute:{}:{}", kind, muted));
        }

        fn use_device(&self, kind: MediaKind, device_id: Option<&str>) {
            self.calls
                .lock()
                .push(format!("device:{}:{}", kind, device_id.unwrap_or("default")));
        }

        fn set_screen_share(&self, active: bool) {
            self.calls.lock().push(format!("screen:{}", active));
        }
    }
}
