//! Auswahl der lokalen Audio-/Video-Geräte
//!
//! Unabhängig vom Call-State. Fehler werden nie in die State-Machine
//! geworfen, sondern als `MediaDeviceError` zurückgegeben und vom
//! Controller als Notification an die UI gereicht.

use crate::engine::MediaEngine;
use crate::error::MediaDeviceError;
use crate::session::{AvailableDevices, DeviceEntry, LocalMedia, MediaKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pseudo-Gerät für Bildschirmfreigabe
pub const SCREEN_DEVICE_ID: &str = "screen";

/// Eintrag wie ihn die Geräte-API liefert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDeviceInfo {
    pub id: String,
    pub label: String,
    pub kind: MediaKind,
}

impl MediaDeviceInfo {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }
}

/// Quelle für Gerätelisten (Browser-API, cpal, Tests)
pub trait DeviceEnumerator: Send + Sync {
    fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, MediaDeviceError>;
}

/// Feste Geräteliste, zur Laufzeit austauschbar
#[derive(Debug, Default)]
pub struct StaticDeviceEnumerator {
    devices: RwLock<Vec<MediaDeviceInfo>>,
}

impl StaticDeviceEnumerator {
    pub fn new(devices: Vec<MediaDeviceInfo>) -> Self {
        Self {
            devices: RwLock::new(devices),
        }
    }

    /// Simuliert Hot-Plug
    pub fn set_devices(&self, devices: Vec<MediaDeviceInfo>) {
        *self.devices.write() = devices;
    }
}

impl DeviceEnumerator for StaticDeviceEnumerator {
    fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, MediaDeviceError> {
        Ok(self.devices.read().clone())
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

pub struct MediaDeviceCoordinator {
    enumerator: Arc<dyn DeviceEnumerator>,
    engine: Arc<dyn MediaEngine>,
    devices: Vec<MediaDeviceInfo>,
    local: LocalMedia,
}

impl MediaDeviceCoordinator {
    pub fn new(enumerator: Arc<dyn DeviceEnumerator>, engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            enumerator,
            engine,
            devices: Vec::new(),
            local: LocalMedia::default(),
        }
    }

    pub fn local_media(&self) -> &LocalMedia {
        &self.local
    }

    /// Geräte für die allgemeine Auswahl; `"screen"` ist ausgeblendet
    pub fn list_devices(&self, kind: MediaKind) -> Vec<DeviceEntry> {
        self.devices
            .iter()
            .filter(|d| d.kind == kind && d.id != SCREEN_DEVICE_ID)
            .map(|d| DeviceEntry {
                id: d.id.clone(),
                label: d.label.clone(),
            })
            .collect()
    }

    /// Beide Auswahllisten für den Snapshot
    pub fn available(&self) -> AvailableDevices {
        AvailableDevices {
            audio: self.list_devices(MediaKind::Audio),
            video: self.list_devices(MediaKind::Video),
        }
    }

    /// Liest die Geräteliste neu ein (Hot-Plug).
    ///
    /// Verschwundene, ausgewählte Geräte fallen auf den System-Default
    /// zurück; für jedes gibt es einen `DeviceVanished`-Fehler.
    pub fn refresh(&mut self) -> Vec<MediaDeviceError> {
        match self.enumerator.enumerate() {
            Ok(devices) => {
                tracing::debug!(count = devices.len(), "Media devices refreshed");
                self.devices = devices;
            }
            Err(e) => {
                tracing::warn!("Device enumeration failed: {}", e);
                return vec![e];
            }
        }

        let mut errors = Vec::new();
        for kind in [MediaKind::Audio, MediaKind::Video] {
            if let Some(selected) = self.selected(kind).map(str::to_string) {
                if !self.exists(kind, &selected) {
                    self.fallback_to_default(kind);
                    errors.push(MediaDeviceError::DeviceVanished {
                        kind,
                        device_id: selected,
                    });
                }
            }
        }
        errors
    }

    /// Wählt ein Gerät. Unbekannte IDs fallen auf den Default zurück.
    pub fn select(&mut self, kind: MediaKind, device_id: &str) -> Result<(), MediaDeviceError> {
        if device_id == SCREEN_DEVICE_ID || !self.exists(kind, device_id) {
            self.fallback_to_default(kind);
            return Err(MediaDeviceError::UnknownDevice {
                kind,
                device_id: device_id.to_string(),
            });
        }

        *self.selected_mut(kind) = Some(device_id.to_string());
        self.use_device(kind, Some(device_id));
        tracing::info!(%kind, device = device_id, "Media device selected");
        Ok(())
    }

    /// Kippt den Mute-Status und gibt den neuen Wert zurück
    pub fn toggle_mute(&mut self, kind: MediaKind) -> bool {
        let muted = !self.is_muted(kind);
        self.set_muted(kind, muted);
        muted
    }

    pub fn set_muted(&mut self, kind: MediaKind, muted: bool) {
        match kind {
            MediaKind::Audio => self.local.audio_muted = muted,
            MediaKind::Video => self.local.video_muted = muted,
        }
        self.engine.set_muted(kind, muted);
    }

    pub fn is_muted(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.local.audio_muted,
            MediaKind::Video => self.local.video_muted,
        }
    }

    /// Schaltet die Video-Quelle auf `"screen"`, die Kamera-Auswahl bleibt
    pub fn start_screen_share(&mut self) {
        if self.local.screen_sharing_active {
            return;
        }
        self.local.screen_sharing_active = true;
        self.engine.use_device(MediaKind::Video, Some(SCREEN_DEVICE_ID));
        self.engine.set_screen_share(true);
        tracing::info!("Screen sharing started");
    }

    /// Zurück zur gewählten Kamera (oder Default)
    pub fn stop_screen_share(&mut self) {
        if !self.local.screen_sharing_active {
            return;
        }
        self.local.screen_sharing_active = false;
        self.engine.set_screen_share(false);
        self.engine
            .use_device(MediaKind::Video, self.local.selected_video_device_id.as_deref());
        tracing::info!("Screen sharing stopped");
    }

    fn exists(&self, kind: MediaKind, device_id: &str) -> bool {
        self.devices
            .iter()
            .any(|d| d.kind == kind && d.id == device_id)
    }

    fn selected(&self, kind: MediaKind) -> Option<&str> {
        match kind {
            MediaKind::Audio => self.local.selected_audio_device_id.as_deref(),
            MediaKind::Video => self.local.selected_video_device_id.as_deref(),
        }
    }

    fn selected_mut(&mut self, kind: MediaKind) -> &mut Option<String> {
        match kind {
            MediaKind::Audio => &mut self.local.selected_audio_device_id,
            MediaKind::Video => &mut self.local.selected_video_device_id,
        }
    }

    fn fallback_to_default(&mut self, kind: MediaKind) {
        *self.selected_mut(kind) = None;
        self.use_device(kind, None);
        tracing::warn!(%kind, "Falling back to default media device");
    }

    /// Während der Bildschirmfreigabe bleibt die Engine auf `"screen"`;
    /// die Kamera-Auswahl greift erst mit `stop_screen_share`.
    fn use_device(&self, kind: MediaKind, device_id: Option<&str>) {
        if kind == MediaKind::Video && self.local.screen_sharing_active {
            tracing::debug!(device = device_id.unwrap_or("default"), "Camera change deferred while sharing screen");
            return;
        }
        self.engine.use_device(kind, device_id);
    }
}

impl std::fmt::Debug for MediaDeviceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaDeviceCoordinator")
            .field("devices", &self.devices.len())
            .field("local", &self.local)
            .finish()
    }
}
