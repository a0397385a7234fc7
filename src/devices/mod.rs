//! Devices Module - lokale Geräteauswahl und Mute-Status
//!
//! - Gerätelisten pro Medienart
//! - Auswahl mit Fallback auf System-Default
//! - Bildschirmfreigabe über das Pseudo-Gerät `"screen"`

mod coordinator;
#[cfg(feature = "cpal-devices")]
mod cpal_backend;

pub use crate::session::{AvailableDevices, DeviceEntry};
pub use coordinator::{
    DeviceEnumerator, MediaDeviceCoordinator, MediaDeviceInfo,
    StaticDeviceEnumerator, SCREEN_DEVICE_ID,
};
#[cfg(feature = "cpal-devices")]
pub use cpal_backend::CpalDeviceEnumerator;
