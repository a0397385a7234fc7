//! Geräteliste über cpal
//!
//! cpal kennt nur Audio; Kameras muss die Media-Engine selbst liefern.

use super::coordinator::{DeviceEnumerator, MediaDeviceInfo};
use crate::error::MediaDeviceError;
use crate::session::MediaKind;
use cpal::traits::{DeviceTrait, HostTrait};

#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDeviceEnumerator;

impl DeviceEnumerator for CpalDeviceEnumerator {
    fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, MediaDeviceError> {
        let host = cpal::default_host();

        let default_input = host.default_input_device().and_then(|d| d.name().ok());

        let devices = host
            .input_devices()
            .map_err(|e| MediaDeviceError::Enumeration(e.to_string()))?
            .filter_map(|d| d.name().ok())
            .map(|name| {
                let label = if Some(&name) == default_input.as_ref() {
                    format!("{} (default)", name)
                } else {
                    name.clone()
                };
                MediaDeviceInfo::new(name, label, MediaKind::Audio)
            })
            .collect();

        Ok(devices)
    }
}
