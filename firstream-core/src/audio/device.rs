//! Audio output device enumeration.

use serde::{Deserialize, Serialize};

/// Metadata about an audio output device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default output device.
    pub is_default: bool,
}

/// Whether `candidate` names the same device as the user's `preferred` name.
///
/// Comparison ignores surrounding whitespace and ASCII case, since names
/// typed into settings rarely match the OS spelling exactly.
pub fn device_name_matches(candidate: &str, preferred: &str) -> bool {
    let preferred = preferred.trim();
    !preferred.is_empty() && candidate.trim().eq_ignore_ascii_case(preferred)
}

/// Order devices default-first, then by name.
pub fn sort_devices(devices: &mut [DeviceInfo]) {
    devices.sort_by_key(|d| (!d.is_default, d.name.to_ascii_lowercase()));
}

/// List all available audio output devices on the system.
///
/// Returns an empty `Vec` if cpal is not available or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());

    match host.output_devices() {
        Ok(devices) => {
            let mut list = devices
                .enumerate()
                .map(|(idx, device)| {
                    let name = device
                        .name()
                        .unwrap_or_else(|_| format!("Output Device {}", idx + 1));
                    let is_default = default_name.as_deref() == Some(name.as_str());
                    DeviceInfo { name, is_default }
                })
                .collect::<Vec<_>>();
            sort_devices(&mut list);
            list
        }
        Err(e) => {
            tracing::warn!("failed to enumerate output devices: {e}");
            default_name
                .map(|name| {
                    vec![DeviceInfo {
                        name,
                        is_default: true,
                    }]
                })
                .unwrap_or_default()
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_output_devices() -> Vec<DeviceInfo> {
    vec![]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_name_match_is_lenient() {
        assert!(device_name_matches("Speakers (Realtek Audio)", " speakers (realtek audio) "));
        assert!(!device_name_matches("Speakers (Realtek Audio)", "Headphones"));
        assert!(!device_name_matches("Speakers", "   "));
    }

    #[test]
    fn default_device_sorts_first() {
        let mut devices = vec![
            DeviceInfo {
                name: "b-side".into(),
                is_default: false,
            },
            DeviceInfo {
                name: "Zeta".into(),
                is_default: true,
            },
            DeviceInfo {
                name: "Alpha".into(),
                is_default: false,
            },
        ];
        sort_devices(&mut devices);
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Zeta", "Alpha", "b-side"]);
    }
}
