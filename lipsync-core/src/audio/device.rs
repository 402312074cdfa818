//! Audio input enumeration and role-aware device preference.

use serde::{Deserialize, Serialize};

/// What the capture device is expected to hear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// A person speaking into a microphone (the avatar mirrors its user).
    #[default]
    Microphone,
    /// The system's own playback, e.g. a remote voice agent already playing
    /// through the speakers.
    Loopback,
}

/// Metadata about an audio input device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default input device.
    pub is_default: bool,
    /// Heuristic flag for devices that capture system/output audio.
    pub is_loopback_like: bool,
    /// Best match for the requested `DeviceRole`.
    pub is_recommended: bool,
}

const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "wave out",
    "what u hear",
    "what you hear",
    "loopback",
    "monitor of",
    "virtual output",
    "cable output",
    "vb-audio",
    "blackhole",
    "soundflower",
    "speakers (",
    "headphones (",
];

const MIC_KEYWORDS: &[&str] = &[
    "microphone",
    "mic",
    "array",
    "headset",
    "line in",
    "webcam",
    "yeti",
    "podcast",
];

/// Best-effort heuristic for devices that capture what the system plays.
pub fn is_loopback_like_name(name: &str) -> bool {
    let lowered = name.trim().to_ascii_lowercase();
    LOOPBACK_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Score a device name for `role`. Higher is better.
pub fn preference_score(name: &str, role: DeviceRole) -> i32 {
    let lowered = name.trim().to_ascii_lowercase();
    let loopback = is_loopback_like_name(&lowered);
    let mic = MIC_KEYWORDS.iter().any(|k| lowered.contains(k));

    let mut score = match (role, loopback) {
        (DeviceRole::Loopback, true) => 16,
        (DeviceRole::Loopback, false) => -8,
        (DeviceRole::Microphone, true) => -16,
        (DeviceRole::Microphone, false) => 8,
    };
    if mic {
        score += match role {
            DeviceRole::Microphone => 6,
            DeviceRole::Loopback => -4,
        };
    }
    if lowered.contains("default") {
        score += 1;
    }
    score
}

/// Flag the best device for `role` and order the list best-first.
pub fn rank_devices(mut list: Vec<DeviceInfo>, role: DeviceRole) -> Vec<DeviceInfo> {
    let best = list
        .iter()
        .enumerate()
        .max_by_key(|(_, d)| preference_score(&d.name, role) + if d.is_default { 2 } else { 0 })
        .map(|(idx, _)| idx);
    if let Some(best) = best.and_then(|idx| list.get_mut(idx)) {
        best.is_recommended = true;
    }

    list.sort_by_key(|d| {
        (
            !d.is_recommended,
            std::cmp::Reverse(preference_score(&d.name, role)),
            !d.is_default,
            d.name.to_ascii_lowercase(),
        )
    });
    list
}

/// List audio input devices, best match for `role` first.
///
/// Returns an empty `Vec` if cpal is not available or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices(role: DeviceRole) -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = match host.input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            return Vec::new();
        }
    };

    let list = devices
        .enumerate()
        .map(|(idx, device)| {
            let name = device
                .name()
                .unwrap_or_else(|_| format!("Input Device {}", idx + 1));
            DeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                is_loopback_like: is_loopback_like_name(&name),
                is_recommended: false,
                name,
            }
        })
        .collect();

    rank_devices(list, role)
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices(_role: DeviceRole) -> Vec<DeviceInfo> {
    vec![]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, is_default: bool) -> DeviceInfo {
        DeviceInfo {
            name: name.into(),
            is_default,
            is_loopback_like: is_loopback_like_name(name),
            is_recommended: false,
        }
    }

    #[test]
    fn detects_common_loopback_names() {
        assert!(is_loopback_like_name("Stereo Mix (Realtek Audio)"));
        assert!(is_loopback_like_name("Monitor of Built-in Audio Analog Stereo"));
        assert!(is_loopback_like_name("BlackHole 2ch"));
        assert!(!is_loopback_like_name("Microphone Array (USB PnP Audio Device)"));
    }

    #[test]
    fn role_flips_the_preference() {
        let mic = "Microphone Array (USB PnP Audio Device)";
        let loopback = "Stereo Mix (Realtek Audio)";

        assert!(
            preference_score(mic, DeviceRole::Microphone)
                > preference_score(loopback, DeviceRole::Microphone)
        );
        assert!(
            preference_score(loopback, DeviceRole::Loopback)
                > preference_score(mic, DeviceRole::Loopback)
        );
    }

    #[test]
    fn ranking_marks_one_recommended_device_first() {
        let devices = vec![
            info("Microphone (Webcam)", true),
            info("Stereo Mix (Realtek Audio)", false),
            info("Line In (USB)", false),
        ];

        let ranked = rank_devices(devices.clone(), DeviceRole::Loopback);
        assert_eq!(ranked[0].name, "Stereo Mix (Realtek Audio)");
        assert!(ranked[0].is_recommended);
        assert_eq!(ranked.iter().filter(|d| d.is_recommended).count(), 1);

        let ranked = rank_devices(devices, DeviceRole::Microphone);
        assert_eq!(ranked[0].name, "Microphone (Webcam)");
    }

    #[test]
    fn ranking_an_empty_list_is_empty() {
        assert!(rank_devices(Vec::new(), DeviceRole::Microphone).is_empty());
    }

    #[test]
    fn role_deserializes_lowercase() {
        let role: DeviceRole = serde_json::from_str(r#""loopback""#).expect("deserialize role");
        assert_eq!(role, DeviceRole::Loopback);
    }
}
