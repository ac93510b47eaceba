use serde::{Deserialize, Serialize};

pub const DEFAULT_STOP_GRACE_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppSettings {
    /// Capture device passed to the record command. `None` means the system
    /// default source; the "<system default>" label only exists in the UI.
    pub input_device: Option<String>,
    /// Re-offered in the file entry on the next launch.
    pub last_reference_file: Option<String>,
    /// How long a stopped process gets to flush before the hard kill.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

fn default_stop_grace_ms() -> u64 {
    DEFAULT_STOP_GRACE_MS
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            input_device: None,
            last_reference_file: None,
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_the_system_capture_device() {
        let settings = AppSettings::default();
        assert!(settings.input_device.is_none());
        assert!(settings.last_reference_file.is_none());
        assert_eq!(settings.stop_grace_ms, 500);
    }

    #[test]
    fn older_settings_without_stop_grace_deserialize_to_default() {
        let json = r#"{
  "input_device": "alsa_input.usb-mic",
  "last_reference_file": null
}"#;

        let parsed: AppSettings =
            serde_json::from_str(json).expect("older settings payload should deserialize");
        assert_eq!(parsed.input_device.as_deref(), Some("alsa_input.usb-mic"));
        assert_eq!(parsed.stop_grace_ms, 500);
    }
}
