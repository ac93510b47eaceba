use crate::config::AppSettings;
use crate::devices::normalize_device_selection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppSettingsPatch {
    pub input_device: Option<Option<String>>,
    pub last_reference_file: Option<Option<String>>,
    pub stop_grace_ms: Option<u64>,
}

pub fn default_settings_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("parrot-practice").join("settings.json")
}

pub fn load_or_default(path: &Path) -> AppSettings {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str::<AppSettings>(&contents).unwrap_or_default(),
        Err(_) => AppSettings::default(),
    }
}

pub fn save(path: &Path, settings: &AppSettings) -> Result<(), String> {
    let parent = path
        .parent()
        .ok_or_else(|| "settings path has no parent directory".to_string())?;
    fs::create_dir_all(parent).map_err(io_to_string)?;
    let contents = serde_json::to_string_pretty(settings).map_err(|error| error.to_string())?;
    fs::write(path, contents).map_err(io_to_string)
}

pub fn apply_patch(settings: &AppSettings, patch: AppSettingsPatch) -> AppSettings {
    AppSettings {
        input_device: patch
            .input_device
            .map(normalize_device_selection)
            .unwrap_or_else(|| settings.input_device.clone()),
        last_reference_file: patch
            .last_reference_file
            .unwrap_or_else(|| settings.last_reference_file.clone()),
        stop_grace_ms: patch.stop_grace_ms.unwrap_or(settings.stop_grace_ms),
    }
}

fn io_to_string(error: io::Error) -> String {
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be set")
            .as_nanos();
        std::env::temp_dir().join(format!("parrot-{name}-{nanos}.json"))
    }

    #[test]
    fn applies_partial_settings_patch() {
        let defaults = AppSettings::default();
        let updated = apply_patch(
            &defaults,
            AppSettingsPatch {
                input_device: Some(Some("alsa_input.usb-mic".to_string())),
                last_reference_file: None,
                stop_grace_ms: Some(250),
            },
        );

        assert_eq!(updated.input_device.as_deref(), Some("alsa_input.usb-mic"));
        assert!(updated.last_reference_file.is_none());
        assert_eq!(updated.stop_grace_ms, 250);
    }

    #[test]
    fn patching_with_a_blank_device_resets_to_system_default() {
        let settings = AppSettings {
            input_device: Some("alsa_input.usb-mic".to_string()),
            ..AppSettings::default()
        };
        let updated = apply_patch(
            &settings,
            AppSettingsPatch {
                input_device: Some(Some("  ".to_string())),
                ..AppSettingsPatch::default()
            },
        );
        assert!(updated.input_device.is_none());
    }

    #[test]
    fn persists_and_loads_settings() {
        let path = temp_file("settings");
        let settings = AppSettings {
            input_device: Some("Built-in Microphone".to_string()),
            last_reference_file: Some("/music/ref.mp3".to_string()),
            stop_grace_ms: 750,
        };

        save(&path, &settings).expect("settings should be saved");
        let loaded = load_or_default(&path);
        assert_eq!(loaded, settings);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn falls_back_to_defaults_for_missing_file() {
        let path = temp_file("missing");
        let loaded = load_or_default(&path);
        assert_eq!(loaded, AppSettings::default());
    }

    #[test]
    fn falls_back_to_defaults_for_corrupt_file() {
        let path = temp_file("corrupt");
        fs::write(&path, "{not json").expect("file should write");
        let loaded = load_or_default(&path);
        assert_eq!(loaded, AppSettings::default());
        let _ = fs::remove_file(path);
    }
}
