use std::process::Command;

use crate::error::AudioError;
use crate::platform::PlatformCommands;

/// Enumerate capture devices through the platform's listing process. An empty
/// list is a valid result ("no devices found"), distinct from enumeration
/// failure. ffmpeg-based listings print to stderr, so stdout and stderr are
/// parsed together.
pub fn list_input_devices<P: PlatformCommands>(platform: &P) -> Result<Vec<String>, AudioError> {
    let spec = platform.enumerate_command()?;
    let output = Command::new(&spec.program)
        .args(&spec.args)
        .output()
        .map_err(|error| AudioError::EnumerationFailed(format!("{}: {error}", spec.program)))?;

    if !output.status.success() && !platform.enumeration_tolerates_failure() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        return Err(AudioError::EnumerationFailed(if detail.is_empty() {
            format!("{} exited with {}", spec.program, output.status)
        } else {
            detail.to_string()
        }));
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(platform.parse_device_listing(&combined))
}

/// The record command takes `None` for "system default". The settings layer
/// stores the selection the same way; an empty or blank string collapses to
/// the default. The "<system default>" marker users pick from exists only in
/// the presentation layer.
pub fn normalize_device_selection(selection: Option<String>) -> Option<String> {
    selection
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
