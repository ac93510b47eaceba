use std::path::Path;
use std::process::Command;

use crate::error::AudioError;
use crate::platform::PlatformCommands;

/// Run the platform's duration probe to completion and parse the reported
/// duration. Blocking; callers run it off the UI context. Invoked once per
/// reference-file selection; a fresh probe supersedes the previous result.
pub fn probe_duration<P: PlatformCommands>(platform: &P, file: &Path) -> Result<f64, AudioError> {
    let spec = platform.probe_command(file)?;
    let output = Command::new(&spec.program)
        .args(&spec.args)
        .output()
        .map_err(|error| AudioError::ProbeFailed(format!("{}: {error}", spec.program)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        return Err(AudioError::ProbeFailed(if detail.is_empty() {
            format!("{} exited with {}", spec.program, output.status)
        } else {
            detail.to_string()
        }));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

pub fn parse_probe_output(raw: &str) -> Result<f64, AudioError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .map_err(|_| AudioError::ParseFailed(trimmed.to_string()))
}
