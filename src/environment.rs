use serde::Serialize;
use std::process::{Command, Stdio};

use crate::platform::PlatformCommands;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentHealth {
    pub os: String,
    pub tools: Vec<ToolStatus>,
    pub ready: bool,
    pub notes: Vec<String>,
}

/// Check whether the external audio tools this platform depends on resolve on
/// this machine, so the UI can explain a dead Record button up front instead
/// of failing on first use.
pub fn detect_environment_health<P: PlatformCommands>(platform: &P) -> EnvironmentHealth {
    let tools = platform
        .required_tools()
        .into_iter()
        .map(|name| ToolStatus {
            name: name.to_string(),
            available: tool_available(name),
        })
        .collect();
    build_health(std::env::consts::OS.to_string(), tools)
}

fn tool_available(name: &str) -> bool {
    // Launching with --version proves the binary resolves; a non-zero exit
    // (afplay has no --version flag) still means it exists.
    Command::new(name)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

fn build_health(os: String, tools: Vec<ToolStatus>) -> EnvironmentHealth {
    let missing = tools
        .iter()
        .filter(|tool| !tool.available)
        .map(|tool| tool.name.clone())
        .collect::<Vec<_>>();

    let mut notes = Vec::new();
    if tools.is_empty() {
        notes.push(format!(
            "No external audio tooling is defined for '{os}'; recording and playback are unavailable."
        ));
    } else if !missing.is_empty() {
        notes.push(format!(
            "Missing tools: {}. Install them with your package manager.",
            missing.join(", ")
        ));
        if missing
            .iter()
            .any(|name| matches!(name.as_str(), "ffmpeg" | "ffplay" | "ffprobe"))
        {
            notes.push("The ffmpeg package provides ffmpeg, ffplay and ffprobe.".to_string());
        }
    }

    let ready = !tools.is_empty() && missing.is_empty();
    EnvironmentHealth {
        os,
        tools,
        ready,
        notes,
    }
}
