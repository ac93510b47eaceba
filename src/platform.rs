use std::path::{Path, PathBuf};

use regex::Regex;

use crate::clip_range::PlaybackWindow;
use crate::error::AudioError;

/// An external command to launch: opaque program name plus positional and
/// flag arguments. Construction is a pure function of platform and
/// parameters, so every command line is unit-testable without spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
        }
    }
}

/// How to play a reference segment on this platform. macOS cannot seek with
/// its system player, so it first extracts the segment into a temp file with
/// a blocking ffmpeg run; the other platforms seek directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePlaybackPlan {
    pub extract: Option<CommandSpec>,
    pub play: CommandSpec,
    pub temp_segment: Option<PathBuf>,
}

pub trait PlatformCommands {
    fn record_command(&self, device: Option<&str>, output: &Path)
        -> Result<CommandSpec, AudioError>;

    fn reference_playback_plan(
        &self,
        reference: &Path,
        window: &PlaybackWindow,
        temp_dir: &Path,
    ) -> Result<ReferencePlaybackPlan, AudioError>;

    fn recording_playback_command(&self, take: &Path) -> Result<CommandSpec, AudioError>;

    fn probe_command(&self, file: &Path) -> Result<CommandSpec, AudioError>;

    fn enumerate_command(&self) -> Result<CommandSpec, AudioError>;

    fn parse_device_listing(&self, raw: &str) -> Vec<String>;

    /// ffmpeg's `-list_devices` run exits non-zero by design; platforms that
    /// enumerate through it still parse the output of a "failed" run.
    fn enumeration_tolerates_failure(&self) -> bool {
        false
    }

    fn required_tools(&self) -> Vec<&'static str>;
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn ffprobe_command(file: &Path) -> CommandSpec {
    CommandSpec::new(
        "ffprobe",
        vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "csv=p=0".to_string(),
            path_arg(file),
        ],
    )
}

fn ffplay_segment_command(file: &Path, window: &PlaybackWindow) -> CommandSpec {
    CommandSpec::new(
        "ffplay",
        vec![
            "-ss".to_string(),
            format!("{:.2}", window.start),
            "-t".to_string(),
            format!("{:.2}", window.duration()),
            "-nodisp".to_string(),
            "-autoexit".to_string(),
            path_arg(file),
        ],
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxCommands;

impl PlatformCommands for LinuxCommands {
    fn record_command(
        &self,
        device: Option<&str>,
        output: &Path,
    ) -> Result<CommandSpec, AudioError> {
        // Record through Pulse/PipeWire so virtual sources (rnnoise filters,
        // monitors) work as capture devices.
        let source = device.unwrap_or("default").to_string();
        Ok(CommandSpec::new(
            "ffmpeg",
            vec![
                "-f".to_string(),
                "pulse".to_string(),
                "-i".to_string(),
                source,
                "-ac".to_string(),
                "1".to_string(),
                "-y".to_string(),
                path_arg(output),
            ],
        ))
    }

    fn reference_playback_plan(
        &self,
        reference: &Path,
        window: &PlaybackWindow,
        _temp_dir: &Path,
    ) -> Result<ReferencePlaybackPlan, AudioError> {
        Ok(ReferencePlaybackPlan {
            extract: None,
            play: ffplay_segment_command(reference, window),
            temp_segment: None,
        })
    }

    fn recording_playback_command(&self, take: &Path) -> Result<CommandSpec, AudioError> {
        Ok(CommandSpec::new("aplay", vec![path_arg(take)]))
    }

    fn probe_command(&self, file: &Path) -> Result<CommandSpec, AudioError> {
        Ok(ffprobe_command(file))
    }

    fn enumerate_command(&self) -> Result<CommandSpec, AudioError> {
        Ok(CommandSpec::new(
            "pactl",
            vec![
                "list".to_string(),
                "short".to_string(),
                "sources".to_string(),
            ],
        ))
    }

    fn parse_device_listing(&self, raw: &str) -> Vec<String> {
        parse_pactl_sources(raw)
    }

    fn required_tools(&self) -> Vec<&'static str> {
        vec!["ffmpeg", "ffplay", "ffprobe", "aplay", "pactl"]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MacCommands;

impl PlatformCommands for MacCommands {
    fn record_command(
        &self,
        device: Option<&str>,
        output: &Path,
    ) -> Result<CommandSpec, AudioError> {
        let source = device.unwrap_or("default").to_string();
        Ok(CommandSpec::new(
            "sox",
            vec![
                "-t".to_string(),
                "coreaudio".to_string(),
                source,
                path_arg(output),
            ],
        ))
    }

    fn reference_playback_plan(
        &self,
        reference: &Path,
        window: &PlaybackWindow,
        temp_dir: &Path,
    ) -> Result<ReferencePlaybackPlan, AudioError> {
        let temp_segment = temp_dir.join("parrot-practice-segment.wav");
        let extract = CommandSpec::new(
            "ffmpeg",
            vec![
                "-ss".to_string(),
                format!("{:.2}", window.start),
                "-t".to_string(),
                format!("{:.2}", window.duration()),
                "-i".to_string(),
                path_arg(reference),
                "-y".to_string(),
                path_arg(&temp_segment),
            ],
        );
        let play = CommandSpec::new("afplay", vec![path_arg(&temp_segment)]);
        Ok(ReferencePlaybackPlan {
            extract: Some(extract),
            play,
            temp_segment: Some(temp_segment),
        })
    }

    fn recording_playback_command(&self, take: &Path) -> Result<CommandSpec, AudioError> {
        Ok(CommandSpec::new("afplay", vec![path_arg(take)]))
    }

    fn probe_command(&self, file: &Path) -> Result<CommandSpec, AudioError> {
        Ok(ffprobe_command(file))
    }

    fn enumerate_command(&self) -> Result<CommandSpec, AudioError> {
        Ok(CommandSpec::new(
            "ffmpeg",
            vec![
                "-f".to_string(),
                "avfoundation".to_string(),
                "-list_devices".to_string(),
                "true".to_string(),
                "-i".to_string(),
                String::new(),
            ],
        ))
    }

    fn parse_device_listing(&self, raw: &str) -> Vec<String> {
        parse_avfoundation_listing(raw)
    }

    fn enumeration_tolerates_failure(&self) -> bool {
        true
    }

    fn required_tools(&self) -> Vec<&'static str> {
        vec!["ffmpeg", "ffprobe", "sox", "afplay"]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsCommands;

impl PlatformCommands for WindowsCommands {
    fn record_command(
        &self,
        device: Option<&str>,
        output: &Path,
    ) -> Result<CommandSpec, AudioError> {
        let source = format!("audio={}", device.unwrap_or("default"));
        Ok(CommandSpec::new(
            "ffmpeg",
            vec![
                "-f".to_string(),
                "dshow".to_string(),
                "-i".to_string(),
                source,
                "-y".to_string(),
                path_arg(output),
            ],
        ))
    }

    fn reference_playback_plan(
        &self,
        reference: &Path,
        window: &PlaybackWindow,
        _temp_dir: &Path,
    ) -> Result<ReferencePlaybackPlan, AudioError> {
        Ok(ReferencePlaybackPlan {
            extract: None,
            play: ffplay_segment_command(reference, window),
            temp_segment: None,
        })
    }

    fn recording_playback_command(&self, take: &Path) -> Result<CommandSpec, AudioError> {
        Ok(CommandSpec::new(
            "ffplay",
            vec![
                "-nodisp".to_string(),
                "-autoexit".to_string(),
                path_arg(take),
            ],
        ))
    }

    fn probe_command(&self, file: &Path) -> Result<CommandSpec, AudioError> {
        Ok(ffprobe_command(file))
    }

    fn enumerate_command(&self) -> Result<CommandSpec, AudioError> {
        Ok(CommandSpec::new(
            "ffmpeg",
            vec![
                "-list_devices".to_string(),
                "true".to_string(),
                "-f".to_string(),
                "dshow".to_string(),
                "-i".to_string(),
                "dummy".to_string(),
            ],
        ))
    }

    fn parse_device_listing(&self, raw: &str) -> Vec<String> {
        parse_dshow_listing(raw)
    }

    fn enumeration_tolerates_failure(&self) -> bool {
        true
    }

    fn required_tools(&self) -> Vec<&'static str> {
        vec!["ffmpeg", "ffplay", "ffprobe"]
    }
}

fn parse_pactl_sources(raw: &str) -> Vec<String> {
    let mut sources = raw
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _index = fields.next()?;
            fields.next().map(str::to_string)
        })
        .collect::<Vec<_>>();
    sources.sort();
    sources
}

fn parse_dshow_listing(raw: &str) -> Vec<String> {
    let quoted = Regex::new(r#""(.+?)"$"#).expect("device name pattern is valid");
    raw.lines()
        .filter_map(|line| {
            quoted
                .captures(line.trim_end())
                .map(|captures| captures[1].to_string())
        })
        .collect()
}

fn parse_avfoundation_listing(raw: &str) -> Vec<String> {
    let indexed = Regex::new(r"\[(\d+)\] (.+)").expect("device index pattern is valid");
    raw.lines()
        .filter_map(|line| {
            indexed
                .captures(line)
                .map(|captures| captures[2].trim().to_string())
        })
        .collect()
}

/// The strategy in use for this process, selected once at startup and
/// injected into the session.
#[derive(Debug, Clone)]
pub enum RuntimePlatform {
    Linux(LinuxCommands),
    MacOs(MacCommands),
    Windows(WindowsCommands),
    Unsupported { os: String },
}

impl RuntimePlatform {
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => RuntimePlatform::Linux(LinuxCommands),
            "macos" => RuntimePlatform::MacOs(MacCommands),
            "windows" => RuntimePlatform::Windows(WindowsCommands),
            other => RuntimePlatform::Unsupported {
                os: other.to_string(),
            },
        }
    }

    pub fn description(&self) -> &str {
        match self {
            RuntimePlatform::Linux(_) => "linux",
            RuntimePlatform::MacOs(_) => "macos",
            RuntimePlatform::Windows(_) => "windows",
            RuntimePlatform::Unsupported { os } => os,
        }
    }

    fn unsupported(&self) -> AudioError {
        AudioError::UnsupportedPlatform(self.description().to_string())
    }
}

impl PlatformCommands for RuntimePlatform {
    fn record_command(
        &self,
        device: Option<&str>,
        output: &Path,
    ) -> Result<CommandSpec, AudioError> {
        match self {
            RuntimePlatform::Linux(inner) => inner.record_command(device, output),
            RuntimePlatform::MacOs(inner) => inner.record_command(device, output),
            RuntimePlatform::Windows(inner) => inner.record_command(device, output),
            RuntimePlatform::Unsupported { .. } => Err(self.unsupported()),
        }
    }

    fn reference_playback_plan(
        &self,
        reference: &Path,
        window: &PlaybackWindow,
        temp_dir: &Path,
    ) -> Result<ReferencePlaybackPlan, AudioError> {
        match self {
            RuntimePlatform::Linux(inner) => {
                inner.reference_playback_plan(reference, window, temp_dir)
            }
            RuntimePlatform::MacOs(inner) => {
                inner.reference_playback_plan(reference, window, temp_dir)
            }
            RuntimePlatform::Windows(inner) => {
                inner.reference_playback_plan(reference, window, temp_dir)
            }
            RuntimePlatform::Unsupported { .. } => Err(self.unsupported()),
        }
    }

    fn recording_playback_command(&self, take: &Path) -> Result<CommandSpec, AudioError> {
        match self {
            RuntimePlatform::Linux(inner) => inner.recording_playback_command(take),
            RuntimePlatform::MacOs(inner) => inner.recording_playback_command(take),
            RuntimePlatform::Windows(inner) => inner.recording_playback_command(take),
            RuntimePlatform::Unsupported { .. } => Err(self.unsupported()),
        }
    }

    fn probe_command(&self, file: &Path) -> Result<CommandSpec, AudioError> {
        match self {
            RuntimePlatform::Linux(inner) => inner.probe_command(file),
            RuntimePlatform::MacOs(inner) => inner.probe_command(file),
            RuntimePlatform::Windows(inner) => inner.probe_command(file),
            RuntimePlatform::Unsupported { .. } => Err(self.unsupported()),
        }
    }

    fn enumerate_command(&self) -> Result<CommandSpec, AudioError> {
        match self {
            RuntimePlatform::Linux(inner) => inner.enumerate_command(),
            RuntimePlatform::MacOs(inner) => inner.enumerate_command(),
            RuntimePlatform::Windows(inner) => inner.enumerate_command(),
            RuntimePlatform::Unsupported { .. } => Err(self.unsupported()),
        }
    }

    fn parse_device_listing(&self, raw: &str) -> Vec<String> {
        match self {
            RuntimePlatform::Linux(inner) => inner.parse_device_listing(raw),
            RuntimePlatform::MacOs(inner) => inner.parse_device_listing(raw),
            RuntimePlatform::Windows(inner) => inner.parse_device_listing(raw),
            RuntimePlatform::Unsupported { .. } => Vec::new(),
        }
    }

    fn enumeration_tolerates_failure(&self) -> bool {
        match self {
            RuntimePlatform::Linux(inner) => inner.enumeration_tolerates_failure(),
            RuntimePlatform::MacOs(inner) => inner.enumeration_tolerates_failure(),
            RuntimePlatform::Windows(inner) => inner.enumeration_tolerates_failure(),
            RuntimePlatform::Unsupported { .. } => false,
        }
    }

    fn required_tools(&self) -> Vec<&'static str> {
        match self {
            RuntimePlatform::Linux(inner) => inner.required_tools(),
            RuntimePlatform::MacOs(inner) => inner.required_tools(),
            RuntimePlatform::Windows(inner) => inner.required_tools(),
            RuntimePlatform::Unsupported { .. } => Vec::new(),
        }
    }
}

/// Platform stub wired to cheap shell commands so the whole pipeline can run
/// in tests without any audio tool installed.
#[cfg(test)]
pub(crate) struct StubPlatform {
    pub probe_output: &'static str,
    pub with_extract: bool,
}

#[cfg(test)]
impl Default for StubPlatform {
    fn default() -> Self {
        Self {
            probe_output: "125.4",
            with_extract: false,
        }
    }
}

#[cfg(test)]
impl PlatformCommands for StubPlatform {
    fn record_command(
        &self,
        _device: Option<&str>,
        _output: &Path,
    ) -> Result<CommandSpec, AudioError> {
        Ok(CommandSpec::new("sleep", vec!["30".to_string()]))
    }

    fn reference_playback_plan(
        &self,
        _reference: &Path,
        _window: &PlaybackWindow,
        temp_dir: &Path,
    ) -> Result<ReferencePlaybackPlan, AudioError> {
        let (extract, temp_segment) = if self.with_extract {
            let temp_segment = temp_dir.join("stub-segment.wav");
            (
                Some(CommandSpec::new(
                    "touch",
                    vec![path_arg(&temp_segment)],
                )),
                Some(temp_segment),
            )
        } else {
            (None, None)
        };
        Ok(ReferencePlaybackPlan {
            extract,
            play: CommandSpec::new("sleep", vec!["30".to_string()]),
            temp_segment,
        })
    }

    fn recording_playback_command(&self, _take: &Path) -> Result<CommandSpec, AudioError> {
        Ok(CommandSpec::new("sleep", vec!["30".to_string()]))
    }

    fn probe_command(&self, _file: &Path) -> Result<CommandSpec, AudioError> {
        Ok(CommandSpec::new(
            "echo",
            vec![self.probe_output.to_string()],
        ))
    }

    fn enumerate_command(&self) -> Result<CommandSpec, AudioError> {
        Ok(CommandSpec::new(
            "echo",
            vec!["stub-device".to_string()],
        ))
    }

    fn parse_device_listing(&self, raw: &str) -> Vec<String> {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn required_tools(&self) -> Vec<&'static str> {
        Vec::new()
    }
}
