use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::Receiver;
use std::time::Duration;

use serde::Serialize;

use crate::clip_range::{ClipRange, PlaybackWindow};
use crate::error::AudioError;
use crate::platform::{CommandSpec, PlatformCommands};
use crate::probe;
use crate::process_control::{OperationKind, ProcessController, ProcessExit};
use crate::take;
use crate::timecode;

/// Everything the UI needs to render, projected from the single source of
/// truth. The MM:SS texts and slider percents are both derived here; feeding
/// either control back goes through a range setter and re-reads this, so the
/// two surfaces can no longer drift apart.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub reference_file: Option<String>,
    pub clip_duration: f64,
    pub clip_duration_display: Option<String>,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub start_display: String,
    pub end_display: String,
    pub start_percent: f64,
    pub end_percent: f64,
    pub recording: bool,
    pub playing_reference: bool,
    pub playing_take: bool,
    pub has_take: bool,
}

/// The rendering-agnostic application core: one range model, one process
/// controller, one injected platform strategy. The desktop command layer is
/// a thin shell over this.
pub struct PracticeSession<P: PlatformCommands> {
    platform: P,
    controller: ProcessController,
    range: ClipRange,
    reference_file: Option<PathBuf>,
    take_path: PathBuf,
}

impl<P: PlatformCommands> PracticeSession<P> {
    pub fn new(
        platform: P,
        take_path: PathBuf,
        stop_grace: Duration,
    ) -> (Self, Receiver<ProcessExit>) {
        let (controller, exits) = ProcessController::new(stop_grace);
        let session = Self {
            platform,
            controller,
            range: ClipRange::new(),
            reference_file: None,
            take_path,
        };
        (session, exits)
    }

    pub fn take_path(&self) -> &Path {
        &self.take_path
    }

    pub fn reference_file(&self) -> Option<&Path> {
        self.reference_file.as_deref()
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn is_running(&self, kind: OperationKind) -> bool {
        self.controller.is_running(kind)
    }

    /// Load (or reload) a reference clip: existence check, blocking duration
    /// probe, then reseed the range to the full clip. A reload supersedes any
    /// previous probe result.
    pub fn load_reference(&mut self, path: &Path) -> Result<f64, AudioError> {
        if !path.exists() {
            return Err(AudioError::FileNotFound(path.display().to_string()));
        }

        let duration = probe::probe_duration(&self.platform, path)?;
        self.range.reset_for_clip(duration);
        self.reference_file = Some(path.to_path_buf());
        Ok(duration)
    }

    pub fn set_start_seconds(&mut self, seconds: f64) {
        self.range.set_start(seconds);
    }

    pub fn set_end_seconds(&mut self, seconds: f64) {
        self.range.set_end(seconds);
    }

    pub fn set_start_text(&mut self, text: &str) {
        self.range.set_start(timecode::parse_time(text));
    }

    pub fn set_end_text(&mut self, text: &str) {
        self.range.set_end(timecode::parse_time(text));
    }

    pub fn set_start_percent(&mut self, percent: f64) {
        let seconds = timecode::percent_to_seconds(percent, self.range.clip_duration());
        self.range.set_start(seconds);
    }

    pub fn set_end_percent(&mut self, percent: f64) {
        let seconds = timecode::percent_to_seconds(percent, self.range.clip_duration());
        self.range.set_end(seconds);
    }

    /// Play the selected range of the reference clip. On platforms whose
    /// player cannot seek, a blocking extraction runs first; its temp file is
    /// removed when this call returns, whatever the outcome.
    pub fn play_reference(&mut self) -> Result<PlaybackWindow, AudioError> {
        let reference = self
            .reference_file
            .clone()
            .ok_or_else(|| AudioError::FileNotFound("no reference clip is loaded".to_string()))?;

        let window = self.range.validate_for_playback()?;
        let plan =
            self.platform
                .reference_playback_plan(&reference, &window, &std::env::temp_dir())?;

        let _temp_guard = plan.temp_segment.clone().map(TempFileGuard);
        if let Some(extract) = &plan.extract {
            run_to_completion(extract, "segment extraction")?;
        }

        self.controller.start(OperationKind::PlayReference, &plan.play)?;
        Ok(window)
    }

    pub fn start_recording(&mut self, device: Option<&str>) -> Result<PathBuf, AudioError> {
        let spec = self.platform.record_command(device, &self.take_path)?;
        self.controller.start(OperationKind::Record, &spec)?;
        Ok(self.take_path.clone())
    }

    pub fn play_recording(&mut self) -> Result<(), AudioError> {
        if !take::take_exists(&self.take_path) {
            return Err(AudioError::FileNotFound(
                "no recording has been made yet".to_string(),
            ));
        }

        let spec = self.platform.recording_playback_command(&self.take_path)?;
        self.controller.start(OperationKind::PlayRecording, &spec)
    }

    pub fn stop(&mut self, kind: OperationKind) -> bool {
        self.controller.stop(kind)
    }

    pub fn stop_all(&mut self) {
        self.controller.stop_all();
    }

    pub fn status(&self) -> SessionStatus {
        let clip_duration = self.range.clip_duration();
        SessionStatus {
            reference_file: self
                .reference_file
                .as_ref()
                .map(|path| path.display().to_string()),
            clip_duration,
            clip_duration_display: (clip_duration > 0.0)
                .then(|| timecode::format_time(clip_duration)),
            start_seconds: self.range.start(),
            end_seconds: self.range.end(),
            start_display: timecode::format_time(self.range.start()),
            end_display: timecode::format_time(self.range.end()),
            start_percent: timecode::seconds_to_percent(self.range.start(), clip_duration),
            end_percent: timecode::seconds_to_percent(self.range.end(), clip_duration),
            recording: self.is_running(OperationKind::Record),
            playing_reference: self.is_running(OperationKind::PlayReference),
            playing_take: self.is_running(OperationKind::PlayRecording),
            has_take: take::take_exists(&self.take_path),
        }
    }
}

struct TempFileGuard(PathBuf);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn run_to_completion(spec: &CommandSpec, operation: &'static str) -> Result<(), AudioError> {
    let status = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|error| AudioError::SpawnFailed {
            operation,
            reason: format!("{}: {error}", spec.program),
        })?;

    if !status.success() {
        return Err(AudioError::SpawnFailed {
            operation,
            reason: format!("{} exited with {status}", spec.program),
        });
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::platform::StubPlatform;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str, extension: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be set")
            .as_nanos();
        std::env::temp_dir().join(format!("parrot-session-{name}-{nanos}.{extension}"))
    }

    fn session_with(
        platform: StubPlatform,
    ) -> (PracticeSession<StubPlatform>, Receiver<ProcessExit>) {
        PracticeSession::new(
            platform,
            temp_path("take", "wav"),
            Duration::from_millis(200),
        )
    }

    fn loaded_session() -> (PracticeSession<StubPlatform>, Receiver<ProcessExit>, PathBuf) {
        let (mut session, exits) = session_with(StubPlatform::default());
        let reference = temp_path("ref", "mp3");
        std::fs::write(&reference, b"fake audio").expect("reference file should write");
        session
            .load_reference(&reference)
            .expect("load should succeed");
        (session, exits, reference)
    }

    #[test]
    fn loading_a_missing_reference_fails_without_probing() {
        let (mut session, _exits) = session_with(StubPlatform::default());
        let missing = temp_path("missing", "mp3");
        assert!(matches!(
            session.load_reference(&missing),
            Err(AudioError::FileNotFound(_))
        ));
        assert!(session.reference_file().is_none());
    }

    #[test]
    fn loading_seeds_the_full_clip_range() {
        let (session, _exits, reference) = loaded_session();

        let status = session.status();
        assert_eq!(status.clip_duration, 125.4);
        assert_eq!(status.clip_duration_display.as_deref(), Some("02:05"));
        assert_eq!(status.start_seconds, 0.0);
        assert_eq!(status.end_seconds, 125.4);
        assert_eq!(status.start_percent, 0.0);
        assert_eq!(status.end_percent, 100.0);
        assert_eq!(status.end_display, "02:05");

        let _ = std::fs::remove_file(reference);
    }

    #[test]
    fn slider_at_half_projects_to_the_time_text() {
        let (mut session, _exits, reference) = loaded_session();

        session.set_start_percent(50.0);
        let status = session.status();
        assert_eq!(status.start_seconds, 62.7);
        assert_eq!(status.start_display, "01:02");

        let _ = std::fs::remove_file(reference);
    }

    #[test]
    fn text_edits_clamp_against_the_probed_duration() {
        let (mut session, _exits, reference) = loaded_session();

        session.set_end_text("10:00");
        let status = session.status();
        assert_eq!(status.end_seconds, 125.4);
        assert_eq!(status.end_display, "02:05");
        assert_eq!(status.end_percent, 100.0);

        let _ = std::fs::remove_file(reference);
    }

    #[test]
    fn inverted_range_refuses_to_play() {
        let (mut session, _exits, reference) = loaded_session();

        session.set_start_text("01:00");
        session.set_end_text("00:30");
        assert!(matches!(
            session.play_reference(),
            Err(AudioError::InvalidRange)
        ));
        assert!(!session.is_running(OperationKind::PlayReference));

        let _ = std::fs::remove_file(reference);
    }

    #[test]
    fn playing_without_a_reference_is_rejected() {
        let (mut session, _exits) = session_with(StubPlatform::default());
        assert!(matches!(
            session.play_reference(),
            Err(AudioError::FileNotFound(_))
        ));
    }

    #[test]
    fn reference_playback_starts_and_stops() {
        let (mut session, _exits, reference) = loaded_session();

        session.set_start_text("00:10");
        session.set_end_text("00:20");
        let window = session.play_reference().expect("playback should start");
        assert_eq!(window.duration(), 10.0);
        assert!(session.status().playing_reference);

        assert!(session.stop(OperationKind::PlayReference));
        assert!(!session.status().playing_reference);

        let _ = std::fs::remove_file(reference);
    }

    #[test]
    fn extraction_temp_file_is_removed_once_playback_starts() {
        let (mut session, _exits) = session_with(StubPlatform {
            with_extract: true,
            ..StubPlatform::default()
        });
        let reference = temp_path("ref-extract", "mp3");
        std::fs::write(&reference, b"fake audio").expect("reference file should write");
        session
            .load_reference(&reference)
            .expect("load should succeed");

        session.play_reference().expect("playback should start");
        assert!(session.is_running(OperationKind::PlayReference));
        // The guard removed the extracted segment when play_reference returned.
        assert!(!std::env::temp_dir().join("stub-segment.wav").exists());

        session.stop_all();
        let _ = std::fs::remove_file(reference);
    }

    #[test]
    fn recording_round_trip_with_take_playback() {
        let (mut session, _exits, reference) = loaded_session();

        let take = session
            .start_recording(Some("stub-device"))
            .expect("recording should start");
        assert!(session.status().recording);
        assert!(matches!(
            session.start_recording(None),
            Err(AudioError::AlreadyRunning("recording"))
        ));

        assert!(session.stop(OperationKind::Record));
        assert!(!session.status().recording);

        // No real recorder ran, so fake the take before playing it back.
        std::fs::write(&take, b"fake take").expect("take file should write");
        session.play_recording().expect("take playback should start");
        assert!(session.status().playing_take);
        assert!(session.status().has_take);

        session.stop_all();
        assert!(!session.status().playing_take);
        let _ = std::fs::remove_file(take);
        let _ = std::fs::remove_file(reference);
    }

    #[test]
    fn playing_a_take_that_does_not_exist_is_rejected() {
        let (mut session, _exits, reference) = loaded_session();
        assert!(matches!(
            session.play_recording(),
            Err(AudioError::FileNotFound(_))
        ));
        let _ = std::fs::remove_file(reference);
    }

    #[test]
    fn reloading_supersedes_the_previous_probe() {
        let (mut session, _exits, reference) = loaded_session();
        session.set_start_text("01:00");

        session
            .load_reference(&reference)
            .expect("reload should succeed");
        let status = session.status();
        assert_eq!(status.start_seconds, 0.0);
        assert_eq!(status.end_seconds, 125.4);

        let _ = std::fs::remove_file(reference);
    }
}
