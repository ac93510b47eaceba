use serde::Serialize;

use crate::error::AudioError;

/// The selected sub-interval of the reference clip. This is the single source
/// of truth for the range: the MM:SS text fields and the percentage sliders
/// are both one-way projections derived from it (see `timecode`), never
/// independent copies.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClipRange {
    start: f64,
    end: f64,
    clip_duration: f64,
}

/// A validated `[start, end)` window ready to hand to a playback command.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PlaybackWindow {
    pub start: f64,
    pub end: f64,
}

impl PlaybackWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl ClipRange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn clip_duration(&self) -> f64 {
        self.clip_duration
    }

    /// Seed the range for a freshly probed clip: full-width selection.
    pub fn reset_for_clip(&mut self, duration: f64) {
        self.clip_duration = duration.max(0.0);
        self.start = 0.0;
        self.end = self.clip_duration;
    }

    pub fn set_clip_duration(&mut self, duration: f64) {
        self.clip_duration = duration.max(0.0);
        if self.clip_duration > 0.0 {
            self.start = self.start.clamp(0.0, self.clip_duration);
            self.end = self.end.clamp(0.0, self.clip_duration);
        }
    }

    /// No ordering is enforced between start and end at assignment time;
    /// ordering is only checked by `validate_for_playback`.
    pub fn set_start(&mut self, seconds: f64) {
        self.start = self.bounded(seconds);
    }

    pub fn set_end(&mut self, seconds: f64) {
        self.end = self.bounded(seconds);
    }

    fn bounded(&self, seconds: f64) -> f64 {
        if self.clip_duration > 0.0 {
            seconds.clamp(0.0, self.clip_duration)
        } else {
            seconds
        }
    }

    /// Resolve the range for playback. The ordering check runs first; an end
    /// beyond a known clip duration is then clamped down (and the clamp is
    /// kept, so the UI re-projects the corrected value).
    pub fn validate_for_playback(&mut self) -> Result<PlaybackWindow, AudioError> {
        if self.end <= self.start {
            return Err(AudioError::InvalidRange);
        }

        if self.clip_duration > 0.0 && self.end > self.clip_duration {
            self.end = self.clip_duration;
        }

        Ok(PlaybackWindow {
            start: self.start,
            end: self.end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timecode::{format_time, parse_time};

    #[test]
    fn starts_all_zero() {
        let range = ClipRange::new();
        assert_eq!(range.start(), 0.0);
        assert_eq!(range.end(), 0.0);
        assert_eq!(range.clip_duration(), 0.0);
    }

    #[test]
    fn reset_selects_the_whole_clip() {
        let mut range = ClipRange::new();
        range.reset_for_clip(125.4);
        assert_eq!(range.start(), 0.0);
        assert_eq!(range.end(), 125.4);
        assert_eq!(range.clip_duration(), 125.4);
    }

    #[test]
    fn assignments_clamp_to_known_duration() {
        let mut range = ClipRange::new();
        range.reset_for_clip(100.0);
        range.set_start(-5.0);
        assert_eq!(range.start(), 0.0);
        range.set_end(240.0);
        assert_eq!(range.end(), 100.0);
        range.set_start(42.5);
        assert_eq!(range.start(), 42.5);
    }

    #[test]
    fn assignments_pass_through_while_duration_is_unknown() {
        let mut range = ClipRange::new();
        range.set_end(240.0);
        assert_eq!(range.end(), 240.0);
    }

    #[test]
    fn shrinking_the_clip_reclamps_both_ends() {
        let mut range = ClipRange::new();
        range.reset_for_clip(200.0);
        range.set_start(150.0);
        range.set_end(180.0);

        range.set_clip_duration(120.0);
        assert_eq!(range.start(), 120.0);
        assert_eq!(range.end(), 120.0);
    }

    #[test]
    fn playback_rejects_inverted_and_empty_ranges() {
        let mut range = ClipRange::new();
        range.reset_for_clip(100.0);

        range.set_start(parse_time("01:00"));
        range.set_end(parse_time("00:30"));
        assert!(matches!(
            range.validate_for_playback(),
            Err(AudioError::InvalidRange)
        ));

        range.set_start(40.0);
        range.set_end(40.0);
        assert!(matches!(
            range.validate_for_playback(),
            Err(AudioError::InvalidRange)
        ));
    }

    #[test]
    fn playback_clamps_end_to_clip_duration() {
        let mut range = ClipRange::new();
        range.reset_for_clip(125.4);
        range.set_start(10.0);
        // Simulate the end drifting past the clip while the bound was unknown.
        range = ClipRange {
            start: 10.0,
            end: parse_time("10:00"),
            clip_duration: 125.4,
        };

        let window = range.validate_for_playback().expect("range should resolve");
        assert_eq!(window.end, 125.4);
        assert_eq!(range.end(), 125.4);
        assert!((window.duration() - 115.4).abs() < 1e-9);
        assert_eq!(format_time(window.end), "02:05");
    }

    #[test]
    fn playback_reports_resolved_window() {
        let mut range = ClipRange::new();
        range.reset_for_clip(125.4);
        range.set_start(parse_time("00:30"));
        range.set_end(parse_time("01:10"));

        let window = range.validate_for_playback().expect("range should resolve");
        assert_eq!(window.start, 30.0);
        assert_eq!(window.end, 70.0);
        assert_eq!(window.duration(), 40.0);
    }
}
