use std::path::{Path, PathBuf};

pub const TAKE_FILE_NAME: &str = "parrot-practice-take.wav";

/// The single recording output file. Every new take overwrites it in place;
/// a playback already reading the old bytes while a new recording starts is
/// an accepted race (stop playback first if it matters).
pub fn default_take_path() -> PathBuf {
    std::env::temp_dir().join(TAKE_FILE_NAME)
}

pub fn take_exists(path: &Path) -> bool {
    path.exists()
}

/// Duration of the recorded take in seconds, when the WAV parses. A recorder
/// killed before finalizing its header leaves a file hound may reject; the
/// caller then just skips the duration in its status message.
pub fn take_duration_seconds(path: &Path) -> Option<f64> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}
