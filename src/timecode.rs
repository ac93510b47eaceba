pub fn format_time(seconds: f64) -> String {
    let whole = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

/// Parse an `MM:SS` string into seconds. Anything that is not exactly two
/// colon-separated fields yields 0.0, and a field that is not an integer
/// contributes 0; malformed input falls back silently instead of erroring.
pub fn parse_time(text: &str) -> f64 {
    let parts = text.split(':').collect::<Vec<_>>();
    if parts.len() != 2 {
        return 0.0;
    }

    let mins = parts[0].trim().parse::<u64>().unwrap_or(0);
    let secs = parts[1].trim().parse::<u64>().unwrap_or(0);
    (mins * 60 + secs) as f64
}

pub fn seconds_to_percent(seconds: f64, clip_duration: f64) -> f64 {
    if clip_duration <= 0.0 {
        return 0.0;
    }
    (seconds / clip_duration * 100.0).clamp(0.0, 100.0)
}

pub fn percent_to_seconds(percent: f64, clip_duration: f64) -> f64 {
    if clip_duration <= 0.0 {
        return 0.0;
    }
    percent.clamp(0.0, 100.0) / 100.0 * clip_duration
}
