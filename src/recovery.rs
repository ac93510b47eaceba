use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Shutdown checkpoint. `stop_all` on window close is what guarantees no
/// recorder or player process outlives the app; when a session ends without
/// reaching it (crash, SIGKILL), the next launch raises a pending notice so
/// the user knows an external process may have been left running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShutdownCheckpoint {
    pub clean_shutdown: bool,
    pub orphan_notice_pending: bool,
    pub launch_count: u64,
    pub last_start_unix_ms: Option<u128>,
    pub last_shutdown_unix_ms: Option<u128>,
}

impl Default for ShutdownCheckpoint {
    fn default() -> Self {
        Self {
            clean_shutdown: true,
            orphan_notice_pending: false,
            launch_count: 0,
            last_start_unix_ms: None,
            last_shutdown_unix_ms: None,
        }
    }
}

pub fn default_checkpoint_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("parrot-practice").join("shutdown.json")
}

pub fn load_or_default(path: &Path) -> ShutdownCheckpoint {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str::<ShutdownCheckpoint>(&contents).unwrap_or_default(),
        Err(_) => ShutdownCheckpoint::default(),
    }
}

pub fn save(path: &Path, checkpoint: &ShutdownCheckpoint) -> Result<(), String> {
    let parent = path
        .parent()
        .ok_or_else(|| "checkpoint path has no parent directory".to_string())?;
    fs::create_dir_all(parent).map_err(io_to_string)?;
    let payload = serde_json::to_string_pretty(checkpoint).map_err(|error| error.to_string())?;
    fs::write(path, payload).map_err(io_to_string)
}

pub fn mark_start(checkpoint: &ShutdownCheckpoint, now_unix_ms: u128) -> ShutdownCheckpoint {
    ShutdownCheckpoint {
        clean_shutdown: false,
        orphan_notice_pending: !checkpoint.clean_shutdown,
        launch_count: checkpoint.launch_count.saturating_add(1),
        last_start_unix_ms: Some(now_unix_ms),
        last_shutdown_unix_ms: checkpoint.last_shutdown_unix_ms,
    }
}

pub fn mark_clean_shutdown(
    checkpoint: &ShutdownCheckpoint,
    now_unix_ms: u128,
) -> ShutdownCheckpoint {
    ShutdownCheckpoint {
        clean_shutdown: true,
        orphan_notice_pending: false,
        launch_count: checkpoint.launch_count,
        last_start_unix_ms: checkpoint.last_start_unix_ms,
        last_shutdown_unix_ms: Some(now_unix_ms),
    }
}

pub fn acknowledge_orphan_notice(checkpoint: &ShutdownCheckpoint) -> ShutdownCheckpoint {
    ShutdownCheckpoint {
        orphan_notice_pending: false,
        ..checkpoint.clone()
    }
}

pub fn current_unix_ms() -> Result<u128, String> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .map_err(|error| error.to_string())
}

fn io_to_string(error: io::Error) -> String {
    error.to_string()
}
