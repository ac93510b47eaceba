pub mod clip_range;
pub mod config;
pub mod devices;
pub mod environment;
pub mod error;
pub mod platform;
pub mod probe;
pub mod process_control;
pub mod recovery;
pub mod runtime_log;
pub mod session;
pub mod settings_store;
pub mod take;
pub mod timecode;

#[cfg(feature = "desktop")]
use config::AppSettings;
#[cfg(feature = "desktop")]
use devices::normalize_device_selection;
#[cfg(feature = "desktop")]
use environment::EnvironmentHealth;
#[cfg(feature = "desktop")]
use platform::RuntimePlatform;
#[cfg(feature = "desktop")]
use process_control::{OperationKind, ProcessExit};
#[cfg(feature = "desktop")]
use recovery::ShutdownCheckpoint;
#[cfg(feature = "desktop")]
use runtime_log as log_store;
#[cfg(feature = "desktop")]
use serde::Serialize;
#[cfg(feature = "desktop")]
use session::{PracticeSession, SessionStatus};
#[cfg(feature = "desktop")]
use settings_store::AppSettingsPatch;
#[cfg(feature = "desktop")]
use std::path::{Path, PathBuf};
#[cfg(feature = "desktop")]
use std::sync::Mutex;
#[cfg(feature = "desktop")]
use std::time::Duration;
#[cfg(feature = "desktop")]
use tauri::Emitter;
#[cfg(feature = "desktop")]
use tauri::Manager;

#[cfg(feature = "desktop")]
struct SessionStore {
    session: Mutex<PracticeSession<RuntimePlatform>>,
}

#[cfg(feature = "desktop")]
impl SessionStore {
    fn new(session: PracticeSession<RuntimePlatform>) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }
}

#[cfg(feature = "desktop")]
struct SettingsState {
    settings: Mutex<AppSettings>,
    settings_path: PathBuf,
}

#[cfg(feature = "desktop")]
impl SettingsState {
    fn new(settings: AppSettings, settings_path: PathBuf) -> Self {
        Self {
            settings: Mutex::new(settings),
            settings_path,
        }
    }
}

#[cfg(feature = "desktop")]
struct RuntimeLogState {
    path: PathBuf,
}

#[cfg(feature = "desktop")]
impl RuntimeLogState {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[cfg(feature = "desktop")]
struct CheckpointState {
    path: PathBuf,
    checkpoint: Mutex<ShutdownCheckpoint>,
}

#[cfg(feature = "desktop")]
impl CheckpointState {
    fn new(path: PathBuf, checkpoint: ShutdownCheckpoint) -> Self {
        Self {
            path,
            checkpoint: Mutex::new(checkpoint),
        }
    }
}

/// Returned by every toggle so the frontend re-renders from the model and
/// shows the new status line in one round trip.
#[cfg(feature = "desktop")]
#[derive(Clone, Serialize)]
struct TogglePayload {
    status: SessionStatus,
    message: String,
}

#[cfg(feature = "desktop")]
#[derive(Clone, Serialize)]
struct OperationFinishedPayload {
    kind: OperationKind,
    success: bool,
    message: String,
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn health_check() -> &'static str {
    "ok"
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn get_status(store: tauri::State<'_, SessionStore>) -> Result<SessionStatus, String> {
    let session = store
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn load_reference_file(
    store: tauri::State<'_, SessionStore>,
    settings_state: tauri::State<'_, SettingsState>,
    logs: tauri::State<'_, RuntimeLogState>,
    path: String,
) -> Result<TogglePayload, String> {
    let mut session = store
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;

    let duration = session
        .load_reference(Path::new(&path))
        .map_err(|error| error.to_string())?;

    let mut settings = settings_state
        .settings
        .lock()
        .map_err(|_| "failed to acquire settings state".to_string())?;
    settings.last_reference_file = Some(path.clone());
    let _ = settings_store::save(&settings_state.settings_path, &settings);

    let _ = log_store::append(
        &logs.path,
        "info",
        "reference.loaded",
        &format!("loaded '{path}' ({duration:.1}s)"),
    );

    let name = Path::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or(path);
    Ok(TogglePayload {
        status: session.status(),
        message: format!("Reference loaded: {name}"),
    })
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn set_range_start_text(
    store: tauri::State<'_, SessionStore>,
    text: String,
) -> Result<SessionStatus, String> {
    let mut session = store
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    session.set_start_text(&text);
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn set_range_end_text(
    store: tauri::State<'_, SessionStore>,
    text: String,
) -> Result<SessionStatus, String> {
    let mut session = store
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    session.set_end_text(&text);
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn set_range_start_percent(
    store: tauri::State<'_, SessionStore>,
    percent: f64,
) -> Result<SessionStatus, String> {
    let mut session = store
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    session.set_start_percent(percent);
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn set_range_end_percent(
    store: tauri::State<'_, SessionStore>,
    percent: f64,
) -> Result<SessionStatus, String> {
    let mut session = store
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    session.set_end_percent(percent);
    Ok(session.status())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn toggle_reference_playback(
    store: tauri::State<'_, SessionStore>,
    logs: tauri::State<'_, RuntimeLogState>,
) -> Result<TogglePayload, String> {
    let mut session = store
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;

    let message = if session.is_running(OperationKind::PlayReference) {
        session.stop(OperationKind::PlayReference);
        let _ = log_store::append(&logs.path, "info", "playback.stop", "reference stopped");
        "Reference playback stopped".to_string()
    } else {
        let window = session.play_reference().map_err(|error| {
            let _ = log_store::append(&logs.path, "warn", "playback.error", &error.to_string());
            error.to_string()
        })?;
        let _ = log_store::append(
            &logs.path,
            "info",
            "playback.start",
            &format!("reference {:.2}s..{:.2}s", window.start, window.end),
        );
        format!("Playing reference ({:.1}s)", window.duration())
    };

    Ok(TogglePayload {
        status: session.status(),
        message,
    })
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn toggle_recording(
    store: tauri::State<'_, SessionStore>,
    settings_state: tauri::State<'_, SettingsState>,
    logs: tauri::State<'_, RuntimeLogState>,
) -> Result<TogglePayload, String> {
    let mut session = store
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;

    let message = if session.is_running(OperationKind::Record) {
        session.stop(OperationKind::Record);
        let saved = session.take_path().display().to_string();
        let _ = log_store::append(&logs.path, "info", "record.stop", &format!("saved {saved}"));
        match take::take_duration_seconds(session.take_path()) {
            Some(duration) => format!("Recording saved to {saved} ({duration:.1}s)"),
            None => format!("Recording saved to {saved}"),
        }
    } else {
        let device = settings_state
            .settings
            .lock()
            .map_err(|_| "failed to acquire settings state".to_string())?
            .input_device
            .clone();
        let device = normalize_device_selection(device);

        session.start_recording(device.as_deref()).map_err(|error| {
            let _ = log_store::append(&logs.path, "warn", "record.error", &error.to_string());
            error.to_string()
        })?;
        let _ = log_store::append(
            &logs.path,
            "info",
            "record.start",
            &format!("device {}", device.as_deref().unwrap_or("<system default>")),
        );
        "Recording...".to_string()
    };

    Ok(TogglePayload {
        status: session.status(),
        message,
    })
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn toggle_take_playback(
    store: tauri::State<'_, SessionStore>,
    logs: tauri::State<'_, RuntimeLogState>,
) -> Result<TogglePayload, String> {
    let mut session = store
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;

    let message = if session.is_running(OperationKind::PlayRecording) {
        session.stop(OperationKind::PlayRecording);
        let _ = log_store::append(&logs.path, "info", "takeplayback.stop", "take stopped");
        "Recording playback stopped".to_string()
    } else {
        session.play_recording().map_err(|error| {
            let _ = log_store::append(&logs.path, "warn", "takeplayback.error", &error.to_string());
            error.to_string()
        })?;
        let _ = log_store::append(&logs.path, "info", "takeplayback.start", "take playing");
        "Playing recording...".to_string()
    };

    Ok(TogglePayload {
        status: session.status(),
        message,
    })
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn list_capture_devices(store: tauri::State<'_, SessionStore>) -> Result<Vec<String>, String> {
    let session = store
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    devices::list_input_devices(session.platform()).map_err(|error| error.to_string())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn get_settings(state: tauri::State<'_, SettingsState>) -> Result<AppSettings, String> {
    let settings = state
        .settings
        .lock()
        .map_err(|_| "failed to acquire settings state".to_string())?;
    Ok(settings.clone())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn update_settings(
    settings_state: tauri::State<'_, SettingsState>,
    logs: tauri::State<'_, RuntimeLogState>,
    patch: AppSettingsPatch,
) -> Result<AppSettings, String> {
    let mut settings = settings_state
        .settings
        .lock()
        .map_err(|_| "failed to acquire settings state".to_string())?;
    let updated = settings_store::apply_patch(&settings, patch);
    settings_store::save(&settings_state.settings_path, &updated)?;
    *settings = updated.clone();

    let _ = log_store::append(
        &logs.path,
        "info",
        "settings.update",
        &format!(
            "input device {}",
            updated.input_device.as_deref().unwrap_or("<system default>")
        ),
    );

    Ok(updated)
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn get_environment_health(
    store: tauri::State<'_, SessionStore>,
) -> Result<EnvironmentHealth, String> {
    let session = store
        .session
        .lock()
        .map_err(|_| "failed to acquire session state".to_string())?;
    Ok(environment::detect_environment_health(session.platform()))
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn get_runtime_logs(
    logs: tauri::State<'_, RuntimeLogState>,
    limit: Option<usize>,
) -> Result<Vec<String>, String> {
    let normalized_limit = limit.unwrap_or(40).clamp(1, 200);
    log_store::read_recent(&logs.path, normalized_limit)
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn clear_runtime_logs(logs: tauri::State<'_, RuntimeLogState>) -> Result<(), String> {
    log_store::clear(&logs.path)
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn get_shutdown_checkpoint(
    checkpoint_state: tauri::State<'_, CheckpointState>,
) -> Result<ShutdownCheckpoint, String> {
    let checkpoint = checkpoint_state
        .checkpoint
        .lock()
        .map_err(|_| "failed to acquire checkpoint state".to_string())?;
    Ok(checkpoint.clone())
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn acknowledge_orphan_notice(
    checkpoint_state: tauri::State<'_, CheckpointState>,
) -> Result<ShutdownCheckpoint, String> {
    let mut checkpoint = checkpoint_state
        .checkpoint
        .lock()
        .map_err(|_| "failed to acquire checkpoint state".to_string())?;
    let updated = recovery::acknowledge_orphan_notice(&checkpoint);
    recovery::save(&checkpoint_state.path, &updated)?;
    *checkpoint = updated.clone();
    Ok(updated)
}

#[cfg(feature = "desktop")]
fn finished_message(exit: &ProcessExit) -> String {
    match (exit.kind, exit.success) {
        (OperationKind::PlayReference, _) => "Reference playback finished".to_string(),
        (OperationKind::PlayRecording, _) => "Recording playback finished".to_string(),
        (OperationKind::Record, true) => "Recording stopped".to_string(),
        (OperationKind::Record, false) => "Recorder exited unexpectedly".to_string(),
    }
}

#[cfg(feature = "desktop")]
fn shut_down(app: &tauri::AppHandle) {
    if let Some(store) = app.try_state::<SessionStore>() {
        if let Ok(mut session) = store.session.lock() {
            session.stop_all();
        }
    }
    if let Some(checkpoint_state) = app.try_state::<CheckpointState>() {
        if let Ok(mut checkpoint) = checkpoint_state.checkpoint.lock() {
            let now = recovery::current_unix_ms().unwrap_or(0);
            let updated = recovery::mark_clean_shutdown(&checkpoint, now);
            let _ = recovery::save(&checkpoint_state.path, &updated);
            *checkpoint = updated;
        }
    }
    if let Some(logs) = app.try_state::<RuntimeLogState>() {
        let _ = log_store::append(&logs.path, "info", "app.shutdown", "clean shutdown");
    }
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let settings_path = settings_store::default_settings_path();
    let settings = settings_store::load_or_default(&settings_path);
    let logs_path = log_store::default_log_path();
    let checkpoint_path = recovery::default_checkpoint_path();
    let previous_checkpoint = recovery::load_or_default(&checkpoint_path);
    let now = recovery::current_unix_ms().unwrap_or(0);
    let current_checkpoint = recovery::mark_start(&previous_checkpoint, now);
    let _ = recovery::save(&checkpoint_path, &current_checkpoint);

    let _ = log_store::append(&logs_path, "info", "app.start", "application startup");
    if current_checkpoint.orphan_notice_pending {
        let _ = log_store::append(
            &logs_path,
            "warn",
            "shutdown.dirty",
            "previous session did not shut down cleanly; a recorder or player process may have been orphaned",
        );
    }

    let (session, exit_rx) = PracticeSession::new(
        RuntimePlatform::detect(),
        take::default_take_path(),
        Duration::from_millis(settings.stop_grace_ms),
    );

    tauri::Builder::default()
        .manage(SessionStore::new(session))
        .manage(SettingsState::new(settings, settings_path))
        .manage(RuntimeLogState::new(logs_path))
        .manage(CheckpointState::new(checkpoint_path, current_checkpoint))
        .setup(move |app| {
            // Natural process exits arrive on the controller's channel from
            // its waiter threads; hand them to the webview as events so all
            // UI mutation happens on the frontend's own loop.
            let handle = app.handle().clone();
            std::thread::spawn(move || {
                for exit in exit_rx {
                    let payload = OperationFinishedPayload {
                        kind: exit.kind,
                        success: exit.success,
                        message: finished_message(&exit),
                    };
                    if let Some(logs) = handle.try_state::<RuntimeLogState>() {
                        let _ = log_store::append(
                            &logs.path,
                            if exit.success { "info" } else { "warn" },
                            "operation.finished",
                            &payload.message,
                        );
                    }
                    let _ = handle.emit("practice:operation-finished", payload);
                }
            });
            Ok(())
        })
        .on_window_event(|window, event| {
            if matches!(event, tauri::WindowEvent::CloseRequested { .. }) {
                shut_down(window.app_handle());
            }
        })
        .invoke_handler(tauri::generate_handler![
            health_check,
            get_status,
            load_reference_file,
            set_range_start_text,
            set_range_end_text,
            set_range_start_percent,
            set_range_end_percent,
            toggle_reference_playback,
            toggle_recording,
            toggle_take_playback,
            list_capture_devices,
            get_settings,
            update_settings,
            get_environment_health,
            get_runtime_logs,
            clear_runtime_logs,
            get_shutdown_checkpoint,
            acknowledge_orphan_notice
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(not(feature = "desktop"))]
pub fn run() {}
