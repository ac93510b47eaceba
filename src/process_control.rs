use std::collections::HashMap;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::AudioError;
use crate::platform::CommandSpec;

/// The three external-process slots. Each kind owns at most one live process.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Record,
    PlayReference,
    PlayRecording,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::Record,
        OperationKind::PlayReference,
        OperationKind::PlayRecording,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Record => "recording",
            OperationKind::PlayReference => "reference playback",
            OperationKind::PlayRecording => "recording playback",
        }
    }
}

/// Delivered on the exit channel when a process ends on its own. A process
/// reaped by an explicit `stop` never produces one of these.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ProcessExit {
    pub kind: OperationKind,
    pub success: bool,
}

struct Slot {
    child: Child,
    generation: u64,
}

struct Inner {
    slots: HashMap<OperationKind, Slot>,
    next_generation: u64,
}

/// Tracks at most one external process per operation kind. Natural exits are
/// observed by a polling waiter thread and reported through an mpsc channel;
/// the desktop layer forwards them onto the UI context. The generation
/// counter guarantees a waiter never reports a process that an explicit
/// `stop` (or a newer `start`) already took over.
pub struct ProcessController {
    inner: Arc<Mutex<Inner>>,
    exit_tx: Sender<ProcessExit>,
    stop_grace: Duration,
}

const WAITER_POLL: Duration = Duration::from_millis(100);

impl ProcessController {
    pub fn new(stop_grace: Duration) -> (Self, Receiver<ProcessExit>) {
        let (exit_tx, exit_rx) = mpsc::channel();
        let controller = Self {
            inner: Arc::new(Mutex::new(Inner {
                slots: HashMap::new(),
                next_generation: 0,
            })),
            exit_tx,
            stop_grace,
        };
        (controller, exit_rx)
    }

    pub fn is_running(&self, kind: OperationKind) -> bool {
        self.lock().slots.contains_key(&kind)
    }

    pub fn running_kinds(&self) -> Vec<OperationKind> {
        let inner = self.lock();
        OperationKind::ALL
            .into_iter()
            .filter(|kind| inner.slots.contains_key(kind))
            .collect()
    }

    pub fn start(&self, kind: OperationKind, spec: &CommandSpec) -> Result<(), AudioError> {
        let mut inner = self.lock();
        if inner.slots.contains_key(&kind) {
            return Err(AudioError::AlreadyRunning(kind.label()));
        }

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|error| AudioError::SpawnFailed {
                operation: kind.label(),
                reason: format!("{}: {error}", spec.program),
            })?;

        let generation = inner.next_generation;
        inner.next_generation += 1;
        inner.slots.insert(kind, Slot { child, generation });
        drop(inner);

        self.spawn_waiter(kind, generation);
        Ok(())
    }

    /// Stop the process for `kind` if one is running. No-op when idle. The
    /// reap happens outside the lock so the waiter threads stay unblocked.
    pub fn stop(&self, kind: OperationKind) -> bool {
        let slot = self.lock().slots.remove(&kind);
        match slot {
            Some(slot) => {
                terminate_child(slot.child, self.stop_grace);
                true
            }
            None => false,
        }
    }

    /// Stop every running operation. Called on window close so no external
    /// process outlives the application.
    pub fn stop_all(&self) {
        for kind in self.running_kinds() {
            self.stop(kind);
        }
    }

    fn spawn_waiter(&self, kind: OperationKind, generation: u64) {
        let inner = Arc::clone(&self.inner);
        let exit_tx = self.exit_tx.clone();
        thread::spawn(move || loop {
            thread::sleep(WAITER_POLL);
            let mut guard = match inner.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            let slot = match guard.slots.get_mut(&kind) {
                Some(slot) if slot.generation == generation => slot,
                // The slot was stopped (or restarted) out from under us;
                // whoever took it over owns the notification.
                _ => return,
            };
            match slot.child.try_wait() {
                Ok(Some(status)) => {
                    guard.slots.remove(&kind);
                    drop(guard);
                    let _ = exit_tx.send(ProcessExit {
                        kind,
                        success: status.success(),
                    });
                    return;
                }
                Ok(None) => {}
                Err(_) => {
                    guard.slots.remove(&kind);
                    drop(guard);
                    let _ = exit_tx.send(ProcessExit {
                        kind,
                        success: false,
                    });
                    return;
                }
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ProcessController {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Ask the process to terminate, give it a bounded grace period to flush and
/// exit (ffmpeg and sox finalize their WAV header on SIGTERM), then escalate
/// to a hard kill.
fn terminate_child(mut child: Child, grace: Duration) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .args(["-TERM", &child.id().to_string()])
            .output();
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if matches!(child.try_wait(), Ok(Some(_))) {
                return;
            }
            thread::sleep(Duration::from_millis(25));
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn controller() -> (ProcessController, Receiver<ProcessExit>) {
        ProcessController::new(Duration::from_millis(200))
    }

    fn sleep_spec(seconds: &str) -> CommandSpec {
        CommandSpec {
            program: "sleep".to_string(),
            args: vec![seconds.to_string()],
        }
    }

    fn true_spec() -> CommandSpec {
        CommandSpec {
            program: "true".to_string(),
            args: Vec::new(),
        }
    }

    #[test]
    fn start_then_stop_transitions_running_to_idle() {
        let (controller, _exits) = controller();
        controller
            .start(OperationKind::Record, &sleep_spec("30"))
            .expect("sleep should spawn");
        assert!(controller.is_running(OperationKind::Record));

        assert!(controller.stop(OperationKind::Record));
        assert!(!controller.is_running(OperationKind::Record));
    }

    #[test]
    fn stop_is_idempotent() {
        let (controller, _exits) = controller();
        controller
            .start(OperationKind::PlayReference, &sleep_spec("30"))
            .expect("sleep should spawn");
        assert!(controller.stop(OperationKind::PlayReference));
        assert!(!controller.stop(OperationKind::PlayReference));
        assert!(!controller.is_running(OperationKind::PlayReference));
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let (controller, _exits) = controller();
        assert!(!controller.stop(OperationKind::PlayRecording));
    }

    #[test]
    fn spawn_failure_reports_the_program() {
        let (controller, _exits) = controller();
        let missing = CommandSpec {
            program: "definitely-not-a-real-binary-4792".to_string(),
            args: Vec::new(),
        };
        let error = controller
            .start(OperationKind::Record, &missing)
            .expect_err("missing binary should fail to spawn");
        match error {
            AudioError::SpawnFailed { operation, reason } => {
                assert_eq!(operation, "recording");
                assert!(reason.contains("definitely-not-a-real-binary-4792"));
            }
            other => panic!("expected SpawnFailed, got {other:?}"),
        }
        assert!(!controller.is_running(OperationKind::Record));
    }

    #[test]
    fn second_start_for_the_same_kind_is_rejected() {
        let (controller, _exits) = controller();
        controller
            .start(OperationKind::Record, &sleep_spec("30"))
            .expect("sleep should spawn");
        assert!(matches!(
            controller.start(OperationKind::Record, &sleep_spec("30")),
            Err(AudioError::AlreadyRunning("recording"))
        ));
        controller.stop(OperationKind::Record);
    }

    #[test]
    fn natural_exit_is_reported_once_and_frees_the_slot() {
        let (controller, exits) = controller();
        controller
            .start(OperationKind::PlayRecording, &true_spec())
            .expect("true should spawn");

        let exit = exits
            .recv_timeout(Duration::from_secs(5))
            .expect("natural exit should be reported");
        assert_eq!(exit.kind, OperationKind::PlayRecording);
        assert!(exit.success);
        assert!(!controller.is_running(OperationKind::PlayRecording));
        assert!(exits.try_recv().is_err());
    }

    #[test]
    fn failing_exit_is_reported_as_unsuccessful() {
        let (controller, exits) = controller();
        controller
            .start(OperationKind::PlayReference, &CommandSpec {
                program: "false".to_string(),
                args: Vec::new(),
            })
            .expect("false should spawn");

        let exit = exits
            .recv_timeout(Duration::from_secs(5))
            .expect("exit should be reported");
        assert!(!exit.success);
    }

    #[test]
    fn explicit_stop_suppresses_the_exit_notification() {
        let (controller, exits) = controller();
        controller
            .start(OperationKind::Record, &sleep_spec("30"))
            .expect("sleep should spawn");
        controller.stop(OperationKind::Record);

        // Give the waiter a few polls to (incorrectly) report something.
        assert!(exits.recv_timeout(Duration::from_millis(400)).is_err());
    }

    #[test]
    fn restart_after_natural_exit_works() {
        let (controller, exits) = controller();
        controller
            .start(OperationKind::Record, &true_spec())
            .expect("true should spawn");
        exits
            .recv_timeout(Duration::from_secs(5))
            .expect("first exit should be reported");

        controller
            .start(OperationKind::Record, &sleep_spec("30"))
            .expect("slot should be free again");
        assert!(controller.is_running(OperationKind::Record));
        controller.stop(OperationKind::Record);
    }

    #[test]
    fn stop_all_with_no_processes_is_safe() {
        let (controller, _exits) = controller();
        controller.stop_all();
        assert!(controller.running_kinds().is_empty());
    }

    #[test]
    fn stop_all_with_a_single_running_process_stops_it() {
        let (controller, _exits) = controller();
        controller
            .start(OperationKind::PlayReference, &sleep_spec("30"))
            .expect("sleep should spawn");

        controller.stop_all();
        assert!(!controller.is_running(OperationKind::PlayReference));
        assert!(controller.running_kinds().is_empty());
    }

    #[test]
    fn stop_all_terminates_every_running_kind() {
        let (controller, exits) = controller();
        for kind in OperationKind::ALL {
            controller
                .start(kind, &sleep_spec("30"))
                .expect("sleep should spawn");
        }
        assert_eq!(controller.running_kinds().len(), 3);

        controller.stop_all();
        assert!(controller.running_kinds().is_empty());
        for kind in OperationKind::ALL {
            assert!(!controller.is_running(kind));
        }
        assert!(exits.recv_timeout(Duration::from_millis(400)).is_err());
    }
}
