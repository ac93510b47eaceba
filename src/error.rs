/// Errors surfaced by the practice session and its collaborators.
///
/// Every variant is terminal for the operation that raised it: the message is
/// shown on the status line and prior state is left unchanged. Nothing here
/// aborts the application.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("failed to start {operation}: {reason}")]
    SpawnFailed {
        operation: &'static str,
        reason: String,
    },
    #[error("could not read audio duration: {0}")]
    ProbeFailed(String),
    #[error("could not parse audio duration from '{0}'")]
    ParseFailed(String),
    #[error("end time must be greater than start time")]
    InvalidRange,
    #[error("unsupported operating system: {0}")]
    UnsupportedPlatform(String),
    #[error("device enumeration failed: {0}")]
    EnumerationFailed(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("{0} is already in progress")]
    AlreadyRunning(&'static str),
}
