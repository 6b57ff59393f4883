/// Session backend abstraction
use async_trait::async_trait;
use termrelay_types::{SessionHandle, SessionInfo};
use thiserror::Error;

/// Failure of a backend operation
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend server itself is not running
    #[error("terminal server is not running")]
    Unavailable,
    /// The addressed session does not exist (any more)
    #[error("session not found: {0}")]
    SessionNotFound(String),
    /// Any other failed backend invocation
    #[error("{command} failed (exit status {status:?}): {message}")]
    CallFailed {
        command: String,
        status: Option<i32>,
        message: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Whether the error means the session is gone rather than the call broken.
    /// A stopped server takes every session with it.
    pub fn is_session_gone(&self) -> bool {
        matches!(self, BackendError::SessionNotFound(_) | BackendError::Unavailable)
    }
}

/// Terminal session backend.
///
/// Implementations are pure I/O: no heuristics, no cached state about the
/// sessions between calls.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// List sessions in backend order. A backend whose server is not running
    /// has no sessions, which is not an error.
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, BackendError>;

    /// Check if a session exists. "Not found" is `Ok(false)`; only a failure
    /// to ask is an error.
    async fn session_exists(&self, session: &SessionHandle) -> Result<bool, BackendError>;

    /// Type `text` into the session and confirm it
    async fn send_input(&self, session: &SessionHandle, text: &str) -> Result<(), BackendError>;

    /// Capture the visible screen plus scrollback, control sequences included.
    /// Has no side effects on the session.
    async fn capture_output(&self, session: &SessionHandle) -> Result<String, BackendError>;

    /// Current working directory of the session's active pane
    async fn working_directory(&self, session: &SessionHandle) -> Result<String, BackendError>;

    /// Get backend name for debugging
    fn backend_name(&self) -> &str;
}
