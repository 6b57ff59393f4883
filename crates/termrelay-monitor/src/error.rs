use termrelay_terminal::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("invalid configuration: {0}")]
    Config(String),
}
