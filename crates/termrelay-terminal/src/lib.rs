// Terminal session access
//
// The backend adapter issues tmux operations (list, exists, send input,
// capture, working directory) and the screen module turns raw captures into
// content lines with the UI chrome filtered out.

pub mod backend;
pub mod screen;
mod tmux_backend;

// Re-export public API
pub use backend::{BackendError, SessionBackend};
pub use screen::{strip_control_sequences, NormalizedScreen, ScreenNormalizer, ScreenSnapshot};
pub use tmux_backend::{classify_failure, parse_session_list, TmuxBackend};
