use std::fmt;
use std::time::Duration;
use termrelay_types::format_duration;

/// Text of the per-execution status message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Started { interval: Duration },
    Running { elapsed_secs: u64, sent: usize },
    Completed { elapsed_secs: u64, sent: usize },
    Stopped { elapsed_secs: u64, sent: usize },
    SessionEnded { elapsed_secs: u64 },
    Failed { message: String },
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::Started { interval } => write!(
                f,
                "🔄 Monitoring started (polling every {}s)",
                interval.as_secs().max(1)
            ),
            StatusLine::Running { elapsed_secs, sent } => write!(
                f,
                "🔄 Monitoring… ⏱️ {} | sent: {}",
                format_duration(*elapsed_secs),
                sent
            ),
            StatusLine::Completed { elapsed_secs, sent } => write!(
                f,
                "✅ Completed ({}) | sent: {}",
                format_duration(*elapsed_secs),
                sent
            ),
            StatusLine::Stopped { elapsed_secs, sent } => write!(
                f,
                "⏸️ Monitoring stopped ({}) | sent: {}",
                format_duration(*elapsed_secs),
                sent
            ),
            StatusLine::SessionEnded { elapsed_secs } => {
                write!(f, "⚠️ Session ended ({})", format_duration(*elapsed_secs))
            }
            StatusLine::Failed { message } => write!(f, "❌ Error: {}", message),
        }
    }
}
