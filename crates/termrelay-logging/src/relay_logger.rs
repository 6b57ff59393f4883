use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use serde_json::{json, Value};

use crate::safe_truncate;

/// Longest message printed on one diagnostic line
const MAX_LINE_CHARS: usize = 500;

/// Append-only JSON-lines file of monitor events
pub struct EventLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl EventLog {
    /// Open (or create) an event log file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create event log directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to create event log file")?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Open today's event log inside `logs_dir`
    pub fn daily(logs_dir: impl AsRef<Path>) -> Result<Self> {
        let name = format!("monitor-{}.jsonl", Utc::now().format("%Y%m%d"));
        Self::open(logs_dir.as_ref().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one event line
    pub fn record(&self, scope: &str, event: &str, fields: Value) -> Result<()> {
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "scope": scope,
            "event": event,
            "fields": fields,
        });

        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        writeln!(file, "{}", entry).context("Failed to write to event log")?;
        file.flush()?;

        Ok(())
    }
}

/// Console diagnostics plus an optional event log
///
/// `info`, `warn` and `error` always print to stderr; `debug` prints only in
/// verbose mode. Events go to the event log when one is attached.
pub struct RelayLogger {
    verbose: bool,
    events: Option<EventLog>,
}

impl RelayLogger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            events: None,
        }
    }

    /// Logger without debug output
    pub fn quiet() -> Self {
        Self::new(false)
    }

    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn event_log_path(&self) -> Option<&Path> {
        self.events.as_ref().map(|e| e.path())
    }

    pub fn debug(&self, scope: &str, message: &str) {
        if !self.verbose {
            return;
        }
        eprintln!(
            "{} {} {}",
            Self::timestamp().bright_black(),
            format!("[{}]", scope).bright_black(),
            safe_truncate(message, MAX_LINE_CHARS).bright_black()
        );
    }

    pub fn info(&self, scope: &str, message: &str) {
        eprintln!(
            "{} {} {}",
            Self::timestamp().bright_black(),
            format!("[{}]", scope).bright_cyan(),
            safe_truncate(message, MAX_LINE_CHARS)
        );
    }

    pub fn warn(&self, scope: &str, message: &str) {
        eprintln!(
            "{} {} {}",
            Self::timestamp().bright_black(),
            format!("[{}]", scope).yellow(),
            safe_truncate(message, MAX_LINE_CHARS).yellow()
        );
    }

    pub fn error(&self, scope: &str, message: &str) {
        eprintln!(
            "{} {} {}",
            Self::timestamp().bright_black(),
            format!("[{}]", scope).red().bold(),
            safe_truncate(message, MAX_LINE_CHARS).red()
        );
    }

    /// Record a structured event; failures to write are reported, not raised
    pub fn event(&self, scope: &str, event: &str, fields: Value) {
        if let Some(ref events) = self.events {
            if let Err(e) = events.record(scope, event, fields) {
                self.warn(scope, &format!("event log write failed: {}", e));
            }
        }
    }

    fn timestamp() -> String {
        Utc::now().format("%H:%M:%S%.3f").to_string()
    }
}

impl std::fmt::Debug for RelayLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayLogger")
            .field("verbose", &self.verbose)
            .field("event_log", &self.event_log_path())
            .finish()
    }
}
