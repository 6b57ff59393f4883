#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use termrelay_config::RelayConfig;
use termrelay_logging::RelayLogger;
use termrelay_monitor::{ChatTransport, Monitor, TransportError};
use termrelay_terminal::{BackendError, SessionBackend};
use termrelay_types::{Destination, MessageId, SessionHandle, SessionInfo};

const RULE: &str = "────────────────────────────────────────";

/// Screen of a program still working: content, spinner with the interrupt
/// banner, and the input box
pub fn busy_screen(lines: &[&str]) -> String {
    format!(
        "{}\n\n\x1b[38;5;174m✻\x1b[0m Thinking… (4s · esc to interrupt)\n\n{}\n> \n{}\n",
        lines.join("\n"),
        RULE,
        RULE
    )
}

/// Screen of a program back at its prompt
pub fn idle_screen(lines: &[&str]) -> String {
    format!(
        "{}\n\n{}\n> \n{}\n  ⏵⏵ bypass permissions on (shift+tab to cycle)\n",
        lines.join("\n"),
        RULE,
        RULE
    )
}

/// In-memory backend replaying a script of captures. Each capture consumes
/// the next frame; once the script runs out the last frame repeats.
pub struct ScriptedBackend {
    frames: Mutex<VecDeque<String>>,
    current: Mutex<String>,
    inputs: Mutex<Vec<String>>,
    captures: AtomicUsize,
    exists_for_captures: AtomicUsize,
    capture_error: Mutex<Option<String>>,
    hold_from: AtomicUsize,
    gate: Notify,
}

impl ScriptedBackend {
    pub fn new(frames: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(frames.into()),
            current: Mutex::new(String::new()),
            inputs: Mutex::new(Vec::new()),
            captures: AtomicUsize::new(0),
            exists_for_captures: AtomicUsize::new(usize::MAX),
            capture_error: Mutex::new(None),
            hold_from: AtomicUsize::new(usize::MAX),
            gate: Notify::new(),
        })
    }

    /// Make the session disappear once `captures` captures have been taken
    pub fn end_session_after(&self, captures: usize) {
        self.exists_for_captures.store(captures, Ordering::SeqCst);
    }

    pub fn fail_captures(&self, message: &str) {
        *self.capture_error.lock().unwrap() = Some(message.to_string());
    }

    /// Block every capture after the first `captures` until [`Self::release`]
    pub fn hold_captures_after(&self, captures: usize) {
        self.hold_from.store(captures, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.hold_from.store(usize::MAX, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionBackend for ScriptedBackend {
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, BackendError> {
        Ok(vec![SessionInfo {
            name: "work".to_string(),
            window_count: 1,
            created_at: None,
            attached: false,
        }])
    }

    async fn session_exists(&self, _session: &SessionHandle) -> Result<bool, BackendError> {
        Ok(self.captures.load(Ordering::SeqCst) < self.exists_for_captures.load(Ordering::SeqCst))
    }

    async fn send_input(&self, _session: &SessionHandle, text: &str) -> Result<(), BackendError> {
        self.inputs.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn capture_output(&self, _session: &SessionHandle) -> Result<String, BackendError> {
        if self.captures.load(Ordering::SeqCst) >= self.hold_from.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }

        if let Some(message) = self.capture_error.lock().unwrap().clone() {
            return Err(BackendError::CallFailed {
                command: "tmux capture-pane".to_string(),
                status: Some(1),
                message,
            });
        }

        self.captures.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.lock().unwrap();
        if let Some(next) = self.frames.lock().unwrap().pop_front() {
            *current = next;
        }
        Ok(current.clone())
    }

    async fn working_directory(&self, _session: &SessionHandle) -> Result<String, BackendError> {
        Ok("/home/dev/project".to_string())
    }

    fn backend_name(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Post { id: MessageId, text: String },
    Update { id: MessageId, text: String },
}

/// Transport that records everything it is asked to deliver
pub struct RecordingTransport {
    deliveries: Mutex<Vec<Delivery>>,
    next_id: AtomicUsize,
    failing: AtomicBool,
    post_limit: usize,
    update_limit: usize,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Self::with_limits(4_000, 4_000)
    }

    pub fn with_limits(post_limit: usize, update_limit: usize) -> Arc<Self> {
        Arc::new(Self {
            deliveries: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            failing: AtomicBool::new(false),
            post_limit,
            update_limit,
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Text of every posted message, in order
    pub fn posts(&self) -> Vec<String> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Post { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Posted content chunks with the code fence removed
    pub fn content(&self) -> Vec<String> {
        self.posts()
            .into_iter()
            .filter_map(|text| {
                text.strip_prefix("```\n")
                    .and_then(|t| t.strip_suffix("\n```"))
                    .map(str::to_string)
            })
            .collect()
    }

    /// Text of every in-place update, in order
    pub fn updates(&self) -> Vec<String> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Update { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    fn max_post_len(&self) -> usize {
        self.post_limit
    }

    fn max_update_len(&self) -> usize {
        self.update_limit
    }

    async fn post_message(
        &self,
        _destination: &Destination,
        text: &str,
    ) -> Result<MessageId, TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("ratelimited".to_string()));
        }
        let len = text.chars().count();
        if len > self.post_limit {
            return Err(TransportError::TooLong { len, max: self.post_limit });
        }

        let id = MessageId::new(format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        self.deliveries.lock().unwrap().push(Delivery::Post {
            id: id.clone(),
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn update_message(
        &self,
        _destination: &Destination,
        message: &MessageId,
        text: &str,
    ) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let len = text.chars().count();
        if len > self.update_limit {
            return Err(TransportError::TooLong { len, max: self.update_limit });
        }

        self.deliveries.lock().unwrap().push(Delivery::Update {
            id: message.clone(),
            text: text.to_string(),
        });
        Ok(())
    }
}

pub fn test_monitor(backend: Arc<ScriptedBackend>, transport: Arc<RecordingTransport>) -> Monitor {
    Monitor::new(
        backend,
        transport,
        &RelayConfig::default(),
        Arc::new(RelayLogger::quiet()),
    )
    .expect("default config is valid")
}

pub fn destination() -> Destination {
    Destination::thread("C1", "1700000000.000100")
}

pub fn session() -> SessionHandle {
    SessionHandle::new("work")
}
