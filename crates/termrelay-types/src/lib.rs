//! Core types and structures for termrelay
//!
//! This crate provides the value types shared by the terminal adapter, the
//! monitor and the application binary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Notice emitted in place of a delta when the screen was cleared or redrawn
pub const SCREEN_CLEARED_NOTICE: &str = "📺 Screen cleared";

/// Number of trailing lines used as the primary diff anchor
pub const PRIMARY_ANCHOR_LINES: usize = 10;

/// Number of trailing lines used as the fallback diff anchor
pub const SECONDARY_ANCHOR_LINES: usize = 3;

// ============================================================================
// Session and destination identifiers
// ============================================================================

/// Backend-understood identifier of one interactive terminal session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionHandle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Where messages for one execution are delivered: a channel and, optionally,
/// a thread inside it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thread: Option<String>,
}

impl Destination {
    pub fn channel(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            thread: None,
        }
    }

    pub fn thread(channel: impl Into<String>, thread: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            thread: Some(thread.into()),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.thread {
            Some(thread) => write!(f, "{}-{}", self.channel, thread),
            None => f.write_str(&self.channel),
        }
    }
}

/// Transport-assigned identifier of a posted message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite of destination and session handle. At most one monitoring loop
/// runs per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionKey(String);

impl ExecutionKey {
    pub fn new(destination: &Destination, session: &SessionHandle) -> Self {
        Self(format!("{}-{}", destination, session))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Backend listing
// ============================================================================

/// One entry of the backend's session list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub name: String,
    pub window_count: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub attached: bool,
}

impl SessionInfo {
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(self.name.clone())
    }
}

// ============================================================================
// Conversation mapping
// ============================================================================

/// Links a conversation thread to the terminal session it drives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMapping {
    pub thread_key: String,
    pub session: SessionHandle,
    pub channel: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionMapping {
    pub fn new(thread_key: String, session: SessionHandle, channel: String) -> Self {
        let now = Utc::now();
        Self {
            thread_key,
            session,
            channel,
            created_at: now,
            last_activity: now,
        }
    }

    /// Destination for messages produced on behalf of this mapping
    pub fn destination(&self) -> Destination {
        Destination::thread(self.channel.clone(), self.thread_key.clone())
    }
}

// ============================================================================
// Monitor results
// ============================================================================

/// Why a monitoring loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorEnd {
    /// The driven program returned to an idle prompt and the screen settled
    Completed,
    /// Cancelled explicitly or superseded by a newer execution for the same key
    Cancelled,
    /// The backend session disappeared while being monitored
    SessionLost,
}

impl fmt::Display for MonitorEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorEnd::Completed => write!(f, "completed"),
            MonitorEnd::Cancelled => write!(f, "cancelled"),
            MonitorEnd::SessionLost => write!(f, "session_lost"),
        }
    }
}

/// Value a monitoring loop resolves to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorOutcome {
    pub final_output: String,
    pub duration_secs: u64,
    pub end: MonitorEnd,
    pub sent_messages: usize,
}

impl MonitorOutcome {
    pub fn completed(&self) -> bool {
        self.end == MonitorEnd::Completed
    }
}

/// Render an elapsed time the way status messages show it
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
