//! Session listing and selection
use chrono::{DateTime, Utc};
use termrelay_types::{format_duration, SessionInfo, SessionMapping};

/// Numbered session list as shown to the operator
pub fn format_session_list(sessions: &[SessionInfo]) -> String {
    if sessions.is_empty() {
        return "No tmux sessions found. Start one with `tmux new -s <name>`.".to_string();
    }

    let mut out = String::from("📋 tmux sessions:\n");
    for (i, session) in sessions.iter().enumerate() {
        let windows = if session.window_count == 1 { "window" } else { "windows" };
        out.push_str(&format!(
            "{}: `{}` ({} {}){}\n",
            i + 1,
            session.name,
            session.window_count,
            windows,
            if session.attached { " (attached)" } else { "" }
        ));
    }
    out.push_str("\nConnect with `termrelay connect <number|name>`");
    out
}

/// Pick a session by 1-based position or exact name. A number that is
/// out of range falls back to a name match, so sessions named "1" still work.
pub fn resolve_session<'a>(target: &str, sessions: &'a [SessionInfo]) -> Option<&'a SessionInfo> {
    let target = target.trim();
    if let Ok(index) = target.parse::<usize>() {
        if index >= 1 {
            if let Some(session) = sessions.get(index - 1) {
                return Some(session);
            }
        }
    }
    sessions.iter().find(|s| s.name == target)
}

/// One line per mapping with its idle time
pub fn format_mapping_list(mappings: &[SessionMapping], now: DateTime<Utc>) -> String {
    if mappings.is_empty() {
        return "No conversations are connected.".to_string();
    }

    mappings
        .iter()
        .map(|m| {
            let idle = (now - m.last_activity).num_seconds().max(0) as u64;
            format!(
                "{} → `{}` in {} (idle {})",
                m.thread_key,
                m.session,
                m.channel,
                format_duration(idle)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
