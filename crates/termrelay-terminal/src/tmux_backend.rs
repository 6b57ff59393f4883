/// Tmux-based session backend
use super::backend::{BackendError, SessionBackend};
use async_trait::async_trait;
use chrono::DateTime;
use std::time::Duration;
use termrelay_config::BackendConfig;
use termrelay_types::{SessionHandle, SessionInfo};
use tokio::process::Command;

/// Format string for `list-sessions`
const LIST_FORMAT: &str = "#{session_name}:#{session_windows}:#{session_created}:#{session_attached}";

/// Backend driving sessions of an external tmux server
#[derive(Debug, Clone)]
pub struct TmuxBackend {
    config: BackendConfig,
}

impl TmuxBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    /// Check that the tmux binary runs; returns its version string
    pub async fn verify(&self) -> Result<String, BackendError> {
        let version = self.run_tmux_command(&["-V"]).await?;
        Ok(version.trim().to_string())
    }

    /// Target naming exactly this session (tmux otherwise prefix-matches)
    fn session_target(session: &SessionHandle) -> String {
        format!("={}", session)
    }

    /// Target naming the active pane of exactly this session
    fn pane_target(session: &SessionHandle) -> String {
        format!("={}:", session)
    }

    /// Run a tmux command and return stdout
    async fn run_tmux_command(&self, args: &[&str]) -> Result<String, BackendError> {
        let output = Command::new(&self.config.tmux_binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let command = format!("tmux {}", args.first().copied().unwrap_or_default());
            return Err(classify_failure(command, output.status.code(), &stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Map tmux's stderr onto the error taxonomy
pub fn classify_failure(command: String, status: Option<i32>, stderr: &str) -> BackendError {
    let message = stderr.trim();
    let lower = message.to_lowercase();

    if lower.contains("no server running") || lower.contains("error connecting to") {
        BackendError::Unavailable
    } else if lower.contains("can't find session")
        || lower.contains("can't find window")
        || lower.contains("can't find pane")
        || lower.contains("session not found")
    {
        BackendError::SessionNotFound(message.to_string())
    } else {
        BackendError::CallFailed {
            command,
            status,
            message: message.to_string(),
        }
    }
}

/// Parse `list-sessions` output produced with [`LIST_FORMAT`]
pub fn parse_session_list(stdout: &str) -> Vec<SessionInfo> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            // Session names cannot contain ':' but split from the right anyway
            let mut parts = line.trim_end().rsplitn(4, ':');
            let attached = parts.next()?;
            let created = parts.next()?;
            let windows = parts.next()?;
            let name = parts.next()?;

            Some(SessionInfo {
                name: name.to_string(),
                window_count: windows.parse().unwrap_or(0),
                created_at: created
                    .parse::<i64>()
                    .ok()
                    .and_then(|secs| DateTime::from_timestamp(secs, 0)),
                attached: attached.parse::<u32>().map(|n| n > 0).unwrap_or(false),
            })
        })
        .collect()
}

#[async_trait]
impl SessionBackend for TmuxBackend {
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, BackendError> {
        match self.run_tmux_command(&["list-sessions", "-F", LIST_FORMAT]).await {
            Ok(stdout) => Ok(parse_session_list(&stdout)),
            Err(BackendError::Unavailable) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn session_exists(&self, session: &SessionHandle) -> Result<bool, BackendError> {
        let target = Self::session_target(session);
        match self.run_tmux_command(&["has-session", "-t", &target]).await {
            Ok(_) => Ok(true),
            Err(BackendError::SessionNotFound(_)) | Err(BackendError::Unavailable) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn send_input(&self, session: &SessionHandle, text: &str) -> Result<(), BackendError> {
        let target = Self::pane_target(session);

        // Literal mode with the text as one argument after `--`: nothing is
        // reinterpreted as a key name or a flag, and quotes reach the program
        // unchanged
        if !text.is_empty() {
            self.run_tmux_command(&["send-keys", "-t", &target, "-l", "--", text])
                .await?;
        }

        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;

        // The first Enter may only accept an autocomplete; the second submits
        for press in 0..self.config.confirm_presses {
            if press > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.confirm_gap_ms)).await;
            }
            self.run_tmux_command(&["send-keys", "-t", &target, "C-m"])
                .await?;
        }

        Ok(())
    }

    async fn capture_output(&self, session: &SessionHandle) -> Result<String, BackendError> {
        let target = Self::pane_target(session);
        let start = format!("-{}", self.config.scrollback_lines);

        let mut args = vec!["capture-pane", "-p", "-t", target.as_str(), "-S", start.as_str()];
        if self.config.capture_escapes {
            args.push("-e");
        }

        self.run_tmux_command(&args).await
    }

    async fn working_directory(&self, session: &SessionHandle) -> Result<String, BackendError> {
        let target = Self::pane_target(session);
        let output = self
            .run_tmux_command(&["display-message", "-p", "-t", &target, "#{pane_current_path}"])
            .await?;
        Ok(output.trim().to_string())
    }

    fn backend_name(&self) -> &str {
        "tmux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_session_list() {
        let stdout = "work:3:1700000000:1\nscratch:1:1700000100:0\n\n";
        let sessions = parse_session_list(stdout);

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].name, "work");
        assert_eq!(sessions[0].window_count, 3);
        assert!(sessions[0].attached);
        assert_eq!(
            sessions[0].created_at.map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(sessions[1].name, "scratch");
        assert!(!sessions[1].attached);
    }

    #[test]
    fn test_parse_session_list_counts_multiple_clients_as_attached() {
        let sessions = parse_session_list("pair:2:1700000000:2");
        assert!(sessions[0].attached);
    }

    #[test]
    fn test_parse_session_list_skips_malformed_lines() {
        let sessions = parse_session_list("garbage\nok:1:x:0");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].name, "ok");
        assert_eq!(sessions[0].created_at, None);
    }

    #[test]
    fn test_classify_no_server() {
        let err = classify_failure(
            "tmux list-sessions".into(),
            Some(1),
            "no server running on /tmp/tmux-1000/default\n",
        );
        assert!(matches!(err, BackendError::Unavailable));

        let err = classify_failure(
            "tmux list-sessions".into(),
            Some(1),
            "error connecting to /tmp/tmux-1000/default (No such file or directory)",
        );
        assert!(matches!(err, BackendError::Unavailable));
    }

    #[test]
    fn test_classify_missing_session() {
        let err = classify_failure("tmux has-session".into(), Some(1), "can't find session: =gone");
        assert!(matches!(err, BackendError::SessionNotFound(_)));
        assert!(err.is_session_gone());
    }

    #[test]
    fn test_classify_other_failure_keeps_status() {
        let err = classify_failure("tmux capture-pane".into(), Some(2), "unknown option -- z");
        match err {
            BackendError::CallFailed { command, status, message } => {
                assert_eq!(command, "tmux capture-pane");
                assert_eq!(status, Some(2));
                assert_eq!(message, "unknown option -- z");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    fn fake_tmux(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("tmux");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_server_means_no_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_tmux(
            dir.path(),
            "echo 'no server running on /tmp/tmux-1000/default' >&2\nexit 1",
        );
        let backend = TmuxBackend::new(BackendConfig {
            tmux_binary: binary,
            ..BackendConfig::default()
        });

        assert_eq!(backend.list_sessions().await.unwrap(), Vec::new());
        assert!(!backend.session_exists(&SessionHandle::new("work")).await.unwrap());
        assert!(backend.capture_output(&SessionHandle::new("work")).await.unwrap_err().is_session_gone());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_send_input_passes_text_literally_then_confirms_twice() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let binary = fake_tmux(
            dir.path(),
            &format!(
                "for a in \"$@\"; do printf '%s\\n' \"$a\" >> '{}'; done\necho --- >> '{}'",
                log.display(),
                log.display()
            ),
        );
        let backend = TmuxBackend::new(BackendConfig {
            tmux_binary: binary,
            settle_delay_ms: 0,
            confirm_gap_ms: 0,
            ..BackendConfig::default()
        });

        backend
            .send_input(&SessionHandle::new("work"), r#"say "hi" to $USER's `shell`"#)
            .await
            .unwrap();

        let calls = std::fs::read_to_string(&log).unwrap();
        let calls: Vec<&str> = calls.split("---\n").filter(|c| !c.is_empty()).collect();
        assert_eq!(
            calls,
            vec![
                "send-keys\n-t\n=work:\n-l\n--\nsay \"hi\" to $USER's `shell`\n",
                "send-keys\n-t\n=work:\nC-m\n",
                "send-keys\n-t\n=work:\nC-m\n",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_send_input_accepts_text_that_looks_like_flags() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("keys.log");
        // Parses send-keys options the way tmux does and rejects unknown flags
        let binary = fake_tmux(
            dir.path(),
            &format!(
                concat!(
                    "[ \"$1\" = send-keys ] || exit 0\n",
                    "shift\n",
                    "while getopts t:l opt; do\n",
                    "  if [ \"$opt\" = '?' ]; then echo 'command send-keys: invalid flag' >&2; exit 1; fi\n",
                    "done\n",
                    "shift $((OPTIND - 1))\n",
                    "printf '%s\\n' \"$1\" >> '{}'",
                ),
                log.display()
            ),
        );
        let backend = TmuxBackend::new(BackendConfig {
            tmux_binary: binary,
            settle_delay_ms: 0,
            confirm_gap_ms: 0,
            ..BackendConfig::default()
        });
        let session = SessionHandle::new("work");

        for text in ["--continue the task", "-v fix", "- list the files"] {
            backend.send_input(&session, text).await.unwrap();
        }

        let keys = std::fs::read_to_string(&log).unwrap();
        assert_eq!(
            keys.lines().collect::<Vec<_>>(),
            vec![
                "--continue the task", "C-m", "C-m",
                "-v fix", "C-m", "C-m",
                "- list the files", "C-m", "C-m",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let backend = TmuxBackend::new(BackendConfig {
            tmux_binary: "/nonexistent/termrelay-tmux".to_string(),
            ..BackendConfig::default()
        });
        let err = backend.list_sessions().await.unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
    }
}
