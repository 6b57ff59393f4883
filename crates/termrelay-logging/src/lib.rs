// Logging module - console diagnostics and monitor event logs
pub mod relay_logger;

use std::path::PathBuf;
use anyhow::{Result, Context};

pub use relay_logger::{EventLog, RelayLogger};

/// Environment variable that switches on verbose diagnostics
pub const DEBUG_ENV_VAR: &str = "TERMRELAY_DEBUG";

/// Safely truncate a string to a maximum number of characters
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        // Reserve space for "..." suffix
        let trunc_chars = if max_chars >= 3 { max_chars - 3 } else { 0 };
        format!("{}...", s.chars().take(trunc_chars).collect::<String>())
    }
}

/// Whether verbose diagnostics were requested through the environment
pub fn debug_from_env() -> bool {
    std::env::var(DEBUG_ENV_VAR)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Get or create the base termrelay directory (~/.termrelay)
pub fn get_relay_dir() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Failed to get home directory")?;

    let relay_dir = PathBuf::from(home_dir).join(".termrelay");

    if !relay_dir.exists() {
        std::fs::create_dir_all(&relay_dir)
            .context("Failed to create termrelay directory")?;
    }

    Ok(relay_dir)
}

/// Get or create the logs directory (~/.termrelay/logs)
pub fn get_logs_dir() -> Result<PathBuf> {
    let logs_dir = get_relay_dir()?.join("logs");

    if !logs_dir.exists() {
        std::fs::create_dir_all(&logs_dir)
            .context("Failed to create logs directory")?;
    }

    Ok(logs_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_truncate() {
        assert_eq!(safe_truncate("short", 10), "short");
        assert_eq!(safe_truncate("abcdefghij", 6), "abc...");
        assert_eq!(safe_truncate("⏵⏵⏵⏵⏵", 4), "⏵...");
        assert_eq!(safe_truncate("abcdef", 2), "...");
    }
}
