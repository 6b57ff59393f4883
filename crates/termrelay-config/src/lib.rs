use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "termrelay.toml";

/// How the tmux adapter talks to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// tmux executable to invoke
    pub tmux_binary: String,
    /// Scrollback lines included in each capture
    pub scrollback_lines: usize,
    /// Ask tmux to keep escape sequences in captures
    pub capture_escapes: bool,
    /// Pause between typing the text and the first confirmation
    pub settle_delay_ms: u64,
    /// Pause between repeated confirmations
    pub confirm_gap_ms: u64,
    /// Number of Enter presses that commit the input
    pub confirm_presses: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            tmux_binary: "tmux".to_string(),
            scrollback_lines: 100,
            capture_escapes: true,
            settle_delay_ms: 200,
            confirm_gap_ms: 50,
            confirm_presses: 2,
        }
    }
}

/// Rules deciding which screen lines are chrome rather than content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorationConfig {
    /// Glyphs that lead a spinner / processing line
    pub processing_glyphs: Vec<String>,
    /// Glyphs that lead other status chrome (tool trees, mode bars)
    pub chrome_glyphs: Vec<String>,
    /// Phrases that mark a status bar line. Matched case-sensitively at the
    /// start of a line, or anywhere on a line that carries one of the glyphs.
    pub status_phrases: Vec<String>,
    /// Phrases shown while the program is working
    pub processing_phrases: Vec<String>,
    /// Glyphs of the input prompt
    pub prompt_glyphs: Vec<String>,
}

impl Default for DecorationConfig {
    fn default() -> Self {
        Self {
            processing_glyphs: ["✢", "✻", "✳", "✶", "✽", "∴"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            chrome_glyphs: vec!["⎿".to_string(), "⏵".to_string()],
            status_phrases: [
                "esc to interrupt",
                "bypass permissions",
                "plan mode",
                "auto-accept edits",
                "Tip:",
                "globalVersion",
                "latestVersion",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            processing_phrases: vec!["Thinking…".to_string(), "undefined…".to_string()],
            prompt_glyphs: vec![">".to_string(), "❯".to_string()],
        }
    }
}

/// Idle detection and stabilization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Banner shown only while the program is busy. Empty selects the
    /// prompt/separator rule instead.
    pub processing_banner: String,
    /// Trailing lines scanned for processing glyphs by the prompt rule
    pub idle_tail_lines: usize,
    /// Lines above the prompt searched for a separator by the prompt rule
    pub separator_window: usize,
    /// Consecutive identical captures required before completion
    pub stability_window: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            processing_banner: "esc to interrupt".to_string(),
            idle_tail_lines: 20,
            separator_window: 10,
            stability_window: 3,
        }
    }
}

/// One step of the adaptive poll schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollStep {
    /// Step applies while elapsed time is below this many seconds
    pub until_secs: u64,
    pub interval_ms: u64,
}

/// Poll cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Interval once every step has been outgrown; also the upper bound
    pub max_interval_ms: u64,
    pub stabilize_interval_ms: u64,
    /// How long a new execution waits for a superseded one to stop
    pub takeover_grace_ms: u64,
    pub status_update_secs: u64,
    pub steps: Vec<PollStep>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            max_interval_ms: 60_000,
            stabilize_interval_ms: 1_000,
            takeover_grace_ms: 2_000,
            status_update_secs: 30,
            steps: vec![
                PollStep { until_secs: 60, interval_ms: 5_000 },
                PollStep { until_secs: 600, interval_ms: 10_000 },
                PollStep { until_secs: 1_800, interval_ms: 20_000 },
                PollStep { until_secs: 3_600, interval_ms: 30_000 },
            ],
        }
    }
}

impl ScheduleConfig {
    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn stabilize_interval(&self) -> Duration {
        Duration::from_millis(self.stabilize_interval_ms)
    }

    pub fn takeover_grace(&self) -> Duration {
        Duration::from_millis(self.takeover_grace_ms)
    }

    pub fn status_update_interval(&self) -> Duration {
        Duration::from_secs(self.status_update_secs)
    }
}

/// Outgoing message shaping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Longest content chunk in characters, before any fencing
    pub max_chunk_len: usize,
    /// Wrap content chunks in a fenced code block
    pub code_fence: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_chunk_len: 2_500,
            code_fence: true,
        }
    }
}

/// Conversation-to-session mapping persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub file: String,
    pub max_inactive_minutes: u64,
    pub cleanup_interval_minutes: u64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            file: "session-mapping.json".to_string(),
            max_inactive_minutes: 60,
            cleanup_interval_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append monitor events to a JSON-lines file under the logs directory
    pub event_log: bool,
}

/// Complete relay configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub backend: BackendConfig,
    pub decoration: DecorationConfig,
    pub completion: CompletionConfig,
    pub schedule: ScheduleConfig,
    pub dispatch: DispatchConfig,
    pub mapping: MappingConfig,
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: RelayConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the file, writing the defaults first when it does not exist yet
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load_from_file(path);
        }

        let config = RelayConfig::default();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        config
            .save_to_file(path)
            .with_context(|| format!("Failed to write default config to {}", path.display()))?;
        eprintln!("📋 Created default config file: {}", path.display());
        Ok(config)
    }

    /// Reject settings the monitor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.completion.stability_window == 0 {
            bail!("completion.stability_window must be at least 1");
        }
        if self.dispatch.max_chunk_len == 0 {
            bail!("dispatch.max_chunk_len must be at least 1");
        }
        if self.schedule.max_interval_ms == 0 {
            bail!("schedule.max_interval_ms must be positive");
        }
        if self.schedule.stabilize_interval_ms >= self.schedule.max_interval_ms {
            bail!("schedule.stabilize_interval_ms must be shorter than schedule.max_interval_ms");
        }
        for pair in self.schedule.steps.windows(2) {
            if pair[0].until_secs >= pair[1].until_secs {
                bail!("schedule.steps must be sorted by until_secs");
            }
        }
        if self.schedule.steps.iter().any(|s| s.interval_ms == 0) {
            bail!("schedule.steps intervals must be positive");
        }
        Ok(())
    }
}
