//! Completion detection
//!
//! An [`IdlePolicy`] answers "is the driven program waiting for input right
//! now?" for one capture. The [`CompletionDetector`] turns those readings into
//! a debounced decision: two consecutive idle readings, then a run of
//! byte-identical captures, before the execution counts as done.

use std::fmt;
use std::sync::Arc;
use termrelay_config::CompletionConfig;
use termrelay_terminal::{NormalizedScreen, ScreenNormalizer};

/// Decides from a single capture whether the driven program is idle
pub trait IdlePolicy: Send + Sync + fmt::Debug {
    fn is_idle(&self, screen: &NormalizedScreen) -> bool;

    fn name(&self) -> &str;
}

/// Idle when a banner shown only while the program works is absent from the
/// whole capture
#[derive(Debug, Clone)]
pub struct BannerIdlePolicy {
    banner: String,
}

impl BannerIdlePolicy {
    pub fn new(banner: impl Into<String>) -> Self {
        Self {
            banner: banner.into(),
        }
    }
}

impl IdlePolicy for BannerIdlePolicy {
    fn is_idle(&self, screen: &NormalizedScreen) -> bool {
        !screen.plain().contains(self.banner.as_str())
    }

    fn name(&self) -> &str {
        "banner"
    }
}

/// Idle when the screen ends in an empty input prompt framed by a rule, with
/// no processing indicator in the trailing lines
#[derive(Debug, Clone)]
pub struct PromptIdlePolicy {
    normalizer: ScreenNormalizer,
    tail_lines: usize,
    separator_window: usize,
}

impl PromptIdlePolicy {
    pub fn new(normalizer: ScreenNormalizer, tail_lines: usize, separator_window: usize) -> Self {
        Self {
            normalizer,
            tail_lines,
            separator_window,
        }
    }
}

impl IdlePolicy for PromptIdlePolicy {
    fn is_idle(&self, screen: &NormalizedScreen) -> bool {
        let lines: Vec<&str> = screen.plain().lines().collect();

        let tail_start = lines.len().saturating_sub(self.tail_lines);
        if lines[tail_start..]
            .iter()
            .any(|line| self.normalizer.is_processing_line(line))
        {
            return false;
        }

        // Last line that is neither blank nor chrome, the prompt itself excepted
        let prompt_index = lines.iter().rposition(|line| {
            !line.trim().is_empty()
                && (self.normalizer.is_empty_prompt(line) || !self.normalizer.is_decorative(line))
        });

        let prompt_index = match prompt_index {
            Some(index) if self.normalizer.is_empty_prompt(lines[index]) => index,
            _ => return false,
        };

        let window_start = prompt_index.saturating_sub(self.separator_window);
        lines[window_start..prompt_index]
            .iter()
            .any(|line| self.normalizer.is_rule(line))
    }

    fn name(&self) -> &str {
        "prompt"
    }
}

/// Policy selected by configuration: the banner rule when a banner is
/// configured, the prompt rule otherwise
pub fn idle_policy_from_config(
    config: &CompletionConfig,
    normalizer: &ScreenNormalizer,
) -> Arc<dyn IdlePolicy> {
    if config.processing_banner.trim().is_empty() {
        Arc::new(PromptIdlePolicy::new(
            normalizer.clone(),
            config.idle_tail_lines,
            config.separator_window,
        ))
    } else {
        Arc::new(BannerIdlePolicy::new(config.processing_banner.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    Running,
    Candidate,
    Stabilizing,
    Done,
}

impl fmt::Display for CompletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompletionState::Running => "running",
            CompletionState::Candidate => "candidate",
            CompletionState::Stabilizing => "stabilizing",
            CompletionState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Debounced completion state machine
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    state: CompletionState,
    stability_window: usize,
    last_capture: Option<String>,
    identical: usize,
}

impl CompletionDetector {
    pub fn new(stability_window: usize) -> Self {
        Self {
            state: CompletionState::Running,
            stability_window: stability_window.max(1),
            last_capture: None,
            identical: 0,
        }
    }

    pub fn state(&self) -> CompletionState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == CompletionState::Done
    }

    /// Feed one idle reading from the regular poll loop. Has no effect once
    /// stabilizing.
    pub fn observe_idle(&mut self, idle: bool) -> CompletionState {
        self.state = match (self.state, idle) {
            (CompletionState::Running, true) => CompletionState::Candidate,
            (CompletionState::Candidate, true) => {
                self.last_capture = None;
                self.identical = 0;
                CompletionState::Stabilizing
            }
            (CompletionState::Candidate, false) => CompletionState::Running,
            (state, _) => state,
        };
        self.state
    }

    /// Feed one raw capture taken while stabilizing. A changed buffer restarts
    /// the count without leaving the state.
    pub fn observe_capture(&mut self, raw: &str) -> CompletionState {
        if self.state != CompletionState::Stabilizing {
            return self.state;
        }

        if self.last_capture.as_deref() == Some(raw) {
            self.identical += 1;
        } else {
            self.last_capture = Some(raw.to_string());
            self.identical = 1;
        }

        if self.identical >= self.stability_window {
            self.state = CompletionState::Done;
        }
        self.state
    }

    /// Identical captures seen so far in the current stabilization run
    pub fn stable_count(&self) -> usize {
        self.identical
    }
}
