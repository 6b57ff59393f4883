//! Screen normalization
//!
//! Turns a raw capture into plain text and separates content lines from the
//! chrome a live terminal UI repaints every frame (spinners, status bars,
//! rules, progress indicators, the empty input prompt).
//!
//! Two line sequences come out of every capture:
//!
//! - `lines`: chrome removed, blank lines kept, used to assemble responses
//! - `anchor_lines`: chrome and blank lines removed, used only for diffing,
//!   since the number of blank lines is unstable across repaints

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use termrelay_config::DecorationConfig;

/// Escape and control sequences: CSI, OSC, charset selection, two-byte
/// escapes, then any other C0 control except tab and newline
static CONTROL_SEQUENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\x1b\[[0-?]*[ -/]*[@-~]",
        r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
        r"|\x1b[()*+][A-Za-z0-9]",
        r"|\x1b[@-Z\\-_=>78]",
        r"|\x1b",
        r"|[\x00-\x08\x0b-\x1f\x7f]",
    ))
    .expect("control sequence pattern is valid")
});

/// Bare percentage or a progress bar ending in one ("45%", "[####  ] 45%")
static PROGRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\[(]?[#=>\-\s░▒▓█■.]*[\])]?\s*\d{1,3}(?:\.\d+)?\s*%$")
        .expect("progress pattern is valid")
});

/// Line made only of rule / box drawing characters
static RULE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[─━═│┃┌┐└┘├┤┬┴┼╭╮╯╰┄┈╌\-]+$").expect("rule pattern is valid")
});

/// Line made only of block characters (bars, meters)
static BLOCK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[░▒▓█▀▄■▌▐\s]+$").expect("block pattern is valid")
});

/// Token counter banner ("56857 tokens")
static TOKEN_COUNT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d+\s+tokens?\b").expect("token count pattern is valid")
});

/// Remove escape and control sequences, leaving the visible text
pub fn strip_control_sequences(raw: &str) -> String {
    CONTROL_SEQUENCE_PATTERN.replace_all(raw, "").into_owned()
}

/// A normalized capture
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedScreen {
    plain: String,
    lines: Vec<String>,
    anchor_lines: Vec<String>,
}

impl NormalizedScreen {
    /// Control-stripped text of the whole capture
    pub fn plain(&self) -> &str {
        &self.plain
    }

    /// Content lines with blank lines retained
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Content lines without blank lines
    pub fn anchor_lines(&self) -> &[String] {
        &self.anchor_lines
    }

    /// Anchor lines joined with newlines: the corpus anchors are searched in
    pub fn anchor_corpus(&self) -> String {
        self.anchor_lines.join("\n")
    }

    /// Response text: content lines with runs of blank lines collapsed
    pub fn content(&self) -> String {
        let mut out: Vec<&str> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
                continue;
            }
            out.push(line);
        }
        out.join("\n").trim().to_string()
    }
}

/// One capture of a session's buffer, raw and normalized
#[derive(Debug, Clone)]
pub struct ScreenSnapshot {
    pub raw: String,
    pub normalized: NormalizedScreen,
    pub captured_at: DateTime<Utc>,
}

/// Classifies screen lines and normalizes captures.
///
/// The rules come from [`DecorationConfig`] so they can follow the conventions
/// of whichever program is being driven.
#[derive(Debug, Clone)]
pub struct ScreenNormalizer {
    processing_glyphs: Vec<String>,
    chrome_glyphs: Vec<String>,
    status_phrases: Vec<String>,
    processing_phrases: Vec<String>,
    prompt_glyphs: Vec<String>,
}

impl Default for ScreenNormalizer {
    fn default() -> Self {
        Self::new(&DecorationConfig::default())
    }
}

impl ScreenNormalizer {
    pub fn new(config: &DecorationConfig) -> Self {
        let non_empty = |items: &[String]| -> Vec<String> {
            items.iter().filter(|s| !s.is_empty()).cloned().collect()
        };

        Self {
            processing_glyphs: non_empty(&config.processing_glyphs),
            chrome_glyphs: non_empty(&config.chrome_glyphs),
            status_phrases: non_empty(&config.status_phrases),
            processing_phrases: non_empty(&config.processing_phrases),
            prompt_glyphs: non_empty(&config.prompt_glyphs),
        }
    }

    /// Normalize a raw capture
    pub fn normalize(&self, raw: &str) -> NormalizedScreen {
        let plain = strip_control_sequences(raw);

        let lines: Vec<String> = plain
            .lines()
            .map(|line| line.trim_end())
            .filter(|line| !self.is_decorative(line))
            .map(str::to_string)
            .collect();

        let anchor_lines = lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .cloned()
            .collect();

        NormalizedScreen {
            plain,
            lines,
            anchor_lines,
        }
    }

    /// Normalize a raw capture and keep both forms
    pub fn snapshot(&self, raw: String) -> ScreenSnapshot {
        let normalized = self.normalize(&raw);
        ScreenSnapshot {
            raw,
            normalized,
            captured_at: Utc::now(),
        }
    }

    /// Drop blank and decorative lines from extracted delta text
    pub fn filter_delta(&self, delta: &str) -> String {
        delta
            .lines()
            .map(|line| line.trim_end())
            .filter(|line| !line.trim().is_empty() && !self.is_decorative(line))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    /// Whether a line is chrome rather than content. Blank lines are not
    /// decorative.
    pub fn is_decorative(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return false;
        }

        PROGRESS_PATTERN.is_match(trimmed)
            || BLOCK_PATTERN.is_match(trimmed)
            || self.is_rule(trimmed)
            || self.is_processing_line(trimmed)
            || self.chrome_glyphs.iter().any(|g| trimmed.starts_with(g.as_str()))
            || self.is_status_bar(trimmed)
            || self.is_empty_prompt(trimmed)
    }

    /// Rule / divider line
    pub fn is_rule(&self, line: &str) -> bool {
        RULE_PATTERN.is_match(line.trim())
    }

    /// Spinner line or a line carrying a processing phrase
    pub fn is_processing_line(&self, line: &str) -> bool {
        let trimmed = line.trim();
        self.processing_glyphs.iter().any(|g| trimmed.starts_with(g.as_str()))
            || self.processing_phrases.iter().any(|p| trimmed.contains(p.as_str()))
    }

    /// Status bar phrase or token counter. A phrase only counts when it
    /// opens the line or the line also carries a UI glyph, so prose that
    /// merely mentions it stays content.
    pub fn is_status_bar(&self, line: &str) -> bool {
        let trimmed = line.trim();
        let has_glyph = self
            .chrome_glyphs
            .iter()
            .chain(&self.processing_glyphs)
            .any(|g| trimmed.contains(g.as_str()));

        self.status_phrases.iter().any(|p| {
            trimmed.starts_with(p.as_str()) || (has_glyph && trimmed.contains(p.as_str()))
        }) || TOKEN_COUNT_PATTERN.is_match(trimmed)
    }

    /// Input prompt with nothing typed after the glyph
    pub fn is_empty_prompt(&self, line: &str) -> bool {
        let trimmed = line.trim();
        self.prompt_glyphs.iter().any(|glyph| {
            trimmed
                .strip_prefix(glyph.as_str())
                .map_or(false, |rest| rest.trim().is_empty())
        })
    }
}
