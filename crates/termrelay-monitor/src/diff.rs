//! Anchor diff
//!
//! A repainting terminal has no stable positions, so new content is located by
//! finding the previous snapshot's trailing lines in the current one and taking
//! whatever follows. Both snapshots are compared in full every time; no parse
//! state is carried between polls.

use termrelay_terminal::{NormalizedScreen, ScreenNormalizer};
use termrelay_types::{PRIMARY_ANCHOR_LINES, SCREEN_CLEARED_NOTICE, SECONDARY_ANCHOR_LINES};

/// Result of comparing two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Nothing new
    Empty,
    /// New content lines, already filtered of chrome
    Content(String),
    /// No anchor matched and the buffer shrank: the screen was cleared or redrawn
    ScreenCleared,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        matches!(self, Delta::Empty)
    }

    /// Text to deliver, if any
    pub fn into_text(self) -> Option<String> {
        match self {
            Delta::Empty => None,
            Delta::Content(text) => Some(text),
            Delta::ScreenCleared => Some(SCREEN_CLEARED_NOTICE.to_string()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Delta::Empty => "empty",
            Delta::Content(_) => "content",
            Delta::ScreenCleared => "screen_cleared",
        }
    }
}

/// Compute the new content of `current` relative to `previous`
pub fn compute_delta(
    previous: Option<&NormalizedScreen>,
    current: &NormalizedScreen,
    normalizer: &ScreenNormalizer,
) -> Delta {
    // The first capture only establishes a baseline
    let previous = match previous {
        Some(previous) => previous,
        None => return Delta::Empty,
    };

    if previous.anchor_corpus().len() == current.anchor_corpus().len() {
        return Delta::Empty;
    }

    let prev_lines = previous.anchor_lines();
    if prev_lines.is_empty() {
        return Delta::Empty;
    }

    let curr_lines = current.anchor_lines();
    let matched = [PRIMARY_ANCHOR_LINES, SECONDARY_ANCHOR_LINES]
        .into_iter()
        .find_map(|size| {
            let anchor = &prev_lines[prev_lines.len() - size.min(prev_lines.len())..];
            find_anchor_end(curr_lines, anchor)
        });

    match matched {
        Some(end) => {
            let text = normalizer.filter_delta(&curr_lines[end..].join("\n"));
            if text.is_empty() {
                Delta::Empty
            } else {
                Delta::Content(text)
            }
        }
        None if current.plain().len() < previous.plain().len() => Delta::ScreenCleared,
        None => Delta::Empty,
    }
}

/// Index just past the first run of `lines` equal to `anchor`
fn find_anchor_end(lines: &[String], anchor: &[String]) -> Option<usize> {
    if anchor.is_empty() || anchor.len() > lines.len() {
        return None;
    }
    lines
        .windows(anchor.len())
        .position(|window| window == anchor)
        .map(|start| start + anchor.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered(range: std::ops::RangeInclusive<usize>) -> String {
        range.map(|i| format!("line{}", i)).collect::<Vec<_>>().join("\n")
    }

    fn screen(n: &ScreenNormalizer, raw: &str) -> NormalizedScreen {
        n.normalize(raw)
    }

    #[test]
    fn test_first_poll_is_baseline() {
        let n = ScreenNormalizer::default();
        let current = screen(&n, &numbered(1..=5));
        assert_eq!(compute_delta(None, &current, &n), Delta::Empty);
    }

    #[test]
    fn test_identical_snapshots_have_no_delta() {
        let n = ScreenNormalizer::default();
        let long = numbered(1..=40);
        for raw in ["", "one", long.as_str(), "a\n\n  45%\nb\n> "] {
            let s = screen(&n, raw);
            assert_eq!(compute_delta(Some(&s), &s, &n), Delta::Empty);
        }
    }

    #[test]
    fn test_appended_line_with_progress_bar() {
        let n = ScreenNormalizer::default();
        let previous = screen(&n, &numbered(1..=12));
        let current = screen(&n, &format!("{}\nline13\n[██████░░░░] 60%", numbered(1..=12)));

        assert_eq!(
            compute_delta(Some(&previous), &current, &n),
            Delta::Content("line13".to_string())
        );
    }

    #[test]
    fn test_interleaved_chrome_does_not_leak_into_delta() {
        let n = ScreenNormalizer::default();
        let previous = screen(&n, &format!("{}\n✻ Thinking…", numbered(1..=12)));
        let current = screen(
            &n,
            &format!(
                "{}\n\n✳ Working… (esc to interrupt)\nalpha\n  12%\n\nbeta\n────────\n> \n  ⏵⏵ bypass permissions on",
                numbered(1..=12)
            ),
        );

        assert_eq!(
            compute_delta(Some(&previous), &current, &n),
            Delta::Content("alpha\nbeta".to_string())
        );
    }

    #[test]
    fn test_scrolled_buffer_still_anchors() {
        let n = ScreenNormalizer::default();
        let previous = screen(&n, &numbered(1..=30));
        let current = screen(&n, &numbered(5..=33));

        assert_eq!(
            compute_delta(Some(&previous), &current, &n),
            Delta::Content("line31\nline32\nline33".to_string())
        );
    }

    #[test]
    fn test_secondary_anchor_when_older_lines_were_redrawn() {
        let n = ScreenNormalizer::default();
        let previous = screen(&n, &numbered(1..=12));
        // line5 repainted differently: the 10-line anchor breaks, the 3-line one holds
        let redrawn = numbered(1..=12).replace("line5", "line5 (edited)");
        let current = screen(&n, &format!("{}\nline13\nline14", redrawn));

        assert_eq!(
            compute_delta(Some(&previous), &current, &n),
            Delta::Content("line13\nline14".to_string())
        );
    }

    #[test]
    fn test_anchor_at_end_is_empty() {
        let n = ScreenNormalizer::default();
        let previous = screen(&n, &numbered(3..=12));
        // Longer buffer, same trailing lines: match sits at the very end
        let current = screen(&n, &format!("{}\n{}", numbered(1..=2), numbered(3..=12)));

        assert_eq!(compute_delta(Some(&previous), &current, &n), Delta::Empty);
    }

    #[test]
    fn test_anchor_must_align_to_lines() {
        let n = ScreenNormalizer::default();
        let previous = screen(&n, "x\nitem 1");
        // "item 1" appears only as part of "item 10"; not a line match
        let current = screen(&n, "y\nitem 10\nitem 11");

        assert_eq!(compute_delta(Some(&previous), &current, &n), Delta::Empty);
    }

    #[test]
    fn test_screen_cleared_notice_when_buffer_shrinks() {
        let n = ScreenNormalizer::default();
        let previous = screen(&n, &numbered(1..=20));
        let current = screen(&n, "fresh prompt output");

        let delta = compute_delta(Some(&previous), &current, &n);
        assert_eq!(delta, Delta::ScreenCleared);
        assert_eq!(delta.into_text().as_deref(), Some(SCREEN_CLEARED_NOTICE));
    }

    #[test]
    fn test_unanchored_growth_fails_safe() {
        let n = ScreenNormalizer::default();
        let previous = screen(&n, "aaa\nbbb");
        let current = screen(&n, "completely\ndifferent\nand longer content");

        assert_eq!(compute_delta(Some(&previous), &current, &n), Delta::Empty);
    }

    #[test]
    fn test_empty_previous_corpus_is_empty_delta() {
        let n = ScreenNormalizer::default();
        let previous = screen(&n, "\n\n> \n");
        let current = screen(&n, "hello\nworld");

        assert_eq!(compute_delta(Some(&previous), &current, &n), Delta::Empty);
    }

    #[test]
    fn test_first_aligned_match_wins() {
        let n = ScreenNormalizer::default();
        let previous = screen(&n, "ok");
        let current = screen(&n, "ok\nfirst\nok\nsecond");

        assert_eq!(
            compute_delta(Some(&previous), &current, &n),
            Delta::Content("first\nok\nsecond".to_string())
        );
    }
}
