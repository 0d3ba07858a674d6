//! Content-aware truncation.
//!
//! Each [`SourceKind`] maps to one strategy. All lengths are measured in
//! characters, never bytes, so multi-byte text is never split mid-character.

use serde::Serialize;

use crate::context::item::SourceKind;

/// Marker placed between the kept head and tail of a file.
pub const MIDDLE_MARKER: &str = "\n... [content truncated] ...\n";
/// Marker prefixed when only the end is kept.
pub const PREFIX_MARKER: &str = "[earlier content truncated] ...\n";
/// Marker appended when only the start is kept.
pub const SUFFIX_MARKER: &str = "\n... [content truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationStrategy {
    /// Keep whole lines from both ends of the text.
    HeadTail,
    /// Keep the most recent text.
    KeepEnd,
    /// Keep the beginning of the text.
    KeepStart,
}

impl TruncationStrategy {
    pub fn for_kind(kind: SourceKind) -> Self {
        match kind {
            SourceKind::ExplicitFile | SourceKind::PinnedFile | SourceKind::ImplicitFile => {
                Self::HeadTail
            }
            SourceKind::ConversationTurn => Self::KeepEnd,
            _ => Self::KeepStart,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::HeadTail => "head-tail",
            Self::KeepEnd => "keep-end",
            Self::KeepStart => "keep-start",
        }
    }

    /// Shorten `text` to roughly `max_chars` characters of content.
    ///
    /// Text that already fits is returned unchanged. The marker is not
    /// counted against `max_chars`.
    pub fn truncate(&self, text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        match self {
            Self::HeadTail => head_tail(text, max_chars),
            Self::KeepEnd => format!("{PREFIX_MARKER}{}", last_chars(text, max_chars)),
            Self::KeepStart => format!("{}{SUFFIX_MARKER}", first_chars(text, max_chars)),
        }
    }
}

fn first_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn last_chars(text: &str, n: usize) -> &str {
    let total = text.chars().count();
    if n >= total {
        return text;
    }
    match text.char_indices().nth(total - n) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

/// Whole lines from the start and end, each side given half the budget.
///
/// If the first (or last) line alone exceeds its half, falls back to a
/// character cut so neither side is empty.
fn head_tail(text: &str, max_chars: usize) -> String {
    let half = (max_chars / 2).max(1);
    let lines: Vec<&str> = text.split_inclusive('\n').collect();

    let mut head_end = 0;
    let mut head_len = 0;
    for line in &lines {
        let n = line.chars().count();
        if head_len + n > half {
            break;
        }
        head_len += n;
        head_end += 1;
    }

    let mut tail_start = lines.len();
    let mut tail_len = 0;
    while tail_start > head_end {
        let n = lines[tail_start - 1].chars().count();
        if tail_len + n > half {
            break;
        }
        tail_len += n;
        tail_start -= 1;
    }

    let head = if head_end == 0 {
        first_chars(text, half).to_string()
    } else {
        lines[..head_end].concat()
    };
    let tail = if tail_start == lines.len() {
        last_chars(text, half).to_string()
    } else {
        lines[tail_start..].concat()
    };

    let mut head = head.trim_end_matches('\n');
    if head.is_empty() {
        head = first_chars(text, 1);
    }
    let mut tail = tail.trim_start_matches('\n');
    if tail.is_empty() {
        tail = last_chars(text, 1);
    }
    format!("{head}{MIDDLE_MARKER}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_lines(n: usize) -> String {
        (1..=n).map(|i| format!("line {i:04} of the file\n")).collect()
    }

    #[test]
    fn fitting_text_unchanged() {
        for strategy in [
            TruncationStrategy::HeadTail,
            TruncationStrategy::KeepEnd,
            TruncationStrategy::KeepStart,
        ] {
            assert_eq!(strategy.truncate("short", 100), "short");
        }
    }

    #[test]
    fn head_tail_keeps_whole_lines_from_both_ends() {
        let text = numbered_lines(200);
        let out = TruncationStrategy::HeadTail.truncate(&text, 300);
        assert!(out.starts_with("line 0001 of the file\n"));
        assert!(out.ends_with("line 0200 of the file\n"));
        assert!(out.contains(MIDDLE_MARKER));
        assert!(!out.contains("line 0100 "));
        assert!(out.chars().count() <= 300 + MIDDLE_MARKER.len());
    }

    #[test]
    fn head_tail_never_empty_on_single_long_line() {
        let text = "x".repeat(1000);
        let out = TruncationStrategy::HeadTail.truncate(&text, 10);
        let (head, tail) = out.split_once(MIDDLE_MARKER).unwrap();
        assert_eq!(head, "xxxxx");
        assert_eq!(tail, "xxxxx");
    }

    #[test]
    fn head_tail_tiny_budget_keeps_one_char_each_side() {
        let out = TruncationStrategy::HeadTail.truncate("abcdef", 1);
        let (head, tail) = out.split_once(MIDDLE_MARKER).unwrap();
        assert_eq!(head, "a");
        assert_eq!(tail, "f");
    }

    #[test]
    fn keep_end_for_conversation() {
        let out = TruncationStrategy::KeepEnd.truncate("0123456789", 4);
        assert_eq!(out, format!("{PREFIX_MARKER}6789"));
    }

    #[test]
    fn keep_start_is_char_safe() {
        let out = TruncationStrategy::KeepStart.truncate("ééééé", 2);
        assert_eq!(out, format!("éé{SUFFIX_MARKER}"));
    }

    #[test]
    fn strategy_per_kind() {
        assert_eq!(
            TruncationStrategy::for_kind(SourceKind::PinnedFile),
            TruncationStrategy::HeadTail
        );
        assert_eq!(
            TruncationStrategy::for_kind(SourceKind::ConversationTurn),
            TruncationStrategy::KeepEnd
        );
        assert_eq!(
            TruncationStrategy::for_kind(SourceKind::PinnedSnippet),
            TruncationStrategy::KeepStart
        );
        assert_eq!(
            TruncationStrategy::for_kind(SourceKind::VectorResult),
            TruncationStrategy::KeepStart
        );
    }

    #[test]
    fn blank_input_keeps_a_char_each_side() {
        let text = "\n".repeat(1000);
        let out = TruncationStrategy::HeadTail.truncate(&text, 100);
        assert_ne!(out, MIDDLE_MARKER);
        assert_eq!(out, format!("\n{MIDDLE_MARKER}\n"));
    }
}
