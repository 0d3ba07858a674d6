//! Typed, prioritized context items.
//!
//! Every piece of text that may end up in a prompt is wrapped in a
//! [`ContextSourceItem`]. Ordering is a composite `(class, sequence)` key:
//! the class comes from the item's [`SourceKind`], the sequence is the order
//! in which the gatherer produced items, so ties stay stable.

use serde::Serialize;

/// What an item is and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    SystemPrompt,
    CorrectionDirective,
    UserQuery,
    ExplicitFile,
    PinnedSnippet,
    PinnedFile,
    ConversationTurn,
    VectorResult,
    ImplicitFile,
}

impl SourceKind {
    /// Priority class. Lower sorts first.
    pub fn priority_class(&self) -> u8 {
        match self {
            Self::SystemPrompt => 0,
            Self::CorrectionDirective => 1,
            Self::UserQuery => 2,
            Self::ExplicitFile => 3,
            Self::PinnedSnippet | Self::PinnedFile => 4,
            Self::ConversationTurn => 5,
            Self::VectorResult => 6,
            Self::ImplicitFile => 7,
        }
    }

    /// System prompt and user query are never dropped or truncated.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Self::SystemPrompt | Self::UserQuery)
    }

    /// File-backed kinds, truncated head-and-tail.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::ExplicitFile | Self::PinnedFile | Self::ImplicitFile)
    }
}

/// Composite ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Priority {
    pub class: u8,
    pub sequence: usize,
}

/// One candidate segment of the prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSourceItem {
    pub text: String,
    /// Human-readable identity used in labels and warnings (a path, a
    /// pinned item's description, ...).
    pub source_description: String,
    pub kind: SourceKind,
    pub priority: Priority,
    /// Character length of `text` as produced, before any truncation.
    pub original_length: usize,
}

impl ContextSourceItem {
    pub fn new(
        kind: SourceKind,
        text: impl Into<String>,
        source_description: impl Into<String>,
        sequence: usize,
    ) -> Self {
        let text = text.into();
        Self {
            original_length: text.chars().count(),
            text,
            source_description: source_description.into(),
            kind,
            priority: Priority {
                class: kind.priority_class(),
                sequence,
            },
        }
    }

    pub fn system_prompt(text: impl Into<String>) -> Self {
        Self::new(SourceKind::SystemPrompt, text, "system prompt", 0)
    }

    pub fn user_query(text: impl Into<String>) -> Self {
        Self::new(SourceKind::UserQuery, text, "user query", 0)
    }

    pub fn correction_directive(text: impl Into<String>) -> Self {
        Self::new(SourceKind::CorrectionDirective, text, "self-correction directive", 0)
    }

    /// Segment header text, without the surrounding dashes.
    pub fn label(&self) -> String {
        let desc = &self.source_description;
        match self.kind {
            SourceKind::SystemPrompt => "SYSTEM PROMPT".into(),
            SourceKind::CorrectionDirective => "CORRECTION".into(),
            SourceKind::UserQuery => "USER QUERY".into(),
            SourceKind::ExplicitFile => format!("FILE: {desc}"),
            SourceKind::PinnedSnippet => format!("PINNED SNIPPET: {desc}"),
            SourceKind::PinnedFile => format!("PINNED FILE: {desc}"),
            SourceKind::ConversationTurn => "CONVERSATION TURN".into(),
            SourceKind::VectorResult => format!("SEARCH RESULT: {desc}"),
            SourceKind::ImplicitFile => format!("CURRENT FILE: {desc}"),
        }
    }

    pub fn is_mandatory(&self) -> bool {
        self.kind.is_mandatory()
    }
}

/// Render one prompt segment: `--- LABEL ---` followed by the text.
///
/// Segments end with a newline and are concatenated without separators.
pub fn format_segment(label: &str, text: &str) -> String {
    format!("--- {label} ---\n{text}\n")
}

/// Stable ascending sort by priority key.
pub fn sort_by_priority(items: &mut [ContextSourceItem]) {
    items.sort_by_key(|item| item.priority);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_order_matches_tiers() {
        let ordered = [
            SourceKind::SystemPrompt,
            SourceKind::CorrectionDirective,
            SourceKind::UserQuery,
            SourceKind::ExplicitFile,
            SourceKind::PinnedSnippet,
            SourceKind::ConversationTurn,
            SourceKind::VectorResult,
            SourceKind::ImplicitFile,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].priority_class() < pair[1].priority_class());
        }
        assert_eq!(
            SourceKind::PinnedSnippet.priority_class(),
            SourceKind::PinnedFile.priority_class()
        );
    }

    #[test]
    fn sort_is_stable_within_class() {
        let mut items = vec![
            ContextSourceItem::new(SourceKind::VectorResult, "v", "v", 1),
            ContextSourceItem::new(SourceKind::ExplicitFile, "b", "b.rs", 3),
            ContextSourceItem::new(SourceKind::ExplicitFile, "a", "a.rs", 2),
            ContextSourceItem::user_query("q"),
            ContextSourceItem::system_prompt("s"),
        ];
        sort_by_priority(&mut items);
        let order: Vec<_> = items.iter().map(|i| i.source_description.as_str()).collect();
        assert_eq!(order, vec!["system prompt", "user query", "a.rs", "b.rs", "v"]);
    }

    #[test]
    fn labels_and_segments() {
        let item = ContextSourceItem::new(SourceKind::ImplicitFile, "x", "src/lib.rs", 0);
        assert_eq!(item.label(), "CURRENT FILE: src/lib.rs");
        assert_eq!(
            format_segment(&item.label(), &item.text),
            "--- CURRENT FILE: src/lib.rs ---\nx\n"
        );
    }

    #[test]
    fn original_length_counts_chars() {
        let item = ContextSourceItem::new(SourceKind::PinnedSnippet, "héllo", "note", 0);
        assert_eq!(item.original_length, 5);
        assert!(!item.is_mandatory());
        assert!(ContextSourceItem::user_query("q").is_mandatory());
    }
}
