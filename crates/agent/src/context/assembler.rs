//! Budget assembler: packs prioritized items into one prompt.
//!
//! # Algorithm
//!
//! 1. Stable-sort items ascending by `(class, sequence)`
//! 2. Append mandatory items (system prompt, user query) verbatim, with their
//!    tokens reserved up front so optional items cannot crowd them out
//! 3. Greedily append optional items that fit; truncate borderline ones by
//!    kind when the remaining budget is above the truncation floor
//! 4. Stop taking optional items once usage crosses the stop ratio
//! 5. Recount on the concatenated text and drop trailing optional segments
//!    while the recount exceeds the budget
//!
//! Assembly is deterministic: identical inputs produce identical prompts.

use codesage_config::ContextConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::item::{ContextSourceItem, SourceKind, format_segment, sort_by_priority};
use crate::context::token::{
    Confidence, CountMethod, ModelProfile, TokenCount, Tokenizer, available_prompt_tokens,
    estimate_chars_for_tokens,
};
use crate::context::truncate::TruncationStrategy;

/// Marker appended to the minimal prompt built when assembly fails.
pub const ASSEMBLY_FAILURE_MARKER: &str = "[ERROR: Failed to build full context]";

const MAX_TRUNCATION_PASSES: usize = 3;

// ── Types ─────────────────────────────────────────────────────────────────

/// Tunables for packing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblySettings {
    /// Truncation is only attempted when more than this many tokens remain.
    pub min_truncation_tokens: usize,
    /// Fraction of the budget after which optional items are no longer taken.
    pub stop_ratio: f64,
}

impl Default for AssemblySettings {
    fn default() -> Self {
        Self {
            min_truncation_tokens: 100,
            stop_ratio: 0.95,
        }
    }
}

impl From<&ContextConfig> for AssemblySettings {
    fn from(cfg: &ContextConfig) -> Self {
        Self {
            min_truncation_tokens: cfg.min_truncation_tokens,
            stop_ratio: cfg.stop_ratio,
        }
    }
}

/// One formatted segment of the final prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptSegment {
    pub label: String,
    pub source: String,
    pub kind: SourceKind,
    pub text: String,
    pub tokens: usize,
    pub truncated: bool,
}

/// The assembled prompt and a report of how it was built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledPrompt {
    pub text: String,
    pub segments: Vec<PromptSegment>,
    /// Recounted on `text`, not summed from segments.
    pub total_tokens: usize,
    pub budget: usize,
    pub included: Vec<String>,
    pub truncated: Vec<String>,
    pub skipped: Vec<String>,
    pub method: CountMethod,
    pub confidence: Confidence,
    pub warnings: Vec<String>,
}

/// Errors that force the minimal fallback prompt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssemblyError {
    #[error("Mandatory item missing: {kind:?}")]
    MissingMandatory { kind: SourceKind },
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Stateless; create one and reuse it.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    tokenizer: Arc<Tokenizer>,
    settings: AssemblySettings,
}

/// Running best counting method seen during one assembly.
struct MethodTracker {
    best: Option<TokenCount>,
}

impl MethodTracker {
    fn observe(&mut self, count: TokenCount) {
        match self.best {
            Some(best) if best.confidence >= count.confidence => {}
            _ => self.best = Some(count),
        }
    }
}

impl ContextAssembler {
    pub fn new(tokenizer: Arc<Tokenizer>) -> Self {
        Self {
            tokenizer,
            settings: AssemblySettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: AssemblySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Assemble, falling back to a minimal prompt on failure. Never errors.
    pub fn assemble(
        &self,
        items: Vec<ContextSourceItem>,
        profile: &ModelProfile,
    ) -> AssembledPrompt {
        let system = text_of(&items, SourceKind::SystemPrompt);
        let query = text_of(&items, SourceKind::UserQuery);
        match self.try_assemble(items, profile) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "Context assembly failed, using minimal prompt");
                self.minimal_prompt(&system, &query, profile, &e)
            }
        }
    }

    /// Assemble, reporting structural problems as errors.
    pub fn try_assemble(
        &self,
        mut items: Vec<ContextSourceItem>,
        profile: &ModelProfile,
    ) -> Result<AssembledPrompt, AssemblyError> {
        for kind in [SourceKind::SystemPrompt, SourceKind::UserQuery] {
            if !items.iter().any(|i| i.kind == kind) {
                return Err(AssemblyError::MissingMandatory { kind });
            }
        }

        sort_by_priority(&mut items);
        let budget = available_prompt_tokens(profile);
        let stop_at = (budget as f64 * self.settings.stop_ratio).ceil() as usize;
        let mut tracker = MethodTracker { best: None };

        let mut pending_mandatory: usize = items
            .iter()
            .filter(|i| i.is_mandatory())
            .map(|i| {
                let rendered = format_segment(&i.label(), &i.text);
                self.tokenizer.count_tokens(&rendered, profile).count
            })
            .sum();

        let mut segments: Vec<PromptSegment> = Vec::new();
        let mut truncated = Vec::new();
        let mut skipped = Vec::new();
        let mut warnings = Vec::new();
        let mut used = 0usize;
        let mut stopped = false;

        if pending_mandatory > budget {
            warn!(mandatory = pending_mandatory, budget, "Mandatory items exceed budget");
            warnings.push(format!(
                "Mandatory context ({pending_mandatory} tokens) exceeds the prompt budget \
                 ({budget} tokens)"
            ));
        }

        for item in &items {
            let label = item.label();

            if item.is_mandatory() {
                let segment_text = format_segment(&label, &item.text);
                let count = self.tokenizer.count_tokens(&segment_text, profile);
                tracker.observe(count);
                pending_mandatory = pending_mandatory.saturating_sub(count.count);
                used += count.count;
                segments.push(segment(item, label, segment_text, count.count, false));
                continue;
            }

            if stopped {
                skipped.push(item.source_description.clone());
                continue;
            }

            let remaining = budget.saturating_sub(used + pending_mandatory);
            let segment_text = format_segment(&label, &item.text);
            let count = self.tokenizer.count_tokens(&segment_text, profile);
            tracker.observe(count);

            if count.count <= remaining {
                debug!(source = %item.source_description, tokens = count.count, "Included");
                used += count.count;
                segments.push(segment(item, label, segment_text, count.count, false));
            } else if remaining > self.settings.min_truncation_tokens {
                match self.truncate_to_fit(item, remaining, profile, &mut tracker) {
                    Some(seg) => {
                        let strategy = TruncationStrategy::for_kind(item.kind);
                        debug!(source = %item.source_description, tokens = seg.tokens, "Truncated");
                        warnings.push(format!(
                            "Truncated {} using {} strategy",
                            item.source_description,
                            strategy.name()
                        ));
                        truncated.push(item.source_description.clone());
                        used += seg.tokens;
                        segments.push(seg);
                    }
                    None => {
                        warnings.push(format!(
                            "Skipped {}: too large even after truncation",
                            item.source_description
                        ));
                        skipped.push(item.source_description.clone());
                        continue;
                    }
                }
            } else {
                warnings.push(format!(
                    "Skipped {}: insufficient token budget ({remaining} tokens remaining)",
                    item.source_description
                ));
                skipped.push(item.source_description.clone());
                continue;
            }

            if used + pending_mandatory >= stop_at {
                stopped = true;
                warnings.push(format!(
                    "Context assembly stopped due to token limit ({} of {budget} tokens used)",
                    used + pending_mandatory
                ));
            }
        }

        // Recount on the real text; drop trailing optional segments if over.
        let mut text: String = segments.iter().map(|s| s.text.as_str()).collect();
        let mut recount = self.tokenizer.count_tokens(&text, profile);
        tracker.observe(recount);
        while recount.count > budget {
            let Some(pos) = segments.iter().rposition(|s| !s.kind.is_mandatory()) else {
                break;
            };
            let dropped = segments.remove(pos);
            warnings.push(format!("Dropped {} after final token recount", dropped.source));
            truncated.retain(|t| t != &dropped.source);
            skipped.push(dropped.source);
            text = segments.iter().map(|s| s.text.as_str()).collect();
            recount = self.tokenizer.count_tokens(&text, profile);
        }

        let best = tracker.best.unwrap_or(recount);
        let included = segments.iter().map(|s| s.source.clone()).collect();
        debug!(
            total_tokens = recount.count,
            budget,
            segments = segments.len(),
            warnings = warnings.len(),
            "Context assembled"
        );

        Ok(AssembledPrompt {
            text,
            segments,
            total_tokens: recount.count,
            budget,
            included,
            truncated,
            skipped,
            method: best.method,
            confidence: best.confidence,
            warnings,
        })
    }

    /// Up to three shrinking passes. `None` if nothing fits.
    fn truncate_to_fit(
        &self,
        item: &ContextSourceItem,
        remaining: usize,
        profile: &ModelProfile,
        tracker: &mut MethodTracker,
    ) -> Option<PromptSegment> {
        let strategy = TruncationStrategy::for_kind(item.kind);
        let label = format!("{} (truncated)", item.label());
        let overhead = self
            .tokenizer
            .count_tokens(&format_segment(&label, ""), profile)
            .count;
        let mut target = remaining.saturating_sub(overhead);

        for _ in 0..MAX_TRUNCATION_PASSES {
            if target == 0 {
                return None;
            }
            let max_chars = estimate_chars_for_tokens(target, profile.provider);
            let shortened = strategy.truncate(&item.text, max_chars);
            let segment_text = format_segment(&label, &shortened);
            let count = self.tokenizer.count_tokens(&segment_text, profile);
            tracker.observe(count);
            if count.count <= remaining {
                return Some(segment(item, label, segment_text, count.count, true));
            }
            // Shrink proportionally to the overshoot, and at least by 10%.
            let scaled = target * remaining / count.count.max(1);
            target = scaled.min(target * 9 / 10);
        }
        None
    }

    fn minimal_prompt(
        &self,
        system: &str,
        query: &str,
        profile: &ModelProfile,
        error: &AssemblyError,
    ) -> AssembledPrompt {
        let text = format!(
            "{}{}{ASSEMBLY_FAILURE_MARKER}\n",
            format_segment("SYSTEM PROMPT", system),
            format_segment("USER QUERY", query)
        );
        let count = self.tokenizer.count_tokens(&text, profile);
        AssembledPrompt {
            text,
            segments: Vec::new(),
            total_tokens: count.count,
            budget: available_prompt_tokens(profile),
            included: Vec::new(),
            truncated: Vec::new(),
            skipped: Vec::new(),
            method: count.method,
            confidence: count.confidence,
            warnings: vec![format!("Failed to build full context ({error}); using minimal prompt")],
        }
    }
}

fn segment(
    item: &ContextSourceItem,
    label: String,
    text: String,
    tokens: usize,
    truncated: bool,
) -> PromptSegment {
    PromptSegment {
        label,
        source: item.source_description.clone(),
        kind: item.kind,
        text,
        tokens,
        truncated,
    }
}

fn text_of(items: &[ContextSourceItem], kind: SourceKind) -> String {
    items
        .iter()
        .find(|i| i.kind == kind)
        .map(|i| i.text.clone())
        .unwrap_or_default()
}
