//! Context source gathering.
//!
//! Resolves the raw references of a request (paths, pinned ids, history,
//! search hits, the focused file) into typed [`ContextSourceItem`]s. Every
//! fetch is read-only and independent, so they run concurrently; the final
//! order comes from the priority key, not from completion order.
//!
//! A failed fetch never fails the gather. The source is omitted and a
//! warning is logged.

use codesage_config::ContextConfig;
use codesage_core::store::{
    ContentStore, PinnedItemKind, PinnedItemStore, SearchHit, VectorSearchProvider,
};
use codesage_core::turn::ConversationTurn;
use futures::future::join_all;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::item::{ContextSourceItem, SourceKind};
use crate::context::token::{ModelProfile, Tokenizer, available_prompt_tokens};

/// Limits applied while gathering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatherSettings {
    /// Max files fetched when expanding a folder reference.
    pub folder_file_cap: usize,
    /// Most recent turns considered for the prompt.
    pub history_window: usize,
    /// Max search hits kept after sorting.
    pub max_search_results: usize,
}

impl Default for GatherSettings {
    fn default() -> Self {
        Self {
            folder_file_cap: 10,
            history_window: 6,
            max_search_results: 10,
        }
    }
}

impl From<&ContextConfig> for GatherSettings {
    fn from(cfg: &ContextConfig) -> Self {
        Self {
            folder_file_cap: cfg.folder_file_cap,
            history_window: cfg.history_window,
            max_search_results: cfg.max_search_results,
        }
    }
}

/// Everything one gather needs, borrowed from the caller.
#[derive(Debug, Clone, Default)]
pub struct GatherRequest {
    pub project_id: String,
    pub system_prompt: String,
    pub user_query: String,
    pub correction_directive: Option<String>,
    pub explicit_paths: Vec<String>,
    pub pinned_ids: Vec<String>,
    pub implicit_path: Option<String>,
    pub search_hits: Vec<SearchHit>,
    pub history: Vec<ConversationTurn>,
}

impl GatherRequest {
    pub fn new(
        project_id: impl Into<String>,
        system_prompt: impl Into<String>,
        user_query: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            system_prompt: system_prompt.into(),
            user_query: user_query.into(),
            ..Default::default()
        }
    }

    pub fn with_explicit_paths(mut self, paths: Vec<String>) -> Self {
        self.explicit_paths = paths;
        self
    }

    pub fn with_pinned_ids(mut self, ids: Vec<String>) -> Self {
        self.pinned_ids = ids;
        self
    }

    pub fn with_implicit_path(mut self, path: impl Into<String>) -> Self {
        self.implicit_path = Some(path.into());
        self
    }

    pub fn with_search_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.search_hits = hits;
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_correction(mut self, directive: impl Into<String>) -> Self {
        self.correction_directive = Some(directive.into());
        self
    }
}

/// Strip leading `/` so `"/src/a.rs"` and `"src/a.rs"` compare equal.
pub fn normalize_path(path: &str) -> &str {
    path.trim().trim_start_matches('/')
}

/// A reference is a folder if it ends in `/` or has no file extension.
pub fn is_folder_reference(path: &str) -> bool {
    path.ends_with('/') || Path::new(path).extension().is_none()
}

/// Resolves request references into context items.
pub struct ContextGatherer {
    content: Arc<dyn ContentStore>,
    pinned: Option<Arc<dyn PinnedItemStore>>,
    search: Option<Arc<dyn VectorSearchProvider>>,
    tokenizer: Arc<Tokenizer>,
    settings: GatherSettings,
}

/// A fetched file, before it becomes an item.
struct Fetched {
    path: String,
    text: String,
}

impl ContextGatherer {
    pub fn new(content: Arc<dyn ContentStore>, tokenizer: Arc<Tokenizer>) -> Self {
        Self {
            content,
            pinned: None,
            search: None,
            tokenizer,
            settings: GatherSettings::default(),
        }
    }

    pub fn with_pinned_store(mut self, store: Arc<dyn PinnedItemStore>) -> Self {
        self.pinned = Some(store);
        self
    }

    pub fn with_search_provider(mut self, search: Arc<dyn VectorSearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_settings(mut self, settings: GatherSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn tokenizer(&self) -> Arc<Tokenizer> {
        Arc::clone(&self.tokenizer)
    }

    pub fn settings(&self) -> GatherSettings {
        self.settings
    }

    /// Produce every candidate item for the request, in priority order.
    pub async fn gather(
        &self,
        request: &GatherRequest,
        profile: &ModelProfile,
    ) -> Vec<ContextSourceItem> {
        let budget = available_prompt_tokens(profile);

        let (explicit, pinned, hits) = futures::join!(
            self.fetch_explicit(&request.explicit_paths, profile, budget),
            self.fetch_pinned(&request.project_id, &request.pinned_ids),
            self.resolve_search_hits(request),
        );

        let mut items = Vec::new();
        let mut seq = 0usize;
        let mut next = || {
            seq += 1;
            seq
        };

        items.push(ContextSourceItem::system_prompt(&request.system_prompt));
        if let Some(directive) = &request.correction_directive {
            items.push(ContextSourceItem::correction_directive(directive));
        }
        items.push(ContextSourceItem::user_query(&request.user_query));

        // Paths already covered by higher tiers, for implicit dedupe.
        let mut covered: HashSet<String> = request
            .explicit_paths
            .iter()
            .map(|p| normalize_path(p).trim_end_matches('/').to_string())
            .collect();

        for file in explicit {
            covered.insert(normalize_path(&file.path).to_string());
            let kind = SourceKind::ExplicitFile;
            items.push(ContextSourceItem::new(kind, file.text, file.path, next()));
        }

        for entry in pinned {
            match entry {
                PinnedEntry::Snippet { description, text } => {
                    let kind = SourceKind::PinnedSnippet;
                    items.push(ContextSourceItem::new(kind, text, description, next()));
                }
                PinnedEntry::File(file) => {
                    covered.insert(normalize_path(&file.path).to_string());
                    let kind = SourceKind::PinnedFile;
                    items.push(ContextSourceItem::new(kind, file.text, file.path, next()));
                }
            }
        }

        let window = self.settings.history_window;
        let start = request.history.len().saturating_sub(window);
        for (offset, turn) in request.history[start..].iter().enumerate().rev() {
            let description = format!(
                "conversation turn {} ({})",
                start + offset + 1,
                turn.role.label().to_lowercase()
            );
            items.push(ContextSourceItem::new(
                SourceKind::ConversationTurn,
                format_turn(turn),
                description,
                next(),
            ));
        }

        for hit in hits {
            let description = format!("{}:{}-{}", hit.path, hit.line_range.0, hit.line_range.1);
            let text = format!(
                "{} (lines {}-{}, score {:.3})\n{}",
                hit.path, hit.line_range.0, hit.line_range.1, hit.score, hit.snippet
            );
            items.push(ContextSourceItem::new(SourceKind::VectorResult, text, description, next()));
        }

        if let Some(implicit) = request.implicit_path.as_deref() {
            let normalized = normalize_path(implicit);
            if normalized.is_empty() || covered.contains(normalized) {
                debug!(path = %implicit, "Implicit file already referenced, skipping");
            } else if let Some(file) = self.fetch_file(normalized).await {
                let kind = SourceKind::ImplicitFile;
                items.push(ContextSourceItem::new(kind, file.text, file.path, next()));
            }
        }

        debug!(items = items.len(), model = %profile.name, "Context gathered");
        items
    }

    async fn fetch_file(&self, path: &str) -> Option<Fetched> {
        match self.content.get(path).await {
            Ok(Some(text)) => Some(Fetched {
                path: normalize_path(path).to_string(),
                text,
            }),
            Ok(None) => {
                warn!(path = %path, "Referenced file not found, omitting");
                None
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to fetch file, omitting");
                None
            }
        }
    }

    async fn fetch_explicit(
        &self,
        paths: &[String],
        profile: &ModelProfile,
        budget: usize,
    ) -> Vec<Fetched> {
        let per_path = paths.iter().map(|p| async move {
            if is_folder_reference(p) {
                self.expand_folder(p, profile, budget).await
            } else {
                self.fetch_file(p).await.into_iter().collect()
            }
        });
        join_all(per_path).await.into_iter().flatten().collect()
    }

    /// Fetch up to `folder_file_cap` files under `folder`, stopping once the
    /// cumulative size already exceeds the whole prompt budget.
    async fn expand_folder(
        &self,
        folder: &str,
        profile: &ModelProfile,
        budget: usize,
    ) -> Vec<Fetched> {
        let prefix = normalize_path(folder).trim_end_matches('/');
        let listing = match self.content.list(prefix, self.settings.folder_file_cap).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(folder = %folder, error = %e, "Failed to list folder, omitting");
                return Vec::new();
            }
        };

        if listing.is_empty() {
            // Extension-less files such as `Makefile` look like folders.
            return self.fetch_file(prefix).await.into_iter().collect();
        }

        let fetched = join_all(listing.iter().map(|p| self.fetch_file(p))).await;

        let mut out = Vec::new();
        let mut cumulative = 0usize;
        for file in fetched.into_iter().flatten() {
            if cumulative > budget {
                debug!(folder = %folder, cumulative, budget, "Folder expansion stopped at budget");
                break;
            }
            cumulative += self.tokenizer.count_tokens(&file.text, profile).count;
            out.push(file);
        }
        out
    }

    async fn fetch_pinned(&self, project_id: &str, ids: &[String]) -> Vec<PinnedEntry> {
        let Some(store) = &self.pinned else {
            return Vec::new();
        };
        if ids.is_empty() {
            return Vec::new();
        }

        let items = match store.list(project_id).await {
            Ok(items) => items,
            Err(e) => {
                warn!(project = %project_id, error = %e, "Failed to list pinned items, omitting");
                return Vec::new();
            }
        };

        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let selected = items.into_iter().filter(|item| wanted.contains(item.id.as_str()));

        let resolved = selected.map(|item| async move {
            match item.kind {
                PinnedItemKind::TextSnippet => Some(PinnedEntry::Snippet {
                    description: item.description.unwrap_or_else(|| item.id.clone()),
                    text: item.content,
                }),
                PinnedItemKind::FilePath => {
                    self.fetch_file(&item.content).await.map(PinnedEntry::File)
                }
            }
        });
        join_all(resolved).await.into_iter().flatten().collect()
    }

    async fn resolve_search_hits(&self, request: &GatherRequest) -> Vec<SearchHit> {
        let cap = self.settings.max_search_results;
        let mut hits = if !request.search_hits.is_empty() {
            request.search_hits.clone()
        } else if let Some(search) = &self.search {
            match search.search(&request.user_query, cap).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(
                        provider = %search.name(),
                        error = %e,
                        "Vector search failed, continuing without hits"
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(cap);
        hits
    }
}

enum PinnedEntry {
    Snippet { description: String, text: String },
    File(Fetched),
}

/// `[timestamp] ROLE: content`, plus tool call and result lines.
pub fn format_turn(turn: &ConversationTurn) -> String {
    let mut out = format!(
        "[{}] {}: {}",
        turn.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        turn.role.label(),
        turn.content
    );
    if let Some(call) = &turn.tool_call {
        out.push_str(&format!("\nTool call: {}", call.render()));
    }
    if let Some(result) = &turn.tool_result {
        if result.is_failure() {
            let error = result.error.clone().unwrap_or_else(|| result.result_text());
            out.push_str(&format!("\nTool result: failed: {error}"));
        } else {
            out.push_str(&format!("\nTool result: success: {}", result.result_text()));
        }
    }
    out
}
