//! Storage and search collaborator traits.
//!
//! The context gatherer resolves file references, pinned items and search
//! hits through these traits. Every lookup is read-only and side-effect free,
//! so callers may issue them concurrently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Read access to the uploaded project files.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "filesystem").
    fn name(&self) -> &str;

    /// Fetch a file's text. `Ok(None)` means the path does not exist.
    async fn get(&self, path: &str) -> Result<Option<String>, StoreError>;

    /// List file paths under `prefix`, at most `limit` entries, in a stable order.
    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, StoreError>;
}

/// The kind of a pinned item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinnedItemKind {
    /// Free text pinned by the user; `content` is the snippet itself.
    TextSnippet,
    /// A pinned file; `content` is the path.
    FilePath,
}

/// An item the user pinned to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedItem {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: PinnedItemKind,

    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Read access to per-project pinned items.
#[async_trait]
pub trait PinnedItemStore: Send + Sync {
    fn name(&self) -> &str;

    /// All pinned items for a project, in the store's order.
    async fn list(&self, project_id: &str) -> Result<Vec<PinnedItem>, StoreError>;
}

/// A single ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// File the snippet came from
    pub path: String,

    /// Inclusive 1-based line range `(start, end)`
    pub line_range: (usize, usize),

    /// Similarity score, higher is better
    pub score: f32,

    pub snippet: String,
}

/// Semantic (or lexical) search over the project.
#[async_trait]
pub trait VectorSearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, StoreError>;
}
