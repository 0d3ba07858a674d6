//! In-memory backends: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use codesage_core::error::StoreError;
use codesage_core::store::{ContentStore, PinnedItem, PinnedItemStore};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::path::validate_relative_path;

/// A content store holding project files in a sorted map.
///
/// Paths registered with [`fail_on`](Self::fail_on) return a backend error
/// on every read, which lets callers exercise partial-failure handling.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentStore {
    files: BTreeMap<String, String>,
    failing: BTreeSet<String>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_file(mut self, path: &str, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Insert or replace a file. Invalid paths are ignored.
    pub fn insert(&mut self, path: &str, content: impl Into<String>) {
        if let Ok(clean) = validate_relative_path(path) {
            self.files.insert(clean, content.into());
        }
    }

    /// Make every read of `path` fail with a backend error.
    pub fn fail_on(mut self, path: &str) -> Self {
        if let Ok(clean) = validate_relative_path(path) {
            self.failing.insert(clean);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, path: &str) -> Result<Option<String>, StoreError> {
        let clean = validate_relative_path(path)?;
        if self.failing.contains(&clean) {
            return Err(StoreError::Backend(format!("simulated failure reading '{clean}'")));
        }
        Ok(self.files.get(&clean).cloned())
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let clean = validate_relative_path(prefix)?;
        let dir_prefix = if clean.is_empty() {
            String::new()
        } else {
            format!("{clean}/")
        };

        Ok(self
            .files
            .keys()
            .filter(|p| p.starts_with(&dir_prefix))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Pinned items keyed by project id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPinnedStore {
    projects: HashMap<String, Vec<PinnedItem>>,
}

impl InMemoryPinnedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style pin.
    pub fn with_item(mut self, project_id: &str, item: PinnedItem) -> Self {
        self.pin(project_id, item);
        self
    }

    /// Pin an item, replacing an existing one with the same id.
    pub fn pin(&mut self, project_id: &str, item: PinnedItem) {
        let items = self.projects.entry(project_id.to_string()).or_default();
        items.retain(|existing| existing.id != item.id);
        items.push(item);
    }
}

#[async_trait]
impl PinnedItemStore for InMemoryPinnedStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn list(&self, project_id: &str) -> Result<Vec<PinnedItem>, StoreError> {
        Ok(self.projects.get(project_id).cloned().unwrap_or_default())
    }
}
