//! Filesystem content store: serves an extracted project directory.
//!
//! Paths are resolved relative to the project root and validated before
//! touching the disk. Listing walks the tree depth-first in sorted order and
//! skips hidden entries and common build/vendor directories.

use async_trait::async_trait;
use codesage_core::error::StoreError;
use codesage_core::store::ContentStore;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::path::validate_relative_path;

/// Directory names never descended into while listing.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "__pycache__", "dist", "build"];

/// A content store backed by a local directory.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Create a store rooted at an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(StoreError::NotFound(format!(
                "project root '{}' is not a directory",
                root.display()
            )));
        }
        debug!(root = %root.display(), "Filesystem content store opened");
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<(String, PathBuf), StoreError> {
        let clean = validate_relative_path(path)?;
        let full = if clean.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&clean)
        };
        Ok((clean, full))
    }

    fn is_skipped(name: &str) -> bool {
        name.starts_with('.') || SKIPPED_DIRS.contains(&name)
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn get(&self, path: &str) -> Result<Option<String>, StoreError> {
        let (clean, full) = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::ReadFailed {
                    path: clean,
                    reason: e.to_string(),
                });
            }
        }

        tokio::fs::read_to_string(&full)
            .await
            .map(Some)
            .map_err(|e| StoreError::ReadFailed {
                path: clean,
                reason: e.to_string(),
            })
    }

    async fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let (clean, start) = self.resolve(prefix)?;
        let mut out = Vec::new();
        if limit == 0 || !start.is_dir() {
            return Ok(out);
        }

        // Depth-first, sorted. The stack holds directories still to visit,
        // pushed in reverse so the smallest name is popped first.
        let mut stack: Vec<(String, PathBuf)> = vec![(clean, start)];
        while let Some((rel_dir, dir)) = stack.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir).await.map_err(|e| StoreError::ReadFailed {
                path: rel_dir.clone(),
                reason: e.to_string(),
            })?;

            let mut files = Vec::new();
            let mut subdirs = Vec::new();
            while let Some(entry) = read_dir.next_entry().await.map_err(|e| StoreError::ReadFailed {
                path: rel_dir.clone(),
                reason: e.to_string(),
            })? {
                let name = entry.file_name().to_string_lossy().to_string();
                if Self::is_skipped(&name) {
                    continue;
                }
                let rel = if rel_dir.is_empty() {
                    name.clone()
                } else {
                    format!("{rel_dir}/{name}")
                };
                match entry.file_type().await {
                    Ok(ft) if ft.is_dir() => subdirs.push((rel, entry.path())),
                    Ok(ft) if ft.is_file() => files.push(rel),
                    _ => {}
                }
            }

            files.sort();
            for file in files {
                out.push(file);
                if out.len() >= limit {
                    return Ok(out);
                }
            }

            subdirs.sort_by(|a, b| b.0.cmp(&a.0));
            stack.extend(subdirs);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/util")).unwrap();
        std::fs::create_dir_all(root.join("target/debug")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(root.join("src/lib.rs"), "pub mod util;\n").unwrap();
        std::fs::write(root.join("src/util/mod.rs"), "pub fn helper() {}\n").unwrap();
        std::fs::write(root.join("target/debug/out.bin"), "binary").unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref").unwrap();
        std::fs::write(root.join("Cargo.toml"), "[package]\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_files_relative_to_root() {
        let dir = project();
        let store = FsContentStore::new(dir.path()).unwrap();
        let content = store.get("/src/main.rs").await.unwrap();
        assert_eq!(content.as_deref(), Some("fn main() {}\n"));
    }

    #[tokio::test]
    async fn missing_file_and_directory_are_none() {
        let dir = project();
        let store = FsContentStore::new(dir.path()).unwrap();
        assert!(store.get("src/nope.rs").await.unwrap().is_none());
        assert!(store.get("src").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_sorted_depth_first_and_skips_ignored() {
        let dir = project();
        let store = FsContentStore::new(dir.path()).unwrap();
        let all = store.list("", 100).await.unwrap();
        assert_eq!(
            all,
            vec!["Cargo.toml", "src/lib.rs", "src/main.rs", "src/util/mod.rs"]
        );
    }

    #[tokio::test]
    async fn list_honours_limit_and_prefix() {
        let dir = project();
        let store = FsContentStore::new(dir.path()).unwrap();
        assert_eq!(store.list("src", 2).await.unwrap(), vec!["src/lib.rs", "src/main.rs"]);
        assert_eq!(store.list("src/util/", 10).await.unwrap(), vec!["src/util/mod.rs"]);
        assert!(store.list("docs", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn traversal_blocked() {
        let dir = project();
        let store = FsContentStore::new(dir.path()).unwrap();
        let err = store.get("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath { .. }));
    }

    #[test]
    fn root_must_exist() {
        assert!(FsContentStore::new("/nonexistent/codesage/project").is_err());
    }
}
