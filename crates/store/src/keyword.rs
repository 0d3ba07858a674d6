//! Keyword search: a lexical stand-in for a vector index.
//!
//! Files are split into fixed line windows; each window is scored by the share
//! of query terms it contains plus a damped occurrence count. Good enough for
//! offline use and tests, where no embedding service is available.

use async_trait::async_trait;
use codesage_core::error::StoreError;
use codesage_core::store::{ContentStore, SearchHit, VectorSearchProvider};
use std::sync::Arc;
use tracing::{debug, warn};

const WINDOW_LINES: usize = 20;
const MAX_FILES: usize = 500;

/// Lexical search over a [`ContentStore`].
pub struct KeywordSearchProvider {
    store: Arc<dyn ContentStore>,
    window_lines: usize,
    max_files: usize,
}

impl KeywordSearchProvider {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            window_lines: WINDOW_LINES,
            max_files: MAX_FILES,
        }
    }

    pub fn with_window_lines(mut self, lines: usize) -> Self {
        self.window_lines = lines.max(1);
        self
    }

    pub fn with_max_files(mut self, max: usize) -> Self {
        self.max_files = max;
        self
    }
}

fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Score a window of text against lower-cased terms. Zero means no match.
fn score_window(window: &str, terms: &[String]) -> f32 {
    let lower = window.to_lowercase();
    let mut matched = 0usize;
    let mut occurrences = 0usize;
    for term in terms {
        let n = lower.matches(term.as_str()).count();
        if n > 0 {
            matched += 1;
            occurrences += n;
        }
    }
    if matched == 0 {
        return 0.0;
    }
    let coverage = matched as f32 / terms.len() as f32;
    let density = occurrences as f32 / (occurrences as f32 + 5.0);
    coverage * 0.7 + density * 0.3
}

#[async_trait]
impl VectorSearchProvider for KeywordSearchProvider {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, StoreError> {
        let terms = query_terms(query);
        if terms.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let paths = self.store.list("", self.max_files).await?;
        let mut hits = Vec::new();

        for path in paths {
            let content = match self.store.get(&path).await {
                Ok(Some(c)) => c,
                Ok(None) => continue,
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping unreadable file during search");
                    continue;
                }
            };

            let lines: Vec<&str> = content.lines().collect();
            for (i, chunk) in lines.chunks(self.window_lines).enumerate() {
                let snippet = chunk.join("\n");
                let score = score_window(&snippet, &terms);
                if score > 0.0 {
                    let start = i * self.window_lines + 1;
                    hits.push(SearchHit {
                        path: path.clone(),
                        line_range: (start, start + chunk.len() - 1),
                        score,
                        snippet,
                    });
                }
            }
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        debug!(query = %query, hits = hits.len(), "Keyword search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryContentStore;

    fn provider() -> KeywordSearchProvider {
        let store = InMemoryContentStore::new()
            .with_file(
                "src/auth.rs",
                "pub fn login(user: &str) -> Token {\n    validate_token(user)\n}\n",
            )
            .with_file("src/db.rs", "pub fn connect() -> Pool {\n    Pool::new()\n}\n")
            .with_file("README.md", "Login flow uses a token cache.");
        KeywordSearchProvider::new(Arc::new(store))
    }

    #[tokio::test]
    async fn ranks_fuller_matches_first() {
        let hits = provider().search("login token", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits.iter().all(|h| h.path != "src/db.rs"));
    }

    #[tokio::test]
    async fn reports_line_ranges() {
        let provider = provider().with_window_lines(1);
        let hits = provider.search("validate_token", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "src/auth.rs");
        assert_eq!(hits[0].line_range, (2, 2));
    }

    #[tokio::test]
    async fn respects_top_k_and_empty_query() {
        let provider = provider();
        assert_eq!(provider.search("login token", 1).await.unwrap().len(), 1);
        assert!(provider.search("  ", 5).await.unwrap().is_empty());
        assert!(provider.search("nothingmatches", 5).await.unwrap().is_empty());
    }

    #[test]
    fn coverage_dominates_score() {
        let terms = query_terms("alpha beta");
        let both = score_window("alpha beta", &terms);
        let one_repeated = score_window("alpha alpha alpha alpha", &terms);
        assert!(both > one_repeated);
    }
}
