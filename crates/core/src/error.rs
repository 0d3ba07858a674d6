//! Error types for the CodeSage domain.
//!
//! Each collaborator boundary has its own `thiserror` enum. Nothing here
//! crosses the engine boundary as `Err`: provider failures become an error
//! step, store failures an omitted item.

use thiserror::Error;

/// Failures reported by a [`ReasoningProvider`](crate::provider::ReasoningProvider).
///
/// The engine never propagates these as `Err`; they surface as a step
/// result with `status = error` and the rendered message.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned an empty completion")]
    EmptyResponse,
}

/// Failures reported by content, pinned-item and search collaborators.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Read failed for '{path}': {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Backend unavailable: {0}")]
    Backend(String),
}
