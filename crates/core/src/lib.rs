//! # CodeSage Core
//!
//! Domain types, collaborator traits, and error definitions for the CodeSage
//! codebase-reasoning engine. This crate depends on **no other workspace crate**; it
//! defines the model that the agent, store and CLI crates implement against.
//!
//! ## Collaborators
//!
//! Everything outside the prompt-assembly core is a trait here:
//! - [`ContentStore`]: uploaded project files
//! - [`PinnedItemStore`]: user-pinned snippets and files
//! - [`VectorSearchProvider`]: ranked semantic search hits
//! - [`ReasoningProvider`]: the LLM completion endpoint
//!
//! Implementations live in `codesage-store` or in the embedding application.

pub mod error;
pub mod provider;
pub mod store;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, StoreError};
pub use provider::{ReasoningProvider, SamplingParams};
pub use store::{
    ContentStore, PinnedItem, PinnedItemKind, PinnedItemStore, SearchHit, VectorSearchProvider,
};
pub use tool::{ToolCatalog, ToolParameter, ToolSpec};
pub use turn::{ConversationTurn, ToolCallRequest, ToolOutcome, TurnRole};
