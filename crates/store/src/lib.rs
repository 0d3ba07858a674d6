//! Collaborator implementations for CodeSage.
//!
//! The engine only sees the traits in `codesage-core`; these backends cover
//! tests, the CLI, and small single-process deployments.

pub mod fs;
pub mod in_memory;
pub mod keyword;
pub mod path;

pub use fs::FsContentStore;
pub use in_memory::{InMemoryContentStore, InMemoryPinnedStore};
pub use keyword::KeywordSearchProvider;
pub use path::{PathValidationError, validate_relative_path};
