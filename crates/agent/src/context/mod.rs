//! Prompt context pipeline.
//!
//! Turns a request's raw references into one budget-respecting prompt.
//!
//! | Tier | Source | Truncation |
//! |------|--------|------------|
//! | 0 | System prompt | Never |
//! | 1 | Self-correction directive | Keep start |
//! | 2 | User query | Never |
//! | 3 | Explicit files and folders | Head and tail |
//! | 4 | Pinned snippets and files | Keep start / head and tail |
//! | 5 | Recent conversation, newest first | Keep end |
//! | 6 | Search hits, best score first | Keep start |
//! | 7 | Implicitly focused file | Head and tail |

pub mod assembler;
pub mod gatherer;
pub mod item;
pub mod token;
pub mod truncate;

pub use assembler::{
    ASSEMBLY_FAILURE_MARKER, AssembledPrompt, AssemblyError, AssemblySettings, ContextAssembler,
    PromptSegment,
};
pub use gatherer::{ContextGatherer, GatherRequest, GatherSettings};
pub use item::{ContextSourceItem, Priority, SourceKind};
pub use token::{
    Confidence, CountMethod, Encoding, ModelProfile, ModelProvider, ModelRegistry, TokenCount,
    Tokenizer, TokenizerError,
};
pub use truncate::TruncationStrategy;
