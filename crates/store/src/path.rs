//! Path validation: keeps store lookups inside the project root.
//!
//! Store paths are project-relative, `/`-separated strings. A leading `/` or
//! `./` is tolerated and stripped; parent-directory components are rejected.

use codesage_core::error::StoreError;

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Absolute drive path not allowed: '{path}'")]
    DrivePath { path: String },
}

impl From<PathValidationError> for StoreError {
    fn from(err: PathValidationError) -> Self {
        let path = match &err {
            PathValidationError::PathTraversal { path }
            | PathValidationError::DrivePath { path } => path.clone(),
        };
        StoreError::InvalidPath {
            path,
            reason: err.to_string(),
        }
    }
}

/// Normalize a project-relative path and reject anything escaping the root.
///
/// Returns the cleaned path (no leading `/`, no `.` components, `/` separators).
/// The empty string denotes the project root.
pub fn validate_relative_path(path: &str) -> Result<String, PathValidationError> {
    let unified = path.replace('\\', "/");

    if unified.len() >= 2 && unified.as_bytes()[1] == b':' {
        return Err(PathValidationError::DrivePath { path: path.into() });
    }

    let mut parts = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => continue,
            ".." => return Err(PathValidationError::PathTraversal { path: path.into() }),
            other => parts.push(other),
        }
    }

    Ok(parts.join("/"))
}
