//! Model error types.

use catalog::CatalogError;
use thiserror::Error;

/// Errors from model training, inference, and persistence
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model has not been trained yet
    #[error("model is not ready; train it first")]
    NotReady,

    /// Training ran but could not produce a usable model
    #[error("training failed: {0}")]
    Training(String),

    /// A persisted artifact was trained against a different catalog
    #[error("stale artifact: catalog fingerprint {found:#018x} does not match {expected:#018x}")]
    Stale { expected: u64, found: u64 },

    /// A loaded artifact is internally inconsistent
    #[error("artifact shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Upstream data-integrity failure
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Artifact file could not be read or written
    #[error("artifact io: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact could not be encoded or decoded
    #[error("artifact encoding: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Convenience Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
