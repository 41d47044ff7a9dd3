//! Error taxonomy for the indexing and query pipelines.
//!
//! Every pipeline boundary returns [`Result`] with a [`RagError`] variant
//! that names the failing stage, so callers can tell provider failures
//! (embedding, generation) apart from structural ones (unsupported format,
//! empty input).

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// File type is not recognized and its bytes are not readable as text.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Reading or parsing a document failed.
    #[error("Failed to extract '{path}': {message}")]
    Extraction { path: String, message: String },

    /// Chunking produced nothing (blank or whitespace-only document).
    #[error("No text chunks generated from '{0}'")]
    EmptyInput(String),

    /// The vector index has not received its first document yet.
    #[error("Vector index is not initialized; upload documents first")]
    IndexNotReady,

    /// The generative model call failed (auth, quota, network, deadline).
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The embedding provider failed.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Invalid or missing configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub fn extraction(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// True for failures of an external provider that may succeed on a
    /// later attempt. Structural failures (format, empty input, config)
    /// will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::Generation(_) | RagError::Embedding(_) | RagError::Storage(_)
        )
    }
}
