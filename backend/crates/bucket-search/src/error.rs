//! Recoverable errors raised while configuring a search index.
//!
//! Violations of the index's own invariants (out-of-bounds queries, slot
//! counts that disagree with the container, broken chains) are programmer
//! errors and panic instead.

use thiserror::Error;

/// Result type for configuration operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Error types for building a search index
#[derive(Error, Debug)]
pub enum SearchError {
    /// Domain bounds that are not finite or not strictly increasing
    #[error("Invalid bounds on axis {axis}: min {min} must be finite and less than max {max}")]
    InvalidBounds {
        /// Offending axis
        axis: usize,
        /// Lower bound given
        min: f64,
        /// Upper bound given
        max: f64,
    },

    /// Requested bucket side length is not usable
    #[error("Bucket side length must be finite and positive, got {0}")]
    InvalidSideLength(f64),

    /// A per-axis configuration value has the wrong number of entries
    #[error("Dimension mismatch in {field}: expected {expected} values, got {found}")]
    DimensionMismatch {
        /// Configuration field with the wrong length
        field: &'static str,
        /// Dimension of the index being built
        expected: usize,
        /// Number of values supplied
        found: usize,
    },

    /// Any other configuration problem
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file is not valid JSON for [`crate::SearchConfig`]
    #[error("JSON parsing error: {0}")]
    Json(String),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Json(err.to_string())
    }
}
