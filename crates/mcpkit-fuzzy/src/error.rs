//! Error types for fuzzy matching

use thiserror::Error;

/// Errors that can occur when constructing a matcher.
///
/// Matching itself never fails; malformed input yields empty results.
#[derive(Debug, Error)]
pub enum FuzzyError {
    /// Configuration value out of range
    #[error("Invalid fuzzy configuration: {0}")]
    InvalidConfig(String),

    /// Typo rule that cannot be used
    #[error("Invalid typo rule {misspelling:?} -> {correction:?}")]
    InvalidRule {
        misspelling: String,
        correction: String,
    },
}

/// Result type for fuzzy operations
pub type Result<T> = std::result::Result<T, FuzzyError>;
