//! Crate error types

use thiserror::Error;

/// Errors produced by the model, decoding, and reward-estimation layers.
///
/// Shape violations are precondition failures: callers are expected to
/// treat them as fatal rather than retry.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("token id {0} outside the extended vocabulary")]
    UnknownTokenId(u32),
}

impl ModelError {
    /// Build a `ShapeMismatch` from anything displayable.
    pub fn shape(
        context: &'static str,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::ShapeMismatch {
            context,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
