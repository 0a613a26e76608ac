//! Error types for structural validation.

use thiserror::Error;

/// Structural corruption detected by the [`crate::IntegrityValidator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StructuralError {
    /// Opening and closing brace counts differ.
    #[error("brace imbalance: {opening} opening vs {closing} closing")]
    BraceImbalance {
        /// Number of `{` characters.
        opening: usize,
        /// Number of `}` characters.
        closing: usize,
    },

    /// The document is smaller than the configured floor.
    #[error("document too small: {bytes} bytes, minimum is {minimum}")]
    Undersized {
        /// Actual byte length.
        bytes: usize,
        /// Required minimum byte length.
        minimum: usize,
    },
}

impl StructuralError {
    /// Creates a brace imbalance error.
    #[must_use]
    pub const fn brace_imbalance(opening: usize, closing: usize) -> Self {
        Self::BraceImbalance { opening, closing }
    }

    /// Creates an undersized document error.
    #[must_use]
    pub const fn undersized(bytes: usize, minimum: usize) -> Self {
        Self::Undersized { bytes, minimum }
    }
}
