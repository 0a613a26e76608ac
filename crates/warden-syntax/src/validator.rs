//! Structural integrity checks for configuration documents.
//!
//! The validator runs before and after every mutating stage. Only brace
//! balance and minimum size are fatal; a missing listener block is reported
//! as a warning because the document may legitimately be mid-edit.

use crate::document::ConfigDocument;
use crate::error::StructuralError;
use crate::scanner::{BlockFilter, BlockPattern};

/// Non-fatal observation produced by a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// No top-level block introduced by the listener keyword was found.
    NoListener {
        /// Keyword that was searched for.
        keyword: String,
    },
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoListener { keyword } => write!(f, "no `{keyword}` block found"),
        }
    }
}

/// Result of a passing validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    bytes: usize,
    lines: usize,
    warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// Byte length of the validated document.
    #[must_use]
    pub const fn bytes(&self) -> usize {
        self.bytes
    }

    /// Line count of the validated document.
    #[must_use]
    pub const fn lines(&self) -> usize {
        self.lines
    }

    /// Soft-check warnings.
    #[must_use]
    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }
}

/// Checks brace balance, minimum size and listener presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityValidator {
    min_bytes: usize,
    listener: BlockFilter,
    listener_keyword: String,
}

impl IntegrityValidator {
    /// Builds a validator with a byte floor and listener keyword.
    #[must_use]
    pub fn new(min_bytes: usize, listener_keyword: impl Into<String>) -> Self {
        let keyword = listener_keyword.into();
        Self {
            min_bytes,
            listener: BlockFilter::header(BlockPattern::keyword(keyword.clone())),
            listener_keyword: keyword,
        }
    }

    /// Minimum accepted byte length.
    #[must_use]
    pub const fn min_bytes(&self) -> usize {
        self.min_bytes
    }

    /// Validates a document, short-circuiting on the first fatal check.
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError::BraceImbalance`] when `{` and `}` counts
    /// differ and [`StructuralError::Undersized`] when the document is below
    /// the byte floor.
    pub fn validate(&self, document: &ConfigDocument) -> Result<ValidationReport, StructuralError> {
        let (opening, closing) = count_braces(document);
        if opening != closing {
            return Err(StructuralError::brace_imbalance(opening, closing));
        }

        let bytes = document.byte_len();
        if bytes < self.min_bytes {
            return Err(StructuralError::undersized(bytes, self.min_bytes));
        }

        let mut warnings = Vec::new();
        if document.scan(&self.listener).next().is_none() {
            warnings.push(ValidationWarning::NoListener {
                keyword: self.listener_keyword.clone(),
            });
        }

        Ok(ValidationReport {
            bytes,
            lines: document.line_count(),
            warnings,
        })
    }
}

fn count_braces(document: &ConfigDocument) -> (usize, usize) {
    document
        .lines()
        .flat_map(str::chars)
        .fold((0, 0), |(opening, closing), ch| match ch {
            '{' => (opening + 1, closing),
            '}' => (opening, closing + 1),
            _ => (opening, closing),
        })
}
