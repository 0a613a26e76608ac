//! Structural analysis for brace-nested web server configuration files.
//!
//! The managed configuration format is line oriented: directives are
//! `key value` lines and blocks are introduced by `keyword [token] {` and
//! closed by a matching `}`. This crate understands exactly that much
//! structure and nothing more. It provides:
//!
//! - **Document model** via [`ConfigDocument`], an ordered line sequence with
//!   1-based addressing that renders back to the exact input bytes.
//! - **Structural scanning** via [`BlockScanner`], a single-pass
//!   depth-tracking scan yielding top-level [`BlockRange`] values for a
//!   header pattern or an in-block attribute predicate.
//! - **Integrity validation** via [`IntegrityValidator`], the brace balance
//!   and minimum size checks run before and after every mutation.
//!
//! # Example: Scanning for blocks
//!
//! ```
//! use warden_syntax::{AttributePattern, BlockFilter, BlockPattern, ConfigDocument};
//!
//! let document = ConfigDocument::parse(
//!     "listener Default {\n  address *:80\n}\nlistener SSL {\n  secure 1\n}\n",
//! );
//! let filter = BlockFilter::attribute(AttributePattern::new("secure", "1"))
//!     .within(BlockPattern::keyword("listener"));
//!
//! let ranges: Vec<_> = document.scan(&filter).collect();
//! assert_eq!(ranges.len(), 1);
//! assert_eq!(ranges[0].start(), 4);
//! ```
//!
//! # Example: Validating a document
//!
//! ```
//! use warden_syntax::{ConfigDocument, IntegrityValidator};
//!
//! let validator = IntegrityValidator::new(8, "listener");
//! let broken = ConfigDocument::parse("tuning {\n  maxConnections 10\n");
//! assert!(validator.validate(&broken).is_err());
//! ```

mod directive;
mod document;
mod error;
mod scanner;
mod validator;

pub use directive::{Directive, brace_delta, first_token};
pub use document::ConfigDocument;
pub use error::StructuralError;
pub use scanner::{AttributePattern, BlockFilter, BlockPattern, BlockRange, BlockScanner};
pub use validator::{IntegrityValidator, ValidationReport, ValidationWarning};

#[cfg(test)]
mod tests;
