//! SHA-256 fingerprints of whole documents.

use std::fmt;
use std::fs;
use std::io;

use camino::Utf8Path;
use sha2::{Digest, Sha256};
use warden_syntax::ConfigDocument;

use crate::commit;
use crate::error::EngineError;

/// Lowercase hex SHA-256 digest of a document's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints raw bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Fingerprints a document as it would be written to disk.
    #[must_use]
    pub fn of_document(document: &ConfigDocument) -> Self {
        Self::of_bytes(document.render().as_bytes())
    }

    /// Fingerprints the current content of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Read`] when the file cannot be read.
    pub fn of_file(path: &Utf8Path) -> Result<Self, EngineError> {
        let bytes = fs::read(path).map_err(|source| EngineError::read(path, source))?;
        Ok(Self::of_bytes(&bytes))
    }

    /// Reads a stored fingerprint; a missing or empty file yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Read`] for failures other than absence.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>, EngineError> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let digest = text.trim();
                Ok((!digest.is_empty()).then(|| Self(digest.to_owned())))
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(EngineError::read(path, source)),
        }
    }

    /// Stores the fingerprint as a single line, replacing the file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Write`] when the file cannot be written.
    pub fn store(&self, path: &Utf8Path) -> Result<(), EngineError> {
        commit::write_atomic(path, &format!("{}\n", self.0))
    }

    /// Hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
