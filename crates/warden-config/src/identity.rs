//! Ownership and permission settings applied to a rewritten document.

use thiserror::Error;

/// Configured owner, group and mode for the managed document.
///
/// Unset fields leave the corresponding attribute as the previous file had
/// it. Name resolution happens in the engine, which falls back to `root`
/// when a configured name is unknown on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentIdentity {
    owner: Option<String>,
    group: Option<String>,
    mode: Option<u32>,
}

impl DocumentIdentity {
    /// Builds an identity, parsing `mode` as octal permission bits.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidMode`] when `mode` is not octal or
    /// sets bits above `0o7777`.
    pub fn new(
        owner: Option<String>,
        group: Option<String>,
        mode: Option<&str>,
    ) -> Result<Self, IdentityError> {
        let parsed = mode.map(parse_mode).transpose()?;
        Ok(Self {
            owner,
            group,
            mode: parsed,
        })
    }

    /// Configured owner name.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Configured group name.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Configured permission bits.
    #[must_use]
    pub const fn mode(&self) -> Option<u32> {
        self.mode
    }

    /// Returns `true` when no attribute is configured.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        self.owner.is_none() && self.group.is_none() && self.mode.is_none()
    }
}

fn parse_mode(text: &str) -> Result<u32, IdentityError> {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
    match u32::from_str_radix(digits, 8) {
        Ok(bits) if bits <= 0o7777 => Ok(bits),
        _ => Err(IdentityError::InvalidMode {
            value: text.to_owned(),
        }),
    }
}

/// Errors raised while interpreting identity settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The configured mode was not an octal permission value.
    #[error("document mode '{value}' is not an octal permission value")]
    InvalidMode {
        /// Mode as configured.
        value: String,
    },
}
