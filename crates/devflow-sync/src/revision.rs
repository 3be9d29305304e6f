//! Content-addressed revision identifiers
//!
//! Provides [`RevisionId`], a validated full-length commit object name as
//! printed by `git rev-parse`. Both SHA-1 (40 hex chars) and SHA-256
//! (64 hex chars) object formats are accepted.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A canonical commit identifier (lowercase hex)
///
/// Unlike a branch or tag name this never moves, so two equal ids always
/// name the same tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RevisionId(String);

/// Lengths of a full object name for the SHA-1 and SHA-256 object formats
const OBJECT_NAME_LENGTHS: [usize; 2] = [40, 64];

impl RevisionId {
    /// Parse a full object name
    ///
    /// # Errors
    /// Returns error if the input is not 40 or 64 hex characters
    pub fn parse(s: &str) -> Result<Self, RevisionIdError> {
        let s = s.trim();
        if !OBJECT_NAME_LENGTHS.contains(&s.len()) {
            return Err(RevisionIdError::InvalidLength(s.len()));
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(RevisionIdError::InvalidCharacter(c));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Whether `reference` is already spelled as a full object name
    #[inline]
    #[must_use]
    pub fn looks_like(reference: &str) -> bool {
        Self::parse(reference).is_ok()
    }

    /// Full hex string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in console output (first 12 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl Display for RevisionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RevisionId {
    type Err = RevisionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RevisionId {
    type Error = RevisionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RevisionId> for String {
    fn from(value: RevisionId) -> Self {
        value.0
    }
}

impl AsRef<str> for RevisionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Revision id parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevisionIdError {
    /// Not a full-length object name
    #[error("invalid object name length: expected 40 or 64, got {0}")]
    InvalidLength(usize),

    /// Non-hex character
    #[error("invalid character in object name: {0:?}")]
    InvalidCharacter(char),
}
