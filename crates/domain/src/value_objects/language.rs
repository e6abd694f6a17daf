//! Language value object
//!
//! Kasa speaks a fixed set of West African languages. A `Language` is a
//! validated lowercase tag from that set.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// The language tags Kasa can synthesize
const SUPPORTED: &[&str] = &["twi", "yoruba", "hausa", "igbo", "ewe", "ga"];

/// A validated language tag (e.g. "twi", "yoruba")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language {
    tag: String,
}

impl Language {
    /// Create a language from a tag, validating against the supported set
    ///
    /// Tags are normalized to lowercase and trimmed before validation.
    pub fn new(tag: impl Into<String>) -> Result<Self, DomainError> {
        let tag = tag.into().trim().to_lowercase();

        if !SUPPORTED.contains(&tag.as_str()) {
            return Err(DomainError::UnsupportedLanguage(tag));
        }

        Ok(Self { tag })
    }

    /// Get the normalized tag
    pub fn as_str(&self) -> &str {
        &self.tag
    }

    /// All supported language tags
    pub fn supported() -> impl Iterator<Item = &'static str> {
        SUPPORTED.iter().copied()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)
    }
}

impl TryFrom<String> for Language {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Language {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.tag
    }
}
