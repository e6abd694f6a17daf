//! Phrase cache key value object

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::Language;

/// A normalized (text, language) pair identifying a cached phrase
///
/// Text is trimmed so that "Akwaaba" and " Akwaaba " resolve to the same
/// cache entry; the original casing is preserved because it can matter for
/// synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhraseKey {
    text: String,
    language: Language,
}

impl PhraseKey {
    /// Create a phrase key from text and language
    pub fn new(text: impl Into<String>, language: Language) -> Result<Self, DomainError> {
        let text = text.into().trim().to_string();

        if text.is_empty() {
            return Err(DomainError::EmptyPhrase);
        }

        Ok(Self { text, language })
    }

    /// The normalized phrase text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The phrase language
    pub fn language(&self) -> &Language {
        &self.language
    }
}

impl fmt::Display for PhraseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.language, self.text)
    }
}
