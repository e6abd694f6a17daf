//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// Language tag is not one of the supported languages
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Voice identifier is empty or malformed
    #[error("Invalid voice id: {0}")]
    InvalidVoiceId(String),

    /// Phrase text is empty after normalization
    #[error("Empty phrase")]
    EmptyPhrase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_language_message() {
        let err = DomainError::UnsupportedLanguage("klingon".to_string());
        assert_eq!(err.to_string(), "Unsupported language: klingon");
    }

    #[test]
    fn invalid_voice_id_message() {
        let err = DomainError::InvalidVoiceId("has spaces".to_string());
        assert_eq!(err.to_string(), "Invalid voice id: has spaces");
    }

    #[test]
    fn empty_phrase_message() {
        assert_eq!(DomainError::EmptyPhrase.to_string(), "Empty phrase");
    }
}
