//! Voice identifier value object

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// A validated voice identifier
///
/// Built-in voices carry human-readable names (e.g. "ama", "kofi"); voices
/// created by cloning get a minted identifier with a UUID suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoiceId {
    value: String,
}

impl VoiceId {
    /// Create a voice id, validating the format
    ///
    /// Ids are non-empty and restricted to ASCII alphanumerics, `-` and `_`.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(DomainError::InvalidVoiceId("empty".to_string()));
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidVoiceId(value));
        }

        Ok(Self { value })
    }

    /// Mint a fresh id for a cloned voice
    pub fn minted() -> Self {
        Self {
            value: format!("cloned-{}", Uuid::new_v4()),
        }
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Whether this id was minted for a cloned voice
    pub fn is_cloned(&self) -> bool {
        self.value.starts_with("cloned-")
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl TryFrom<String> for VoiceId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for VoiceId {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VoiceId> for String {
    fn from(id: VoiceId) -> Self {
        id.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_voice_is_accepted() {
        let id = VoiceId::new("ama").unwrap();
        assert_eq!(id.as_str(), "ama");
        assert!(!id.is_cloned());
    }

    #[test]
    fn empty_id_is_rejected() {
        assert!(VoiceId::new("  ").is_err());
    }

    #[test]
    fn id_with_spaces_is_rejected() {
        assert!(VoiceId::new("two words").is_err());
    }

    #[test]
    fn minted_ids_are_unique_and_cloned() {
        let a = VoiceId::minted();
        let b = VoiceId::minted();
        assert_ne!(a, b);
        assert!(a.is_cloned());
    }

    #[test]
    fn minted_id_round_trips_through_validation() {
        let minted = VoiceId::minted();
        let parsed = VoiceId::new(minted.as_str()).unwrap();
        assert_eq!(minted, parsed);
    }
}
