//! Value objects for the Kasa domain

pub mod language;
pub mod phrase_key;
pub mod voice_id;

pub use language::Language;
pub use phrase_key::PhraseKey;
pub use voice_id::VoiceId;
