//! Speech subsystem errors

use thiserror::Error;

/// Errors that can occur across the speech-synthesis client
#[derive(Debug, Error)]
pub enum SpeechError {
    /// An engine operation was attempted before `initialize()` succeeded
    #[error("Engine not initialized")]
    EngineNotInitialized,

    /// The isolated computation context crashed; pending work was discarded
    #[error("Execution context lost: {0}")]
    ExecutionContextLost(String),

    /// A request to the computation context did not answer in time
    #[error("Request timed out after {0}ms")]
    RequestTimeout(u64),

    /// The requested voice is not known to the engine
    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    /// The remote synthesis service could not be reached or failed
    #[error("Remote synthesis unavailable: {0}")]
    RemoteUnavailable(String),

    /// Synthesis itself failed inside an otherwise healthy tier
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    /// An audio container could not be decoded
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// A sample buffer could not be encoded
    #[error("Encode failure: {0}")]
    EncodeFailure(String),

    /// A cache payload exceeds the per-entry byte cap
    #[error("Cache entry too large: {size} bytes exceeds maximum of {max}")]
    CacheEntryTooLarge {
        /// Size of the rejected payload
        size: usize,
        /// Configured per-entry cap
        max: usize,
    },

    /// Cache metadata store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// The playback sink rejected or aborted playback
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Every synthesis tier was exhausted; the only user-visible failure
    #[error("Speech unavailable")]
    Unavailable,
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::RequestTimeout(30000)
        } else {
            Self::RemoteUnavailable(err.to_string())
        }
    }
}
