//! Ports for the speech subsystem
//!
//! Trait seams between the fallback orchestrator and the outside world:
//! the remote synthesis service, the platform's native voice, the audio
//! output device, and network reachability.

use async_trait::async_trait;
use domain::Language;

use crate::error::SpeechError;
use crate::types::{AudioData, SynthesisRequest};

/// Network speech-synthesis service
#[async_trait]
pub trait RemoteSynthesizer: Send + Sync {
    /// Synthesize a phrase and return encoded audio
    ///
    /// # Errors
    ///
    /// Returns `RemoteUnavailable` when the service cannot be reached and
    /// `SynthesisFailed` when it rejects the request.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioData, SpeechError>;
}

/// Platform-native text-to-speech
///
/// Output quality is below the on-device engine, so this tier is last in
/// the fallback chain and its results are never cached.
#[async_trait]
pub trait PlatformSynthesizer: Send + Sync {
    /// Synthesize a phrase with the platform voice
    ///
    /// # Errors
    ///
    /// Returns `SynthesisFailed` when the platform voice cannot render the
    /// phrase.
    async fn synthesize(&self, text: &str, language: &Language) -> Result<AudioData, SpeechError>;

    /// Whether the platform voice can speak this language at all
    fn supports(&self, language: &Language) -> bool;
}

/// Audio output device
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Play encoded audio to completion
    ///
    /// # Errors
    ///
    /// Returns `PlaybackFailed` when the device rejects or aborts the audio.
    async fn play(&self, audio: &AudioData) -> Result<(), SpeechError>;

    /// Stop whatever is currently playing
    ///
    /// # Errors
    ///
    /// Returns `PlaybackFailed` when the device cannot be stopped.
    async fn stop(&self) -> Result<(), SpeechError>;
}

/// Network reachability check
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Whether the remote service is worth attempting right now
    async fn is_online(&self) -> bool;
}
