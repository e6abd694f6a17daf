//! Fallback orchestrator
//!
//! Drives one phrase through the tiered synthesis chain: the remote service,
//! the phrase cache, the on-device engine, then the platform voice. Each
//! tier failure advances a state machine; only full exhaustion surfaces as
//! "speech unavailable". Offline devices skip straight to the cache tier,
//! and platform output is never cached because its quality is below the
//! other tiers.

use std::sync::Arc;

use domain::PhraseKey;
use tracing::{debug, info, instrument, warn};

use crate::cache::PhraseCache;
use crate::codec::encode_wav;
use crate::config::DspConfig;
use crate::dsp::PostProcessor;
use crate::engine::SynthesisEngine;
use crate::error::SpeechError;
use crate::ports::{ConnectivityProbe, PlatformSynthesizer, PlaybackSink, RemoteSynthesizer};
use crate::types::{AudioData, AudioFormat, SynthesisRequest};

/// Synthesis tier that produced audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechTier {
    /// Hosted synthesis service
    Remote,
    /// Phrase cache hit
    Cache,
    /// On-device engine
    Local,
    /// Platform-native voice
    Platform,
}

/// State of the fallback chain for one phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    /// Trying the hosted service
    AttemptRemote,
    /// Trying the phrase cache
    AttemptCache,
    /// Trying the on-device engine
    AttemptLocal,
    /// Trying the platform voice
    AttemptPlatform,
    /// A tier produced audio
    Succeeded(SpeechTier),
    /// Every tier failed
    Exhausted,
}

impl FallbackState {
    /// Starting state; offline devices skip the remote tier
    #[must_use]
    pub const fn initial(online: bool) -> Self {
        if online {
            Self::AttemptRemote
        } else {
            Self::AttemptCache
        }
    }

    /// The tier this attempt state exercises, if any
    #[must_use]
    pub const fn tier(self) -> Option<SpeechTier> {
        match self {
            Self::AttemptRemote => Some(SpeechTier::Remote),
            Self::AttemptCache => Some(SpeechTier::Cache),
            Self::AttemptLocal => Some(SpeechTier::Local),
            Self::AttemptPlatform => Some(SpeechTier::Platform),
            Self::Succeeded(_) | Self::Exhausted => None,
        }
    }

    /// Advance the machine after one attempt
    ///
    /// Terminal states map to themselves.
    #[must_use]
    pub const fn next(self, succeeded: bool) -> Self {
        match (self, succeeded) {
            (Self::AttemptRemote, true) => Self::Succeeded(SpeechTier::Remote),
            (Self::AttemptRemote, false) => Self::AttemptCache,
            (Self::AttemptCache, true) => Self::Succeeded(SpeechTier::Cache),
            (Self::AttemptCache, false) => Self::AttemptLocal,
            (Self::AttemptLocal, true) => Self::Succeeded(SpeechTier::Local),
            (Self::AttemptLocal, false) => Self::AttemptPlatform,
            (Self::AttemptPlatform, true) => Self::Succeeded(SpeechTier::Platform),
            (Self::AttemptPlatform, false) => Self::Exhausted,
            (terminal @ (Self::Succeeded(_) | Self::Exhausted), _) => terminal,
        }
    }
}

/// Outcome of speaking one phrase
#[derive(Debug)]
pub struct SpokenPhrase {
    /// Tier that produced the audio
    pub tier: SpeechTier,
    /// The audio that was played
    pub audio: AudioData,
    /// Every state the fallback machine visited, in order
    pub transitions: Vec<FallbackState>,
}

/// Tiered synthesis driver
pub struct SpeechOrchestrator {
    engine: Arc<SynthesisEngine>,
    cache: Arc<PhraseCache>,
    remote: Arc<dyn RemoteSynthesizer>,
    platform: Arc<dyn PlatformSynthesizer>,
    sink: Arc<dyn PlaybackSink>,
    probe: Arc<dyn ConnectivityProbe>,
    dsp_config: DspConfig,
}

impl SpeechOrchestrator {
    /// Wire the orchestrator to its tiers
    #[must_use]
    pub fn new(
        engine: Arc<SynthesisEngine>,
        cache: Arc<PhraseCache>,
        remote: Arc<dyn RemoteSynthesizer>,
        platform: Arc<dyn PlatformSynthesizer>,
        sink: Arc<dyn PlaybackSink>,
        probe: Arc<dyn ConnectivityProbe>,
        dsp_config: DspConfig,
    ) -> Self {
        Self {
            engine,
            cache,
            remote,
            platform,
            sink,
            probe,
            dsp_config,
        }
    }

    /// Render a phrase as speech and play it
    ///
    /// Any earlier playback is stopped first. The returned report names the
    /// tier that produced the audio and the states the chain moved through.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` only when every tier has failed, and
    /// `PlaybackFailed` when audio was produced but could not be played.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn speak(&self, key: &PhraseKey) -> Result<SpokenPhrase, SpeechError> {
        if let Err(e) = self.sink.stop().await {
            warn!("could not stop previous playback: {e}");
        }

        let mut state = FallbackState::initial(self.probe.is_online().await);
        let mut transitions = vec![state];

        loop {
            let Some(tier) = state.tier() else {
                break;
            };

            match self.attempt(tier, key).await {
                Ok(audio) => {
                    state = state.next(true);
                    transitions.push(state);
                    info!(?tier, "phrase synthesized");

                    self.sink.play(&audio).await?;
                    return Ok(SpokenPhrase {
                        tier,
                        audio,
                        transitions,
                    });
                }
                Err(e) => {
                    warn!(?tier, "synthesis tier failed: {e}");
                    state = state.next(false);
                    transitions.push(state);
                }
            }
        }

        debug!(?transitions, "fallback chain exhausted");
        Err(SpeechError::Unavailable)
    }

    async fn attempt(&self, tier: SpeechTier, key: &PhraseKey) -> Result<AudioData, SpeechError> {
        match tier {
            SpeechTier::Remote => self.attempt_remote(key).await,
            SpeechTier::Cache => self.attempt_cache(key).await,
            SpeechTier::Local => self.attempt_local(key).await,
            SpeechTier::Platform => self.attempt_platform(key).await,
        }
    }

    async fn attempt_remote(&self, key: &PhraseKey) -> Result<AudioData, SpeechError> {
        let request = SynthesisRequest::new(key.text(), key.language().clone());
        let audio = self.remote.synthesize(&request).await?;
        self.store(key, &audio).await;
        Ok(audio)
    }

    async fn attempt_cache(&self, key: &PhraseKey) -> Result<AudioData, SpeechError> {
        self.cache
            .get(key)
            .await?
            .ok_or_else(|| SpeechError::SynthesisFailed("phrase not cached".to_string()))
    }

    async fn attempt_local(&self, key: &PhraseKey) -> Result<AudioData, SpeechError> {
        self.engine.initialize().await?;

        let request = SynthesisRequest::new(key.text(), key.language().clone());
        let result = self.engine.generate(request).await?;

        let processor = PostProcessor::new(self.dsp_config, result.sample_rate);
        let samples = processor.process(&result.samples);

        let wav = encode_wav(&samples, result.sample_rate, 1)?;
        let audio = AudioData::new(wav, AudioFormat::Wav);
        self.store(key, &audio).await;
        Ok(audio)
    }

    async fn attempt_platform(&self, key: &PhraseKey) -> Result<AudioData, SpeechError> {
        if !self.platform.supports(key.language()) {
            return Err(SpeechError::SynthesisFailed(format!(
                "platform voice cannot speak {}",
                key.language()
            )));
        }
        // platform output is intentionally not cached
        self.platform.synthesize(key.text(), key.language()).await
    }

    /// Cache audio from a high-quality tier; failures are not fatal
    async fn store(&self, key: &PhraseKey, audio: &AudioData) {
        if let Err(e) = self.cache.put(key, audio).await {
            warn!("could not cache phrase: {e}");
        }
    }
}

impl std::fmt::Debug for SpeechOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechOrchestrator").finish_non_exhaustive()
    }
}
