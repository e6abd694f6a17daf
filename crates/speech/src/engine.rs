//! On-device synthesis engine adapter
//!
//! Wraps the [`EngineBridge`] with the state the engine itself cannot hold
//! across crashes: whether initialization completed, which voices are
//! loaded, and a lock serializing generation. When the bridge reports a lost
//! execution context the adapter forgets that state so the next call runs
//! initialization again.

use std::collections::HashMap;
use std::sync::Arc;

use domain::{Language, VoiceId};
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use crate::bridge::{BackendFactory, EngineBridge, EngineRequest, EngineResponse};
use crate::config::{BridgeConfig, EngineConfig};
use crate::error::SpeechError;
use crate::types::{AudioData, SynthesisRequest, SynthesisResult, VoiceInfo};

#[derive(Default)]
struct EngineState {
    initialized: bool,
    loaded_voices: HashMap<VoiceId, Language>,
}

/// Stateful adapter over the isolated synthesis engine
pub struct SynthesisEngine {
    bridge: EngineBridge,
    config: EngineConfig,
    state: Mutex<EngineState>,
    // the engine cannot synthesize two phrases at once
    generate_lock: tokio::sync::Mutex<()>,
}

impl SynthesisEngine {
    /// Create the adapter; the engine's worker thread starts on first use
    #[must_use]
    pub fn new(factory: BackendFactory, config: EngineConfig, bridge_config: BridgeConfig) -> Self {
        Self {
            bridge: EngineBridge::new(factory, bridge_config.request_timeout_ms),
            config,
            state: Mutex::new(EngineState::default()),
            generate_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Whether initialization has completed since the last crash
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Voices currently loaded in the engine
    #[must_use]
    pub fn loaded_voices(&self) -> Vec<VoiceInfo> {
        let state = self.state.lock();
        state
            .loaded_voices
            .iter()
            .map(|(voice, language)| VoiceInfo {
                id: voice.clone(),
                language: language.clone(),
                name: voice.as_str().to_string(),
                loaded: true,
            })
            .collect()
    }

    /// Prepare the engine for synthesis
    ///
    /// Safe to call repeatedly; already-initialized engines return
    /// immediately.
    ///
    /// # Errors
    ///
    /// Propagates bridge and backend failures.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), SpeechError> {
        if self.is_initialized() {
            return Ok(());
        }

        match self.call(EngineRequest::Initialize).await? {
            EngineResponse::Initialized => {
                self.state.lock().initialized = true;
                info!("synthesis engine initialized");
                Ok(())
            }
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Load a voice, skipping voices that are already resident
    ///
    /// # Errors
    ///
    /// Returns `EngineNotInitialized` before [`initialize`](Self::initialize)
    /// has succeeded.
    #[instrument(skip(self), fields(voice = %voice, language = %language))]
    pub async fn load_voice(&self, voice: VoiceId, language: Language) -> Result<(), SpeechError> {
        self.require_initialized()?;
        if self.state.lock().loaded_voices.contains_key(&voice) {
            return Ok(());
        }

        let request = EngineRequest::LoadVoice {
            voice: voice.clone(),
            language: language.clone(),
        };
        match self.call(request).await? {
            EngineResponse::VoiceLoaded => {
                self.state.lock().loaded_voices.insert(voice, language);
                Ok(())
            }
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Synthesize one phrase
    ///
    /// Requests without a voice fall back to the configured default for the
    /// phrase's language, loading it on demand. Generations are serialized;
    /// concurrent callers queue on an internal lock.
    ///
    /// # Errors
    ///
    /// Returns `EngineNotInitialized` before initialization, `VoiceNotFound`
    /// when no voice is named and no default exists for the language, and
    /// propagates bridge failures.
    #[instrument(skip(self, request), fields(language = %request.language))]
    pub async fn generate(&self, mut request: SynthesisRequest) -> Result<SynthesisResult, SpeechError> {
        self.require_initialized()?;
        let _serialized = self.generate_lock.lock().await;

        let voice = match request.voice_id.take() {
            Some(voice) => voice,
            None => self.default_voice(&request.language)?,
        };
        self.load_voice(voice.clone(), request.language.clone()).await?;
        request.voice_id = Some(voice);

        match self.call(EngineRequest::Generate(request)).await? {
            EngineResponse::Generated(result) => Ok(result),
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Derive a new voice from one or more reference recordings
    ///
    /// The minted identifier is immediately usable in
    /// [`generate`](Self::generate).
    ///
    /// # Errors
    ///
    /// Returns `EngineNotInitialized` before initialization, rejects an empty
    /// clip list, and propagates bridge failures.
    #[instrument(skip(self, samples), fields(language = %language, clips = samples.len()))]
    pub async fn clone_voice(
        &self,
        samples: Vec<AudioData>,
        language: Language,
    ) -> Result<VoiceId, SpeechError> {
        self.require_initialized()?;
        if samples.is_empty() {
            return Err(SpeechError::SynthesisFailed(
                "voice cloning requires at least one reference clip".into(),
            ));
        }

        let request = EngineRequest::CloneVoice {
            samples,
            language: language.clone(),
        };
        match self.call(request).await? {
            EngineResponse::VoiceCloned(voice) => {
                self.state.lock().loaded_voices.insert(voice.clone(), language);
                Ok(voice)
            }
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Abandon any in-progress generation and tear the engine down
    ///
    /// The execution context exits, and initialization and loaded voices are
    /// forgotten; the next operation must run
    /// [`initialize`](Self::initialize) again. A no-op on an uninitialized
    /// engine.
    ///
    /// # Errors
    ///
    /// Propagates bridge failures.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), SpeechError> {
        if !self.is_initialized() {
            return Ok(());
        }
        match self.call(EngineRequest::Stop).await? {
            EngineResponse::Stopped => {
                self.bridge.shutdown();
                let mut state = self.state.lock();
                state.initialized = false;
                state.loaded_voices.clear();
                Ok(())
            }
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Route a request through the bridge, resetting state on context loss
    async fn call(&self, request: EngineRequest) -> Result<EngineResponse, SpeechError> {
        let reply = self.bridge.call(request).await;
        if let Err(SpeechError::ExecutionContextLost(detail)) = &reply {
            warn!(detail, "execution context lost, engine state reset");
            let mut state = self.state.lock();
            state.initialized = false;
            state.loaded_voices.clear();
        }
        reply
    }

    fn require_initialized(&self) -> Result<(), SpeechError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(SpeechError::EngineNotInitialized)
        }
    }

    fn default_voice(&self, language: &Language) -> Result<VoiceId, SpeechError> {
        let tag = self
            .config
            .default_voice_for(language.as_str())
            .ok_or_else(|| SpeechError::VoiceNotFound(language.as_str().to_string()))?;
        VoiceId::new(tag).map_err(|e| SpeechError::VoiceNotFound(e.to_string()))
    }
}

impl std::fmt::Debug for SynthesisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisEngine")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

/// Convenience constructor used by tests and the orchestrator wiring
#[must_use]
pub fn engine_with_defaults(factory: BackendFactory) -> Arc<SynthesisEngine> {
    Arc::new(SynthesisEngine::new(
        factory,
        EngineConfig::default(),
        BridgeConfig::default(),
    ))
}

fn unexpected_reply(reply: &EngineResponse) -> SpeechError {
    SpeechError::SynthesisFailed(format!("engine returned an unexpected reply: {reply:?}"))
}
