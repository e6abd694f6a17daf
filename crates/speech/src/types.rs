//! Types for speech synthesis
//!
//! Contains data structures for audio data, synthesis requests and results,
//! and voice metadata.

use domain::{Language, VoiceId};
use serde::{Deserialize, Serialize};

/// Audio byte-container formats the subsystem handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// WAV container (uncompressed PCM, owned by this crate's codec)
    Wav,
    /// MP3, as returned by the remote synthesis service
    Mp3,
}

impl AudioFormat {
    /// Get the MIME type for this audio format
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
        }
    }

    /// Parse an audio format from a MIME type
    #[must_use]
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let base = mime.split(';').next().unwrap_or(mime).trim();
        match base {
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(Self::Wav),
            "audio/mpeg" | "audio/mp3" => Some(Self::Mp3),
            _ => None,
        }
    }
}

/// Container for encoded audio bytes with format metadata
#[derive(Debug, Clone)]
pub struct AudioData {
    data: Vec<u8>,
    format: AudioFormat,
}

impl AudioData {
    /// Create new audio data
    #[must_use]
    pub const fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self { data, format }
    }

    /// Get the raw audio bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume and return the raw audio bytes
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get the audio format
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Get the size of the audio data in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if the audio data is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A synthesis request, immutable once issued
///
/// Decoding parameters not supplied take engine defaults; the defaults favor
/// determinism over diversity so repeated phrases sound identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Phrase to synthesize
    pub text: String,
    /// Target language
    pub language: Language,
    /// Voice to use; `None` selects the language's default voice
    #[serde(default)]
    pub voice_id: Option<VoiceId>,
    /// Engine preset name
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Top-K sampling cutoff
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// Nucleus sampling cutoff
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Length penalty applied during decoding
    #[serde(default = "default_length_penalty")]
    pub length_penalty: f32,
    /// Repetition penalty applied during decoding
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
}

fn default_preset() -> String {
    "standard".to_string()
}

const fn default_temperature() -> f32 {
    0.3
}

const fn default_top_k() -> u32 {
    50
}

const fn default_top_p() -> f32 {
    0.85
}

const fn default_length_penalty() -> f32 {
    1.0
}

const fn default_repetition_penalty() -> f32 {
    2.0
}

impl SynthesisRequest {
    /// Create a request with default decoding parameters
    #[must_use]
    pub fn new(text: impl Into<String>, language: Language) -> Self {
        Self {
            text: text.into(),
            language,
            voice_id: None,
            preset: default_preset(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            length_penalty: default_length_penalty(),
            repetition_penalty: default_repetition_penalty(),
        }
    }

    /// Select a specific voice
    #[must_use]
    pub fn with_voice(mut self, voice_id: VoiceId) -> Self {
        self.voice_id = Some(voice_id);
        self
    }

    /// Select an engine preset
    #[must_use]
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Raw synthesized audio: mono float samples normalized to [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Sample buffer (mono)
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration_secs: f32,
}

impl SynthesisResult {
    /// Create a result, deriving the duration from the buffer
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration_secs = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f32 / sample_rate as f32
        };
        Self {
            samples,
            sample_rate,
            duration_secs,
        }
    }

    /// Check if the result carries no audio
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Information about a voice known to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceInfo {
    /// Voice identifier
    pub id: VoiceId,
    /// Language this voice speaks
    pub language: Language,
    /// Human-readable name
    pub name: String,
    /// Whether the voice has been loaded into the engine
    pub loaded: bool,
}
