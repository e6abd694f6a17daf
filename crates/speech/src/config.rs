//! Configuration for the speech subsystem

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level settings for the speech-synthesis client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechSettings {
    /// On-device engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Isolated execution bridge settings
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Audio post-processor settings
    #[serde(default)]
    pub dsp: DspConfig,

    /// Phrase cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Remote synthesis service settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Platform-native synthesis settings
    #[serde(default)]
    pub system_tts: SystemTtsConfig,
}

impl SpeechSettings {
    /// Validate all sections
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        self.bridge.validate()?;
        self.dsp.validate()?;
        self.cache.validate()?;
        self.remote.validate()?;
        Ok(())
    }
}

/// On-device synthesis engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default voice per language tag, used when a request names no voice
    #[serde(default = "default_voices")]
    pub default_voices: HashMap<String, String>,
}

impl EngineConfig {
    /// Look up the default voice for a language tag
    #[must_use]
    pub fn default_voice_for(&self, language: &str) -> Option<&str> {
        self.default_voices.get(language).map(String::as_str)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_voices: default_voices(),
        }
    }
}

fn default_voices() -> HashMap<String, String> {
    [
        ("twi", "ama"),
        ("yoruba", "adeola"),
        ("hausa", "binta"),
        ("igbo", "chidi"),
        ("ewe", "selorm"),
        ("ga", "naa"),
    ]
    .into_iter()
    .map(|(lang, voice)| (lang.to_string(), voice.to_string()))
    .collect()
}

/// Isolated execution bridge configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl BridgeConfig {
    fn validate(&self) -> Result<(), String> {
        if self.request_timeout_ms == 0 {
            return Err("Bridge request timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

const fn default_request_timeout_ms() -> u64 {
    30000 // 30 seconds
}

/// Audio post-processor configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DspConfig {
    /// Envelope level above which gain reduction starts (fraction of full scale)
    #[serde(default = "default_compressor_threshold")]
    pub compressor_threshold: f32,

    /// Compression ratio (e.g. 3.0 for 3:1)
    #[serde(default = "default_compressor_ratio")]
    pub compressor_ratio: f32,

    /// Envelope attack time constant in milliseconds
    #[serde(default = "default_attack_ms")]
    pub attack_ms: f32,

    /// Envelope release time constant in milliseconds
    #[serde(default = "default_release_ms")]
    pub release_ms: f32,

    /// High-frequency energy threshold for de-essing
    #[serde(default = "default_deess_threshold")]
    pub deess_threshold: f32,

    /// Target peak for normalization (fraction of full scale)
    #[serde(default = "default_normalize_target")]
    pub normalize_target: f32,
}

impl DspConfig {
    fn validate(&self) -> Result<(), String> {
        if self.compressor_ratio < 1.0 {
            return Err(format!(
                "Compressor ratio must be at least 1.0, got {}",
                self.compressor_ratio
            ));
        }
        if !(0.0..=1.0).contains(&self.normalize_target) {
            return Err(format!(
                "Normalize target must be within [0, 1], got {}",
                self.normalize_target
            ));
        }
        Ok(())
    }
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            compressor_threshold: default_compressor_threshold(),
            compressor_ratio: default_compressor_ratio(),
            attack_ms: default_attack_ms(),
            release_ms: default_release_ms(),
            deess_threshold: default_deess_threshold(),
            normalize_target: default_normalize_target(),
        }
    }
}

const fn default_compressor_threshold() -> f32 {
    0.5
}

const fn default_compressor_ratio() -> f32 {
    3.0
}

const fn default_attack_ms() -> f32 {
    3.0
}

const fn default_release_ms() -> f32 {
    100.0
}

const fn default_deess_threshold() -> f32 {
    0.2
}

const fn default_normalize_target() -> f32 {
    0.9
}

/// Phrase cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries retained
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Maximum payload size per entry in bytes
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,

    /// Entries older than this many days are purged on open
    #[serde(default = "default_expiry_days")]
    pub expiry_days: i64,

    /// SQLite database path (":memory:" for tests)
    #[serde(default = "default_cache_db_path")]
    pub db_path: PathBuf,
}

impl CacheConfig {
    /// Configuration backed by an in-memory database, for tests
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            db_path: PathBuf::from(":memory:"),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("Cache must allow at least one entry".to_string());
        }
        if self.max_entry_bytes == 0 {
            return Err("Cache per-entry cap must be greater than 0".to_string());
        }
        if self.expiry_days <= 0 {
            return Err("Cache expiry window must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_entry_bytes: default_max_entry_bytes(),
            expiry_days: default_expiry_days(),
            db_path: default_cache_db_path(),
        }
    }
}

const fn default_max_entries() -> usize {
    50
}

const fn default_max_entry_bytes() -> usize {
    5 * 1024 * 1024 // 5 MiB
}

const fn default_expiry_days() -> i64 {
    7
}

fn default_cache_db_path() -> PathBuf {
    PathBuf::from("kasa_phrases.db")
}

/// Remote synthesis service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Service base URL
    #[serde(default = "default_remote_base_url")]
    pub base_url: String,

    /// Optional bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,

    /// Speaking pitch adjustment (1.0 = neutral)
    #[serde(default = "default_unity")]
    pub pitch: f32,

    /// Speaking rate adjustment (1.0 = neutral)
    #[serde(default = "default_unity")]
    pub rate: f32,

    /// Output volume (1.0 = full)
    #[serde(default = "default_unity")]
    pub volume: f32,
}

impl RemoteConfig {
    fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Remote base URL must not be empty".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("Remote timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_base_url(),
            api_key: None,
            timeout_ms: default_request_timeout_ms(),
            pitch: default_unity(),
            rate: default_unity(),
            volume: default_unity(),
        }
    }
}

fn default_remote_base_url() -> String {
    "https://speech.kasa.app/v1".to_string()
}

const fn default_unity() -> f32 {
    1.0
}

/// Platform-native synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemTtsConfig {
    /// TTS executable (defaults to espeak-ng in PATH)
    #[serde(default = "default_tts_executable")]
    pub executable_path: PathBuf,

    /// Voice argument per language tag, passed to the executable
    #[serde(default)]
    pub voice_args: HashMap<String, String>,
}

impl Default for SystemTtsConfig {
    fn default() -> Self {
        Self {
            executable_path: default_tts_executable(),
            voice_args: HashMap::new(),
        }
    }
}

fn default_tts_executable() -> PathBuf {
    PathBuf::from("espeak-ng")
}
