//! Platform text-to-speech provider
//!
//! Shells out to espeak-ng for the last-resort synthesis tier. The voice is
//! robotic compared to the on-device engine, so the orchestrator only
//! reaches here after every better tier has failed, and never caches the
//! result.
//!
//! # Prerequisites
//!
//! espeak-ng must be installed and available in PATH:
//!
//! ```bash
//! sudo apt install espeak-ng
//! ```

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use domain::Language;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use crate::config::SystemTtsConfig;
use crate::error::SpeechError;
use crate::ports::PlatformSynthesizer;
use crate::types::{AudioData, AudioFormat};

/// Platform TTS provider backed by the espeak-ng CLI
#[derive(Debug, Clone)]
pub struct EspeakProvider {
    config: SystemTtsConfig,
}

impl EspeakProvider {
    /// Create a provider from the platform TTS configuration
    #[must_use]
    pub const fn new(config: SystemTtsConfig) -> Self {
        Self { config }
    }

    fn executable(&self) -> &Path {
        &self.config.executable_path
    }

    /// espeak-ng voice argument for a language tag
    fn voice_arg(&self, language: &Language) -> Option<&str> {
        self.config
            .voice_args
            .get(language.as_str())
            .map(String::as_str)
    }

    #[instrument(skip(self, text), fields(language = %language, text_len = text.len()))]
    async fn run_espeak(&self, text: &str, language: &Language) -> Result<Vec<u8>, SpeechError> {
        let output_file = NamedTempFile::with_suffix(".wav").map_err(|e| {
            SpeechError::SynthesisFailed(format!("failed to create temp file: {e}"))
        })?;

        let mut cmd = Command::new(self.executable());
        cmd.arg("-w").arg(output_file.path());
        if let Some(voice) = self.voice_arg(language) {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!("running espeak-ng: {cmd:?}");

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SpeechError::SynthesisFailed(format!(
                    "espeak-ng not found at '{}'",
                    self.executable().display()
                ))
            } else {
                SpeechError::SynthesisFailed(format!("failed to run espeak-ng: {e}"))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("espeak-ng failed: {}", stderr.trim());
            return Err(SpeechError::SynthesisFailed(format!(
                "espeak-ng exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let audio = tokio::fs::read(output_file.path()).await.map_err(|e| {
            SpeechError::SynthesisFailed(format!("failed to read espeak-ng output: {e}"))
        })?;

        if audio.is_empty() {
            return Err(SpeechError::SynthesisFailed(
                "espeak-ng produced empty output".to_string(),
            ));
        }

        Ok(audio)
    }
}

#[async_trait]
impl PlatformSynthesizer for EspeakProvider {
    #[instrument(skip(self, text), fields(language = %language, text_len = text.len()))]
    async fn synthesize(&self, text: &str, language: &Language) -> Result<AudioData, SpeechError> {
        if text.is_empty() {
            return Err(SpeechError::SynthesisFailed(
                "cannot synthesize empty text".to_string(),
            ));
        }

        let wav = self.run_espeak(text, language).await?;
        Ok(AudioData::new(wav, AudioFormat::Wav))
    }

    fn supports(&self, _language: &Language) -> bool {
        // unmapped languages still render with the espeak-ng default voice
        true
    }
}
