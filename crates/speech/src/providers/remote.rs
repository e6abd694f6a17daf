//! Remote synthesis service client
//!
//! Talks to the hosted synthesis API over HTTPS. Successful responses carry
//! encoded audio; failures carry a JSON error envelope.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::RemoteConfig;
use crate::error::SpeechError;
use crate::ports::{ConnectivityProbe, RemoteSynthesizer};
use crate::types::{AudioData, AudioFormat, SynthesisRequest};

/// HTTP client for the hosted synthesis service
#[derive(Debug, Clone)]
pub struct HttpRemoteSynthesizer {
    client: Client,
    config: RemoteConfig,
}

impl HttpRemoteSynthesizer {
    /// Create a client from the remote configuration
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when the HTTP client cannot be built.
    pub fn new(config: RemoteConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                SpeechError::Configuration(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    fn synthesize_url(&self) -> String {
        format!("{}/synthesize", self.config.base_url)
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url)
    }
}

/// JSON body for the synthesize endpoint
#[derive(Debug, Serialize)]
struct SynthesizeBody<'a> {
    text: &'a str,
    language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
    pitch: f32,
    rate: f32,
    volume: f32,
}

/// Error envelope returned on non-success statuses
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: String,
}

#[async_trait]
impl RemoteSynthesizer for HttpRemoteSynthesizer {
    #[instrument(skip(self, request), fields(language = %request.language, text_len = request.text.len()))]
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioData, SpeechError> {
        debug!("requesting remote synthesis");

        let body = SynthesizeBody {
            text: &request.text,
            language: request.language.as_str(),
            voice: request.voice_id.as_ref().map(domain::VoiceId::as_str),
            pitch: self.config.pitch,
            rate: self.config.rate,
            volume: self.config.volume,
        };

        let mut builder = self.client.post(self.synthesize_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&error_body) {
                return Err(SpeechError::SynthesisFailed(envelope.error));
            }
            return Err(SpeechError::SynthesisFailed(format!(
                "HTTP {status}: {error_body}"
            )));
        }

        let format = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(AudioFormat::from_mime_type)
            .unwrap_or(AudioFormat::Wav);

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SpeechError::SynthesisFailed(
                "remote service returned empty audio".to_string(),
            ));
        }

        debug!(bytes = bytes.len(), ?format, "remote synthesis complete");
        Ok(AudioData::new(bytes.to_vec(), format))
    }
}

#[async_trait]
impl ConnectivityProbe for HttpRemoteSynthesizer {
    async fn is_online(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("remote health check failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_for(server: &MockServer) -> RemoteConfig {
        RemoteConfig {
            base_url: server.uri(),
            api_key: Some("test-key".to_string()),
            timeout_ms: 5000,
            ..RemoteConfig::default()
        }
    }

    fn twi_request() -> SynthesisRequest {
        SynthesisRequest::new("Akwaaba", "twi".try_into().unwrap())
    }

    #[tokio::test]
    async fn synthesize_returns_audio_with_declared_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/synthesize"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "text": "Akwaaba",
                "language": "twi",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/mpeg")
                    .set_body_bytes(vec![0xFFu8, 0xFB, 0x90, 0x00]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpRemoteSynthesizer::new(config_for(&server)).unwrap();
        let audio = provider.synthesize(&twi_request()).await.unwrap();

        assert_eq!(audio.format(), AudioFormat::Mp3);
        assert_eq!(audio.size_bytes(), 4);
    }

    #[tokio::test]
    async fn named_voice_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/synthesize"))
            .and(body_partial_json(serde_json::json!({ "voice": "ama" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/wav")
                    .set_body_bytes(vec![1u8; 8]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpRemoteSynthesizer::new(config_for(&server)).unwrap();
        let request = twi_request().with_voice(domain::VoiceId::new("ama").unwrap());
        provider.synthesize(&request).await.unwrap();
    }

    #[tokio::test]
    async fn error_envelope_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/synthesize"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "error": "unsupported language: klingon"
            })))
            .mount(&server)
            .await;

        let provider = HttpRemoteSynthesizer::new(config_for(&server)).unwrap();
        match provider.synthesize(&twi_request()).await {
            Err(SpeechError::SynthesisFailed(message)) => {
                assert!(message.contains("unsupported language"));
            }
            other => panic!("expected synthesis failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_still_fails_cleanly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/synthesize"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = HttpRemoteSynthesizer::new(config_for(&server)).unwrap();
        match provider.synthesize(&twi_request()).await {
            Err(SpeechError::SynthesisFailed(message)) => {
                assert!(message.contains("500"));
            }
            other => panic!("expected synthesis failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_audio_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/synthesize"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("content-type", "audio/wav"),
            )
            .mount(&server)
            .await;

        let provider = HttpRemoteSynthesizer::new(config_for(&server)).unwrap();
        assert!(matches!(
            provider.synthesize(&twi_request()).await,
            Err(SpeechError::SynthesisFailed(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_maps_to_remote_unavailable() {
        let config = RemoteConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: None,
            timeout_ms: 1000,
            ..RemoteConfig::default()
        };

        let provider = HttpRemoteSynthesizer::new(config).unwrap();
        assert!(matches!(
            provider.synthesize(&twi_request()).await,
            Err(SpeechError::RemoteUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn health_endpoint_drives_the_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let provider = HttpRemoteSynthesizer::new(config_for(&server)).unwrap();
        assert!(provider.is_online().await);
    }

    #[tokio::test]
    async fn failing_health_check_reports_offline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = HttpRemoteSynthesizer::new(config_for(&server)).unwrap();
        assert!(!provider.is_online().await);
    }
}
