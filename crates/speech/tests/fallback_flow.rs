//! End-to-end fallback flows through the orchestrator
//!
//! Exercises the real HTTP client, phrase cache, engine bridge, DSP chain,
//! and WAV codec together, with only the device seams (platform voice,
//! playback, connectivity) mocked.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use domain::{Language, PhraseKey, VoiceId};
use parking_lot::Mutex;
use speech::bridge::{EngineRequest, EngineResponse, SynthesisBackend};
use speech::config::{BridgeConfig, CacheConfig, DspConfig, EngineConfig, RemoteConfig};
use speech::orchestrator::{FallbackState, SpeechOrchestrator, SpeechTier};
use speech::ports::{ConnectivityProbe, PlatformSynthesizer, PlaybackSink, RemoteSynthesizer};
use speech::types::{AudioData, AudioFormat, SynthesisResult};
use speech::{HttpRemoteSynthesizer, PhraseCache, SpeechError, SynthesisEngine};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Engine backend producing a constant-amplitude second of audio
struct ToneBackend {
    sample_rate: u32,
    seconds: f32,
    fail: bool,
}

impl SynthesisBackend for ToneBackend {
    fn handle(&mut self, request: EngineRequest) -> Result<EngineResponse, SpeechError> {
        match request {
            EngineRequest::Initialize => Ok(EngineResponse::Initialized),
            EngineRequest::LoadVoice { .. } => Ok(EngineResponse::VoiceLoaded),
            EngineRequest::Generate(_) => {
                if self.fail {
                    return Err(SpeechError::SynthesisFailed("no model loaded".to_string()));
                }
                let count = (self.sample_rate as f32 * self.seconds) as usize;
                Ok(EngineResponse::Generated(SynthesisResult::new(
                    vec![0.4; count],
                    self.sample_rate,
                )))
            }
            EngineRequest::CloneVoice { .. } => Ok(EngineResponse::VoiceCloned(VoiceId::minted())),
            EngineRequest::Stop => Ok(EngineResponse::Stopped),
        }
    }
}

struct NoPlatform;

#[async_trait]
impl PlatformSynthesizer for NoPlatform {
    async fn synthesize(&self, _text: &str, _language: &Language) -> Result<AudioData, SpeechError> {
        Err(SpeechError::SynthesisFailed("platform voice missing".to_string()))
    }

    fn supports(&self, _language: &Language) -> bool {
        false
    }
}

struct FixedPlatform;

#[async_trait]
impl PlatformSynthesizer for FixedPlatform {
    async fn synthesize(&self, _text: &str, _language: &Language) -> Result<AudioData, SpeechError> {
        Ok(AudioData::new(vec![5u8; 24], AudioFormat::Wav))
    }

    fn supports(&self, _language: &Language) -> bool {
        true
    }
}

#[derive(Default)]
struct RecordingSink {
    played: Mutex<Vec<AudioData>>,
    stops: AtomicUsize,
}

#[async_trait]
impl PlaybackSink for RecordingSink {
    async fn play(&self, audio: &AudioData) -> Result<(), SpeechError> {
        self.played.lock().push(audio.clone());
        Ok(())
    }

    async fn stop(&self) -> Result<(), SpeechError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Online(bool);

#[async_trait]
impl ConnectivityProbe for Online {
    async fn is_online(&self) -> bool {
        self.0
    }
}

struct Fixture {
    orchestrator: SpeechOrchestrator,
    cache: Arc<PhraseCache>,
    sink: Arc<RecordingSink>,
}

async fn fixture(
    server: &MockServer,
    online: bool,
    local_fails: bool,
    platform: Arc<dyn PlatformSynthesizer>,
) -> Fixture {
    let remote = HttpRemoteSynthesizer::new(RemoteConfig {
        base_url: server.uri(),
        api_key: None,
        timeout_ms: 5000,
        ..RemoteConfig::default()
    })
    .unwrap();

    let cache = Arc::new(PhraseCache::open(CacheConfig::in_memory()).await.unwrap());
    let sink = Arc::new(RecordingSink::default());
    let engine = Arc::new(SynthesisEngine::new(
        Arc::new(move || {
            Box::new(ToneBackend {
                sample_rate: 22050,
                seconds: 1.0,
                fail: local_fails,
            }) as Box<dyn SynthesisBackend>
        }),
        EngineConfig::default(),
        BridgeConfig::default(),
    ));

    let orchestrator = SpeechOrchestrator::new(
        engine,
        Arc::clone(&cache),
        Arc::new(remote),
        platform,
        Arc::clone(&sink) as Arc<dyn PlaybackSink>,
        Arc::new(Online(online)),
        DspConfig::default(),
    );

    Fixture {
        orchestrator,
        cache,
        sink,
    }
}

async fn remote_down(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/synthesize"))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
            "error": "service overloaded"
        })))
        .mount(server)
        .await;
}

fn akwaaba() -> PhraseKey {
    PhraseKey::new("Akwaaba", "twi".try_into().unwrap()).unwrap()
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[tokio::test]
async fn akwaaba_falls_through_to_the_local_engine() {
    let server = MockServer::start().await;
    remote_down(&server).await;

    let f = fixture(&server, true, false, Arc::new(NoPlatform)).await;
    let spoken = f.orchestrator.speak(&akwaaba()).await.unwrap();

    assert_eq!(spoken.tier, SpeechTier::Local);
    assert_eq!(
        spoken.transitions,
        vec![
            FallbackState::AttemptRemote,
            FallbackState::AttemptCache,
            FallbackState::AttemptLocal,
            FallbackState::Succeeded(SpeechTier::Local),
        ]
    );

    // one second of mono 22050 Hz audio, 44100 PCM data bytes
    let wav = spoken.audio.data();
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(read_u16(wav, 22), 1);
    assert_eq!(read_u32(wav, 24), 22050);
    assert_eq!(read_u32(wav, 40), 44100);

    // played exactly once
    let played = f.sink.played.lock();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].data(), spoken.audio.data());
}

#[tokio::test]
async fn local_result_is_served_from_cache_on_the_next_attempt() {
    let server = MockServer::start().await;
    remote_down(&server).await;

    let f = fixture(&server, true, false, Arc::new(NoPlatform)).await;
    let first = f.orchestrator.speak(&akwaaba()).await.unwrap();
    assert_eq!(first.tier, SpeechTier::Local);

    let second = f.orchestrator.speak(&akwaaba()).await.unwrap();
    assert_eq!(second.tier, SpeechTier::Cache);
    assert_eq!(second.audio.data(), first.audio.data());
}

#[tokio::test]
async fn remote_success_is_cached_for_offline_replay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/synthesize"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(vec![0xFFu8, 0xFB, 0x90, 0x00]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server, true, true, Arc::new(NoPlatform)).await;
    let first = f.orchestrator.speak(&akwaaba()).await.unwrap();
    assert_eq!(first.tier, SpeechTier::Remote);
    assert_eq!(first.audio.format(), AudioFormat::Mp3);

    // cached copy satisfies a later request without touching the network
    assert!(f.cache.get(&akwaaba()).await.unwrap().is_some());
}

#[tokio::test]
async fn offline_device_starts_at_the_cache_tier() {
    let server = MockServer::start().await;

    let f = fixture(&server, false, false, Arc::new(NoPlatform)).await;
    let spoken = f.orchestrator.speak(&akwaaba()).await.unwrap();

    assert_eq!(spoken.tier, SpeechTier::Local);
    assert_eq!(spoken.transitions[0], FallbackState::AttemptCache);
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn platform_tier_rescues_a_phrase_but_is_not_cached() {
    let server = MockServer::start().await;
    remote_down(&server).await;

    let f = fixture(&server, true, true, Arc::new(FixedPlatform)).await;
    let spoken = f.orchestrator.speak(&akwaaba()).await.unwrap();

    assert_eq!(spoken.tier, SpeechTier::Platform);
    assert_eq!(f.sink.played.lock().len(), 1);
    assert!(f.cache.is_empty().await.unwrap());
}

#[tokio::test]
async fn exhausted_chain_is_the_only_source_of_unavailable() {
    let server = MockServer::start().await;
    remote_down(&server).await;

    let f = fixture(&server, true, true, Arc::new(NoPlatform)).await;
    match f.orchestrator.speak(&akwaaba()).await {
        Err(SpeechError::Unavailable) => {}
        other => panic!("expected speech unavailable, got {other:?}"),
    }
    assert!(f.sink.played.lock().is_empty());
}

#[tokio::test]
async fn consecutive_phrases_stop_earlier_playback() {
    let server = MockServer::start().await;
    remote_down(&server).await;

    let f = fixture(&server, true, false, Arc::new(NoPlatform)).await;
    f.orchestrator.speak(&akwaaba()).await.unwrap();
    f.orchestrator
        .speak(&PhraseKey::new("Medaase", "twi".try_into().unwrap()).unwrap())
        .await
        .unwrap();

    assert_eq!(f.sink.stops.load(Ordering::SeqCst), 2);
    assert_eq!(f.sink.played.lock().len(), 2);
}
