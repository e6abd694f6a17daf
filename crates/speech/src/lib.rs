//! Speech - tiered speech synthesis for West African languages
//!
//! Renders phrases as speech through a chain of tiers that degrade
//! gracefully:
//! - A hosted synthesis service for the highest quality
//! - A durable phrase cache so repeated phrases work offline
//! - An on-device neural engine, isolated behind a crash-tolerant bridge
//! - The platform's native voice as a last resort
//!
//! # Architecture
//!
//! This crate follows the ports & adapters pattern:
//! - `ports` module defines the traits (ports)
//! - `providers` module contains concrete implementations (adapters)
//! - `orchestrator` drives the fallback chain across the tiers
//!
//! The on-device engine runs on a dedicated worker thread behind the
//! `bridge` module; a crashed engine fails in-flight requests with
//! `ExecutionContextLost` and is respawned transparently.
//!
//! # Example
//!
//! ```ignore
//! use domain::PhraseKey;
//! use speech::{SpeechOrchestrator, SpeechTier};
//!
//! let phrase = PhraseKey::new("Akwaaba", "twi".try_into()?)?;
//! let spoken = orchestrator.speak(&phrase).await?;
//! println!("spoke via {:?}", spoken.tier);
//! ```

pub mod bridge;
pub mod cache;
pub mod codec;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod ports;
pub mod providers;
pub mod types;

pub use bridge::{EngineBridge, EngineRequest, EngineResponse, SynthesisBackend};
pub use cache::PhraseCache;
pub use config::SpeechSettings;
pub use dsp::PostProcessor;
pub use engine::SynthesisEngine;
pub use error::SpeechError;
pub use orchestrator::{FallbackState, SpeechOrchestrator, SpeechTier, SpokenPhrase};
pub use ports::{ConnectivityProbe, PlatformSynthesizer, PlaybackSink, RemoteSynthesizer};
pub use providers::{EspeakProvider, HttpRemoteSynthesizer};
pub use types::{AudioData, AudioFormat, SynthesisRequest, SynthesisResult, VoiceInfo};
