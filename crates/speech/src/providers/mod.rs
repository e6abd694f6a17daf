//! Synthesis providers
//!
//! Concrete implementations of the synthesis ports: the hosted HTTP service
//! and the platform's espeak-ng voice.

mod remote;
mod system;

pub use remote::HttpRemoteSynthesizer;
pub use system::EspeakProvider;
