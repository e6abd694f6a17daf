//! Isolated execution bridge
//!
//! Runs the synthesis backend on a dedicated worker thread and exposes an
//! async request/response surface. Every request carries a fresh correlation
//! id; replies that arrive after their caller timed out are dropped, and a
//! backend panic settles all in-flight requests with
//! [`SpeechError::ExecutionContextLost`] before the worker is respawned on
//! the next call.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use domain::{Language, VoiceId};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::error::SpeechError;
use crate::types::{AudioData, SynthesisRequest, SynthesisResult};

/// Command sent across the bridge to the backend
#[derive(Debug)]
pub enum EngineRequest {
    /// Load the model and prepare the engine for synthesis
    Initialize,
    /// Make a voice available for generation
    LoadVoice {
        /// Voice to load
        voice: VoiceId,
        /// Language the voice speaks
        language: Language,
    },
    /// Synthesize audio for a phrase
    Generate(SynthesisRequest),
    /// Derive a new voice from reference recordings
    CloneVoice {
        /// Reference clips to clone from, at least one
        samples: Vec<AudioData>,
        /// Language the cloned voice will speak
        language: Language,
    },
    /// Abandon any in-progress generation
    Stop,
}

/// Reply produced by the backend for one [`EngineRequest`]
#[derive(Debug)]
pub enum EngineResponse {
    /// Engine is ready
    Initialized,
    /// Requested voice is loaded
    VoiceLoaded,
    /// Synthesized audio
    Generated(SynthesisResult),
    /// Identifier minted for the cloned voice
    VoiceCloned(VoiceId),
    /// Generation abandoned
    Stopped,
}

/// Blocking synthesis backend executed on the worker thread
///
/// Implementations may block freely; the bridge keeps them off the async
/// runtime.
pub trait SynthesisBackend: Send {
    /// Execute one command
    ///
    /// # Errors
    ///
    /// Returns the backend's failure for the command; panics are treated as
    /// a lost execution context by the bridge.
    fn handle(&mut self, request: EngineRequest) -> Result<EngineResponse, SpeechError>;
}

/// Factory recreating the backend after a crash
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn SynthesisBackend> + Send + Sync>;

type Reply = Result<EngineResponse, SpeechError>;
type Pending = Arc<Mutex<HashMap<Uuid, oneshot::Sender<Reply>>>>;

struct Envelope {
    id: Uuid,
    request: EngineRequest,
}

/// Async handle to the worker thread
pub struct EngineBridge {
    factory: BackendFactory,
    sender: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    pending: Pending,
    timeout_ms: u64,
}

impl EngineBridge {
    /// Create a handle; the worker thread starts on the first call
    #[must_use]
    pub fn new(factory: BackendFactory, timeout_ms: u64) -> Self {
        Self {
            factory,
            sender: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout_ms,
        }
    }

    /// Send one request and await its correlated reply
    ///
    /// # Errors
    ///
    /// Returns `RequestTimeout` when no reply arrives within the configured
    /// window and `ExecutionContextLost` when the backend crashed; backend
    /// failures pass through unchanged.
    #[instrument(skip(self, request), fields(correlation_id))]
    pub async fn call(&self, request: EngineRequest) -> Reply {
        let id = Uuid::new_v4();
        tracing::Span::current().record("correlation_id", tracing::field::display(id));

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(id, reply_tx);

        if let Err(envelope) = self.dispatch(Envelope { id, request }) {
            // worker is gone and could not be revived
            drop(envelope);
            self.pending.lock().remove(&id);
            return Err(SpeechError::ExecutionContextLost(
                "engine worker is not running".to_string(),
            ));
        }

        let window = std::time::Duration::from_millis(self.timeout_ms);
        match tokio::time::timeout(window, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(SpeechError::ExecutionContextLost(
                "engine worker dropped the request".to_string(),
            )),
            Err(_) => {
                // forget the request so the eventual reply is dropped as late
                self.pending.lock().remove(&id);
                Err(SpeechError::RequestTimeout(self.timeout_ms))
            }
        }
    }

    /// Tear down the worker thread; a later call spawns a fresh context
    pub fn shutdown(&self) {
        if self.sender.lock().take().is_some() {
            debug!("engine worker shut down");
        }
    }

    /// Hand the envelope to the worker, spawning it on first use or after
    /// a crash
    fn dispatch(&self, envelope: Envelope) -> Result<(), Envelope> {
        let mut sender = self.sender.lock();
        let envelope = match sender.as_ref() {
            None => envelope,
            Some(tx) => match tx.send(envelope) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(envelope)) => {
                    debug!("engine worker has exited, respawning");
                    envelope
                }
            },
        };

        let tx = spawn_worker(Arc::clone(&self.factory), Arc::clone(&self.pending));
        let delivered = tx
            .send(envelope)
            .map_err(|mpsc::error::SendError(envelope)| envelope);
        *sender = Some(tx);
        delivered
    }
}

impl std::fmt::Debug for EngineBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBridge")
            .field("timeout_ms", &self.timeout_ms)
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

/// Start a worker thread owning a fresh backend instance
fn spawn_worker(factory: BackendFactory, pending: Pending) -> mpsc::UnboundedSender<Envelope> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || run_worker(factory, rx, pending));
    tx
}

fn run_worker(
    factory: BackendFactory,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    pending: Pending,
) {
    let mut backend = match catch_unwind(AssertUnwindSafe(|| factory())) {
        Ok(backend) => backend,
        Err(panic) => {
            drain_pending(&pending, &panic_message(&*panic));
            return;
        }
    };

    while let Some(envelope) = rx.blocking_recv() {
        match catch_unwind(AssertUnwindSafe(|| backend.handle(envelope.request))) {
            Ok(reply) => match pending.lock().remove(&envelope.id) {
                Some(reply_tx) => {
                    let _ = reply_tx.send(reply);
                }
                None => {
                    debug!(correlation_id = %envelope.id, "dropping late engine reply");
                }
            },
            Err(panic) => {
                let detail = panic_message(&*panic);
                error!(correlation_id = %envelope.id, detail, "engine backend crashed");
                drain_pending(&pending, &detail);
                return;
            }
        }
    }
}

/// Fail every in-flight request with a lost-context error
fn drain_pending(pending: &Pending, detail: &str) {
    let drained: Vec<_> = pending.lock().drain().collect();
    for (_, reply_tx) in drained {
        let _ = reply_tx.send(Err(SpeechError::ExecutionContextLost(detail.to_string())));
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic.downcast_ref::<&str>().map_or_else(
        || {
            panic
                .downcast_ref::<String>()
                .cloned()
                .unwrap_or_else(|| "engine panicked".to_string())
        },
        |s| (*s).to_string(),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Backend whose behavior is scripted per command
    struct ScriptedBackend {
        generate_delay: Duration,
        panic_on_generate: bool,
    }

    impl ScriptedBackend {
        fn well_behaved() -> Self {
            Self {
                generate_delay: Duration::ZERO,
                panic_on_generate: false,
            }
        }
    }

    impl SynthesisBackend for ScriptedBackend {
        fn handle(&mut self, request: EngineRequest) -> Result<EngineResponse, SpeechError> {
            match request {
                EngineRequest::Initialize => Ok(EngineResponse::Initialized),
                EngineRequest::LoadVoice { .. } => Ok(EngineResponse::VoiceLoaded),
                EngineRequest::Generate(_) => {
                    if self.panic_on_generate {
                        panic!("model state corrupted");
                    }
                    std::thread::sleep(self.generate_delay);
                    Ok(EngineResponse::Generated(SynthesisResult::new(
                        vec![0.1, 0.2],
                        22050,
                    )))
                }
                EngineRequest::CloneVoice { .. } => {
                    Ok(EngineResponse::VoiceCloned(VoiceId::minted()))
                }
                EngineRequest::Stop => Ok(EngineResponse::Stopped),
            }
        }
    }

    fn generate_request() -> EngineRequest {
        EngineRequest::Generate(SynthesisRequest::new("Akwaaba", "twi".try_into().unwrap()))
    }

    fn well_behaved_factory() -> BackendFactory {
        Arc::new(|| Box::new(ScriptedBackend::well_behaved()) as Box<dyn SynthesisBackend>)
    }

    #[tokio::test]
    async fn worker_starts_on_the_first_call() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let bridge = EngineBridge::new(
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(ScriptedBackend::well_behaved()) as Box<dyn SynthesisBackend>
            }),
            1000,
        );

        assert_eq!(created.load(Ordering::SeqCst), 0);
        bridge.call(EngineRequest::Initialize).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_discards_the_context_and_the_next_call_gets_a_fresh_one() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let bridge = EngineBridge::new(
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(ScriptedBackend::well_behaved()) as Box<dyn SynthesisBackend>
            }),
            1000,
        );

        bridge.call(EngineRequest::Initialize).await.unwrap();
        bridge.shutdown();

        bridge.call(EngineRequest::Initialize).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn requests_receive_their_correlated_reply() {
        let bridge = EngineBridge::new(well_behaved_factory(), 1000);

        assert!(matches!(
            bridge.call(EngineRequest::Initialize).await,
            Ok(EngineResponse::Initialized)
        ));
        assert!(matches!(
            bridge.call(generate_request()).await,
            Ok(EngineResponse::Generated(_))
        ));
    }

    #[tokio::test]
    async fn slow_backend_yields_timeout_and_late_reply_is_dropped() {
        let bridge = EngineBridge::new(
            Arc::new(|| {
                Box::new(ScriptedBackend {
                    generate_delay: Duration::from_millis(300),
                    panic_on_generate: false,
                }) as Box<dyn SynthesisBackend>
            }),
            50,
        );

        assert!(matches!(
            bridge.call(generate_request()).await,
            Err(SpeechError::RequestTimeout(50))
        ));

        // the late reply must not leak into the next request
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(matches!(
            bridge.call(EngineRequest::Stop).await,
            Ok(EngineResponse::Stopped)
        ));
        assert!(bridge.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn backend_panic_reports_context_lost() {
        let bridge = EngineBridge::new(
            Arc::new(|| {
                Box::new(ScriptedBackend {
                    generate_delay: Duration::ZERO,
                    panic_on_generate: true,
                }) as Box<dyn SynthesisBackend>
            }),
            1000,
        );

        match bridge.call(generate_request()).await {
            Err(SpeechError::ExecutionContextLost(detail)) => {
                assert!(detail.contains("model state corrupted"));
            }
            other => panic!("expected context loss, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn worker_is_respawned_after_a_crash() {
        let crashes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&crashes);
        let bridge = EngineBridge::new(
            Arc::new(move || {
                // first backend crashes on generate, replacements behave
                let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
                Box::new(ScriptedBackend {
                    generate_delay: Duration::ZERO,
                    panic_on_generate: first,
                }) as Box<dyn SynthesisBackend>
            }),
            1000,
        );

        assert!(bridge.call(generate_request()).await.is_err());

        // give the crashed worker time to unwind so dispatch sees it gone
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            bridge.call(generate_request()).await,
            Ok(EngineResponse::Generated(_))
        ));
        assert_eq!(crashes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_requests_settle_independently() {
        let bridge = Arc::new(EngineBridge::new(well_behaved_factory(), 1000));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let bridge = Arc::clone(&bridge);
            handles.push(tokio::spawn(
                async move { bridge.call(generate_request()).await },
            ));
        }
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Ok(EngineResponse::Generated(_))
            ));
        }
        assert!(bridge.pending.lock().is_empty());
    }
}
