use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

use crate::circuit;
use crate::engine::{CircuitVerifier, Engine, EngineLauncher};
use crate::error::BackendError;
use crate::types::ProofType;

/// Everything needed to verify proofs of one type.
pub struct CircuitHandle {
    pub proof_type: ProofType,
    pub circuit_id: String,
    pub engine: Arc<dyn Engine>,
    pub verifier: Arc<dyn CircuitVerifier>,
}

type SharedInit<T> = Shared<BoxFuture<'static, Result<T, BackendError>>>;

/// An initialization future parked in a cache slot.
///
/// The `id` lets a failed caller clear the slot only if it still holds the
/// future that failed, not a newer retry.
struct InFlight<T: Clone> {
    id: u64,
    future: SharedInit<T>,
}

impl<T: Clone> InFlight<T> {
    fn ready(&self) -> Option<&T> {
        match self.future.peek() {
            Some(Ok(value)) => Some(value),
            _ => None,
        }
    }
}

/// Run an initialization on its own task and share its result.
///
/// The task keeps going when every waiter is dropped, so an abandoned
/// initialization still finishes and releases whatever it holds.
fn spawn_shared<T, F>(init: F) -> SharedInit<T>
where
    T: Clone + Send + Sync + 'static,
    F: std::future::Future<Output = Result<T, BackendError>> + Send + 'static,
{
    let task = tokio::spawn(init);
    async move {
        task.await
            .map_err(|e| BackendError::Engine(format!("initialization task failed: {}", e)))?
    }
    .boxed()
    .shared()
}

/// Owns the verification engine and one cached handle per proof type.
///
/// Both caches store the in-flight initialization future itself, so
/// concurrent first callers await one initialization instead of racing to
/// start their own. Failed initializations are evicted so the next call
/// retries. Nothing is added to either cache once shutdown has begun.
pub struct BackendManager {
    launcher: Arc<dyn EngineLauncher>,
    circuits_dir: PathBuf,
    engine: Mutex<Option<InFlight<Arc<dyn Engine>>>>,
    circuits: Mutex<HashMap<ProofType, InFlight<Arc<CircuitHandle>>>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl BackendManager {
    pub fn new(launcher: Arc<dyn EngineLauncher>, circuits_dir: impl Into<PathBuf>) -> Self {
        Self {
            launcher,
            circuits_dir: circuits_dir.into(),
            engine: Mutex::new(None),
            circuits: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        }
    }

    fn ensure_running(&self) -> Result<(), BackendError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(BackendError::ShutDown);
        }
        Ok(())
    }

    /// The process-wide engine, started on first use.
    pub async fn shared_engine(&self) -> Result<Arc<dyn Engine>, BackendError> {
        self.ensure_running()?;

        let (id, future) = {
            let mut slot = self.engine.lock().await;
            match slot.as_ref() {
                Some(in_flight) => (in_flight.id, in_flight.future.clone()),
                None => {
                    self.ensure_running()?;
                    let launcher = Arc::clone(&self.launcher);
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    let future = spawn_shared(async move {
                        tracing::info!("Initializing verification engine");
                        launcher.launch().await
                    });
                    *slot = Some(InFlight {
                        id,
                        future: future.clone(),
                    });
                    (id, future)
                }
            }
        };

        let result = future.await;
        if let Err(e) = &result {
            let mut slot = self.engine.lock().await;
            if slot.as_ref().is_some_and(|in_flight| in_flight.id == id) {
                tracing::error!("Verification engine failed to start: {}", e);
                *slot = None;
            }
        }
        // Shutdown owns whatever finished after it started.
        self.ensure_running()?;
        result
    }

    /// The cached handle for `proof_type`, loading its artifact on a miss.
    pub async fn circuit_handle(
        &self,
        proof_type: ProofType,
    ) -> Result<Arc<CircuitHandle>, BackendError> {
        self.ensure_running()?;

        let cached = {
            let circuits = self.circuits.lock().await;
            circuits
                .get(&proof_type)
                .map(|in_flight| (in_flight.id, in_flight.future.clone()))
        };

        let (id, future) = match cached {
            Some(entry) => entry,
            None => {
                let engine = self.shared_engine().await?;
                let mut circuits = self.circuits.lock().await;
                // Another caller may have started the load while we awaited the engine.
                match circuits.get(&proof_type) {
                    Some(in_flight) => (in_flight.id, in_flight.future.clone()),
                    None => {
                        self.ensure_running()?;
                        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                        let circuits_dir = self.circuits_dir.clone();
                        let future = spawn_shared(load_handle(engine, circuits_dir, proof_type));
                        circuits.insert(
                            proof_type,
                            InFlight {
                                id,
                                future: future.clone(),
                            },
                        );
                        (id, future)
                    }
                }
            }
        };

        let result = future.await;
        if let Err(e) = &result {
            let mut circuits = self.circuits.lock().await;
            if circuits
                .get(&proof_type)
                .is_some_and(|in_flight| in_flight.id == id)
            {
                tracing::error!("Circuit {} failed to load: {}", proof_type, e);
                circuits.remove(&proof_type);
            }
        }
        self.ensure_running()?;
        result
    }

    /// Load every listed circuit concurrently.
    ///
    /// A circuit that fails is logged and left out; the rest still load.
    /// Returns the proof types that are ready.
    pub async fn preload(&self, proof_types: &[ProofType]) -> Vec<ProofType> {
        let results = join_all(proof_types.iter().map(|&proof_type| async move {
            (proof_type, self.circuit_handle(proof_type).await)
        }))
        .await;

        let mut loaded = Vec::new();
        for (proof_type, result) in results {
            match result {
                Ok(_) => loaded.push(proof_type),
                Err(e) => tracing::warn!(
                    "Circuit {} unavailable, continuing without it: {}",
                    proof_type,
                    e
                ),
            }
        }
        tracing::info!(
            "Preloaded {}/{} circuits",
            loaded.len(),
            proof_types.len()
        );
        loaded
    }

    /// Proof types whose handle has finished loading.
    pub async fn cached_circuits(&self) -> Vec<ProofType> {
        let circuits = self.circuits.lock().await;
        let mut ready: Vec<ProofType> = circuits
            .iter()
            .filter(|(_, in_flight)| in_flight.ready().is_some())
            .map(|(proof_type, _)| *proof_type)
            .collect();
        ready.sort();
        ready
    }

    pub async fn engine_ready(&self) -> bool {
        self.engine
            .lock()
            .await
            .as_ref()
            .is_some_and(|in_flight| in_flight.ready().is_some())
    }

    /// Release all handles and destroy the engine.
    ///
    /// Only the first call does anything. Initializations still in flight
    /// are awaited so that what they produce is torn down too.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            tracing::debug!("Backend shutdown already performed");
            return;
        }

        let circuits: Vec<InFlight<Arc<CircuitHandle>>> = {
            let mut cache = self.circuits.lock().await;
            cache.drain().map(|(_, in_flight)| in_flight).collect()
        };
        for in_flight in circuits {
            if let Ok(handle) = in_flight.future.await {
                handle.verifier.release().await;
                tracing::info!("Released circuit {}", handle.circuit_id);
            }
        }

        let engine = self.engine.lock().await.take();
        match engine {
            Some(in_flight) => match in_flight.future.await {
                Ok(engine) => {
                    engine.destroy().await;
                    tracing::info!("Verification engine {} destroyed", engine.name());
                }
                Err(e) => tracing::info!("Verification engine never started: {}", e),
            },
            None => tracing::info!("Verification engine was never started"),
        }
    }
}

async fn load_handle(
    engine: Arc<dyn Engine>,
    circuits_dir: PathBuf,
    proof_type: ProofType,
) -> Result<Arc<CircuitHandle>, BackendError> {
    let artifact = circuit::load_artifact(&circuits_dir, proof_type).await?;
    let circuit_id = artifact.circuit_id.clone();
    let verifier = engine.load_circuit(artifact).await?;
    Ok(Arc::new(CircuitHandle {
        proof_type,
        circuit_id,
        engine,
        verifier,
    }))
}
