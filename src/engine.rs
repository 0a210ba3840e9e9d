use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::circuit::CircuitArtifact;
use crate::error::BackendError;

/// Serializes blocking calls into a non-reentrant native library.
///
/// The guard is moved into the blocking task, so the lock is held until the
/// call returns even if the awaiting future is dropped (for example by a
/// request timeout).
#[derive(Clone, Default)]
pub struct FfiLock {
    inner: Arc<Mutex<()>>,
}

impl FfiLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `call` on the blocking pool while holding the lock.
    pub async fn run<T, F>(&self, call: F) -> Result<T, BackendError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let guard = Arc::clone(&self.inner).lock_owned().await;
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            call()
        })
        .await
        .map_err(|e| BackendError::Engine(format!("FFI task aborted: {}", e)))
    }

    /// Wait until no call is running.
    pub async fn drain(&self) {
        let _guard = self.inner.lock().await;
    }
}

/// Starts the proving-system engine. Called at most once per successful
/// start by [`crate::backend::BackendManager`].
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Engine>, BackendError>;
}

/// A running proving-system engine, shared by every circuit.
#[async_trait]
pub trait Engine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Prepare a verifier for one compiled circuit.
    async fn load_circuit(
        &self,
        artifact: CircuitArtifact,
    ) -> Result<Arc<dyn CircuitVerifier>, BackendError>;

    async fn destroy(&self);
}

/// Per-circuit verification capability.
#[async_trait]
pub trait CircuitVerifier: Send + Sync {
    /// `Ok(false)` means the proof is cryptographically invalid; `Err` means
    /// the engine could not answer.
    async fn verify(&self, proof: &[u8], public_inputs: &[Vec<u8>]) -> Result<bool, BackendError>;

    async fn release(&self) {}
}

/// Counting in-memory engine for tests.
///
/// Proofs starting with `ok` verify, proofs starting with `boom` make the
/// engine fail, everything else is invalid. Artifacts whose bytecode
/// contains `broken` fail to load.
#[cfg(test)]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Default, Debug)]
    pub struct MockStats {
        launches: AtomicUsize,
        loads: AtomicUsize,
        verifies: AtomicUsize,
        releases: AtomicUsize,
        destroys: AtomicUsize,
    }

    impl MockStats {
        pub fn launches(&self) -> usize {
            self.launches.load(Ordering::SeqCst)
        }
        pub fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
        pub fn verifies(&self) -> usize {
            self.verifies.load(Ordering::SeqCst)
        }
        pub fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
        pub fn destroys(&self) -> usize {
            self.destroys.load(Ordering::SeqCst)
        }
    }

    pub struct MockLauncher {
        pub stats: Arc<MockStats>,
        failures_left: AtomicUsize,
        delay: Duration,
    }

    impl MockLauncher {
        pub fn new() -> Arc<Self> {
            Self::build(0, Duration::ZERO)
        }

        /// Launcher that sleeps in `launch` and `load_circuit`, so concurrent
        /// callers pile up on the in-flight future.
        pub fn slow(delay: Duration) -> Arc<Self> {
            Self::build(0, delay)
        }

        /// Slow launcher whose first `failures` launches fail.
        pub fn slow_failing(failures: usize, delay: Duration) -> Arc<Self> {
            Self::build(failures, delay)
        }

        fn build(failures: usize, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                stats: Arc::new(MockStats::default()),
                failures_left: AtomicUsize::new(failures),
                delay,
            })
        }
    }

    #[async_trait]
    impl EngineLauncher for MockLauncher {
        async fn launch(&self) -> Result<Arc<dyn Engine>, BackendError> {
            self.stats.launches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let failed = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(BackendError::EngineStart("mock engine refused to start".to_string()));
            }
            Ok(Arc::new(MockEngine {
                stats: Arc::clone(&self.stats),
                delay: self.delay,
            }))
        }
    }

    pub struct MockEngine {
        stats: Arc<MockStats>,
        delay: Duration,
    }

    #[async_trait]
    impl Engine for MockEngine {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn load_circuit(
            &self,
            artifact: CircuitArtifact,
        ) -> Result<Arc<dyn CircuitVerifier>, BackendError> {
            self.stats.loads.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if artifact.bytecode.contains("broken") {
                return Err(BackendError::CircuitLoad {
                    circuit_id: artifact.circuit_id,
                    reason: "mock bytecode rejected".to_string(),
                });
            }
            Ok(Arc::new(MockVerifier {
                stats: Arc::clone(&self.stats),
            }))
        }

        async fn destroy(&self) {
            self.stats.destroys.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub struct MockVerifier {
        stats: Arc<MockStats>,
    }

    #[async_trait]
    impl CircuitVerifier for MockVerifier {
        async fn verify(
            &self,
            proof: &[u8],
            _public_inputs: &[Vec<u8>],
        ) -> Result<bool, BackendError> {
            self.stats.verifies.fetch_add(1, Ordering::SeqCst);
            if proof.starts_with(b"boom") {
                return Err(BackendError::Engine("mock engine crashed".to_string()));
            }
            Ok(proof.starts_with(b"ok"))
        }

        async fn release(&self) {
            self.stats.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}
