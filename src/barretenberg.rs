//! Barretenberg UltraHonk (Keccak) engine via noir_rs.
//!
//! barretenberg's C++ FFI has global mutable state and is NOT thread-safe,
//! so every call goes through one [`FfiLock`] shared by the engine and all
//! of its circuit verifiers. The calls themselves are blocking and run on
//! the blocking pool while the lock is held.

use std::sync::Arc;

use async_trait::async_trait;
use noir_rs::barretenberg::srs::setup_srs_from_bytecode;
use noir_rs::barretenberg::verify::{
    get_ultra_honk_keccak_verification_key, verify_ultra_honk_keccak,
};

use crate::circuit::CircuitArtifact;
use crate::engine::{CircuitVerifier, Engine, EngineLauncher, FfiLock};
use crate::error::BackendError;

pub struct BarretenbergLauncher {
    srs_path: Option<String>,
}

impl BarretenbergLauncher {
    pub fn new(srs_path: Option<String>) -> Self {
        Self { srs_path }
    }
}

#[async_trait]
impl EngineLauncher for BarretenbergLauncher {
    async fn launch(&self) -> Result<Arc<dyn Engine>, BackendError> {
        if let Some(parent) = self
            .srs_path
            .as_deref()
            .and_then(|path| std::path::Path::new(path).parent())
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                BackendError::EngineStart(format!(
                    "SRS directory {} unusable: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        tracing::info!(
            "Barretenberg engine started (srs={})",
            self.srs_path.as_deref().unwrap_or("default")
        );
        Ok(Arc::new(BarretenbergEngine {
            ffi: FfiLock::new(),
            srs_path: self.srs_path.clone(),
        }))
    }
}

pub struct BarretenbergEngine {
    ffi: FfiLock,
    srs_path: Option<String>,
}

#[async_trait]
impl Engine for BarretenbergEngine {
    fn name(&self) -> &'static str {
        "barretenberg-ultrahonk-keccak"
    }

    /// Sets up the SRS for the circuit size (downloads from the Aztec CDN if
    /// it is not cached) and derives the verification key.
    async fn load_circuit(
        &self,
        artifact: CircuitArtifact,
    ) -> Result<Arc<dyn CircuitVerifier>, BackendError> {
        let circuit_id = artifact.circuit_id.clone();
        let srs_path = self.srs_path.clone();
        let bytecode = artifact.bytecode;

        tracing::info!("Setting up SRS and VK for {}", circuit_id);
        let vk = self
            .ffi
            .run(move || -> Result<Vec<u8>, String> {
                setup_srs_from_bytecode(bytecode.as_str(), srs_path.as_deref(), false)
                    .map_err(|e| format!("SRS setup failed: {}", e))?;
                get_ultra_honk_keccak_verification_key(bytecode.as_str(), false, false)
                    .map_err(|e| format!("VK generation failed: {}", e))
            })
            .await?
            .map_err(|reason| BackendError::CircuitLoad {
                circuit_id: circuit_id.clone(),
                reason,
            })?;

        tracing::info!("Circuit {} ready: vk={} bytes", circuit_id, vk.len());

        Ok(Arc::new(BarretenbergVerifier {
            ffi: self.ffi.clone(),
            circuit_id,
            vk,
        }))
    }

    async fn destroy(&self) {
        self.ffi.drain().await;
        tracing::info!("Barretenberg engine destroyed");
    }
}

pub struct BarretenbergVerifier {
    ffi: FfiLock,
    circuit_id: String,
    vk: Vec<u8>,
}

#[async_trait]
impl CircuitVerifier for BarretenbergVerifier {
    /// noir_rs expects `public_inputs ++ proof` as one buffer.
    async fn verify(&self, proof: &[u8], public_inputs: &[Vec<u8>]) -> Result<bool, BackendError> {
        let mut proof_with_inputs: Vec<u8> =
            Vec::with_capacity(public_inputs.iter().map(Vec::len).sum::<usize>() + proof.len());
        for input in public_inputs {
            proof_with_inputs.extend_from_slice(input);
        }
        proof_with_inputs.extend_from_slice(proof);

        tracing::debug!(
            "Verifying proof for circuit={} proof_len={}",
            self.circuit_id,
            proof_with_inputs.len()
        );

        let vk = self.vk.clone();
        self.ffi
            .run(move || verify_ultra_honk_keccak(proof_with_inputs, vk, false))
            .await?
            .map_err(|e| BackendError::Engine(format!("Verification failed: {}", e)))
    }

    async fn release(&self) {
        tracing::debug!("Released verifier for circuit {}", self.circuit_id);
    }
}
