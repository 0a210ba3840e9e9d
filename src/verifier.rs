use std::sync::Arc;

use crate::backend::BackendManager;
use crate::error::BackendError;
use crate::types::{ProofType, VerificationResult};

/// The claim a proof is submitted for. Carried into the result verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofClaim {
    pub proof_type: ProofType,
    pub nullifier: String,
    pub commitment: String,
    pub epoch: u64,
    pub data_hash: String,
}

/// A decoded proof submission.
#[derive(Debug, Clone)]
pub struct ProofSubmission {
    pub proof: Vec<u8>,
    pub public_inputs: Vec<Vec<u8>>,
    pub claim: ProofClaim,
}

/// Why a verification attempt ended the way it did.
///
/// Callers of the public API only see `is_valid`; this keeps the cause
/// available for logs and retry decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Valid,
    Invalid,
    InfrastructureError(BackendError),
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid)
    }
}

pub struct ProofVerifier {
    backend: Arc<BackendManager>,
}

impl ProofVerifier {
    pub fn new(backend: Arc<BackendManager>) -> Self {
        Self { backend }
    }

    /// Ask the circuit's verifier about the proof, loading the circuit on
    /// first use.
    pub async fn check(&self, submission: &ProofSubmission) -> VerificationOutcome {
        let proof_type = submission.claim.proof_type;

        let handle = match self.backend.circuit_handle(proof_type).await {
            Ok(handle) => handle,
            Err(e) => return VerificationOutcome::InfrastructureError(e),
        };

        tracing::info!(
            "Verifying {} proof: circuit={} engine={} proof_len={} public_inputs={}",
            handle.proof_type,
            handle.circuit_id,
            handle.engine.name(),
            submission.proof.len(),
            submission.public_inputs.len()
        );

        match handle
            .verifier
            .verify(&submission.proof, &submission.public_inputs)
            .await
        {
            Ok(true) => VerificationOutcome::Valid,
            Ok(false) => VerificationOutcome::Invalid,
            Err(e) => VerificationOutcome::InfrastructureError(e),
        }
    }

    /// Verify a submission and record the outcome.
    ///
    /// Never fails: any backend error becomes `is_valid = false`.
    pub async fn verify(&self, submission: &ProofSubmission) -> VerificationResult {
        self.verify_with_outcome(submission).await.0
    }

    pub async fn verify_with_outcome(
        &self,
        submission: &ProofSubmission,
    ) -> (VerificationResult, VerificationOutcome) {
        let outcome = self.check(submission).await;
        let claim = &submission.claim;

        match &outcome {
            VerificationOutcome::Valid => {
                tracing::info!("Proof valid: type={} epoch={}", claim.proof_type, claim.epoch)
            }
            VerificationOutcome::Invalid => {
                tracing::warn!("Proof invalid: type={} epoch={}", claim.proof_type, claim.epoch)
            }
            VerificationOutcome::InfrastructureError(e) => tracing::error!(
                "Proof verification errored: type={} epoch={} cause={}",
                claim.proof_type,
                claim.epoch,
                e
            ),
        }

        let result = VerificationResult {
            is_valid: outcome.is_valid(),
            proof_type: claim.proof_type,
            nullifier: claim.nullifier.clone(),
            commitment: claim.commitment.clone(),
            epoch: claim.epoch,
            data_hash: claim.data_hash.clone(),
            verified_at: chrono::Utc::now().timestamp_millis(),
        };
        (result, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::write_test_artifacts;
    use crate::engine::mock::MockLauncher;

    fn submission(proof: &[u8], proof_type: ProofType) -> ProofSubmission {
        ProofSubmission {
            proof: proof.to_vec(),
            public_inputs: vec![vec![0u8; 32]],
            claim: ProofClaim {
                proof_type,
                nullifier: format!("0x{}", "a".repeat(64)),
                commitment: "B".repeat(64),
                epoch: 42,
                data_hash: "c".repeat(64),
            },
        }
    }

    fn verifier_for(dir: &std::path::Path) -> (ProofVerifier, Arc<MockLauncher>) {
        let launcher = MockLauncher::new();
        let backend = Arc::new(BackendManager::new(launcher.clone(), dir));
        (ProofVerifier::new(backend), launcher)
    }

    #[tokio::test]
    async fn test_valid_proof() {
        let dir = write_test_artifacts("verifier_valid");
        let (verifier, launcher) = verifier_for(&dir);

        let before = chrono::Utc::now().timestamp_millis();
        let result = verifier.verify(&submission(b"ok-proof", ProofType::Developer)).await;

        assert!(result.is_valid);
        assert_eq!(result.proof_type, ProofType::Developer);
        assert_eq!(result.epoch, 42);
        assert!(result.verified_at >= before);
        assert_eq!(launcher.stats.verifies(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_invalid_proof_is_a_result_not_an_error() {
        let dir = write_test_artifacts("verifier_invalid");
        let (verifier, _) = verifier_for(&dir);

        let (result, outcome) = verifier
            .verify_with_outcome(&submission(b"forged", ProofType::Whale))
            .await;

        assert!(!result.is_valid);
        assert_eq!(outcome, VerificationOutcome::Invalid);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_engine_error_folds_into_invalid() {
        let dir = write_test_artifacts("verifier_engine_error");
        let (verifier, _) = verifier_for(&dir);

        let (result, outcome) = verifier
            .verify_with_outcome(&submission(b"boom", ProofType::Developer))
            .await;

        assert!(!result.is_valid);
        assert!(matches!(
            outcome,
            VerificationOutcome::InfrastructureError(BackendError::Engine(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_circuit_folds_into_invalid() {
        let (verifier, launcher) = verifier_for(std::path::Path::new("/nonexistent/circuits"));

        let (result, outcome) = verifier
            .verify_with_outcome(&submission(b"ok-proof", ProofType::Developer))
            .await;

        assert!(!result.is_valid);
        assert!(matches!(
            outcome,
            VerificationOutcome::InfrastructureError(BackendError::ArtifactMissing(_))
        ));
        assert_eq!(launcher.stats.verifies(), 0);
    }

    #[tokio::test]
    async fn test_claim_fields_preserved_verbatim() {
        let dir = write_test_artifacts("verifier_preserve");
        let (verifier, _) = verifier_for(&dir);
        let input = submission(b"forged", ProofType::Whale);

        let result = verifier.verify(&input).await;

        assert_eq!(result.nullifier, input.claim.nullifier);
        assert_eq!(result.commitment, "B".repeat(64));
        assert_eq!(result.data_hash, input.claim.data_hash);
        assert_eq!(result.epoch, input.claim.epoch);
        std::fs::remove_dir_all(&dir).ok();
    }
}
