use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sha2::{Digest, Sha256};

use crate::attestation;
use crate::backend::BackendManager;
use crate::circuit::circuit_info;
use crate::signer::{self, AttestationSigner};
use crate::types::{
    AttestationCheckResponse, CircuitsResponse, ErrorResponse, HealthResponse, PublicKeyResponse,
    SignedAttestation, VerifyRequest, VerifyResponse,
};
use crate::verifier::{ProofClaim, ProofSubmission, ProofVerifier};

/// Length of one epoch bucket.
pub const SECONDS_PER_EPOCH: i64 = 86_400;

/// Shared application state passed to all route handlers.
pub struct AppState {
    pub backend: Arc<BackendManager>,
    pub verifier: ProofVerifier,
    pub signer: Arc<AttestationSigner>,
    pub verify_timeout: Duration,
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, String> {
    let digits = attestation::strip_hex_prefix(value);
    hex::decode(digits).map_err(|e| format!("{} is not valid hex: {}", field, e))
}

/// A 32-byte field in its one accepted spelling: lowercase digits with an
/// optional lowercase `0x`. The v2 message binds the decoded bytes, so
/// other spellings of the same bytes are refused here rather than signed.
fn check_hex32(field: &'static str, value: &str) -> Result<(), String> {
    attestation::decode_hex32(field, value).map_err(|e| e.to_string())?;
    if value.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(format!("{} must be lowercase hex", field));
    }
    Ok(())
}

fn current_epoch() -> u64 {
    (chrono::Utc::now().timestamp() / SECONDS_PER_EPOCH).max(0) as u64
}

/// Schema checks for a submission. Runs before any engine work.
fn decode_submission(req: VerifyRequest) -> Result<ProofSubmission, String> {
    let proof = decode_hex("proof", &req.proof)?;
    if proof.is_empty() {
        return Err("proof must not be empty".to_string());
    }

    let public_inputs = req
        .public_inputs
        .iter()
        .enumerate()
        .map(|(i, input)| decode_hex(&format!("publicInputs[{}]", i), input))
        .collect::<Result<Vec<_>, _>>()?;

    check_hex32("nullifier", &req.nullifier)?;
    check_hex32("commitment", &req.commitment)?;

    let data_hash = match req.data_hash {
        Some(data_hash) => {
            check_hex32("data hash", &data_hash)?;
            data_hash
        }
        None => {
            let mut hasher = Sha256::new();
            for input in &public_inputs {
                hasher.update(input);
            }
            hex::encode(hasher.finalize())
        }
    };

    Ok(ProofSubmission {
        proof,
        public_inputs,
        claim: ProofClaim {
            proof_type: req.proof_type,
            nullifier: req.nullifier,
            commitment: req.commitment,
            epoch: req.epoch.unwrap_or_else(current_epoch),
            data_hash,
        },
    })
}

/// POST /verify — Verify a proof and issue a signed attestation.
///
/// Request body: VerifyRequest { proof, publicInputs, proofType, nullifier, commitment,
/// epoch?, dataHash? }
/// Response: VerifyResponse { success, attestation?, error? }
///
/// An invalid proof and a backend failure produce the same response; the
/// cause is only in the server logs.
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> impl IntoResponse {
    let submission = match decode_submission(req) {
        Ok(submission) => submission,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(VerifyResponse::failed(e))),
    };

    let result = match tokio::time::timeout(
        state.verify_timeout,
        state.verifier.verify(&submission),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                "Verification timed out after {:?}: type={}",
                state.verify_timeout,
                submission.claim.proof_type
            );
            return (
                StatusCode::GATEWAY_TIMEOUT,
                Json(VerifyResponse::failed("verification timed out")),
            );
        }
    };

    if !result.is_valid {
        return (
            StatusCode::BAD_REQUEST,
            Json(VerifyResponse::failed("proof verification failed")),
        );
    }

    match state.signer.sign(&result) {
        Ok(attestation) => {
            tracing::info!(
                "Attestation issued: type={} hash={}",
                result.proof_type,
                attestation.attestation_hash
            );
            (StatusCode::OK, Json(VerifyResponse::attested(attestation)))
        }
        Err(e) => {
            tracing::error!("Failed to sign attestation: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(VerifyResponse::failed(format!("failed to sign attestation: {}", e))),
            )
        }
    }
}

/// POST /attestations/verify — Check a signed attestation before submitting it on-chain.
pub async fn check_attestation_handler(
    Json(attestation): Json<SignedAttestation>,
) -> impl IntoResponse {
    let valid = signer::verify_signature(&attestation);
    (StatusCode::OK, Json(AttestationCheckResponse { valid }))
}

/// GET /circuits — Metadata for circuits currently cached.
pub async fn circuits_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let circuits = state
        .backend
        .cached_circuits()
        .await
        .into_iter()
        .map(circuit_info)
        .collect();
    (StatusCode::OK, Json(CircuitsResponse { circuits }))
}

/// GET /health — Health check endpoint.
///
/// Response: HealthResponse { status: "ok", engineReady, circuitsLoaded, cachedCircuits }
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cached_circuits = state.backend.cached_circuits().await;
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            engine_ready: state.backend.engine_ready().await,
            circuits_loaded: cached_circuits.len(),
            cached_circuits,
        }),
    )
}

/// GET /public-key — The verifier public key to register on-chain.
pub async fn public_key_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.signer.public_key() {
        Ok(public_key) => {
            (StatusCode::OK, Json(PublicKeyResponse { public_key })).into_response()
        }
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// Build the axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    use axum::routing::{get, post};
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    axum::Router::new()
        .route("/verify", post(verify_handler))
        .route("/attestations/verify", post(check_attestation_handler))
        .route("/circuits", get(circuits_handler))
        .route("/health", get(health_handler))
        .route("/public-key", get(public_key_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
