use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attestation::FormatVersion;
use crate::error::EncodingError;

/// Category of claim being proven.
///
/// The wire codes match the on-chain `ProofType` enum, where 0 is `Unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofType {
    Developer,
    Whale,
}

impl ProofType {
    pub const ALL: [ProofType; 2] = [ProofType::Developer, ProofType::Whale];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProofType::Developer => "developer",
            ProofType::Whale => "whale",
        }
    }

    /// One-byte code used in the v2 attestation message. Never 0.
    pub fn code(&self) -> u8 {
        match self {
            ProofType::Developer => 1,
            ProofType::Whale => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, EncodingError> {
        match code {
            1 => Ok(ProofType::Developer),
            2 => Ok(ProofType::Whale),
            other => Err(EncodingError::UnknownProofTypeCode(other)),
        }
    }
}

impl fmt::Display for ProofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProofType {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "developer" => Ok(ProofType::Developer),
            "whale" => Ok(ProofType::Whale),
            other => Err(EncodingError::UnknownProofType(other.to_string())),
        }
    }
}

/// Outcome of one verification attempt. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub is_valid: bool,
    pub proof_type: ProofType,
    pub nullifier: String,
    pub commitment: String,
    pub epoch: u64,
    pub data_hash: String,
    /// Unix time in milliseconds.
    pub verified_at: i64,
}

/// A verification result bound to the verifier's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAttestation {
    pub result: VerificationResult,
    /// Base58 Ed25519 public key of the signing verifier (a Solana `Pubkey`).
    pub verifier: String,
    /// Hex-encoded detached Ed25519 signature over the canonical message.
    pub signature: String,
    pub attestation_hash: String,
    /// Attestations issued before the version tag existed are v1.
    #[serde(default = "FormatVersion::legacy")]
    pub version: FormatVersion,
}

// ─────────────────────────────────────────────
// HTTP request / response bodies
// ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Hex-encoded proof bytes.
    pub proof: String,
    /// Hex-encoded public inputs, one entry per field element.
    pub public_inputs: Vec<String>,
    pub proof_type: ProofType,
    pub nullifier: String,
    pub commitment: String,
    #[serde(default)]
    pub epoch: Option<u64>,
    #[serde(default)]
    pub data_hash: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attestation: Option<SignedAttestation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyResponse {
    pub fn attested(attestation: SignedAttestation) -> Self {
        Self {
            success: true,
            attestation: Some(attestation),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            attestation: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttestationCheckResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CircuitInfo {
    pub id: String,
    pub proof_type: ProofType,
    pub display_name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct CircuitsResponse {
    pub circuits: Vec<CircuitInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub engine_ready: bool,
    pub circuits_loaded: usize,
    pub cached_circuits: Vec<ProofType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> VerificationResult {
        VerificationResult {
            is_valid: true,
            proof_type: ProofType::Developer,
            nullifier: "a".repeat(64),
            commitment: "b".repeat(64),
            epoch: 42,
            data_hash: "c".repeat(64),
            verified_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_proof_type_codes_are_never_zero() {
        for proof_type in ProofType::ALL {
            assert_ne!(proof_type.code(), 0);
            assert_eq!(ProofType::from_code(proof_type.code()).unwrap(), proof_type);
        }
    }

    #[test]
    fn test_proof_type_code_zero_is_rejected() {
        assert_eq!(
            ProofType::from_code(0),
            Err(EncodingError::UnknownProofTypeCode(0))
        );
    }

    #[test]
    fn test_proof_type_from_str() {
        assert_eq!("developer".parse::<ProofType>().unwrap(), ProofType::Developer);
        assert_eq!("whale".parse::<ProofType>().unwrap(), ProofType::Whale);
        assert!("Developer".parse::<ProofType>().is_err());
        assert!("nft_holder".parse::<ProofType>().is_err());
    }

    #[test]
    fn test_verification_result_serialize_camel_case() {
        let json = serde_json::to_value(sample_result()).unwrap();
        assert_eq!(json["isValid"], true);
        assert_eq!(json["proofType"], "developer");
        assert_eq!(json["dataHash"], "c".repeat(64));
        assert_eq!(json["verifiedAt"], 1_700_000_000_000i64);
        assert_eq!(json["epoch"], 42);
    }

    #[test]
    fn test_verify_request_deserialize() {
        let json = format!(
            r#"{{
                "proof": "deadbeef",
                "publicInputs": ["01", "02"],
                "proofType": "whale",
                "nullifier": "{}",
                "commitment": "{}"
            }}"#,
            "a".repeat(64),
            "b".repeat(64)
        );
        let req: VerifyRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req.proof_type, ProofType::Whale);
        assert_eq!(req.public_inputs, vec!["01", "02"]);
        assert!(req.epoch.is_none());
        assert!(req.data_hash.is_none());
    }

    #[test]
    fn test_verify_request_unknown_proof_type() {
        let json = r#"{
            "proof": "deadbeef",
            "publicInputs": [],
            "proofType": "nft_holder",
            "nullifier": "00",
            "commitment": "00"
        }"#;
        let result: Result<VerifyRequest, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_response_failed_omits_attestation() {
        let json =
            serde_json::to_value(VerifyResponse::failed("proof verification failed")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "proof verification failed");
        assert!(json.get("attestation").is_none());
    }

    #[test]
    fn test_signed_attestation_without_version_is_legacy() {
        let json = serde_json::json!({
            "result": serde_json::to_value(sample_result()).unwrap(),
            "verifier": "00",
            "signature": "00",
            "attestationHash": "00"
        });
        let attestation: SignedAttestation = serde_json::from_value(json).unwrap();
        assert_eq!(attestation.version, FormatVersion::V1);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse {
            status: "ok".to_string(),
            engine_ready: true,
            circuits_loaded: 1,
            cached_circuits: vec![ProofType::Developer],
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["engineReady"], true);
        assert_eq!(json["circuitsLoaded"], 1);
        assert_eq!(json["cachedCircuits"][0], "developer");
    }
}
