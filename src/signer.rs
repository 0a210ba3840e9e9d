use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use once_cell::sync::OnceCell;
use rand::rngs::OsRng;

use crate::attestation::{self, FormatVersion};
use crate::error::{ConfigError, SignerError};
use crate::types::{SignedAttestation, VerificationResult};

/// The verifier's Ed25519 keypair.
///
/// Does not implement `Serialize`, and `Debug` only shows the public key.
pub struct VerifierKeypair {
    signing_key: SigningKey,
}

impl VerifierKeypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Parse a configured secret.
    ///
    /// Accepts a base58 string (the form Solana wallets export), a hex
    /// string or a JSON byte array (the `solana-keygen` file format),
    /// holding either a 32-byte seed or a 64-byte `secret ++ public` keypair.
    pub fn from_secret(secret: &str) -> Result<Self, ConfigError> {
        let bytes = decode_secret(secret)?;
        let signing_key = match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                SigningKey::from_bytes(&seed)
            }
            64 => {
                let mut keypair = [0u8; 64];
                keypair.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&keypair)
                    .map_err(|e| ConfigError::InconsistentKeypair(e.to_string()))?
            }
            n => return Err(ConfigError::SecretLength(n)),
        };
        Ok(Self { signing_key })
    }

    /// Base58 public key, the form `add_verifier` takes as a `Pubkey`.
    pub fn public_key_base58(&self) -> String {
        bs58::encode(self.signing_key.verifying_key().to_bytes()).into_string()
    }
}

impl std::fmt::Debug for VerifierKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifierKeypair(public={}, <private>)", self.public_key_base58())
    }
}

/// Hex lengths of a seed and of a keypair. Base58 encodings of 32 or 64
/// bytes are never this long, so length alone tells the two apart.
const HEX_SECRET_LENS: [usize; 2] = [64, 128];

fn decode_secret(secret: &str) -> Result<Vec<u8>, ConfigError> {
    let secret = secret.trim();
    if secret.starts_with('[') {
        return serde_json::from_str::<Vec<u8>>(secret)
            .map_err(|_| ConfigError::UndecodableSecret);
    }
    if let Some(digits) = secret.strip_prefix("0x") {
        return hex::decode(digits).map_err(|_| ConfigError::UndecodableSecret);
    }
    let looks_hex = secret.bytes().all(|b| b.is_ascii_hexdigit());
    if looks_hex && HEX_SECRET_LENS.contains(&secret.len()) {
        return hex::decode(secret).map_err(|_| ConfigError::UndecodableSecret);
    }
    bs58::decode(secret)
        .into_vec()
        .map_err(|_| ConfigError::UndecodableSecret)
}

/// Proof that the caller is operator tooling rather than a request handler.
/// Only the operator CLI constructs one; HTTP handlers never do.
pub struct OperatorAccess(pub(crate) ());

/// Holds the verifier keypair and signs attestations.
///
/// The keypair is written once by [`AttestationSigner::initialize`] and only
/// read afterwards.
#[derive(Default)]
pub struct AttestationSigner {
    keypair: OnceCell<VerifierKeypair>,
}

impl AttestationSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the keypair, or return the one already loaded.
    ///
    /// With no secret an ephemeral keypair is generated; attestations it
    /// signs die with the process.
    pub fn initialize(&self, secret: Option<&str>) -> Result<&VerifierKeypair, SignerError> {
        let keypair = self.keypair.get_or_try_init(|| match secret {
            Some(secret) => VerifierKeypair::from_secret(secret),
            None => {
                tracing::warn!("==============================================================");
                tracing::warn!("VERIFIER_SECRET_KEY is not set: using an EPHEMERAL keypair.");
                tracing::warn!("Attestations will not verify on-chain after a restart.");
                tracing::warn!("Never run this configuration in production.");
                tracing::warn!("==============================================================");
                Ok(VerifierKeypair::generate())
            }
        })?;
        Ok(keypair)
    }

    fn keypair(&self) -> Result<&VerifierKeypair, SignerError> {
        self.keypair.get().ok_or(SignerError::NotInitialized)
    }

    pub fn public_key(&self) -> Result<String, SignerError> {
        Ok(self.keypair()?.public_key_base58())
    }

    /// Sign `result` in the current message format.
    pub fn sign(&self, result: &VerificationResult) -> Result<SignedAttestation, SignerError> {
        self.sign_as(result, FormatVersion::CURRENT)
    }

    pub fn sign_as(
        &self,
        result: &VerificationResult,
        version: FormatVersion,
    ) -> Result<SignedAttestation, SignerError> {
        let keypair = self.keypair()?;
        let message = attestation::build(result, version)?;
        let signature = keypair.signing_key.sign(&message.bytes);

        Ok(SignedAttestation {
            result: result.clone(),
            verifier: keypair.public_key_base58(),
            signature: hex::encode(signature.to_bytes()),
            attestation_hash: message.attestation_hash_hex(),
            version: message.version,
        })
    }

    /// Raw `secret ++ public` keypair bytes for registering the verifier
    /// on-chain.
    pub fn export_keypair(&self, _access: &OperatorAccess) -> Result<[u8; 64], SignerError> {
        Ok(self.keypair()?.signing_key.to_keypair_bytes())
    }
}

/// Rebuild the message from `attestation.result` and check the embedded
/// hash and signature against the embedded public key.
pub fn verify_signature(attestation: &SignedAttestation) -> bool {
    match check_signature(attestation) {
        Ok(()) => true,
        Err(reason) => {
            tracing::debug!("Attestation rejected: {}", reason);
            false
        }
    }
}

fn check_signature(attestation: &SignedAttestation) -> Result<(), String> {
    let message = attestation::build(&attestation.result, attestation.version)
        .map_err(|e| e.to_string())?;

    let claimed_hash = hex::decode(&attestation.attestation_hash)
        .map_err(|e| format!("attestation hash is not hex: {}", e))?;
    if claimed_hash != message.attestation_hash {
        return Err("attestation hash does not match result".to_string());
    }

    let public_key: [u8; 32] = bs58::decode(&attestation.verifier)
        .into_vec()
        .map_err(|e| format!("verifier key is not base58: {}", e))?
        .try_into()
        .map_err(|_| "verifier key must be 32 bytes".to_string())?;
    let verifying_key =
        VerifyingKey::from_bytes(&public_key).map_err(|e| format!("invalid verifier key: {}", e))?;

    let signature: [u8; 64] = hex::decode(&attestation.signature)
        .map_err(|e| format!("signature is not hex: {}", e))?
        .try_into()
        .map_err(|_| "signature must be 64 bytes".to_string())?;

    verifying_key
        .verify_strict(&message.bytes, &Signature::from_bytes(&signature))
        .map_err(|e| format!("signature check failed: {}", e))
}
