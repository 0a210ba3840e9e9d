use thiserror::Error;

/// Startup configuration problems. Fatal, never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    InvalidVar { name: &'static str, reason: String },

    #[error("verifier secret key is not a valid base58 string, hex string or JSON byte array")]
    UndecodableSecret,

    #[error("verifier secret key has {0} bytes, expected 32 (seed) or 64 (keypair)")]
    SecretLength(usize),

    #[error("verifier secret keypair is inconsistent: {0}")]
    InconsistentKeypair(String),
}

/// Failures inside the verification backend.
///
/// Cloneable so that one in-flight initialization can hand the same failure
/// to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("engine initialization failed: {0}")]
    EngineStart(String),

    #[error("circuit artifact not found: {0}")]
    ArtifactMissing(String),

    #[error("circuit artifact malformed: {0}")]
    ArtifactMalformed(String),

    #[error("circuit load failed for {circuit_id}: {reason}")]
    CircuitLoad { circuit_id: String, reason: String },

    #[error("engine call failed: {0}")]
    Engine(String),

    #[error("verification backend has been shut down")]
    ShutDown,
}

/// Malformed input to the attestation encoders. Raised before any
/// signing happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("{field} must be {expected} hex characters, got {actual}")]
    HexLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field} is not valid hex: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("attestation message must be {expected} bytes, got {actual}")]
    MessageLength { expected: usize, actual: usize },

    #[error("attestation message has an unexpected domain separator")]
    DomainSeparator,

    #[error("unknown proof type code {0}")]
    UnknownProofTypeCode(u8),

    #[error("unknown proof type: {0}")]
    UnknownProofType(String),

    #[error("unsupported attestation format version {0}")]
    UnsupportedVersion(u8),
}

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("signer has not been initialized")]
    NotInitialized,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}
