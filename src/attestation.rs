//! Canonical attestation messages.
//!
//! The bytes produced here are what the verifier signs and what the
//! on-chain program reconstructs, so every layout is frozen once shipped.
//! A new format gets a new `FormatVersion` and a new encoder; existing
//! encoders are never edited.
//!
//! v1 is a `|`-joined UTF-8 string. v2 is a fixed 125-byte record:
//!
//! ```text
//! offset  width  field
//!      0     20  domain separator "VOUCH_ATTESTATION_V2"
//!     20      1  proof type code
//!     21     32  nullifier
//!     53      8  epoch (u64, big-endian)
//!     61     32  data hash
//!     93     32  attestation hash = sha256("{1|0}|{proof_type}|{verified_at}")
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::EncodingError;
use crate::types::{ProofType, VerificationResult};

pub const DOMAIN_SEPARATOR: &[u8; 20] = b"VOUCH_ATTESTATION_V2";

pub const MESSAGE_LEN: usize = 125;

const PROOF_TYPE_OFFSET: usize = 20;
const NULLIFIER_OFFSET: usize = 21;
const EPOCH_OFFSET: usize = 53;
const DATA_HASH_OFFSET: usize = 61;
const ATTESTATION_HASH_OFFSET: usize = 93;

/// Number of hex characters in a 32-byte field.
const HEX32_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FormatVersion {
    V1,
    V2,
}

impl FormatVersion {
    pub const CURRENT: FormatVersion = FormatVersion::V2;

    /// Version assumed for attestations that carry no tag.
    pub fn legacy() -> Self {
        FormatVersion::V1
    }
}

impl TryFrom<u8> for FormatVersion {
    type Error = EncodingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FormatVersion::V1),
            2 => Ok(FormatVersion::V2),
            other => Err(EncodingError::UnsupportedVersion(other)),
        }
    }
}

impl From<FormatVersion> for u8 {
    fn from(version: FormatVersion) -> Self {
        match version {
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
        }
    }
}

/// Bytes to sign plus the attestation hash reported alongside them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMessage {
    pub version: FormatVersion,
    pub bytes: Vec<u8>,
    pub attestation_hash: [u8; 32],
}

impl CanonicalMessage {
    pub fn attestation_hash_hex(&self) -> String {
        hex::encode(self.attestation_hash)
    }
}

/// Build the canonical message for `result` in the requested format.
pub fn build(
    result: &VerificationResult,
    version: FormatVersion,
) -> Result<CanonicalMessage, EncodingError> {
    match version {
        FormatVersion::V1 => Ok(encode_v1(result)),
        FormatVersion::V2 => encode_v2(result),
    }
}

fn validity_flag(result: &VerificationResult) -> char {
    if result.is_valid {
        '1'
    } else {
        '0'
    }
}

fn encode_v1(result: &VerificationResult) -> CanonicalMessage {
    let joined = format!(
        "{}|{}|{}|{}|{}|{}|{}",
        validity_flag(result),
        result.proof_type,
        result.nullifier,
        result.commitment,
        result.epoch,
        result.data_hash,
        result.verified_at
    );
    let attestation_hash: [u8; 32] = Sha256::digest(joined.as_bytes()).into();
    CanonicalMessage {
        version: FormatVersion::V1,
        bytes: joined.into_bytes(),
        attestation_hash,
    }
}

/// SHA-256 over the verification outcome and its timestamp.
///
/// Commits to the fields the v2 layout has no slot for; the surrounding
/// message then binds it to one nullifier/epoch/data-hash triple.
pub fn metadata_hash(result: &VerificationResult) -> [u8; 32] {
    let metadata = format!(
        "{}|{}|{}",
        validity_flag(result),
        result.proof_type,
        result.verified_at
    );
    Sha256::digest(metadata.as_bytes()).into()
}

fn encode_v2(result: &VerificationResult) -> Result<CanonicalMessage, EncodingError> {
    let message = AttestationMessage {
        proof_type: result.proof_type,
        nullifier: decode_hex32("nullifier", &result.nullifier)?,
        epoch: result.epoch,
        data_hash: decode_hex32("data hash", &result.data_hash)?,
        attestation_hash: metadata_hash(result),
    };
    Ok(CanonicalMessage {
        version: FormatVersion::V2,
        bytes: message.to_bytes().to_vec(),
        attestation_hash: message.attestation_hash,
    })
}

/// Drop a leading `0x` or `0X`.
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Decode a 32-byte field from 64 hex characters, with an optional `0x`.
///
/// Length is checked before decoding; nothing is padded or truncated.
/// Case and prefix do not change the bytes, so a v2 signature binds the
/// decoded value, not the exact string in the result.
pub fn decode_hex32(field: &'static str, value: &str) -> Result<[u8; 32], EncodingError> {
    let digits = strip_hex_prefix(value);
    if digits.len() != HEX32_LEN {
        return Err(EncodingError::HexLength {
            field,
            expected: HEX32_LEN,
            actual: digits.len(),
        });
    }
    let mut out = [0u8; 32];
    hex::decode_to_slice(digits, &mut out).map_err(|e| EncodingError::InvalidHex {
        field,
        reason: e.to_string(),
    })?;
    Ok(out)
}

/// Field view of a v2 message, as the on-chain decoder sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationMessage {
    pub proof_type: ProofType,
    pub nullifier: [u8; 32],
    pub epoch: u64,
    pub data_hash: [u8; 32],
    pub attestation_hash: [u8; 32],
}

impl AttestationMessage {
    /// The v2 layout. Both signing and verification go through here.
    pub fn to_bytes(&self) -> [u8; MESSAGE_LEN] {
        let mut out = [0u8; MESSAGE_LEN];
        out[..PROOF_TYPE_OFFSET].copy_from_slice(DOMAIN_SEPARATOR);
        out[PROOF_TYPE_OFFSET] = self.proof_type.code();
        out[NULLIFIER_OFFSET..EPOCH_OFFSET].copy_from_slice(&self.nullifier);
        out[EPOCH_OFFSET..DATA_HASH_OFFSET].copy_from_slice(&self.epoch.to_be_bytes());
        out[DATA_HASH_OFFSET..ATTESTATION_HASH_OFFSET].copy_from_slice(&self.data_hash);
        out[ATTESTATION_HASH_OFFSET..].copy_from_slice(&self.attestation_hash);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EncodingError> {
        if bytes.len() != MESSAGE_LEN {
            return Err(EncodingError::MessageLength {
                expected: MESSAGE_LEN,
                actual: bytes.len(),
            });
        }
        if &bytes[..PROOF_TYPE_OFFSET] != DOMAIN_SEPARATOR {
            return Err(EncodingError::DomainSeparator);
        }
        let proof_type = ProofType::from_code(bytes[PROOF_TYPE_OFFSET])?;

        let mut nullifier = [0u8; 32];
        nullifier.copy_from_slice(&bytes[NULLIFIER_OFFSET..EPOCH_OFFSET]);
        let mut epoch = [0u8; 8];
        epoch.copy_from_slice(&bytes[EPOCH_OFFSET..DATA_HASH_OFFSET]);
        let mut data_hash = [0u8; 32];
        data_hash.copy_from_slice(&bytes[DATA_HASH_OFFSET..ATTESTATION_HASH_OFFSET]);
        let mut attestation_hash = [0u8; 32];
        attestation_hash.copy_from_slice(&bytes[ATTESTATION_HASH_OFFSET..]);

        Ok(Self {
            proof_type,
            nullifier,
            epoch: u64::from_be_bytes(epoch),
            data_hash,
            attestation_hash,
        })
    }
}
