use clap::{Parser, Subcommand};

use crate::attestation::AttestationMessage;
use crate::config::ServiceConfig;
use crate::signer::{AttestationSigner, OperatorAccess};

#[derive(Debug, Parser)]
#[command(
    name = "vouch-attestor",
    version,
    about = "Verifies Vouch zero-knowledge proofs and signs attestations for the on-chain verifier"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service (default).
    Serve,
    /// Print the verifier public key for registration with `add_verifier`.
    PublicKey,
    /// Print the full verifier keypair as a JSON byte array. Operator use only.
    ExportKeypair,
    /// Decode a hex-encoded 125-byte attestation message.
    InspectMessage {
        /// Message bytes as hex, with or without `0x`.
        hex: String,
    },
}

/// Load the configured signer. Refuses to fall back to an ephemeral key:
/// a key that dies with this process is useless to register.
fn configured_signer(config: &ServiceConfig) -> Result<AttestationSigner, String> {
    let secret = config
        .verifier_secret
        .as_deref()
        .ok_or_else(|| "VERIFIER_SECRET_KEY is not set".to_string())?;
    let signer = AttestationSigner::new();
    signer.initialize(Some(secret)).map_err(|e| e.to_string())?;
    Ok(signer)
}

pub fn public_key(config: &ServiceConfig) -> Result<(), String> {
    let signer = configured_signer(config)?;
    println!("{}", signer.public_key().map_err(|e| e.to_string())?);
    Ok(())
}

pub fn export_keypair(config: &ServiceConfig) -> Result<(), String> {
    let signer = configured_signer(config)?;
    let keypair = signer
        .export_keypair(&OperatorAccess(()))
        .map_err(|e| e.to_string())?;
    tracing::warn!("Exporting verifier keypair to stdout");
    let json = serde_json::to_string(&keypair.to_vec()).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

pub fn inspect_message(hex_message: &str) -> Result<(), String> {
    let digits = hex_message.trim();
    let digits = digits.strip_prefix("0x").unwrap_or(digits);
    let bytes = hex::decode(digits).map_err(|e| format!("message is not valid hex: {}", e))?;
    let message = AttestationMessage::decode(&bytes).map_err(|e| e.to_string())?;

    let view = serde_json::json!({
        "proofType": message.proof_type,
        "nullifier": hex::encode(message.nullifier),
        "epoch": message.epoch,
        "dataHash": hex::encode(message.data_hash),
        "attestationHash": hex::encode(message.attestation_hash),
    });
    let pretty = serde_json::to_string_pretty(&view).map_err(|e| e.to_string())?;
    println!("{}", pretty);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::parse_from(["vouch-attestor"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_inspect_message() {
        let cli = Cli::parse_from(["vouch-attestor", "inspect-message", "0xdead"]);
        assert!(matches!(cli.command, Some(Command::InspectMessage { hex }) if hex == "0xdead"));
    }

    #[test]
    fn test_inspect_message_rejects_short_input() {
        let err = inspect_message("deadbeef").unwrap_err();
        assert!(err.contains("125"));
    }
}
