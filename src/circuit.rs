use std::path::{Path, PathBuf};

use crate::error::BackendError;
use crate::types::{CircuitInfo, ProofType};

/// Compiled circuit as read from disk, before the engine has seen it.
#[derive(Clone, Debug)]
pub struct CircuitArtifact {
    pub circuit_id: String,
    pub bytecode: String,
}

/// Canonical circuit ID for each proof type.
pub fn circuit_id(proof_type: ProofType) -> &'static str {
    match proof_type {
        ProofType::Developer => "dev_reputation",
        ProofType::Whale => "whale_trading",
    }
}

/// Circuit metadata for one proof type.
pub fn circuit_info(proof_type: ProofType) -> CircuitInfo {
    let (display_name, description) = match proof_type {
        ProofType::Developer => (
            "Developer Reputation",
            "Prove deployed programs hold at least a TVL threshold without revealing the wallet",
        ),
        ProofType::Whale => (
            "Whale Trading",
            "Prove trading volume above a threshold without revealing the wallet",
        ),
    };
    CircuitInfo {
        id: circuit_id(proof_type).to_string(),
        proof_type,
        display_name: display_name.to_string(),
        description: description.to_string(),
    }
}

/// Location of a compiled circuit under `circuits_dir`.
///
/// ```text
/// circuits_dir/
///   dev_reputation/target/dev_reputation.json
///   whale_trading/target/whale_trading.json
/// ```
pub fn artifact_path(circuits_dir: &Path, proof_type: ProofType) -> PathBuf {
    let id = circuit_id(proof_type);
    circuits_dir
        .join(id)
        .join("target")
        .join(format!("{}.json", id))
}

/// Extract the bytecode string from a compiled Noir circuit JSON document.
/// The JSON has a top-level `bytecode` field containing the base64 circuit.
fn parse_bytecode(path: &Path, contents: &str) -> Result<String, BackendError> {
    let json: serde_json::Value = serde_json::from_str(contents).map_err(|e| {
        BackendError::ArtifactMalformed(format!(
            "Failed to parse circuit JSON at {}: {}",
            path.display(),
            e
        ))
    })?;
    json["bytecode"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            BackendError::ArtifactMalformed(format!(
                "No 'bytecode' field in circuit JSON at {}",
                path.display()
            ))
        })
}

/// Read the artifact for `proof_type` from disk.
///
/// A missing file is a configuration error; the caller decides whether the
/// service can run without that circuit.
pub async fn load_artifact(
    circuits_dir: &Path,
    proof_type: ProofType,
) -> Result<CircuitArtifact, BackendError> {
    let path = artifact_path(circuits_dir, proof_type);
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BackendError::ArtifactMissing(path.display().to_string()));
        }
        Err(e) => {
            return Err(BackendError::ArtifactMalformed(format!(
                "Failed to read circuit JSON at {}: {}",
                path.display(),
                e
            )));
        }
    };
    let bytecode = parse_bytecode(&path, &contents)?;

    tracing::info!(
        "Loaded circuit artifact: {} from {} ({} chars)",
        circuit_id(proof_type),
        path.display(),
        bytecode.len()
    );

    Ok(CircuitArtifact {
        circuit_id: circuit_id(proof_type).to_string(),
        bytecode,
    })
}

/// Write a minimal artifact for every proof type into a fresh directory.
#[cfg(test)]
pub fn write_test_artifacts(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vouch_test_{}", name));
    std::fs::remove_dir_all(&dir).ok();
    for proof_type in ProofType::ALL {
        let path = artifact_path(&dir, proof_type);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            format!(
                r#"{{"bytecode": "H4sIAAAAAAAA/{}", "abi": {{}}}}"#,
                circuit_id(proof_type)
            ),
        )
        .unwrap();
    }
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_ids() {
        assert_eq!(circuit_id(ProofType::Developer), "dev_reputation");
        assert_eq!(circuit_id(ProofType::Whale), "whale_trading");
    }

    #[test]
    fn test_circuit_info_display_names() {
        assert_eq!(
            circuit_info(ProofType::Developer).display_name,
            "Developer Reputation"
        );
        assert_eq!(circuit_info(ProofType::Whale).display_name, "Whale Trading");
    }

    #[test]
    fn test_artifact_path_layout() {
        let path = artifact_path(Path::new("/circuits"), ProofType::Whale);
        assert_eq!(
            path,
            PathBuf::from("/circuits/whale_trading/target/whale_trading.json")
        );
    }

    #[tokio::test]
    async fn test_load_artifact_valid() {
        let dir = write_test_artifacts("artifact_valid");
        let artifact = load_artifact(&dir, ProofType::Developer).await.unwrap();
        assert_eq!(artifact.circuit_id, "dev_reputation");
        assert_eq!(artifact.bytecode, "H4sIAAAAAAAA/dev_reputation");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_load_artifact_missing_file() {
        let result = load_artifact(Path::new("/nonexistent/circuits"), ProofType::Developer).await;
        assert!(matches!(result, Err(BackendError::ArtifactMissing(_))));
    }

    #[tokio::test]
    async fn test_load_artifact_missing_bytecode_field() {
        let dir = std::env::temp_dir().join("vouch_test_artifact_no_bc");
        let path = artifact_path(&dir, ProofType::Whale);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"abi": {}}"#).unwrap();

        let err = load_artifact(&dir, ProofType::Whale).await.unwrap_err();
        assert!(err.to_string().contains("No 'bytecode' field"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_load_artifact_invalid_json() {
        let dir = std::env::temp_dir().join("vouch_test_artifact_bad_json");
        let path = artifact_path(&dir, ProofType::Whale);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not valid json").unwrap();

        let err = load_artifact(&dir, ProofType::Whale).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
