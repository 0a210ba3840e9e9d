use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Service configuration, read once from the environment at startup.
pub struct ServiceConfig {
    pub port: u16,
    pub circuits_dir: PathBuf,
    pub srs_path: Option<String>,
    pub verifier_secret: Option<String>,
    pub verify_timeout: Duration,
    pub preload_circuits: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Treat `VAR=` the same as an unset variable.
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(v) => v.trim().parse().map_err(|e| ConfigError::InvalidVar {
                name: "PORT",
                reason: format!("{}", e),
            })?,
            None => 4003,
        };

        let circuits_dir =
            PathBuf::from(var("CIRCUITS_DIR").unwrap_or_else(|| "./circuits".to_string()));

        let verify_timeout = match var("VERIFY_TIMEOUT_SECS") {
            Some(v) => {
                let secs: u64 = v.trim().parse().map_err(|e| ConfigError::InvalidVar {
                    name: "VERIFY_TIMEOUT_SECS",
                    reason: format!("{}", e),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidVar {
                        name: "VERIFY_TIMEOUT_SECS",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(30),
        };

        let preload_circuits = match var("PRELOAD_CIRCUITS").as_deref().map(str::trim) {
            None | Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            Some(other) => {
                return Err(ConfigError::InvalidVar {
                    name: "PRELOAD_CIRCUITS",
                    reason: format!("expected true/false, got {}", other),
                })
            }
        };

        Ok(Self {
            port,
            circuits_dir,
            srs_path: var("SRS_PATH"),
            verifier_secret: var("VERIFIER_SECRET_KEY"),
            verify_timeout,
            preload_circuits,
        })
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("port", &self.port)
            .field("circuits_dir", &self.circuits_dir)
            .field("srs_path", &self.srs_path)
            .field(
                "verifier_secret",
                &self.verifier_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("verify_timeout", &self.verify_timeout)
            .field("preload_circuits", &self.preload_circuits)
            .finish()
    }
}
