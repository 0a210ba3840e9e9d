mod attestation;
mod backend;
#[cfg(feature = "barretenberg")]
mod barretenberg;
mod circuit;
mod cli;
mod config;
mod engine;
mod error;
mod routes;
mod signer;
mod types;
mod verifier;

use std::sync::Arc;

use clap::Parser;

use crate::backend::BackendManager;
use crate::cli::{Cli, Command};
use crate::config::ServiceConfig;
use crate::engine::EngineLauncher;
use crate::routes::{build_router, AppState};
use crate::signer::AttestationSigner;
use crate::types::ProofType;
use crate::verifier::ProofVerifier;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vouch_attestor=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = ServiceConfig::from_env().unwrap_or_else(|e| {
        panic!("Invalid configuration: {}", e);
    });

    let outcome = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            serve(config).await;
            Ok(())
        }
        Command::PublicKey => cli::public_key(&config),
        Command::ExportKeypair => cli::export_keypair(&config),
        Command::InspectMessage { hex } => cli::inspect_message(&hex),
    };

    if let Err(e) = outcome {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "barretenberg")]
fn engine_launcher(config: &ServiceConfig) -> Arc<dyn EngineLauncher> {
    Arc::new(barretenberg::BarretenbergLauncher::new(config.srs_path.clone()))
}

#[cfg(not(feature = "barretenberg"))]
fn engine_launcher(_config: &ServiceConfig) -> Arc<dyn EngineLauncher> {
    panic!(
        "Proof verification requires the 'barretenberg' feature. \
         Build with: cargo build --features barretenberg"
    );
}

async fn serve(config: ServiceConfig) {
    tracing::info!("Starting attestation service: {:?}", config);

    // Signer first: a bad secret must stop startup before anything else happens.
    let signer = Arc::new(AttestationSigner::new());
    let keypair = signer
        .initialize(config.verifier_secret.as_deref())
        .unwrap_or_else(|e| {
            panic!("Verifier key setup failed: {}", e);
        });
    tracing::info!("Verifier public key: {}", keypair.public_key_base58());

    tracing::info!("Loading circuits from: {}", config.circuits_dir.display());
    let backend = Arc::new(BackendManager::new(
        engine_launcher(&config),
        config.circuits_dir.clone(),
    ));

    if config.preload_circuits {
        let loaded = backend.preload(&ProofType::ALL).await;
        if loaded.is_empty() {
            tracing::warn!(
                "No circuits loaded; every verification will fail until artifacts are present"
            );
        }
    }

    let state = Arc::new(AppState {
        verifier: ProofVerifier::new(Arc::clone(&backend)),
        backend: Arc::clone(&backend),
        signer,
        verify_timeout: config.verify_timeout,
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Attestation service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            panic!("Failed to bind to {}: {}", addr, e);
        });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            panic!("Server error: {}", e);
        });

    backend.shutdown().await;
    tracing::info!("Attestation service stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
