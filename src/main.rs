//! agentinstall-webhook - validating admission webhook for AgentClusterInstall.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Starts the health server
//! - Starts the TLS webhook server
//!
//! The webhook is stateless; every replica serves identically, so there is
//! no leader election.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use agentinstall_webhook::health::{HealthState, run_health_server};
use agentinstall_webhook::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, run_webhook_server};

/// Grace period for in-flight admission requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agentinstall_webhook=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting agentinstall-webhook");

    if !Path::new(WEBHOOK_CERT_PATH).exists() || !Path::new(WEBHOOK_KEY_PATH).exists() {
        error!(
            cert_path = WEBHOOK_CERT_PATH,
            key_path = WEBHOOK_KEY_PATH,
            "TLS certificates not found; the webhook cannot serve without them"
        );
        return Err("missing webhook TLS certificates".into());
    }

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    // Start health server immediately (probes should work before readiness)
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    // Start webhook server
    let webhook_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            health_state.set_ready(true).await;
            if let Err(e) =
                run_webhook_server(health_state.clone(), WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH).await
            {
                error!("Webhook server error: {}", e);
            }
            health_state.set_ready(false).await;
        })
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready so the endpoint drops out of rotation
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            // Give in-flight admission requests time to complete
            info!(
                "Waiting {}s for in-flight requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut
/// down gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
