//! Admission webhook server.
//!
//! Provides the HTTP endpoint for the Kubernetes admission webhook.
//!
//! To enable the webhook:
//! 1. Deploy cert-manager for TLS certificates
//! 2. Create a ValidatingWebhookConfiguration for agentclusterinstalls
//! 3. Mount the TLS certificate secret to the pod at /etc/webhook/certs/
//!
//! Requests for resources no registered policy claims are allowed
//! unconditionally; this webhook has no opinion on them.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::response::StatusSummary;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::health::HealthState;
use crate::webhooks::policies::{
    AdmissionPolicy, STATUS_BAD_REQUEST, ValidationResult,
    immutability::{
        ADMISSION_GROUP, ADMISSION_RESOURCE, ADMISSION_SINGULAR, ADMISSION_VERSION,
        ImmutabilityPolicy,
    },
};

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;

/// Shared state for webhook handlers
pub struct WebhookState {
    /// Registered policies, consulted in order.
    pub policies: Vec<Box<dyn AdmissionPolicy>>,
    /// Health state for recording admission metrics.
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(policies: Vec<Box<dyn AdmissionPolicy>>, health: Arc<HealthState>) -> Self {
        Self { policies, health }
    }
}

/// Run a request through the registered policies and build the response.
///
/// The first policy whose `matches` returns true decides; if none claims
/// the request, it is allowed. Pure apart from logging, so the admission
/// contract can be tested without the HTTP layer.
pub fn process(
    policies: &[Box<dyn AdmissionPolicy>],
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    for policy in policies {
        if policy.matches(request) {
            return into_response(request, policy.validate(request));
        }
    }
    debug!(
        uid = %request.uid,
        group = %request.resource.group,
        version = %request.resource.version,
        resource = %request.resource.resource,
        "No policy registered for resource, allowing"
    );
    AdmissionResponse::from(request)
}

/// Convert a policy result into an AdmissionResponse, carrying the status
/// code and reason inside the review result on denial.
fn into_response(
    request: &AdmissionRequest<DynamicObject>,
    result: ValidationResult,
) -> AdmissionResponse {
    if result.allowed {
        return AdmissionResponse::from(request);
    }

    let message = result
        .message
        .unwrap_or_else(|| "validation failed".to_string());
    let mut response = AdmissionResponse::from(request).deny(message);
    response.result.status = Some(StatusSummary::Failure);
    response.result.reason = result.reason.unwrap_or_else(|| "BadRequest".to_string());
    response.result.code = result.code.unwrap_or(STATUS_BAD_REQUEST);
    response
}

/// Create the webhook router with the default policy set
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    let path = ImmutabilityPolicy::default().webhook_path();
    Router::new()
        .route(path, post(validate_agentclusterinstall))
        .with_state(state)
}

/// AgentClusterInstall admission webhook handler
async fn validate_agentclusterinstall(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    debug!(
        uid = %request.uid,
        operation = ?request.operation,
        group = %request.resource.group,
        version = %request.resource.version,
        resource = %request.resource.resource,
        name = %request.name,
        "Processing admission request"
    );

    let response = process(&state.policies, &request);
    state.health.metrics.record_admission(response.allowed);

    if response.allowed {
        info!(uid = %request.uid, "Admission request allowed");
    } else {
        warn!(
            uid = %request.uid,
            reason = %response.result.reason,
            "Admission request denied"
        );
    }

    (StatusCode::OK, Json(response.into_review()))
}

/// Errors that can occur when running the webhook server
#[derive(Debug, Error)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:9443 and serves the /validate-agentclusterinstall
/// endpoint. TLS certificates are loaded from the paths specified.
///
/// # Arguments
/// * `health` - Shared health state for metrics
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
pub async fn run_webhook_server(
    health: Arc<HealthState>,
    cert_path: &str,
    key_path: &str,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    // The registration identity the external admission-routing layer uses
    // for this webhook. Static configuration, logged for operators.
    info!(
        group = ADMISSION_GROUP,
        version = ADMISSION_VERSION,
        resource = ADMISSION_RESOURCE,
        singular = ADMISSION_SINGULAR,
        "Registering validation REST resource"
    );

    let policies: Vec<Box<dyn AdmissionPolicy>> = vec![Box::new(ImmutabilityPolicy::default())];
    let state = Arc::new(WebhookState::new(policies, health));
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_PORT));
    info!(port = WEBHOOK_PORT, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
