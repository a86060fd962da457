//! Webhook module for validating admission requests.
//!
//! The policy core is pure and synchronous: the diff engine plus the
//! immutability policy. The server is the thin HTTP surface that feeds
//! admission reviews through the registered policies.

pub mod diff;
pub mod policies;
mod server;

pub use policies::{AdmissionPolicy, ValidationResult};
pub use server::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, WebhookState,
    create_webhook_router, process, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::DynamicObject;
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
