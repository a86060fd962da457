//! agentinstall-webhook library crate
//!
//! Validating admission webhook that freezes the AgentClusterInstall spec
//! once installation has started, except for an explicit whitelist of
//! mutable fields. Exports the resource model, the policy core, and the
//! webhook/health servers.

pub mod crd;
pub mod health;
pub mod webhooks;

pub use health::HealthState;
pub use webhooks::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, run_webhook_server,
};
