//! Validation policies for admission webhooks.
//!
//! Each policy owns one protected resource identity: `matches` decides
//! whether a request is the policy's business, `validate` produces the
//! decision. The server dispatches to the first matching policy and allows
//! anything no policy claims.

pub mod immutability;

use kube::core::DynamicObject;
use kube::core::admission::AdmissionRequest;

/// HTTP status carried in a denial result (the transport response stays 200;
/// this travels inside the AdmissionReview status).
pub const STATUS_BAD_REQUEST: u16 = 400;

/// Result of a validation check
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub allowed: bool,
    /// Status code for the review result (if not allowed)
    pub code: Option<u16>,
    /// Machine-readable reason (if not allowed)
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            code: None,
            reason: None,
            message: None,
        }
    }

    /// Create a denied result with BadRequest status.
    ///
    /// Both decode failures and immutability violations reject the single
    /// request as a client error; neither is retryable.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            code: Some(STATUS_BAD_REQUEST),
            reason: Some("BadRequest".to_string()),
            message: Some(message.into()),
        }
    }
}

/// An admission policy for one protected resource type.
///
/// Implementations must be pure per request: no I/O, no shared mutable
/// state, safe to call from concurrent handler tasks.
pub trait AdmissionPolicy: Send + Sync {
    /// Whether this policy has an opinion on the request's resource identity.
    fn matches(&self, request: &AdmissionRequest<DynamicObject>) -> bool;

    /// Produce the decision for a matching request.
    fn validate(&self, request: &AdmissionRequest<DynamicObject>) -> ValidationResult;
}
