//! Spec immutability policy for AgentClusterInstall.
//!
//! Once installation has started, the spec is frozen except for an explicit
//! whitelist of fields (cluster metadata produced by the install itself).
//! Enforced on UPDATE operations only; create and delete pass through.

use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, Operation};
use tracing::{debug, info, warn};

use super::{AdmissionPolicy, ValidationResult};
use crate::crd::{
    AgentClusterInstall, CLUSTER_COMPLETED_CONDITION, CLUSTER_INSTALLATION_FAILED_REASON,
    CLUSTER_INSTALLATION_IN_PROGRESS_REASON, CLUSTER_INSTALLED_REASON, ClusterInstallCondition,
    find_condition,
};
use crate::webhooks::diff::{diff_specs, format_entries};

/// API group of the protected resource.
pub const AGENT_CLUSTER_INSTALL_GROUP: &str = "extensions.hive.openshift.io";
/// API version of the protected resource.
pub const AGENT_CLUSTER_INSTALL_VERSION: &str = "v1beta1";
/// Plural resource name of the protected resource.
pub const AGENT_CLUSTER_INSTALL_RESOURCE: &str = "agentclusterinstalls";

/// Identity under which the external routing layer registers this webhook.
/// Deliberately a different group than the CRD itself.
pub const ADMISSION_GROUP: &str = "admission.agentinstall.openshift.io";
/// Version of the registration resource.
pub const ADMISSION_VERSION: &str = "v1";
/// Plural name of the registration resource.
pub const ADMISSION_RESOURCE: &str = "agentclusterinstallvalidators";
/// Singular name of the registration resource.
pub const ADMISSION_SINGULAR: &str = "agentclusterinstallvalidator";

/// Spec fields that remain mutable after installation starts.
pub const MUTABLE_SPEC_FIELDS: &[&str] = &["clusterMetadata"];

/// Completed-condition reasons that mark installation as underway or done.
/// This set is the sole gate on the immutability check; the policy only
/// bites once one of these reasons appears.
pub const INSTALL_STARTED_REASONS: &[&str] = &[
    CLUSTER_INSTALLATION_FAILED_REASON,
    CLUSTER_INSTALLED_REASON,
    CLUSTER_INSTALLATION_IN_PROGRESS_REASON,
];

/// Immutability policy for AgentClusterInstall updates.
///
/// The whitelist and the progress-reason set are injected at construction so
/// tests can exercise the engine with synthetic configuration; production
/// uses [`ImmutabilityPolicy::default`], which carries the policy constants.
pub struct ImmutabilityPolicy {
    mutable_fields: Vec<String>,
    progress_reasons: Vec<String>,
}

impl Default for ImmutabilityPolicy {
    fn default() -> Self {
        Self::new(
            MUTABLE_SPEC_FIELDS.iter().map(|s| s.to_string()).collect(),
            INSTALL_STARTED_REASONS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl ImmutabilityPolicy {
    /// Create a policy with an explicit whitelist and progress-reason set.
    pub fn new(mutable_fields: Vec<String>, progress_reasons: Vec<String>) -> Self {
        Self {
            mutable_fields,
            progress_reasons,
        }
    }

    /// Webhook endpoint path served for this policy.
    pub fn webhook_path(&self) -> &'static str {
        "/validate-agentclusterinstall"
    }

    /// Whether installation has progressed past the point of no return.
    ///
    /// Absence of the Completed condition means the install has not reached
    /// a state worth protecting yet.
    fn install_already_started(&self, conditions: &[ClusterInstallCondition]) -> bool {
        match find_condition(conditions, CLUSTER_COMPLETED_CONDITION) {
            Some(cond) => self.progress_reasons.iter().any(|r| *r == cond.reason),
            None => false,
        }
    }

    fn validate_update(&self, request: &AdmissionRequest<DynamicObject>) -> ValidationResult {
        let new_object = match decode(request.object.as_ref(), "Object") {
            Ok(obj) => obj,
            Err(message) => {
                warn!(uid = %request.uid, error = %message, "Failed decoding new object");
                return ValidationResult::bad_request(message);
            }
        };

        let old_object = match decode(request.old_object.as_ref(), "OldObject") {
            Ok(obj) => obj,
            Err(message) => {
                warn!(uid = %request.uid, error = %message, "Failed decoding old object");
                return ValidationResult::bad_request(message);
            }
        };

        let conditions = new_object
            .status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[]);

        if !self.install_already_started(conditions) {
            debug!(uid = %request.uid, "Install not started, spec still mutable");
            return ValidationResult::allowed();
        }

        let exclude: Vec<&str> = self.mutable_fields.iter().map(String::as_str).collect();
        let (changed, entries) = match diff_specs(&old_object.spec, &new_object.spec, &exclude) {
            Ok(result) => result,
            Err(e) => {
                let message = format!("failed to compare AgentClusterInstall specs: {}", e);
                warn!(uid = %request.uid, error = %message, "Spec comparison failed");
                return ValidationResult::bad_request(message);
            }
        };

        if changed {
            let message = format!(
                "Attempted to change AgentClusterInstall.Spec which is immutable \
                 after install started, except for {} fields. Unsupported change:\n{}",
                self.mutable_fields.join(","),
                format_entries(&entries)
            );
            warn!(uid = %request.uid, name = %request.name, "Failed validation: {}", message);
            return ValidationResult::bad_request(message);
        }

        ValidationResult::allowed()
    }
}

impl AdmissionPolicy for ImmutabilityPolicy {
    /// Explicitly check the request's resource identity. The webhook may
    /// have accidentally been registered for some other GVR; those requests
    /// are not this policy's business.
    fn matches(&self, request: &AdmissionRequest<DynamicObject>) -> bool {
        let resource = &request.resource;
        resource.group == AGENT_CLUSTER_INSTALL_GROUP
            && resource.version == AGENT_CLUSTER_INSTALL_VERSION
            && resource.resource == AGENT_CLUSTER_INSTALL_RESOURCE
    }

    fn validate(&self, request: &AdmissionRequest<DynamicObject>) -> ValidationResult {
        if request.operation != Operation::Update {
            // Only updates can violate immutability.
            info!(uid = %request.uid, operation = ?request.operation, "Operation not validated");
            return ValidationResult::allowed();
        }
        self.validate_update(request)
    }
}

/// Decode one side of the request into a typed AgentClusterInstall.
///
/// A malformed payload is a fatal, non-retryable rejection of this single
/// request, surfaced as the decode error message.
fn decode(
    object: Option<&DynamicObject>,
    which: &str,
) -> Result<AgentClusterInstall, String> {
    let object = object.ok_or_else(|| format!("missing {} in admission request", which))?;
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|e| format!("failed to decode {}: {}", which, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::{
        AgentClusterInstallSpec, CLUSTER_INSTALLATION_NOT_STARTED_REASON, ClusterMetadata,
        ObjectReference, ProvisionRequirements,
    };
    use kube::core::admission::AdmissionReview;
    use serde_json::{Value, json};

    fn spec(control_plane_agents: i32, cluster_id: &str) -> AgentClusterInstallSpec {
        AgentClusterInstallSpec {
            cluster_deployment_ref: ObjectReference {
                name: "test-cluster".to_string(),
            },
            cluster_metadata: Some(ClusterMetadata {
                cluster_id: cluster_id.to_string(),
                ..Default::default()
            }),
            provision_requirements: ProvisionRequirements {
                control_plane_agents,
                worker_agents: 0,
            },
            ..Default::default()
        }
    }

    fn completed_condition(reason: &str) -> Value {
        json!({
            "type": CLUSTER_COMPLETED_CONDITION,
            "status": "True",
            "reason": reason,
            "message": ""
        })
    }

    fn object(spec: &AgentClusterInstallSpec, conditions: Value) -> Value {
        json!({
            "apiVersion": "extensions.hive.openshift.io/v1beta1",
            "kind": "AgentClusterInstall",
            "metadata": {"name": "test-cluster", "namespace": "default"},
            "spec": serde_json::to_value(spec).unwrap(),
            "status": {"conditions": conditions}
        })
    }

    fn update_request(
        resource: Value,
        old_object: Value,
        new_object: Value,
    ) -> AdmissionRequest<DynamicObject> {
        let review: AdmissionReview<DynamicObject> = serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-4c38-aa22-2dbdd9ee28c5",
                "kind": {
                    "group": "extensions.hive.openshift.io",
                    "version": "v1beta1",
                    "kind": "AgentClusterInstall"
                },
                "resource": resource,
                "name": "test-cluster",
                "namespace": "default",
                "operation": "UPDATE",
                "userInfo": {},
                "object": new_object,
                "oldObject": old_object,
                "dryRun": false
            }
        }))
        .unwrap();
        review.try_into().unwrap()
    }

    fn agentclusterinstall_gvr() -> Value {
        json!({
            "group": AGENT_CLUSTER_INSTALL_GROUP,
            "version": AGENT_CLUSTER_INSTALL_VERSION,
            "resource": AGENT_CLUSTER_INSTALL_RESOURCE
        })
    }

    #[test]
    fn test_install_started_for_terminal_and_in_flight_reasons() {
        let policy = ImmutabilityPolicy::default();
        for reason in [
            CLUSTER_INSTALLATION_FAILED_REASON,
            CLUSTER_INSTALLED_REASON,
            CLUSTER_INSTALLATION_IN_PROGRESS_REASON,
        ] {
            let conditions: Vec<ClusterInstallCondition> =
                serde_json::from_value(json!([completed_condition(reason)])).unwrap();
            assert!(
                policy.install_already_started(&conditions),
                "reason {} should mean started",
                reason
            );
        }
    }

    #[test]
    fn test_install_not_started_for_other_reasons() {
        let policy = ImmutabilityPolicy::default();
        for reason in [CLUSTER_INSTALLATION_NOT_STARTED_REASON, "SomeFutureReason"] {
            let conditions: Vec<ClusterInstallCondition> =
                serde_json::from_value(json!([completed_condition(reason)])).unwrap();
            assert!(!policy.install_already_started(&conditions));
        }
    }

    #[test]
    fn test_install_not_started_without_completed_condition() {
        let policy = ImmutabilityPolicy::default();
        let conditions: Vec<ClusterInstallCondition> = serde_json::from_value(json!([
            {"type": "SpecSynced", "status": "True", "reason": "SyncOK", "message": ""}
        ]))
        .unwrap();
        assert!(!policy.install_already_started(&conditions));
        assert!(!policy.install_already_started(&[]));
    }

    #[test]
    fn test_matches_protected_resource() {
        let policy = ImmutabilityPolicy::default();
        let request = update_request(
            agentclusterinstall_gvr(),
            object(&spec(3, "id"), json!([])),
            object(&spec(3, "id"), json!([])),
        );
        assert!(policy.matches(&request));
    }

    #[test]
    fn test_does_not_match_other_resource() {
        let policy = ImmutabilityPolicy::default();
        let request = update_request(
            json!({"group": "hive.openshift.io", "version": "v1", "resource": "clusterdeployments"}),
            object(&spec(3, "id"), json!([])),
            object(&spec(3, "id"), json!([])),
        );
        assert!(!policy.matches(&request));
    }

    #[test]
    fn test_mutable_field_change_allowed_after_install_started() {
        let policy = ImmutabilityPolicy::default();
        let conditions = json!([completed_condition(CLUSTER_INSTALLATION_IN_PROGRESS_REASON)]);
        let request = update_request(
            agentclusterinstall_gvr(),
            object(&spec(3, "old-id"), conditions.clone()),
            object(&spec(3, "new-id"), conditions),
        );

        let result = policy.validate(&request);
        assert!(result.allowed);
    }

    #[test]
    fn test_immutable_field_change_denied_after_install_started() {
        let policy = ImmutabilityPolicy::default();
        let conditions = json!([completed_condition(CLUSTER_INSTALLED_REASON)]);
        let request = update_request(
            agentclusterinstall_gvr(),
            object(&spec(3, "id"), conditions.clone()),
            object(&spec(5, "id"), conditions),
        );

        let result = policy.validate(&request);
        assert!(!result.allowed);
        assert_eq!(result.code, Some(400));
        assert_eq!(result.reason.as_deref(), Some("BadRequest"));
        let message = result.message.unwrap();
        assert!(message.contains("immutable after install started"));
        assert!(message.contains("clusterMetadata"));
        assert!(message.contains("provisionRequirements.controlPlaneAgents: (3 => 5)"));
    }

    #[test]
    fn test_immutable_field_change_allowed_before_install_started() {
        let policy = ImmutabilityPolicy::default();
        let conditions = json!([completed_condition(CLUSTER_INSTALLATION_NOT_STARTED_REASON)]);
        let request = update_request(
            agentclusterinstall_gvr(),
            object(&spec(3, "id"), conditions.clone()),
            object(&spec(5, "id"), conditions),
        );

        let result = policy.validate(&request);
        assert!(result.allowed);
    }

    #[test]
    fn test_malformed_old_object_denied_bad_request() {
        let policy = ImmutabilityPolicy::default();
        let malformed = json!({
            "apiVersion": "extensions.hive.openshift.io/v1beta1",
            "kind": "AgentClusterInstall",
            "metadata": {"name": "test-cluster", "namespace": "default"},
            "spec": "not-an-object"
        });
        let request = update_request(
            agentclusterinstall_gvr(),
            malformed,
            object(&spec(3, "id"), json!([])),
        );

        let result = policy.validate(&request);
        assert!(!result.allowed);
        assert_eq!(result.code, Some(400));
        assert!(result.message.unwrap().contains("OldObject"));
    }

    #[test]
    fn test_non_update_operation_allowed() {
        let policy = ImmutabilityPolicy::default();
        let review: AdmissionReview<DynamicObject> = serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-4c38-aa22-2dbdd9ee28c5",
                "kind": {
                    "group": "extensions.hive.openshift.io",
                    "version": "v1beta1",
                    "kind": "AgentClusterInstall"
                },
                "resource": agentclusterinstall_gvr(),
                "name": "test-cluster",
                "namespace": "default",
                "operation": "CREATE",
                "userInfo": {},
                "object": object(&spec(3, "id"), json!([])),
                "dryRun": false
            }
        }))
        .unwrap();
        let request: AdmissionRequest<DynamicObject> = review.try_into().unwrap();

        let result = policy.validate(&request);
        assert!(result.allowed);
    }

    #[test]
    fn test_injected_whitelist_and_reasons() {
        // Synthetic configuration: sshPublicKey mutable, custom reason set.
        let policy = ImmutabilityPolicy::new(
            vec!["sshPublicKey".to_string()],
            vec!["Rolling".to_string()],
        );
        let conditions = json!([completed_condition("Rolling")]);

        let mut old = spec(3, "id");
        old.ssh_public_key = Some("ssh-ed25519 AAA old".to_string());
        let mut new = spec(3, "id");
        new.ssh_public_key = Some("ssh-ed25519 AAA new".to_string());

        let request = update_request(
            agentclusterinstall_gvr(),
            object(&old, conditions.clone()),
            object(&new, conditions.clone()),
        );
        assert!(policy.validate(&request).allowed);

        // clusterMetadata is no longer whitelisted under this configuration.
        let request = update_request(
            agentclusterinstall_gvr(),
            object(&spec(3, "old-id"), conditions.clone()),
            object(&spec(3, "new-id"), conditions),
        );
        assert!(!policy.validate(&request).allowed);
    }
}
