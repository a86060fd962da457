//! AgentClusterInstall Custom Resource Definition.
//!
//! Mirrors the hive extension resource that drives assisted cluster
//! installation. The webhook only reads these types; it never writes them.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type set once installation reaches a terminal or in-flight state.
pub const CLUSTER_COMPLETED_CONDITION: &str = "Completed";

/// Reason: installation ran and failed.
pub const CLUSTER_INSTALLATION_FAILED_REASON: &str = "InstallationFailed";
/// Reason: installation finished successfully.
pub const CLUSTER_INSTALLED_REASON: &str = "InstallationCompleted";
/// Reason: installation is currently running.
pub const CLUSTER_INSTALLATION_IN_PROGRESS_REASON: &str = "InstallationInProgress";
/// Reason: installation has not begun.
pub const CLUSTER_INSTALLATION_NOT_STARTED_REASON: &str = "InstallationNotStarted";

/// AgentClusterInstall represents the intent to install a cluster using
/// discovered agents.
///
/// Example:
/// ```yaml
/// apiVersion: extensions.hive.openshift.io/v1beta1
/// kind: AgentClusterInstall
/// metadata:
///   name: my-cluster
/// spec:
///   clusterDeploymentRef:
///     name: my-cluster
///   imageSetRef:
///     name: openshift-v4.19
///   provisionRequirements:
///     controlPlaneAgents: 3
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "extensions.hive.openshift.io",
    version = "v1beta1",
    kind = "AgentClusterInstall",
    plural = "agentclusterinstalls",
    status = "AgentClusterInstallStatus",
    namespaced,
    printcolumn = r#"{"name":"Cluster", "type":"string", "jsonPath":".spec.clusterDeploymentRef.name"}"#,
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.debugInfo.state"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AgentClusterInstallSpec {
    /// Reference to the ClusterDeployment that owns this installation.
    #[serde(default)]
    pub cluster_deployment_ref: ObjectReference,

    /// Reference to the ClusterImageSet specifying the release image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_set_ref: Option<ClusterImageSetReference>,

    /// Metadata about the deployed cluster (cluster ID, kubeconfig secret).
    /// Populated by the installation flow after the cluster comes up, so it
    /// stays mutable after installation starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_metadata: Option<ClusterMetadata>,

    /// Reference to a ConfigMap holding extra install manifests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifests_config_map_ref: Option<ManifestsConfigMapReference>,

    /// Cluster networking configuration.
    #[serde(default)]
    pub networking: Networking,

    /// SSH public key to authorize on the hosts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<String>,

    /// Agent counts required before installation may begin.
    #[serde(default)]
    pub provision_requirements: ProvisionRequirements,

    /// Virtual IP for the API endpoint.
    #[serde(default, rename = "apiVIP", skip_serializing_if = "Option::is_none")]
    pub api_vip: Option<String>,

    /// Virtual IP for cluster ingress.
    #[serde(default, rename = "ingressVIP", skip_serializing_if = "Option::is_none")]
    pub ingress_vip: Option<String>,

    /// When true, installation will not start even once requirements are met.
    #[serde(default)]
    pub hold_installation: bool,

    /// Custom ignition endpoint for host bootstrapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignition_endpoint: Option<IgnitionEndpoint>,

    /// Proxy settings applied to the installed cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Proxy>,

    /// Disk encryption settings for the installed hosts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_encryption: Option<DiskEncryption>,
}

/// Reference to an object by name within the same namespace.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// Name of the referenced object.
    #[serde(default)]
    pub name: String,
}

/// Reference to a ClusterImageSet.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterImageSetReference {
    /// Name of the ClusterImageSet.
    pub name: String,
}

/// Reference to a ConfigMap containing extra install manifests.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestsConfigMapReference {
    /// Name of the ConfigMap.
    pub name: String,
}

/// Metadata about the cluster produced by a completed installation.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    /// Unique cluster identifier assigned at install time.
    #[serde(default, rename = "clusterID")]
    pub cluster_id: String,

    /// Infrastructure identifier used to tag cloud resources.
    #[serde(default, rename = "infraID")]
    pub infra_id: String,

    /// Secret holding the admin kubeconfig for the deployed cluster.
    #[serde(default)]
    pub admin_kubeconfig_secret_ref: ObjectReference,

    /// Secret holding the initial admin password, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password_secret_ref: Option<ObjectReference>,
}

/// Cluster networking configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Networking {
    /// Pod network CIDRs and per-node prefix sizes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_network: Vec<ClusterNetworkEntry>,

    /// Service network CIDRs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_network: Vec<String>,

    /// Machine network CIDRs the hosts are expected to be on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub machine_network: Vec<MachineNetworkEntry>,

    /// When true, the user provides load balancing and DNS instead of the
    /// platform-managed VIPs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_managed_networking: Option<bool>,
}

/// One pod-network CIDR allocation.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkEntry {
    /// CIDR block for pod IPs.
    pub cidr: String,

    /// Prefix size carved out of the CIDR for each node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_prefix: Option<i32>,
}

/// One machine-network CIDR.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MachineNetworkEntry {
    /// CIDR block the host machines are on.
    pub cidr: String,
}

/// Agent counts that must be discovered and approved before install.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequirements {
    /// Number of control plane agents required (1 or 3).
    #[serde(default)]
    pub control_plane_agents: i32,

    /// Number of worker agents required.
    #[serde(default)]
    pub worker_agents: i32,
}

/// Custom ignition endpoint served to hosts during bootstrap.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IgnitionEndpoint {
    /// URL of the ignition endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Secret holding the CA certificate to trust when fetching ignition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_certificate_reference: Option<CaCertificateReference>,
}

/// Namespaced secret reference for a CA certificate.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaCertificateReference {
    /// Namespace of the secret.
    pub namespace: String,

    /// Name of the secret.
    pub name: String,
}

/// Proxy settings for the installed cluster.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Proxy {
    /// Proxy URL for HTTP requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,

    /// Proxy URL for HTTPS requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,

    /// Comma-separated list of domains excluded from proxying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

/// Disk encryption settings for installed hosts.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiskEncryption {
    /// Which host roles get encrypted disks (none, all, masters, workers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_on: Option<String>,

    /// Encryption mode (tpmv2 or tang).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// JSON-encoded tang server list, when mode is tang.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tang_servers: Option<String>,
}

/// Observed state of an AgentClusterInstall.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentClusterInstallStatus {
    /// Conditions describing installation progress and outcome.
    #[serde(default)]
    pub conditions: Vec<ClusterInstallCondition>,

    /// Coarse installation progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ClusterProgressInfo>,

    /// Links and state strings useful for debugging a stalled install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,

    /// API VIP in use, once known.
    #[serde(default, rename = "apiVIP", skip_serializing_if = "Option::is_none")]
    pub api_vip: Option<String>,

    /// Ingress VIP in use, once known.
    #[serde(default, rename = "ingressVIP", skip_serializing_if = "Option::is_none")]
    pub ingress_vip: Option<String>,
}

/// A single status condition on an AgentClusterInstall.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInstallCondition {
    /// Type of condition (e.g. "Completed").
    pub r#type: String,

    /// Status of the condition ("True", "False", "Unknown").
    #[serde(default)]
    pub status: String,

    /// Last time the condition was checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe_time: Option<String>,

    /// Last time the condition transitioned between statuses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,

    /// Machine-readable reason for the condition's last transition.
    #[serde(default)]
    pub reason: String,

    /// Human-readable message with transition details.
    #[serde(default)]
    pub message: String,
}

/// Coarse installation progress.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProgressInfo {
    /// Estimated percentage of the installation that has completed.
    #[serde(default)]
    pub total_percentage: i64,
}

/// Links and state strings useful for debugging a stalled install.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    /// URL for streaming installation events.
    #[serde(default, rename = "eventsURL", skip_serializing_if = "Option::is_none")]
    pub events_url: Option<String>,

    /// URL for downloading installation logs.
    #[serde(default, rename = "logsURL", skip_serializing_if = "Option::is_none")]
    pub logs_url: Option<String>,

    /// Current backend state of the installation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Human-readable elaboration of `state`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_info: Option<String>,
}

/// Find the condition of the given type.
///
/// Returns the first match in sequence order; well-formed resources carry at
/// most one condition per type, so producer ordering decides ties.
pub fn find_condition<'a>(
    conditions: &'a [ClusterInstallCondition],
    condition_type: &str,
) -> Option<&'a ClusterInstallCondition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn condition(condition_type: &str, reason: &str) -> ClusterInstallCondition {
        ClusterInstallCondition {
            r#type: condition_type.to_string(),
            status: "True".to_string(),
            reason: reason.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_find_condition_present() {
        let conditions = vec![
            condition("SpecSynced", "SyncOK"),
            condition(CLUSTER_COMPLETED_CONDITION, CLUSTER_INSTALLED_REASON),
        ];

        let found = find_condition(&conditions, CLUSTER_COMPLETED_CONDITION).unwrap();
        assert_eq!(found.reason, CLUSTER_INSTALLED_REASON);
    }

    #[test]
    fn test_find_condition_absent() {
        let conditions = vec![condition("SpecSynced", "SyncOK")];
        assert!(find_condition(&conditions, CLUSTER_COMPLETED_CONDITION).is_none());
    }

    #[test]
    fn test_find_condition_first_match_wins() {
        let conditions = vec![
            condition(CLUSTER_COMPLETED_CONDITION, CLUSTER_INSTALLATION_NOT_STARTED_REASON),
            condition(CLUSTER_COMPLETED_CONDITION, CLUSTER_INSTALLED_REASON),
        ];

        let found = find_condition(&conditions, CLUSTER_COMPLETED_CONDITION).unwrap();
        assert_eq!(found.reason, CLUSTER_INSTALLATION_NOT_STARTED_REASON);
    }

    #[test]
    fn test_spec_round_trips_camel_case() {
        let spec = AgentClusterInstallSpec {
            cluster_deployment_ref: ObjectReference {
                name: "my-cluster".to_string(),
            },
            api_vip: Some("192.0.2.10".to_string()),
            ..Default::default()
        };

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["clusterDeploymentRef"]["name"], "my-cluster");
        assert_eq!(value["apiVIP"], "192.0.2.10");
    }
}
