//! Custom Resource Definitions (CRDs) consumed by the webhook.
//!
//! - `AgentClusterInstall`: installation intent for a cluster built from
//!   discovered agents. The webhook validates it but never creates it.

mod agent_cluster_install;

pub use agent_cluster_install::*;
