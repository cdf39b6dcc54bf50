//! kman kubehub: the only crate that talks to the API server.
//!
//! Everything above it consumes cluster state through [`ClusterGateway`], which
//! hands out immutable snapshots and accepts typed manifest documents for apply.

#![forbid(unsafe_code)]

use std::path::PathBuf;

use kman_core::{DeploymentSnapshot, KmanResult, ManifestDocument, NodeSnapshot, PodSnapshot, ServerVersion};
use serde::{Deserialize, Serialize};

pub mod convert;
mod kube_gateway;
pub mod mock;

pub use kube_gateway::KubeGateway;
pub use mock::MockGateway;

// Operation names used in fetch errors and metrics labels.
pub const OP_LIST_NODES: &str = "list nodes";
pub const OP_LIST_PODS: &str = "list pods";
pub const OP_LIST_NAMESPACES: &str = "list namespaces";
pub const OP_GET_DEPLOYMENT: &str = "get deployment";
pub const OP_LIST_DEPLOYMENTS: &str = "list deployments";
pub const OP_SERVER_VERSION: &str = "get server version";
pub const OP_APPLY: &str = "server-side apply";

/// Explicit client configuration, built once by the caller and passed in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Kubeconfig file; when unset, in-cluster config is tried before `~/.kube/config`.
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context override.
    pub context: Option<String>,
    /// Field manager recorded for server-side apply.
    pub field_manager: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { kubeconfig: None, context: None, field_manager: "kmanctl".to_string() }
    }
}

/// Read/write contract against the orchestrator. Implementations are expected to be
/// internally synchronized; callers share them behind `Arc`.
#[async_trait::async_trait]
pub trait ClusterGateway: Send + Sync {
    async fn list_nodes(&self) -> KmanResult<Vec<NodeSnapshot>>;

    /// `namespace = None` lists across all namespaces.
    async fn list_pods(&self, namespace: Option<&str>, label_selector: Option<&str>) -> KmanResult<Vec<PodSnapshot>>;

    async fn list_namespaces(&self) -> KmanResult<Vec<String>>;

    async fn get_deployment(&self, name: &str, namespace: &str) -> KmanResult<DeploymentSnapshot>;

    async fn list_deployments(&self, namespace: &str) -> KmanResult<Vec<DeploymentSnapshot>>;

    async fn server_version(&self) -> KmanResult<ServerVersion>;

    /// API server URL the gateway is connected to.
    fn api_endpoint(&self) -> String;

    /// Create-or-update a single resource. Idempotency is the server's concern.
    async fn apply_resource(&self, doc: &ManifestDocument) -> KmanResult<()>;
}
