//! In-memory gateway for tests and offline demos.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use kman_core::{
    DeploymentSnapshot, KmanError, KmanResult, ManifestDocument, NodeSnapshot, PodSnapshot, ServerVersion,
};

use crate::{
    ClusterGateway, OP_APPLY, OP_GET_DEPLOYMENT, OP_LIST_DEPLOYMENTS, OP_LIST_NAMESPACES, OP_LIST_NODES,
    OP_LIST_PODS, OP_SERVER_VERSION,
};

/// Serves fixed snapshots, records applies, and can be told to fail specific operations.
///
/// Pod listings can be scripted with [`MockGateway::push_pod_poll`]: each call to
/// `list_pods` consumes one scripted response and the last one repeats.
#[derive(Default)]
pub struct MockGateway {
    pub nodes: Vec<NodeSnapshot>,
    pub pods: Vec<PodSnapshot>,
    pub namespaces: Vec<String>,
    pub deployments: Vec<DeploymentSnapshot>,
    pub version: ServerVersion,
    pub endpoint: String,
    pod_polls: Mutex<VecDeque<Vec<PodSnapshot>>>,
    failing_ops: HashSet<&'static str>,
    rejected_names: HashSet<String>,
    list_delay: Option<Duration>,
    applied: Mutex<Vec<ManifestDocument>>,
    pod_list_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(mut self, nodes: Vec<NodeSnapshot>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_pods(mut self, pods: Vec<PodSnapshot>) -> Self {
        self.pods = pods;
        self
    }

    pub fn with_namespaces(mut self, namespaces: &[&str]) -> Self {
        self.namespaces = namespaces.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_deployments(mut self, deployments: Vec<DeploymentSnapshot>) -> Self {
        self.deployments = deployments;
        self
    }

    pub fn with_version(mut self, git_version: &str, platform: &str, endpoint: &str) -> Self {
        self.version = ServerVersion { git_version: git_version.into(), platform: platform.into() };
        self.endpoint = endpoint.into();
        self
    }

    /// Make an operation (one of the `OP_*` names) fail with a fetch/write error.
    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing_ops.insert(op);
        self
    }

    /// Reject applies of documents with this `metadata.name`.
    pub fn rejecting(mut self, name: &str) -> Self {
        self.rejected_names.insert(name.to_string());
        self
    }

    /// Hold every `list_pods` call for `delay` (tokio time) before answering.
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn push_pod_poll(&self, pods: Vec<PodSnapshot>) {
        self.pod_polls.lock().unwrap().push_back(pods);
    }

    pub fn applied(&self) -> Vec<ManifestDocument> {
        self.applied.lock().unwrap().clone()
    }

    pub fn pod_list_calls(&self) -> usize {
        self.pod_list_calls.load(Ordering::SeqCst)
    }

    /// Number of apply attempts, successful or not.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn check(&self, op: &'static str) -> KmanResult<()> {
        if self.failing_ops.contains(op) {
            return Err(KmanError::fetch(op, "mock failure"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClusterGateway for MockGateway {
    async fn list_nodes(&self) -> KmanResult<Vec<NodeSnapshot>> {
        self.check(OP_LIST_NODES)?;
        Ok(self.nodes.clone())
    }

    async fn list_pods(&self, namespace: Option<&str>, _label_selector: Option<&str>) -> KmanResult<Vec<PodSnapshot>> {
        self.pod_list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        self.check(OP_LIST_PODS)?;
        {
            let mut polls = self.pod_polls.lock().unwrap();
            if polls.len() > 1 {
                return Ok(polls.pop_front().unwrap_or_default());
            }
            if let Some(last) = polls.front() {
                return Ok(last.clone());
            }
        }
        Ok(self
            .pods
            .iter()
            .filter(|p| namespace.map(|ns| p.namespace == ns).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn list_namespaces(&self) -> KmanResult<Vec<String>> {
        self.check(OP_LIST_NAMESPACES)?;
        Ok(self.namespaces.clone())
    }

    async fn get_deployment(&self, name: &str, namespace: &str) -> KmanResult<DeploymentSnapshot> {
        self.check(OP_GET_DEPLOYMENT)?;
        self.deployments
            .iter()
            .find(|d| d.name == name && d.namespace == namespace)
            .cloned()
            .ok_or_else(|| KmanError::fetch(OP_GET_DEPLOYMENT, format!("deployments.apps \"{}\" not found", name)))
    }

    async fn list_deployments(&self, namespace: &str) -> KmanResult<Vec<DeploymentSnapshot>> {
        self.check(OP_LIST_DEPLOYMENTS)?;
        Ok(self.deployments.iter().filter(|d| d.namespace == namespace).cloned().collect())
    }

    async fn server_version(&self) -> KmanResult<ServerVersion> {
        self.check(OP_SERVER_VERSION)?;
        Ok(self.version.clone())
    }

    fn api_endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn apply_resource(&self, doc: &ManifestDocument) -> KmanResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_ops.contains(OP_APPLY) || self.rejected_names.contains(doc.name()) {
            return Err(KmanError::write(OP_APPLY, format!("admission webhook denied {}", doc.display_key())));
        }
        self.applied.lock().unwrap().push(doc.clone());
        Ok(())
    }
}
