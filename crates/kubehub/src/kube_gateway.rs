use anyhow::{anyhow, Context, Result};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kman_core::{
    DeploymentSnapshot, KmanError, KmanResult, ManifestDocument, NodeSnapshot, PodSnapshot, ServerVersion,
};
use kube::{
    api::{Api, ListParams, Patch, PatchParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    discovery::{Discovery, Scope},
    Client, Config,
};
use metrics::{counter, histogram};
use serde_json::Value as Json;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::{
    convert, ClusterGateway, GatewayConfig, OP_APPLY, OP_GET_DEPLOYMENT, OP_LIST_DEPLOYMENTS, OP_LIST_NAMESPACES,
    OP_LIST_NODES, OP_LIST_PODS, OP_SERVER_VERSION,
};

/// Gateway backed by a kube-rs client.
pub struct KubeGateway {
    client: Client,
    endpoint: String,
    field_manager: String,
    discovery: OnceCell<Discovery>,
}

impl KubeGateway {
    /// Resolve client configuration and build a client. With no explicit kubeconfig,
    /// in-cluster credentials are tried first, then the default kubeconfig.
    pub async fn connect(cfg: &GatewayConfig) -> KmanResult<Self> {
        let config = load_config(cfg).await.map_err(|e| KmanError::Config(format!("{:#}", e)))?;
        let endpoint = config.cluster_url.to_string();
        let client = Client::try_from(config).map_err(|e| KmanError::Config(e.to_string()))?;
        info!(endpoint = %endpoint, context = ?cfg.context, "kube client ready");
        Ok(Self::from_client(client, endpoint, &cfg.field_manager))
    }

    pub fn from_client(client: Client, endpoint: String, field_manager: &str) -> Self {
        Self { client, endpoint, field_manager: field_manager.to_string(), discovery: OnceCell::new() }
    }

    async fn discovery(&self) -> Result<&Discovery> {
        self.discovery
            .get_or_try_init(|| async {
                let t0 = std::time::Instant::now();
                let d = Discovery::new(self.client.clone()).run().await.context("running api discovery")?;
                histogram!("gateway_discovery_ms", t0.elapsed().as_secs_f64() * 1000.0);
                Ok::<_, anyhow::Error>(d)
            })
            .await
    }

    async fn find_api_resource(&self, gvk: &GroupVersionKind) -> Result<(ApiResource, bool)> {
        let discovery = self.discovery().await?;
        for group in discovery.groups() {
            for (ar, caps) in group.recommended_resources() {
                if ar.group == gvk.group && ar.version == gvk.version && ar.kind == gvk.kind {
                    let namespaced = matches!(caps.scope, Scope::Namespaced);
                    return Ok((ar, namespaced));
                }
            }
        }
        Err(anyhow!("GVK not found: {}/{}/{}", gvk.group, gvk.version, gvk.kind))
    }
}

async fn load_config(cfg: &GatewayConfig) -> Result<Config> {
    let opts = KubeConfigOptions { context: cfg.context.clone(), ..Default::default() };
    if let Some(path) = &cfg.kubeconfig {
        let kc = Kubeconfig::read_from(path).with_context(|| format!("reading kubeconfig {}", path.display()))?;
        return Config::from_custom_kubeconfig(kc, &opts).await.context("loading kubeconfig");
    }
    if cfg.context.is_none() {
        match Config::incluster() {
            Ok(c) => return Ok(c),
            Err(e) => debug!(error = %e, "in-cluster config unavailable; falling back to kubeconfig"),
        }
    }
    Config::from_kubeconfig(&opts).await.context("failed to create kubernetes config")
}

fn fetch_failed(op: &'static str, err: kube::Error) -> KmanError {
    counter!("gateway_errors_total", 1u64, "op" => op);
    KmanError::fetch(op, err)
}

#[async_trait::async_trait]
impl ClusterGateway for KubeGateway {
    async fn list_nodes(&self) -> KmanResult<Vec<NodeSnapshot>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await.map_err(|e| fetch_failed(OP_LIST_NODES, e))?;
        Ok(list.items.iter().map(convert::node_snapshot).collect())
    }

    async fn list_pods(&self, namespace: Option<&str>, label_selector: Option<&str>) -> KmanResult<Vec<PodSnapshot>> {
        let api: Api<Pod> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let mut lp = ListParams::default();
        if let Some(sel) = label_selector {
            lp = lp.labels(sel);
        }
        let list = api.list(&lp).await.map_err(|e| fetch_failed(OP_LIST_PODS, e))?;
        debug!(ns = ?namespace, selector = ?label_selector, count = list.items.len(), "pods listed");
        Ok(list.items.iter().map(convert::pod_snapshot).collect())
    }

    async fn list_namespaces(&self) -> KmanResult<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await.map_err(|e| fetch_failed(OP_LIST_NAMESPACES, e))?;
        Ok(list.items.into_iter().filter_map(|n| n.metadata.name).collect())
    }

    async fn get_deployment(&self, name: &str, namespace: &str) -> KmanResult<DeploymentSnapshot> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let dep = api.get(name).await.map_err(|e| fetch_failed(OP_GET_DEPLOYMENT, e))?;
        convert::deployment_snapshot(&dep)
    }

    async fn list_deployments(&self, namespace: &str) -> KmanResult<Vec<DeploymentSnapshot>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await.map_err(|e| fetch_failed(OP_LIST_DEPLOYMENTS, e))?;
        list.items.iter().map(convert::deployment_snapshot).collect()
    }

    async fn server_version(&self) -> KmanResult<ServerVersion> {
        let info = self.client.apiserver_version().await.map_err(|e| fetch_failed(OP_SERVER_VERSION, e))?;
        Ok(ServerVersion { git_version: info.git_version, platform: info.platform })
    }

    fn api_endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn apply_resource(&self, doc: &ManifestDocument) -> KmanResult<()> {
        let t0 = std::time::Instant::now();
        let (group, version) = doc.group_version();
        let gvk = GroupVersionKind { group: group.to_string(), version: version.to_string(), kind: doc.kind().to_string() };
        let (ar, namespaced) = self.find_api_resource(&gvk).await.map_err(|e| KmanError::write("resolve kind", format!("{:#}", e)))?;

        let body = submission_body(doc, namespaced)?;
        let api: Api<DynamicObject> = if namespaced {
            Api::namespaced_with(self.client.clone(), doc.namespace(), &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        };

        let pp = PatchParams::apply(&self.field_manager);
        match api.patch(doc.name(), &pp, &Patch::Apply(&body)).await {
            Ok(obj) => {
                histogram!("gateway_apply_ms", t0.elapsed().as_secs_f64() * 1000.0);
                counter!("gateway_apply_ok", 1u64);
                debug!(key = %doc.display_key(), ns = %doc.namespace(), rv = ?obj.metadata.resource_version, "applied");
                Ok(())
            }
            Err(e) => {
                counter!("gateway_errors_total", 1u64, "op" => OP_APPLY);
                Err(KmanError::write(OP_APPLY, e))
            }
        }
    }
}

/// Object submitted for server-side apply. Cluster-scoped kinds lose any namespace;
/// namespaced kinds must carry one.
fn submission_body(doc: &ManifestDocument, namespaced: bool) -> KmanResult<Json> {
    if doc.name().is_empty() {
        return Err(KmanError::write(OP_APPLY, "YAML missing metadata.name"));
    }
    if namespaced && doc.namespace().is_empty() {
        return Err(KmanError::write(OP_APPLY, "namespace required for namespaced kind"));
    }
    let mut body = doc.to_json();
    if !namespaced {
        if let Some(meta) = body.get_mut("metadata").and_then(|m| m.as_object_mut()) {
            meta.remove("namespace");
        }
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Json) -> ManifestDocument {
        ManifestDocument::from_json(v).unwrap()
    }

    #[test]
    fn cluster_scoped_kind_drops_namespace() {
        let mut ns = doc(json!({ "apiVersion": "v1", "kind": "Namespace", "metadata": { "name": "shop", "namespace": "default" } }));
        ns.default_namespace("shop");
        let body = submission_body(&ns, false).unwrap();
        assert_eq!(body["metadata"]["name"], "shop");
        assert!(body["metadata"].get("namespace").is_none());
    }

    #[test]
    fn namespaced_kind_keeps_namespace_and_body() {
        let cm = doc(json!({ "apiVersion": "v1", "kind": "ConfigMap", "metadata": { "name": "settings", "namespace": "shop" }, "data": { "mode": "prod" } }));
        let body = submission_body(&cm, true).unwrap();
        assert_eq!(body["metadata"]["namespace"], "shop");
        assert_eq!(body["data"]["mode"], "prod");
    }

    #[test]
    fn namespaced_kind_without_namespace_is_rejected() {
        let cm = doc(json!({ "apiVersion": "v1", "kind": "ConfigMap", "metadata": { "name": "settings" } }));
        let e = submission_body(&cm, true).unwrap_err();
        assert_eq!(e.kind(), "write");
        assert!(e.to_string().contains("namespace required"), "e={}", e);
    }

    #[test]
    fn document_without_name_is_rejected() {
        let cm = doc(json!({ "apiVersion": "v1", "kind": "ConfigMap", "metadata": { "namespace": "shop" } }));
        let e = submission_body(&cm, true).unwrap_err();
        assert!(e.to_string().contains("metadata.name"), "e={}", e);
        assert!(submission_body(&cm, false).is_err());
    }
}
