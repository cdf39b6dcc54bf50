use std::path::PathBuf;
use std::sync::Arc;

use kman_core::{KmanError, KmanResult, ManifestDocument};
use kman_kubehub::ClusterGateway;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::loader::{load_manifests_with, LoadOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Application name, used for reporting only.
    pub name: String,
    pub manifest_path: PathBuf,
    /// Applied to documents that do not set a namespace.
    pub namespace: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedResource {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl From<&ManifestDocument> for PlannedResource {
    fn from(d: &ManifestDocument) -> Self {
        Self { kind: d.kind().to_string(), name: d.name().to_string(), namespace: d.namespace().to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployReport {
    pub name: String,
    pub dry_run: bool,
    pub resources: Vec<PlannedResource>,
    pub applied: usize,
}

impl DeployReport {
    /// Human preview, one `Kind/name` line per resource.
    pub fn preview_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.resources.len() + 1);
        let verb = if self.dry_run { "would deploy" } else { "deployed" };
        lines.push(format!("{} {} manifests for {}", verb, self.resources.len(), self.name));
        for r in &self.resources {
            lines.push(format!("  - {}/{}", r.kind, r.name));
        }
        lines
    }
}

/// Load and namespace-default the documents of a request, in apply order.
fn prepare(req: &DeployRequest, load: &LoadOptions) -> KmanResult<Vec<ManifestDocument>> {
    let mut docs = load_manifests_with(&req.manifest_path, load)?;
    for doc in docs.iter_mut() {
        doc.default_namespace(&req.namespace);
    }
    Ok(docs)
}

/// Dry-run report for a request. Reads manifests only; needs no cluster.
pub fn preview(req: &DeployRequest, load: &LoadOptions) -> KmanResult<DeployReport> {
    let docs = prepare(req, load)?;
    info!(app = %req.name, count = docs.len(), "dry run; no resources applied");
    Ok(DeployReport {
        name: req.name.clone(),
        dry_run: true,
        resources: docs.iter().map(PlannedResource::from).collect(),
        applied: 0,
    })
}

/// Loads manifests and applies them one at a time in file order.
pub struct Deployer {
    gateway: Arc<dyn ClusterGateway>,
    load: LoadOptions,
}

impl Deployer {
    pub fn new(gateway: Arc<dyn ClusterGateway>) -> Self {
        Self { gateway, load: LoadOptions::default() }
    }

    pub fn with_load_options(mut self, load: LoadOptions) -> Self {
        self.load = load;
        self
    }

    /// Dry-run never touches the gateway. In apply mode the first failure stops the
    /// sequence; resources applied before it are left as they are.
    pub async fn deploy(&self, req: &DeployRequest) -> KmanResult<DeployReport> {
        if req.dry_run {
            return preview(req, &self.load);
        }
        let docs = prepare(req, &self.load)?;
        let resources: Vec<PlannedResource> = docs.iter().map(PlannedResource::from).collect();

        let t0 = std::time::Instant::now();
        for (index, doc) in docs.iter().enumerate() {
            info!(app = %req.name, key = %doc.display_key(), ns = %doc.namespace(), "applying");
            if let Err(e) = self.gateway.apply_resource(doc).await {
                counter!("deploy_apply_err", 1u64);
                warn!(app = %req.name, key = %doc.display_key(), applied = index, error = %e, "apply failed; aborting deploy");
                return Err(KmanError::Apply {
                    index,
                    kind: doc.kind().to_string(),
                    name: doc.name().to_string(),
                    applied: index,
                    message: e.to_string(),
                });
            }
            counter!("deploy_apply_ok", 1u64);
        }
        histogram!("deploy_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        info!(app = %req.name, count = docs.len(), "deploy complete");
        Ok(DeployReport { name: req.name.clone(), dry_run: false, applied: resources.len(), resources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_lists_kind_and_name() {
        let r = DeployReport {
            name: "shop".into(),
            dry_run: true,
            resources: vec![
                PlannedResource { kind: "Namespace".into(), name: "shop".into(), namespace: String::new() },
                PlannedResource { kind: "Deployment".into(), name: "web".into(), namespace: "shop".into() },
            ],
            applied: 0,
        };
        assert_eq!(
            r.preview_lines(),
            vec!["would deploy 2 manifests for shop", "  - Namespace/shop", "  - Deployment/web"]
        );
    }
}
