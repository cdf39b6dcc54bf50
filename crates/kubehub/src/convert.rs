//! k8s-openapi objects -> kman snapshots.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Node, Pod};
use kman_core::{
    Condition, ConditionStatus, DeploymentSnapshot, KmanError, KmanResult, NodeSnapshot, PodPhase, PodSnapshot,
};

pub fn node_snapshot(node: &Node) -> NodeSnapshot {
    let conditions = node
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|cs| cs.iter().map(|c| Condition::new(c.type_.clone(), ConditionStatus::parse(&c.status))).collect())
        .unwrap_or_default();
    NodeSnapshot {
        name: node.metadata.name.clone().unwrap_or_default(),
        conditions,
        labels: node.metadata.labels.clone().unwrap_or_default(),
    }
}

pub fn pod_snapshot(pod: &Pod) -> PodSnapshot {
    let status = pod.status.as_ref();
    PodSnapshot {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        phase: PodPhase::parse(status.and_then(|s| s.phase.as_deref())),
        containers_ready: status
            .and_then(|s| s.container_statuses.as_ref())
            .map(|cs| cs.iter().map(|c| c.ready).collect())
            .unwrap_or_default(),
    }
}

/// Fails when `spec.replicas` is absent: the API server always defaults it, so a
/// missing value means the source handed us something that is not a live object.
pub fn deployment_snapshot(dep: &Deployment) -> KmanResult<DeploymentSnapshot> {
    let name = dep.metadata.name.clone().unwrap_or_default();
    let namespace = dep.metadata.namespace.clone().unwrap_or_default();
    let spec = dep.spec.as_ref();
    let desired_replicas = spec.and_then(|s| s.replicas).ok_or_else(|| {
        KmanError::ContractViolation(format!("deployment {}/{} has no spec.replicas", namespace, name))
    })?;
    let image = spec
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|ps| ps.containers.first())
        .and_then(|c| c.image.clone());
    let status = dep.status.as_ref();
    let conditions = status
        .and_then(|s| s.conditions.as_ref())
        .map(|cs| {
            cs.iter()
                .map(|c| Condition {
                    kind: c.type_.clone(),
                    status: ConditionStatus::parse(&c.status),
                    reason: c.reason.clone(),
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(DeploymentSnapshot {
        name,
        namespace,
        desired_replicas,
        ready_replicas: status.and_then(|s| s.ready_replicas).unwrap_or(0),
        created_at: dep.metadata.creation_timestamp.as_ref().map(|t| t.0),
        conditions,
        image,
    })
}
