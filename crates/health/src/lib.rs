//! kman health: turn raw snapshots into cluster and application verdicts.
//!
//! Every function here is a pure reduction over already-fetched snapshots.
//! Fetching, retries and error reporting belong to the caller.

#![forbid(unsafe_code)]

use kman_core::{
    AppPhase, ApplicationStatus, ClusterHealth, ClusterInfo, ClusterStatus, ConditionStatus, DeploymentSnapshot,
    NodeInfo, NodeRole, NodeSnapshot, PodInfo, PodPhase, PodSnapshot, ServerVersion, DEPLOYMENT_PROGRESSING,
    NODE_READY, PROGRESS_DEADLINE_EXCEEDED,
};
use tracing::debug;

const LABEL_CONTROL_PLANE: &str = "node-role.kubernetes.io/control-plane";
const LABEL_MASTER: &str = "node-role.kubernetes.io/master";

pub fn node_is_ready(node: &NodeSnapshot) -> bool {
    node.conditions.iter().any(|c| c.kind == NODE_READY && c.status == ConditionStatus::True)
}

pub fn node_role(node: &NodeSnapshot) -> NodeRole {
    if node.labels.contains_key(LABEL_CONTROL_PLANE) {
        NodeRole::ControlPlane
    } else if node.labels.contains_key(LABEL_MASTER) {
        NodeRole::Master
    } else {
        NodeRole::Worker
    }
}

/// Running with every container ready. A pod that reports no container statuses
/// yet is treated as ready once Running.
pub fn pod_is_ready(pod: &PodSnapshot) -> bool {
    pod.phase == PodPhase::Running && pod.containers_ready.iter().all(|r| *r)
}

fn pod_is_unhealthy(pod: &PodSnapshot) -> bool {
    matches!(pod.phase, PodPhase::Failed | PodPhase::Pending)
}

/// Reduce node/pod snapshots into a single cluster verdict.
///
/// Healthy needs every node ready and no Pending/Failed pods; otherwise Degraded
/// while at least one node is ready, else Unhealthy. An empty cluster with no
/// unhealthy pods is Healthy.
pub fn aggregate_cluster(nodes: &[NodeSnapshot], pods: &[PodSnapshot], namespaces: usize) -> ClusterStatus {
    let total_nodes = nodes.len();
    let ready_nodes = nodes.iter().filter(|n| node_is_ready(n)).count();

    let running_pods = pods.iter().filter(|p| p.phase == PodPhase::Running).count();
    let unhealthy_pods: Vec<PodInfo> = pods
        .iter()
        .filter(|p| pod_is_unhealthy(p))
        .map(|p| PodInfo { name: p.name.clone(), namespace: p.namespace.clone(), phase: p.phase })
        .collect();

    let status = if ready_nodes == total_nodes && unhealthy_pods.is_empty() {
        ClusterHealth::Healthy
    } else if ready_nodes > 0 {
        ClusterHealth::Degraded
    } else {
        ClusterHealth::Unhealthy
    };
    debug!(%status, ready_nodes, total_nodes, running_pods, unhealthy = unhealthy_pods.len(), "cluster aggregated");

    ClusterStatus {
        status,
        ready_nodes,
        total_nodes,
        running_pods,
        total_pods: pods.len(),
        namespaces,
        unhealthy_pods,
    }
}

/// Classify a deployment. Rules are ordered; the first match wins:
/// exact replica match, stalled Progressing condition, partial availability, pending.
pub fn classify_deployment(dep: &DeploymentSnapshot) -> AppPhase {
    if dep.ready_replicas == dep.desired_replicas {
        return AppPhase::Ready;
    }
    let stalled = dep.conditions.iter().any(|c| {
        c.kind == DEPLOYMENT_PROGRESSING
            && (c.status == ConditionStatus::False || c.reason.as_deref() == Some(PROGRESS_DEADLINE_EXCEEDED))
    });
    if stalled {
        return AppPhase::Failed;
    }
    if dep.ready_replicas > 0 {
        return AppPhase::Degraded;
    }
    AppPhase::Pending
}

pub fn application_status(dep: &DeploymentSnapshot) -> ApplicationStatus {
    ApplicationStatus {
        name: dep.name.clone(),
        namespace: dep.namespace.clone(),
        phase: classify_deployment(dep),
        ready_replicas: dep.ready_replicas,
        total_replicas: dep.desired_replicas,
        image: dep.image.clone(),
        created_at: dep.created_at,
        conditions: dep.conditions.clone(),
    }
}

pub fn cluster_info(version: &ServerVersion, api_server: &str, nodes: &[NodeSnapshot]) -> ClusterInfo {
    ClusterInfo {
        version: version.git_version.clone(),
        platform: version.platform.clone(),
        api_server: api_server.to_string(),
        nodes: nodes
            .iter()
            .map(|n| NodeInfo { name: n.name.clone(), role: node_role(n), ready: node_is_ready(n) })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kman_core::Condition;
    use std::collections::BTreeMap;

    fn node(name: &str, labels: &[&str]) -> NodeSnapshot {
        NodeSnapshot {
            name: name.into(),
            conditions: vec![Condition::new("Ready", ConditionStatus::True)],
            labels: labels.iter().map(|l| (l.to_string(), String::new())).collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn role_prefers_control_plane_label() {
        assert_eq!(node_role(&node("a", &[LABEL_CONTROL_PLANE, LABEL_MASTER])), NodeRole::ControlPlane);
        assert_eq!(node_role(&node("b", &[LABEL_MASTER])), NodeRole::Master);
        assert_eq!(node_role(&node("c", &["kubernetes.io/os"])), NodeRole::Worker);
    }

    #[test]
    fn ready_condition_must_be_true() {
        let mut n = node("a", &[]);
        assert!(node_is_ready(&n));
        n.conditions = vec![
            Condition::new("MemoryPressure", ConditionStatus::True),
            Condition::new("Ready", ConditionStatus::Unknown),
        ];
        assert!(!node_is_ready(&n));
    }

    #[test]
    fn running_pod_without_statuses_counts_ready() {
        let p = PodSnapshot { name: "p".into(), namespace: "ns".into(), phase: PodPhase::Running, containers_ready: vec![] };
        assert!(pod_is_ready(&p));
        let q = PodSnapshot { containers_ready: vec![true, false], ..p.clone() };
        assert!(!pod_is_ready(&q));
        let r = PodSnapshot { phase: PodPhase::Pending, containers_ready: vec![true], ..p };
        assert!(!pod_is_ready(&r));
    }

    #[test]
    fn cluster_info_maps_nodes_in_order() {
        let v = ServerVersion { git_version: "v1.29.3+k3s1".into(), platform: "linux/amd64".into() };
        let mut down = node("w1", &[]);
        down.conditions.clear();
        let info = cluster_info(&v, "https://127.0.0.1:6443", &[node("cp", &[LABEL_CONTROL_PLANE]), down]);
        assert_eq!(info.version, "v1.29.3+k3s1");
        assert_eq!(info.api_server, "https://127.0.0.1:6443");
        assert_eq!(info.nodes.len(), 2);
        assert_eq!(info.nodes[0].role, NodeRole::ControlPlane);
        assert!(info.nodes[0].ready);
        assert_eq!(info.nodes[1].role, NodeRole::Worker);
        assert!(!info.nodes[1].ready);
    }
}
