use kman_core::{ApplicationStatus, ClusterInfo, ClusterStatus, KmanResult};
use kman_kubehub::ClusterGateway;
use tracing::info;

/// Fetch nodes, all pods and namespaces, then aggregate. Any failed read aborts
/// the report; nothing partial is returned.
pub async fn cluster_status(gw: &dyn ClusterGateway) -> KmanResult<ClusterStatus> {
    let (nodes, pods, namespaces) = futures::try_join!(gw.list_nodes(), gw.list_pods(None, None), gw.list_namespaces())?;
    let status = kman_health::aggregate_cluster(&nodes, &pods, namespaces.len());
    info!(status = %status.status, nodes = status.total_nodes, pods = status.total_pods, "cluster status computed");
    Ok(status)
}

pub async fn cluster_info(gw: &dyn ClusterGateway) -> KmanResult<ClusterInfo> {
    let version = gw.server_version().await?;
    let nodes = gw.list_nodes().await?;
    Ok(kman_health::cluster_info(&version, &gw.api_endpoint(), &nodes))
}

pub async fn application_status(gw: &dyn ClusterGateway, name: &str, namespace: &str) -> KmanResult<ApplicationStatus> {
    let dep = gw.get_deployment(name, namespace).await?;
    Ok(kman_health::application_status(&dep))
}

/// One status per deployment in `namespace`, in the order the gateway lists them.
pub async fn list_applications(gw: &dyn ClusterGateway, namespace: &str) -> KmanResult<Vec<ApplicationStatus>> {
    let deps = gw.list_deployments(namespace).await?;
    Ok(deps.iter().map(kman_health::application_status).collect())
}
