//! kman core types: point-in-time snapshots read from the cluster and the
//! reports derived from them.
//!
//! Snapshots are plain values. Nothing here holds a client handle, so every
//! report can be recomputed from the same inputs with the same result.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod error;
mod manifest;

pub use error::{KmanError, KmanResult};
pub use manifest::ManifestDocument;

/// Condition type carried by ready nodes.
pub const NODE_READY: &str = "Ready";
/// Deployment condition type inspected for stalled rollouts.
pub const DEPLOYMENT_PROGRESSING: &str = "Progressing";
/// Reason set by the controller when a rollout exceeds its progress deadline.
pub const PROGRESS_DEADLINE_EXCEEDED: &str = "ProgressDeadlineExceeded";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "True" => Self::True,
            "False" => Self::False,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A typed fact attached to a node or deployment. Nodes leave `reason` empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Condition {
    pub fn new(kind: impl Into<String>, status: ConditionStatus) -> Self {
        Self { kind: kind.into(), status, reason: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub name: String,
    pub conditions: Vec<Condition>,
    /// Node labels; used for role derivation only.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PodPhase {
    Running,
    Pending,
    Failed,
    Succeeded,
    Unknown,
}

impl PodPhase {
    /// Missing or unrecognised phases map to `Unknown`.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("Running") => Self::Running,
            Some("Pending") => Self::Pending,
            Some("Failed") => Self::Failed,
            Some("Succeeded") => Self::Succeeded,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Pending => "Pending",
            Self::Failed => "Failed",
            Self::Succeeded => "Succeeded",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PodSnapshot {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    /// One flag per container status, in the order reported.
    pub containers_ready: Vec<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentSnapshot {
    pub name: String,
    pub namespace: String,
    pub desired_replicas: i32,
    pub ready_replicas: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub conditions: Vec<Condition>,
    /// Image of the first container in the pod template.
    pub image: Option<String>,
}

// ---- derived reports ----

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClusterHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for ClusterHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Healthy => "Healthy",
            Self::Degraded => "Degraded",
            Self::Unhealthy => "Unhealthy",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterStatus {
    pub status: ClusterHealth,
    pub ready_nodes: usize,
    pub total_nodes: usize,
    pub running_pods: usize,
    pub total_pods: usize,
    pub namespaces: usize,
    pub unhealthy_pods: Vec<PodInfo>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppPhase {
    Ready,
    Degraded,
    Failed,
    Pending,
}

impl fmt::Display for AppPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "Ready",
            Self::Degraded => "Degraded",
            Self::Failed => "Failed",
            Self::Pending => "Pending",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplicationStatus {
    pub name: String,
    pub namespace: String,
    pub phase: AppPhase,
    pub ready_replicas: i32,
    pub total_replicas: i32,
    pub image: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    ControlPlane,
    Master,
    Worker,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ControlPlane => "control-plane",
            Self::Master => "master",
            Self::Worker => "worker",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub role: NodeRole,
    pub ready: bool,
}

/// Version details reported by the API server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServerVersion {
    pub git_version: String,
    pub platform: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterInfo {
    pub version: String,
    pub platform: String,
    pub api_server: String,
    pub nodes: Vec<NodeInfo>,
}

pub mod prelude {
    pub use super::{
        AppPhase, ApplicationStatus, ClusterHealth, ClusterInfo, ClusterStatus, Condition, ConditionStatus,
        DeploymentSnapshot, KmanError, KmanResult, ManifestDocument, NodeInfo, NodeRole, NodeSnapshot, PodInfo,
        PodPhase, PodSnapshot, ServerVersion,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_phase_parse_maps_unknown_values() {
        assert_eq!(PodPhase::parse(Some("Running")), PodPhase::Running);
        assert_eq!(PodPhase::parse(Some("Succeeded")), PodPhase::Succeeded);
        assert_eq!(PodPhase::parse(Some("Evicted")), PodPhase::Unknown);
        assert_eq!(PodPhase::parse(None), PodPhase::Unknown);
    }

    #[test]
    fn condition_status_parse_is_case_sensitive() {
        assert_eq!(ConditionStatus::parse("True"), ConditionStatus::True);
        assert_eq!(ConditionStatus::parse("False"), ConditionStatus::False);
        assert_eq!(ConditionStatus::parse("true"), ConditionStatus::Unknown);
    }

    #[test]
    fn condition_serializes_type_field() {
        let c = Condition::new("Progressing", ConditionStatus::False).with_reason("ProgressDeadlineExceeded");
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["type"], "Progressing");
        assert_eq!(v["status"], "False");
        assert_eq!(v["reason"], "ProgressDeadlineExceeded");
    }

    #[test]
    fn node_role_renders_kebab_case() {
        assert_eq!(NodeRole::ControlPlane.to_string(), "control-plane");
        assert_eq!(serde_json::to_value(NodeRole::ControlPlane).unwrap(), "control-plane");
    }
}
