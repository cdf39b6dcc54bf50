//! Human-readable rendering. JSON output goes straight through serde in `main`.

use chrono::{DateTime, Utc};
use kman_apply::DeployReport;
use kman_core::{ApplicationStatus, ClusterInfo, ClusterStatus, PodSnapshot};

pub fn cluster_status(s: &ClusterStatus) -> Vec<String> {
    let mut lines = vec![
        format!("Cluster:    {}", s.status),
        format!("Nodes:      {}/{} ready", s.ready_nodes, s.total_nodes),
        format!("Pods:       {}/{} running", s.running_pods, s.total_pods),
        format!("Namespaces: {}", s.namespaces),
    ];
    if !s.unhealthy_pods.is_empty() {
        lines.push(String::new());
        lines.push(format!("{:<20} {:<40} {}", "NAMESPACE", "POD", "PHASE"));
        for p in &s.unhealthy_pods {
            lines.push(format!("{:<20} {:<40} {}", p.namespace, p.name, p.phase));
        }
    }
    lines
}

pub fn cluster_info(info: &ClusterInfo) -> Vec<String> {
    let mut lines = vec![
        format!("Version:    {}", info.version),
        format!("Platform:   {}", info.platform),
        format!("API server: {}", info.api_server),
        String::new(),
        format!("{:<32} {:<14} {}", "NODE", "ROLE", "READY"),
    ];
    for n in &info.nodes {
        lines.push(format!("{:<32} {:<14} {}", n.name, n.role, if n.ready { "yes" } else { "no" }));
    }
    lines
}

pub fn app_table(apps: &[ApplicationStatus], now: DateTime<Utc>) -> Vec<String> {
    let mut lines = vec![format!("{:<28} {:<9} {:<7} {:<6} {}", "NAME", "PHASE", "READY", "AGE", "IMAGE")];
    for a in apps {
        lines.push(format!(
            "{:<28} {:<9} {:<7} {:<6} {}",
            a.name,
            a.phase,
            format!("{}/{}", a.ready_replicas, a.total_replicas),
            render_age(a.created_at, now),
            a.image.as_deref().unwrap_or("-"),
        ));
    }
    lines
}

pub fn app_detail(a: &ApplicationStatus, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = vec![
        format!("Name:      {}", a.name),
        format!("Namespace: {}", a.namespace),
        format!("Phase:     {}", a.phase),
        format!("Replicas:  {}/{} ready", a.ready_replicas, a.total_replicas),
        format!("Image:     {}", a.image.as_deref().unwrap_or("-")),
        format!("Age:       {}", render_age(a.created_at, now)),
    ];
    if !a.conditions.is_empty() {
        lines.push("Conditions:".to_string());
        for c in &a.conditions {
            match &c.reason {
                Some(r) => lines.push(format!("  {:<16} {:<8} {}", c.kind, c.status, r)),
                None => lines.push(format!("  {:<16} {}", c.kind, c.status)),
            }
        }
    }
    lines
}

pub fn deploy_report(r: &DeployReport) -> Vec<String> {
    r.preview_lines()
}

pub fn ready_pod(p: &PodSnapshot) -> String {
    format!("pod {}/{} is ready", p.namespace, p.name)
}

pub fn render_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else { return "-".to_string() };
    let mut secs = (now - created).num_seconds().max(0) as u64;
    let days = secs / 86_400; secs %= 86_400;
    let hours = secs / 3600; secs %= 3600;
    let mins = secs / 60; secs %= 60;
    if days > 0 { format!("{}d{}h", days, hours) }
    else if hours > 0 { format!("{}h{}m", hours, mins) }
    else if mins > 0 { format!("{}m", mins) }
    else { format!("{}s", secs) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use kman_core::{AppPhase, ClusterHealth, Condition, ConditionStatus, PodInfo, PodPhase};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn age_buckets() {
        let n = now();
        assert_eq!(render_age(None, n), "-");
        assert_eq!(render_age(Some(n - Duration::seconds(42)), n), "42s");
        assert_eq!(render_age(Some(n - Duration::minutes(7)), n), "7m");
        assert_eq!(render_age(Some(n - Duration::minutes(125)), n), "2h5m");
        assert_eq!(render_age(Some(n - Duration::hours(50)), n), "2d2h");
        // clock skew renders as zero rather than negative
        assert_eq!(render_age(Some(n + Duration::seconds(30)), n), "0s");
    }

    #[test]
    fn status_lists_unhealthy_pods_only_when_present() {
        let mut s = ClusterStatus {
            status: ClusterHealth::Healthy,
            ready_nodes: 3,
            total_nodes: 3,
            running_pods: 10,
            total_pods: 10,
            namespaces: 4,
            unhealthy_pods: vec![],
        };
        assert_eq!(cluster_status(&s).len(), 4);
        s.status = ClusterHealth::Degraded;
        s.unhealthy_pods.push(PodInfo { name: "job-x".into(), namespace: "batch".into(), phase: PodPhase::Failed });
        let lines = cluster_status(&s);
        assert_eq!(lines[0], "Cluster:    Degraded");
        assert!(lines.last().unwrap().contains("job-x"));
        assert!(lines.last().unwrap().ends_with("Failed"));
    }

    #[test]
    fn app_detail_shows_condition_reason() {
        let a = ApplicationStatus {
            name: "web".into(),
            namespace: "shop".into(),
            phase: AppPhase::Failed,
            ready_replicas: 0,
            total_replicas: 3,
            image: None,
            created_at: Some(now() - Duration::minutes(3)),
            conditions: vec![Condition::new("Progressing", ConditionStatus::False).with_reason("ProgressDeadlineExceeded")],
        };
        let lines = app_detail(&a, now());
        assert!(lines.contains(&"Replicas:  0/3 ready".to_string()));
        assert!(lines.contains(&"Image:     -".to_string()));
        assert!(lines.contains(&"Age:       3m".to_string()));
        assert!(lines.last().unwrap().ends_with("ProgressDeadlineExceeded"));
        let table = app_table(std::slice::from_ref(&a), now());
        assert!(table[1].starts_with("web"));
        assert!(table[1].contains("0/3"));
    }
}
