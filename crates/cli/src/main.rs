#![forbid(unsafe_code)]

mod config;
mod render;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use kman_apply::{DeployReport, DeployRequest, Deployer};
use kman_core::KmanError;
use kman_kubehub::{ClusterGateway, KubeGateway};
use kman_ops::{CancellationToken, WaitOptions};
use serde::Serialize;
use tokio::signal;
use tracing::{debug, info, warn};

use crate::config::{FileConfig, Overrides, Settings};

/// Exit status for a wait that ran out of time.
const EXIT_WAIT_TIMEOUT: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "kmanctl", version, about = "Cluster health, application status, deploy and wait")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace (default: config file, then "default")
    #[arg(long = "ns", env = "KMAN_NAMESPACE", global = true)]
    namespace: Option<String>,

    /// Config file (default: ~/.kmanctl.yaml, then ./.kmanctl.yaml)
    #[arg(long = "config", env = "KMAN_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Kubeconfig path (default: in-cluster, then the standard kubeconfig)
    #[arg(long = "kubeconfig", env = "KMAN_KUBECONFIG", global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context
    #[arg(long = "context", env = "KMAN_CONTEXT", global = true)]
    context: Option<String>,

    /// Debug logging when KMAN_LOG is unset
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Overall cluster health: nodes, pods, namespaces
    Status,
    /// Server version, API endpoint and node roles
    Info,
    /// Application (deployment) status
    Apps {
        #[command(subcommand)]
        cmd: AppsCmd,
    },
    /// Apply a directory or file of manifests
    Deploy {
        /// Application name (used for reporting)
        name: String,
        /// Manifest directory or single YAML file
        #[arg(long = "manifests", short = 'f')]
        manifests: PathBuf,
        /// Print what would be applied without writing
        #[arg(long = "dry-run", action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// Wait until a pod matching the selector is ready
    Wait {
        /// Label selector, e.g. "app=web"
        #[arg(long = "selector", short = 'l')]
        selector: String,
        /// Give up after this many seconds (default: config file, then 300)
        #[arg(long = "timeout-secs")]
        timeout_secs: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum AppsCmd {
    /// Every deployment in the namespace
    List,
    /// A single deployment
    Status { name: String },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env = std::env::var("KMAN_LOG").unwrap_or_else(|_| default.to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KMAN_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid KMAN_METRICS_ADDR; expected host:port");
        }
    }
}

fn emit<T: Serialize>(output: Output, value: &T, human: impl FnOnce(&T) -> Vec<String>) -> Result<()> {
    match output {
        Output::Human => {
            for line in human(value) {
                println!("{}", line);
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let output = cli.output;
    if let Err(e) = run(cli).await {
        let timed_out = e.downcast_ref::<KmanError>().map(KmanError::is_timeout).unwrap_or(false);
        match output {
            Output::Json => eprintln!("{}", error_body(&e)),
            Output::Human => eprintln!("error: {:#}", e),
        }
        std::process::exit(if timed_out { EXIT_WAIT_TIMEOUT } else { 1 });
    }
}

/// `{"kind", "message"}`; errors outside the taxonomy are reported as `internal`.
fn error_body(e: &anyhow::Error) -> serde_json::Value {
    let kind = e.downcast_ref::<KmanError>().map(KmanError::kind).unwrap_or("internal");
    serde_json::json!({ "kind": kind, "message": format!("{:#}", e) })
}

async fn connect(settings: &Settings) -> Result<Arc<dyn ClusterGateway>> {
    let gw = KubeGateway::connect(&settings.gateway).await.context("connecting to cluster")?;
    Ok(Arc::new(gw))
}

/// Dry runs only read manifests and never connect.
async fn deploy(req: &DeployRequest, settings: &Settings) -> Result<DeployReport> {
    if req.dry_run {
        return Ok(kman_apply::preview(req, &settings.load)?);
    }
    let gateway = connect(settings).await?;
    Ok(Deployer::new(gateway).with_load_options(settings.load).deploy(req).await?)
}

async fn run(cli: Cli) -> Result<()> {
    let (file, source) = FileConfig::load(cli.config.as_deref()).map_err(|e| KmanError::Config(format!("{:#}", e)))?;
    let settings = Settings::resolve(
        Overrides { namespace: cli.namespace, kubeconfig: cli.kubeconfig, context: cli.context, verbose: cli.verbose },
        file,
    );
    init_tracing(settings.verbose);
    init_metrics();
    debug!(config = ?source, ns = %settings.namespace, "settings resolved");

    let ns = settings.namespace.as_str();
    let now = chrono::Utc::now();

    match cli.command {
        Commands::Status => {
            let gateway = connect(&settings).await?;
            let status = kman_ops::cluster_status(gateway.as_ref()).await?;
            emit(cli.output, &status, render::cluster_status)?;
        }
        Commands::Info => {
            let gateway = connect(&settings).await?;
            let info = kman_ops::cluster_info(gateway.as_ref()).await?;
            emit(cli.output, &info, render::cluster_info)?;
        }
        Commands::Apps { cmd: AppsCmd::List } => {
            info!(ns = %ns, "apps list invoked");
            let gateway = connect(&settings).await?;
            let apps = kman_ops::list_applications(gateway.as_ref(), ns).await?;
            emit(cli.output, &apps, |a| render::app_table(a, now))?;
        }
        Commands::Apps { cmd: AppsCmd::Status { name } } => {
            info!(ns = %ns, name = %name, "apps status invoked");
            let gateway = connect(&settings).await?;
            let app = kman_ops::application_status(gateway.as_ref(), &name, ns).await?;
            emit(cli.output, &app, |a| render::app_detail(a, now))?;
        }
        Commands::Deploy { name, manifests, dry_run } => {
            info!(name = %name, path = %manifests.display(), ns = %ns, dry_run, "deploy invoked");
            let req = DeployRequest { name, manifest_path: manifests, namespace: ns.to_string(), dry_run };
            let report = deploy(&req, &settings).await?;
            emit(cli.output, &report, render::deploy_report)?;
        }
        Commands::Wait { selector, timeout_secs } => {
            let timeout = timeout_secs.map(Duration::from_secs).unwrap_or(settings.wait_timeout);
            let opts = WaitOptions { timeout, poll_interval: settings.poll_interval };
            let gateway = connect(&settings).await?;
            let cancel = CancellationToken::new();
            let on_signal = tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    if signal::ctrl_c().await.is_ok() {
                        info!("interrupt received; cancelling wait");
                        cancel.cancel();
                    }
                }
            });
            let res = kman_ops::wait_for_pod_ready(gateway.as_ref(), ns, &selector, &opts, &cancel).await;
            on_signal.abort();
            let pod = res?;
            emit(cli.output, &pod, |p| vec![render::ready_pod(p)])?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["kmanctl", "apps", "status", "web", "--ns", "shop", "-o", "json"]).unwrap();
        assert_eq!(cli.output, Output::Json);
        assert_eq!(cli.namespace.as_deref(), Some("shop"));
        match cli.command {
            Commands::Apps { cmd: AppsCmd::Status { name } } => assert_eq!(name, "web"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parses_deploy_and_wait() {
        let cli = Cli::try_parse_from(["kmanctl", "deploy", "shop", "--manifests", "./k8s", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Deploy { name, manifests, dry_run } => {
                assert_eq!(name, "shop");
                assert_eq!(manifests, PathBuf::from("./k8s"));
                assert!(dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        let cli = Cli::try_parse_from(["kmanctl", "wait", "-l", "app=web", "--timeout-secs", "30"]).unwrap();
        match cli.command {
            Commands::Wait { selector, timeout_secs } => {
                assert_eq!(selector, "app=web");
                assert_eq!(timeout_secs, Some(30));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    fn offline_settings() -> Settings {
        let file = FileConfig { kubeconfig: Some(PathBuf::from("/nonexistent/kubeconfig")), ..Default::default() };
        Settings::resolve(Overrides::default(), file)
    }

    #[tokio::test]
    async fn dry_run_deploy_does_not_need_a_cluster() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cm.yaml"), "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\n").unwrap();
        let req = DeployRequest { name: "shop".into(), manifest_path: dir.path().to_path_buf(), namespace: "shop".into(), dry_run: true };
        let report = deploy(&req, &offline_settings()).await.unwrap();
        assert_eq!(report.preview_lines(), vec!["would deploy 1 manifests for shop", "  - ConfigMap/settings"]);
    }

    #[tokio::test]
    async fn real_deploy_reports_missing_kubeconfig() {
        let dir = tempfile::tempdir().unwrap();
        let req = DeployRequest { name: "shop".into(), manifest_path: dir.path().to_path_buf(), namespace: "shop".into(), dry_run: false };
        let err = deploy(&req, &offline_settings()).await.unwrap_err();
        assert_eq!(error_body(&err)["kind"], "config");
    }

    #[test]
    fn json_errors_always_carry_a_kind() {
        let timeout: anyhow::Error = KmanError::WaitTimeout { namespace: "apps".into(), selector: "app=web".into() }.into();
        assert_eq!(error_body(&timeout)["kind"], "wait_timeout");
        let wrapped = anyhow::Error::new(KmanError::Config("bad file".into())).context("loading settings");
        let body = error_body(&wrapped);
        assert_eq!(body["kind"], "config");
        assert!(body["message"].as_str().unwrap().contains("bad file"));
        let plain = anyhow::anyhow!("stdout closed");
        assert_eq!(error_body(&plain)["kind"], "internal");
    }

    #[test]
    fn deploy_requires_manifests() {
        assert!(Cli::try_parse_from(["kmanctl", "deploy", "shop"]).is_err());
    }
}
