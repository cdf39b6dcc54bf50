//! Config file loading and flag/env/file precedence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use kman_apply::LoadOptions;
use kman_kubehub::GatewayConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = ".kmanctl.yaml";
const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;
const MIN_POLL_INTERVAL_SECS: u64 = 1;

/// On-disk config (`~/.kmanctl.yaml` or `./.kmanctl.yaml`). Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub wait_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub max_manifest_bytes: Option<u64>,
    pub verbose: Option<bool>,
}

impl FileConfig {
    /// An explicit path must exist. Without one, the home directory is searched, then
    /// the working directory; finding neither is not an error.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::read(path)?, Some(path.to_path_buf())));
        }
        for candidate in default_locations() {
            if candidate.is_file() {
                return Ok((Self::read(&candidate)?, Some(candidate)));
            }
        }
        Ok((Self::default(), None))
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        out.push(PathBuf::from(home).join(CONFIG_FILE_NAME));
    }
    out.push(PathBuf::from(".").join(CONFIG_FILE_NAME));
    out
}

/// Values taken from flags or their env vars; these win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub verbose: bool,
}

/// Fully resolved settings handed to each command.
#[derive(Debug, Clone)]
pub struct Settings {
    pub namespace: String,
    pub gateway: GatewayConfig,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub load: LoadOptions,
    pub verbose: bool,
}

impl Settings {
    pub fn resolve(flags: Overrides, file: FileConfig) -> Self {
        let load_defaults = LoadOptions::default();
        Self {
            namespace: flags.namespace.or(file.namespace).unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            gateway: GatewayConfig {
                kubeconfig: flags.kubeconfig.or(file.kubeconfig),
                context: flags.context.or(file.context),
                ..GatewayConfig::default()
            },
            wait_timeout: Duration::from_secs(file.wait_timeout_secs.unwrap_or(DEFAULT_WAIT_TIMEOUT_SECS)),
            poll_interval: file
                .poll_interval_secs
                .map(|secs| Duration::from_secs(secs.max(MIN_POLL_INTERVAL_SECS)))
                .unwrap_or(kman_ops::DEFAULT_POLL_INTERVAL),
            load: LoadOptions { max_file_bytes: file.max_manifest_bytes.unwrap_or(load_defaults.max_file_bytes) },
            verbose: flags.verbose || file.verbose.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file_or_flags() {
        let s = Settings::resolve(Overrides::default(), FileConfig::default());
        assert_eq!(s.namespace, "default");
        assert_eq!(s.wait_timeout, Duration::from_secs(300));
        assert_eq!(s.poll_interval, Duration::from_secs(2));
        assert_eq!(s.gateway.field_manager, "kmanctl");
        assert!(s.gateway.kubeconfig.is_none());
        assert!(!s.verbose);
    }

    #[test]
    fn flags_override_file() {
        let file = FileConfig {
            namespace: Some("from-file".into()),
            context: Some("lab".into()),
            wait_timeout_secs: Some(30),
            verbose: Some(true),
            ..Default::default()
        };
        let flags = Overrides { namespace: Some("from-flag".into()), ..Default::default() };
        let s = Settings::resolve(flags, file);
        assert_eq!(s.namespace, "from-flag");
        assert_eq!(s.gateway.context.as_deref(), Some("lab"));
        assert_eq!(s.wait_timeout, Duration::from_secs(30));
        assert!(s.verbose);
    }

    #[test]
    fn zero_poll_interval_is_raised_to_one_second() {
        let file = FileConfig { poll_interval_secs: Some(0), ..Default::default() };
        let s = Settings::resolve(Overrides::default(), file);
        assert_eq!(s.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn explicit_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kman.yaml");
        std::fs::write(&path, "namespace: shop\npoll_interval_secs: 5\nkubeconfig: /etc/k3s/k3s.yaml\n").unwrap();
        let (cfg, used) = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(used.as_deref(), Some(path.as_path()));
        assert_eq!(cfg.namespace.as_deref(), Some("shop"));
        assert_eq!(cfg.poll_interval_secs, Some(5));
        assert_eq!(cfg.kubeconfig, Some(PathBuf::from("/etc/k3s/k3s.yaml")));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(Some(&dir.path().join("absent.yaml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("absent.yaml"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kman.yaml");
        std::fs::write(&path, "namepsace: typo\n").unwrap();
        assert!(FileConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kman.yaml");
        std::fs::write(&path, "\n").unwrap();
        let (cfg, _) = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg, FileConfig::default());
    }
}
