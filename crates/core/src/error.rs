use serde::{Deserialize, Serialize};

/// Failures surfaced by kman operations. Each carries enough context to tell
/// the user what failed without a backtrace.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum KmanError {
    #[error("fetch: {op} failed: {message}")]
    Fetch { op: String, message: String },
    #[error("write: {op} failed: {message}")]
    Write { op: String, message: String },
    #[error("parse: failed to decode YAML in {path}: {message}")]
    Parse { path: String, message: String },
    #[error("io: {path}: {message}")]
    Io { path: String, message: String },
    #[error("apply: {kind}/{name} (document #{index}) failed after {applied} applied: {message}")]
    Apply { index: usize, kind: String, name: String, applied: usize, message: String },
    #[error("timeout waiting for pod with selector {selector} in namespace {namespace}")]
    WaitTimeout { namespace: String, selector: String },
    #[error("cancelled waiting for pod with selector {selector} in namespace {namespace}")]
    WaitCancelled { namespace: String, selector: String },
    #[error("contract violation: {0}")]
    ContractViolation(String),
    #[error("config: {0}")]
    Config(String),
}

impl KmanError {
    pub fn fetch(op: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Fetch { op: op.into(), message: err.to_string() }
    }

    pub fn write(op: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Write { op: op.into(), message: err.to_string() }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Write { .. } => "write",
            Self::Parse { .. } => "parse",
            Self::Io { .. } => "io",
            Self::Apply { .. } => "apply",
            Self::WaitTimeout { .. } => "wait_timeout",
            Self::WaitCancelled { .. } => "wait_cancelled",
            Self::ContractViolation(_) => "contract_violation",
            Self::Config(_) => "config",
        }
    }

    /// Timeouts are an expected outcome of a bounded wait, not a crash.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }
}

pub type KmanResult<T> = Result<T, KmanError>;
