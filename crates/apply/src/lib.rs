//! kman apply: load manifests from disk and push them through the gateway.

#![forbid(unsafe_code)]

mod deploy;
mod loader;

pub use deploy::{preview, DeployReport, DeployRequest, Deployer, PlannedResource};
pub use loader::{load_manifests, load_manifests_with, parse_documents, LoadOptions};
