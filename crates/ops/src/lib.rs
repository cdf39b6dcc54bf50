//! kman Ops: read-side cluster operations built on the gateway.
//! Inspection fetches snapshots and hands them to `kman-health`; `wait` polls
//! pods until one matching a selector is ready.

#![forbid(unsafe_code)]

mod inspect;
mod wait;

pub use inspect::{application_status, cluster_info, cluster_status, list_applications};
pub use tokio_util::sync::CancellationToken;
pub use wait::{wait_for_pod_ready, WaitOptions, DEFAULT_POLL_INTERVAL};
