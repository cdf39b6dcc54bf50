use std::time::Duration;

use kman_core::{KmanError, KmanResult, PodSnapshot};
use kman_kubehub::ClusterGateway;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Stand-in deadline for timeouts too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    /// Fixed delay between polls; no backoff growth, no jitter.
    pub poll_interval: Duration,
}

impl WaitOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout, poll_interval: DEFAULT_POLL_INTERVAL }
    }
}

/// Among several matches, the lexicographically smallest name is inspected so that
/// repeated polls look at the same pod regardless of list order.
fn candidate(pods: &[PodSnapshot]) -> Option<&PodSnapshot> {
    pods.iter().min_by(|a, b| a.name.cmp(&b.name))
}

/// Poll pods matching `selector` in `namespace` until the candidate pod is Running
/// with every container ready.
///
/// The deadline and `cancel` are honoured before each poll, while the list call is in
/// flight and during the sleep, so neither waits longer than one interval to take effect.
/// A failing list call is returned as-is; it is not retried.
pub async fn wait_for_pod_ready(
    gw: &dyn ClusterGateway,
    namespace: &str,
    selector: &str,
    opts: &WaitOptions,
    cancel: &CancellationToken,
) -> KmanResult<PodSnapshot> {
    let now = Instant::now();
    let deadline = now.checked_add(opts.timeout).unwrap_or_else(|| now + FAR_FUTURE);
    let timed_out = || KmanError::WaitTimeout { namespace: namespace.to_string(), selector: selector.to_string() };
    let cancelled = || KmanError::WaitCancelled { namespace: namespace.to_string(), selector: selector.to_string() };
    info!(ns = %namespace, selector = %selector, timeout_secs = opts.timeout.as_secs_f64(), "waiting for pod");

    let mut polls = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        if Instant::now() >= deadline {
            warn!(ns = %namespace, selector = %selector, polls, "pod wait timed out");
            return Err(timed_out());
        }

        polls += 1;
        counter!("pod_wait_polls", 1u64);
        let pods = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = sleep_until(deadline) => return Err(timed_out()),
            res = gw.list_pods(Some(namespace), Some(selector)) => res?,
        };

        match candidate(&pods) {
            Some(pod) if kman_health::pod_is_ready(pod) => {
                info!(pod = %pod.name, ns = %namespace, polls, "pod ready");
                return Ok(pod.clone());
            }
            Some(pod) => debug!(pod = %pod.name, phase = %pod.phase, matches = pods.len(), "pod not ready yet"),
            None => debug!(selector = %selector, "no pods match selector yet"),
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = sleep_until(deadline) => return Err(timed_out()),
            _ = sleep(opts.poll_interval) => {}
        }
    }
}
