//! Readiness and liveness probes.
//!
//! Unreachable services are expected while they boot, so nothing here returns
//! an error: every outcome collapses into a `bool`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

/// Cap on a single attempt inside [`Prober::wait_ready`].
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(800);

#[async_trait]
pub trait Prober: Send + Sync {
    /// Single-shot probe. Transport errors, timeouts and non-2xx are unhealthy.
    async fn is_healthy(&self, url: &str, timeout: Duration) -> bool;

    /// Cadence between attempts in [`Prober::wait_ready`].
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Poll `url` until it answers healthy or `timeout` elapses.
    async fn wait_ready(&self, url: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut attempts = 0u32;
        loop {
            let now = Instant::now();
            if now >= deadline {
                debug!(url, attempts, "not ready before deadline");
                return false;
            }
            let remaining = deadline - now;
            attempts += 1;
            if self.is_healthy(url, remaining.min(ATTEMPT_TIMEOUT)).await {
                debug!(url, attempts, "ready");
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(url, attempts, "not ready before deadline");
                return false;
            }
            sleep(self.poll_interval().min(remaining)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// HttpProber
// ---------------------------------------------------------------------------

/// `GET`-based prober.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    interval: Duration,
}

impl HttpProber {
    pub fn new(interval: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            interval,
        }
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn is_healthy(&self, url: &str, timeout: Duration) -> bool {
        match self.client.get(url).timeout(timeout).send().await {
            Ok(resp) => {
                let ok = resp.status().is_success();
                trace!(url, status = resp.status().as_u16(), ok, "probe");
                ok
            }
            Err(e) => {
                trace!(url, "probe failed: {e}");
                false
            }
        }
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
