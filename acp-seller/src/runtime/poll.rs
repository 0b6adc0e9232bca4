//! The pull-side event source.
//!
//! Polling is the catch-up and fallback path behind the socket listener:
//! it repeatedly lists the wallet's active jobs and feeds them through the
//! same dispatcher, so a job missed over the push channel is picked up on
//! the next cycle.

use crate::runtime::dispatcher::{Dispatcher, Source};
use acp_client::{AcpResult, SellerApi};
use acp_types::normalize_address;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Growth factor applied to the interval on each consecutive failure.
const FAILURE_BACKOFF_FACTOR: f64 = 1.8;
/// Interval ceiling while the backend is failing.
const MAX_FAILURE_INTERVAL: Duration = Duration::from_secs(120);

pub struct PollReconciler {
    api: Arc<dyn SellerApi>,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    page_size: u32,
}

impl PollReconciler {
    pub fn new(
        api: Arc<dyn SellerApi>,
        dispatcher: Arc<Dispatcher>,
        interval: Duration,
        page_size: u32,
    ) -> Self {
        Self {
            api,
            dispatcher,
            interval,
            page_size,
        }
    }

    /// Run forever. An initial catch-up poll happens before the first
    /// wait; on failures the wait grows multiplicatively and resets on
    /// the next success.
    pub async fn run(self) {
        let mut current = self.interval;
        loop {
            match self.poll_once().await {
                Ok(handled) => {
                    debug!(component = "poll", handled, "poll cycle complete");
                    current = self.interval;
                }
                Err(err) => {
                    current = next_failure_interval(current);
                    warn!(
                        component = "poll",
                        error = %err,
                        next_interval_ms = current.as_millis() as u64,
                        "poll cycle failed"
                    );
                }
            }
            tokio::time::sleep(current).await;
        }
    }

    /// One full paginated sweep of the wallet's active jobs.
    async fn poll_once(&self) -> AcpResult<usize> {
        let mut page = 1u32;
        let mut handled = 0usize;
        loop {
            let jobs = self.api.active_jobs(page, self.page_size).await?;
            let count = jobs.len();
            for raw in &jobs {
                if !self.is_ours(raw) {
                    continue;
                }
                self.dispatcher.handle_job(raw, Source::Poll).await;
                handled += 1;
            }
            if count < self.page_size as usize {
                return Ok(handled);
            }
            page += 1;
        }
    }

    fn is_ours(&self, raw: &Value) -> bool {
        raw.get("providerAddress")
            .and_then(Value::as_str)
            .and_then(normalize_address)
            .is_some_and(|provider| provider == self.dispatcher.wallet())
    }
}

fn next_failure_interval(current: Duration) -> Duration {
    current.mul_f64(FAILURE_BACKOFF_FACTOR).min(MAX_FAILURE_INTERVAL)
}
