//! Retry policy for remote calls.
//!
//! Exponential backoff with additive jitter, a bounded attempt count, and
//! a retryable/non-retryable error classification. The transport keeps a
//! small retry of its own (see [`crate::client`]); this layer is wrapped
//! by callers whose local context makes further attempts worthwhile.

use crate::error::{AcpError, AcpResult, HttpErrorInfo};
use rand::Rng;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Hook invoked before each backoff wait with the attempt number that just
/// failed, the computed delay, and the error.
pub type RetryHook = Box<dyn Fn(u32, Duration, &AcpError) + Send + Sync>;

/// Options for [`with_retry`].
pub struct RetryOptions {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound for the exponential delay (before jitter).
    pub max_delay: Duration,
    pub on_retry: Option<RetryHook>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            on_retry: None,
        }
    }
}

impl RetryOptions {
    pub fn with_on_retry(mut self, hook: RetryHook) -> Self {
        self.on_retry = Some(hook);
        self
    }
}

/// Jitterless delay for the given 1-based failed attempt:
/// `min(max_delay, base_delay * 2^(attempt-1))`.
pub fn delay_for_attempt(attempt: u32, opts: &RetryOptions) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    opts.base_delay.saturating_mul(factor).min(opts.max_delay)
}

/// Additive jitter uniform in `[0, delay/4)`.
fn jittered(delay: Duration) -> Duration {
    let quarter = delay.as_millis() as u64 / 4;
    if quarter == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..quarter))
}

fn extract_info(doc: &Value) -> HttpErrorInfo {
    HttpErrorInfo {
        status_code: doc
            .get("statusCode")
            .and_then(Value::as_u64)
            .map(|n| n as u16),
        message: doc
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Recover a status code and message from an error.
///
/// Backend error bodies sometimes arrive as JSON-in-a-string
/// (`"{\"statusCode\": 429, \"message\": \"rate limited\"}"`); both the
/// direct and the wrapped form are unwrapped here.
pub fn parse_http_error(err: &AcpError) -> HttpErrorInfo {
    match err {
        AcpError::Status { status, body } => {
            let mut info = match serde_json::from_str::<Value>(body) {
                // One level of unwrapping for stringified bodies.
                Ok(Value::String(inner)) => serde_json::from_str::<Value>(&inner)
                    .map(|doc| extract_info(&doc))
                    .unwrap_or_default(),
                Ok(doc) => extract_info(&doc),
                Err(_) => HttpErrorInfo::default(),
            };
            if info.status_code.is_none() {
                info.status_code = Some(*status);
            }
            if info.message.is_none() && !body.is_empty() {
                info.message = Some(body.clone());
            }
            info
        }
        other => HttpErrorInfo {
            status_code: None,
            message: Some(other.to_string()),
        },
    }
}

const RETRYABLE_FRAGMENTS: [&str; 4] = ["econnreset", "etimedout", "socket hang up", "network"];

/// Whether another attempt can reasonably succeed: 429, any 5xx, or a
/// socket-level failure recognizable from the message.
pub fn is_retryable(err: &AcpError) -> bool {
    let info = parse_http_error(err);
    if let Some(status) = info.status_code {
        if status == 429 || (500..600).contains(&status) {
            return true;
        }
    }
    let message = info.message.unwrap_or_default().to_lowercase();
    RETRYABLE_FRAGMENTS.iter().any(|f| message.contains(f))
}

/// Run `op` with bounded retries.
///
/// Retries only retryable errors; exhaustion re-raises the last error.
/// `label` names the operation in log lines.
pub async fn with_retry<T, F, Fut>(label: &str, opts: &RetryOptions, mut op: F) -> AcpResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AcpResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= opts.attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = jittered(delay_for_attempt(attempt, opts));
                if let Some(hook) = &opts.on_retry {
                    hook(attempt, delay, &err);
                }
                warn!(
                    component = "retry",
                    operation = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn status(status: u16, body: &str) -> AcpError {
        AcpError::Status {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn default_delay_sequence_is_doubling_from_500ms() {
        let opts = RetryOptions::default();
        let delays: Vec<u64> = (1..=5)
            .map(|n| delay_for_attempt(n, &opts).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000]);
        // Past the fifth failure the exponent would exceed the cap.
        assert_eq!(delay_for_attempt(6, &opts), Duration::from_secs(10));
        assert_eq!(delay_for_attempt(30, &opts), Duration::from_secs(10));
    }

    #[test]
    fn classification_covers_status_codes_and_socket_errors() {
        assert!(is_retryable(&status(429, "")));
        assert!(is_retryable(&status(500, "")));
        assert!(is_retryable(&status(503, "")));
        assert!(!is_retryable(&status(400, "")));
        assert!(!is_retryable(&status(404, "not found")));

        assert!(is_retryable(&AcpError::Network {
            message: "read ECONNRESET".into()
        }));
        assert!(is_retryable(&AcpError::Network {
            message: "socket hang up".into()
        }));
        assert!(!is_retryable(&AcpError::Serialization {
            message: "trailing comma".into()
        }));
    }

    #[test]
    fn parse_unwraps_json_in_a_string_bodies() {
        let wrapped = status(
            500,
            "\"{\\\"statusCode\\\": 429, \\\"message\\\": \\\"rate limited\\\"}\"",
        );
        let info = parse_http_error(&wrapped);
        assert_eq!(info.status_code, Some(429));
        assert_eq!(info.message.as_deref(), Some("rate limited"));

        let direct = status(429, "{\"statusCode\": 429, \"message\": \"rate limited\"}");
        let info = parse_http_error(&direct);
        assert_eq!(info.status_code, Some(429));
        assert_eq!(info.message.as_deref(), Some("rate limited"));
    }

    #[test]
    fn parse_falls_back_to_transport_status() {
        let info = parse_http_error(&status(502, "bad gateway"));
        assert_eq!(info.status_code, Some(502));
        assert_eq!(info.message.as_deref(), Some("bad gateway"));
    }

    fn fast_opts(attempts: u32) -> RetryOptions {
        RetryOptions {
            attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            on_retry: None,
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = with_retry("test", &fast_opts(5), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(status(429, ""))
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: AcpResult<u32> = with_retry("test", &fast_opts(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(status(400, "bad request"))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_reraises_the_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: AcpResult<u32> = with_retry("test", &fast_opts(3), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(status(503, "unavailable"))
            }
        })
        .await;
        match result {
            Err(AcpError::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn hook_runs_before_each_wait() {
        let hook_calls = Arc::new(AtomicU32::new(0));
        let seen = hook_calls.clone();
        let opts = fast_opts(3).with_on_retry(Box::new(move |attempt, _delay, _err| {
            seen.fetch_add(attempt, Ordering::SeqCst);
        }));
        let _: AcpResult<u32> = with_retry("test", &opts, || async { Err(status(500, "")) }).await;
        // Failed attempts 1 and 2 waited; the third returned.
        assert_eq!(hook_calls.load(Ordering::SeqCst), 3);
    }
}
