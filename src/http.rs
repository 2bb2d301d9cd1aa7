use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    /// When false only 429 answers and connect failures are retried; a 5xx
    /// or a timeout may already have applied the write.
    pub idempotent: bool,
}

impl RetryPolicy {
    /// Same budget, for requests that must not be replayed after the
    /// server may have acted on them.
    pub fn non_idempotent(self) -> Self {
        RetryPolicy {
            idempotent: false,
            ..self
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt)
    }
}

fn is_retryable_status(status: StatusCode, idempotent: bool) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || (idempotent && status.is_server_error())
}

fn is_retryable_error(err: &reqwest::Error, idempotent: bool) -> bool {
    err.is_connect() || (idempotent && err.is_timeout())
}

/// Send a request built by `build`, retrying 429/5xx answers, timeouts and
/// connection failures with exponential backoff (writes: see
/// [`RetryPolicy::idempotent`]). The last response is returned whatever its
/// status; callers decide what non-success means.
pub async fn send_with_retry<F>(
    build: F,
    policy: RetryPolicy,
    what: &str,
) -> Result<Response, reqwest::Error>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let result = build().send().await;

        let should_retry = match &result {
            Ok(resp) => is_retryable_status(resp.status(), policy.idempotent),
            Err(e) => is_retryable_error(e, policy.idempotent),
        };
        if !should_retry || attempt >= policy.max_retries {
            return result;
        }

        let backoff = policy.backoff(attempt);
        match &result {
            Ok(resp) => warn!(
                "{} answered {} (attempt {}/{}), backing off {:.1}s",
                what,
                resp.status(),
                attempt + 1,
                policy.max_retries,
                backoff.as_secs_f64()
            ),
            Err(e) => warn!(
                "{} failed: {} (attempt {}/{}), backing off {:.1}s",
                what,
                e,
                attempt + 1,
                policy.max_retries,
                backoff.as_secs_f64()
            ),
        }
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}
