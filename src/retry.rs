use rand::Rng;
use reqwest::StatusCode;
use std::time::Duration;

use crate::config::RetryConfig;

/// Retry policy for the weather provider
#[derive(Debug, Clone)]
pub enum RetryPolicy {
    /// Exponential backoff with jitter
    ExponentialBackoff(RetryConfig),
    /// Single attempt
    Never,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::ExponentialBackoff(RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Delays to wait before each retry; its length is the retry budget.
    pub fn delays(&self) -> Vec<Duration> {
        match self {
            RetryPolicy::Never => Vec::new(),
            RetryPolicy::ExponentialBackoff(cfg) => {
                let max_delay = Duration::from_millis(cfg.max_delay_ms);
                (0..cfg.max_retries)
                    .map(|attempt| {
                        let base = cfg
                            .initial_delay_ms
                            .saturating_mul(cfg.backoff_factor.saturating_pow(attempt as u32));
                        let jitter = rand::thread_rng().gen_range(0.8..=1.2);
                        let delay = Duration::from_millis((base as f64 * jitter) as u64);
                        std::cmp::min(delay, max_delay)
                    })
                    .collect()
            }
        }
    }
}

/// Statuses worth another attempt: rate limiting and server-side failures.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Transport-level failures worth another attempt.
pub fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
