use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::error::{ClientError, Context};

use super::FetchResult;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Retry parameters applied to every request issued through a [`Session`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub transient_statuses: Vec<StatusCode>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: 0.3,
            transient_statuses: vec![
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::BAD_GATEWAY,
                StatusCode::GATEWAY_TIMEOUT,
            ],
        }
    }
}

impl RetryPolicy {
    pub fn is_transient(&self, status: StatusCode) -> bool {
        self.transient_statuses.contains(&status)
    }

    /// Delay applied after the given zero-based attempt fails.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.backoff_factor * 2_f64.powi(attempt as i32))
    }
}

/// Blocking HTTP session that absorbs transport failures and transient
/// server errors before they reach the caller.
pub struct Session {
    client: Client,
    policy: RetryPolicy,
}

impl Session {
    pub fn new(policy: RetryPolicy) -> FetchResult<Self> {
        Self::with_default_headers(policy, HeaderMap::new())
    }

    /// Build a session whose headers are attached to every request, e.g. an
    /// `Authorization` header installed after authentication.
    pub fn with_default_headers(policy: RetryPolicy, headers: HeaderMap) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .context("Failed to construct HTTP client")?;

        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Issue a GET request. Connection failures, read failures, and responses
    /// whose status is in the transient set are retried with exponential
    /// backoff until the retry budget is spent. Any other response, 4xx
    /// included, is returned to the caller untouched.
    pub fn get(&self, url: &str) -> FetchResult<Response> {
        let mut attempt = 0;

        loop {
            let last_attempt = attempt + 1 >= self.policy.max_retries;

            match self.client.get(url).send() {
                Ok(response) if !self.policy.is_transient(response.status()) => {
                    return Ok(response);
                }
                Ok(response) => {
                    if last_attempt {
                        return Err(ClientError::message(format!(
                            "Request failed with status {} after {} attempts",
                            response.status(),
                            self.policy.max_retries
                        )));
                    }
                    log::warn!(
                        "Transient status {} from {}, retrying",
                        response.status(),
                        url
                    );
                }
                Err(err) => {
                    if last_attempt {
                        return Err(err.into());
                    }
                    log::warn!("Request to {} failed: {}, retrying", url, err);
                }
            }

            thread::sleep(self.policy.backoff_delay(attempt));
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_standard_retry_settings() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_retries, 3);
        assert!(policy.is_transient(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(policy.is_transient(StatusCode::BAD_GATEWAY));
        assert!(policy.is_transient(StatusCode::GATEWAY_TIMEOUT));
        assert!(!policy.is_transient(StatusCode::NOT_FOUND));
        assert!(!policy.is_transient(StatusCode::BAD_REQUEST));
        assert!(!policy.is_transient(StatusCode::OK));
    }

    #[test]
    fn backoff_grows_exponentially() {
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_factor: 0.3,
            transient_statuses: Vec::new(),
        };

        assert_eq!(policy.backoff_delay(0), Duration::from_secs_f64(0.3));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs_f64(0.6));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs_f64(1.2));
    }
}
