use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    api::transport::{ApiRequest, ApiResponse, Transport},
    error::ApiError,
    types::QueueSignal,
};

/// Exponential backoff for API calls: retry `n` waits `min(base * 2^n, max)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Hard limit for one in-flight call
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Same timeout, no retries. Periodic pollers retry on their next tick.
    pub fn single_attempt(&self) -> Self {
        Self {
            max_retries: 0,
            ..self.clone()
        }
    }

    pub fn with_timeout(&self, call_timeout: Duration) -> Self {
        Self {
            call_timeout,
            ..self.clone()
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Map a raw response onto the error taxonomy.
pub fn classify(path: &str, response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    match response.status {
        404 => Err(ApiError::NotFound {
            path: path.to_string(),
        }),
        422 => Err(ApiError::InvalidInput {
            detail: detail_of(&response),
        }),
        503 => Err(ApiError::Capacity {
            queue: QueueSignal::from_body(&response.text()),
        }),
        status => Err(ApiError::Status {
            status,
            body: response.text(),
        }),
    }
}

fn detail_of(response: &ApiResponse) -> String {
    serde_json::from_slice::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|v| v["detail"].as_str().map(str::to_string))
        .unwrap_or_else(|| response.text())
}

/// Run one API call under the retry policy.
pub async fn execute<T>(
    transport: &T,
    policy: &RetryPolicy,
    request: ApiRequest,
) -> Result<ApiResponse, ApiError>
where
    T: Transport + ?Sized,
{
    let mut retry = 0;
    loop {
        let outcome = match tokio::time::timeout(policy.call_timeout, transport.send(request.clone()))
            .await
        {
            Ok(Ok(response)) => classify(&request.path, response),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ApiError::Timeout {
                path: request.path.clone(),
                timeout: policy.call_timeout,
            }),
        };

        match outcome {
            Ok(response) => {
                debug!(path = %request.path, status = response.status, retries = retry, "api call succeeded");
                return Ok(response);
            }
            Err(e) if !e.is_retryable() || retry >= policy.max_retries => return Err(e),
            Err(e) => {
                retry += 1;
                let wait = policy.delay_for(retry);
                warn!(
                    path = %request.path,
                    error = %e,
                    "retrying in {:?} (retry {}/{})",
                    wait,
                    retry,
                    policy.max_retries
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(40), Duration::from_secs(10));
    }

    #[test]
    fn classify_extracts_422_detail() {
        let response = ApiResponse {
            status: 422,
            body: br#"{"detail": "Text must be at least 5 characters long"}"#.to_vec(),
        };
        match classify("/generate-video", response) {
            Err(ApiError::InvalidInput { detail }) => {
                assert_eq!(detail, "Text must be at least 5 characters long")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn classify_passes_success_through() {
        let response = ApiResponse {
            status: 204,
            body: Vec::new(),
        };
        assert!(classify("/track-download/x", response).is_ok());
    }
}
