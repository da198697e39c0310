//! Asset fetcher over HTTP using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    fetch::AssetFetcher,
};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy for transient HTTP failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub use_exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            use_exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        if self.use_exponential_backoff {
            let exponential_delay = self.base_delay * 2u32.pow(attempt.saturating_sub(1));
            exponential_delay.min(self.max_delay)
        } else {
            self.base_delay
        }
    }
}

/// Reqwest-based asset fetcher
///
/// Resolves relative asset URLs (`audio/bgm/Theme1.ogg`) against a base URL,
/// retries 5xx/429 responses and connection failures per [`RetryPolicy`], and
/// maps 404 to [`BridgeError::NotFound`].
pub struct ReqwestAssetFetcher {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl ReqwestAssetFetcher {
    /// Create a fetcher rooted at `base_url` with default timeouts
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a fetcher with a custom request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent("stream-audio-core/0.1.0")
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        Self::with_client(client, base_url)
    }

    /// Create a fetcher around an existing client
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Join the base URL and a relative asset path
    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") || self.base_url.is_empty() {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<Bytes> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.policy.max_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts = self.policy.max_attempts,
                url = %url,
                "Fetching asset"
            );

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::NOT_FOUND {
                        return Err(BridgeError::NotFound(url.to_string()));
                    }

                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        warn!(
                            status = status.as_u16(),
                            attempt = attempt + 1,
                            "Asset fetch failed with retryable status"
                        );
                        last_error = Some(BridgeError::OperationFailed(format!(
                            "HTTP {} error",
                            status.as_u16()
                        )));
                    } else if !status.is_success() {
                        return Err(BridgeError::OperationFailed(format!(
                            "HTTP {} error",
                            status.as_u16()
                        )));
                    } else {
                        return response
                            .bytes()
                            .await
                            .map_err(|e| BridgeError::OperationFailed(e.to_string()));
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempt + 1, "Asset fetch failed");

                    last_error = Some(if e.is_timeout() {
                        BridgeError::OperationFailed("Request timed out".to_string())
                    } else if e.is_connect() {
                        BridgeError::OperationFailed(format!("Connection failed: {}", e))
                    } else {
                        BridgeError::OperationFailed(e.to_string())
                    });
                }
            }

            attempt += 1;

            if attempt < self.policy.max_attempts {
                let delay = self.policy.delay_for(attempt);
                debug!(delay_ms = delay.as_millis(), "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

#[async_trait]
impl AssetFetcher for ReqwestAssetFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let resolved = self.resolve(url);
        self.fetch_with_retry(&resolved).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_url() {
        let fetcher = ReqwestAssetFetcher::new("https://cdn.example.com/game/");
        assert_eq!(
            fetcher.resolve("audio/bgm/Theme1.ogg"),
            "https://cdn.example.com/game/audio/bgm/Theme1.ogg"
        );
        assert_eq!(
            fetcher.resolve("https://other.example.com/a.ogg"),
            "https://other.example.com/a.ogg"
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            use_exponential_backoff: true,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(250));
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}
