//! Search-engine channel adapters
//!
//! Three ways of talking to search infrastructure: a batched push endpoint,
//! a sitemap registration ping, and a read-only URL inspection API. Each
//! adapter is behind a trait so the engine can be driven against fakes, and
//! each returns [`ChannelError`] for the failures a caller is expected to
//! handle (quota, rejection, outage) rather than panicking or retrying
//! forever on its own.

pub mod inspect;
pub mod push;
pub mod sitemap;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::utils::backoff::BackoffPolicy;

pub use inspect::{HttpInspectionChannel, InspectionSnapshot};
pub use push::{HttpPushChannel, PushReceipt};
pub use sitemap::HttpSitemapChannel;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur during channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// HTTP transport failed (connect, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream reported a retryable condition (429 or 5xx)
    #[error("Transient channel failure (status {status:?}): {message}")]
    Transient {
        status: Option<u16>,
        message: String,
        /// Server-provided retry hint, in seconds
        retry_after: Option<u64>,
    },

    /// Upstream definitively rejected the request (4xx)
    #[error("Channel rejected request (status {status}): {body}")]
    Rejected { status: u16, body: String },

    /// Channel has no credential configured
    #[error("Channel not configured: {0}")]
    NotConfigured(&'static str),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("Channel error: {0}")]
    Other(String),
}

impl ChannelError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Transient { .. } => true,
            Self::Rejected { .. } => false,
            Self::NotConfigured(_) => false,
            Self::Serialization(_) => false,
            Self::Other(_) => false,
        }
    }

    /// Server-provided retry hint, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Determine if a status code should trigger a retry
///
/// Retry on 429 and the usual 5xx gateway statuses; everything else in the
/// 4xx range is a definitive answer.
pub fn should_retry(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Map a non-success HTTP status to the right error class
pub(crate) fn classify_status(status: u16, body: String, retry_after: Option<u64>) -> ChannelError {
    if should_retry(status) {
        ChannelError::Transient {
            status: Some(status),
            message: body,
            retry_after,
        }
    } else {
        ChannelError::Rejected { status, body }
    }
}

/// Parse a Retry-After header value (seconds form only)
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Run a channel operation with backoff, retrying only transient failures.
///
/// A server retry hint takes precedence over the computed delay, capped at
/// the policy's maximum so a hostile header cannot stall the run.
pub(crate) async fn send_with_retry<T, F, Fut>(
    policy: &BackoffPolicy,
    operation: F,
) -> ChannelResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = ChannelResult<T>>,
{
    let mut last_error: Option<ChannelError> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let computed = policy.delay_for(attempt);
            let delay = match last_error.as_ref().and_then(ChannelError::retry_after) {
                Some(hint) => hint.min(Duration::from_millis(policy.max_delay_ms)),
                None => computed,
            };
            tracing::debug!(
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying channel request after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(attempt = attempt, "channel request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    attempt = attempt,
                    max_retries = policy.max_retries,
                    error = %e,
                    "transient channel failure"
                );
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error
        .unwrap_or_else(|| ChannelError::Other(String::from("retries exhausted with no error"))))
}

/// Batched push-notification channel
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Whether a credential is present
    fn is_configured(&self) -> bool;

    /// Submit a list of absolute URLs belonging to `host`. The adapter
    /// splits oversized lists into protocol-sized batches itself.
    async fn submit(&self, host: &str, urls: &[String]) -> ChannelResult<PushReceipt>;
}

/// Sitemap registration channel
#[async_trait]
pub trait SitemapChannel: Send + Sync {
    /// Whether a credential is present
    fn is_configured(&self) -> bool;

    /// Ask the search side to (re)read a sitemap
    async fn register(&self, sitemap_url: &str) -> ChannelResult<()>;
}

/// Read-only URL inspection channel
#[async_trait]
pub trait InspectionChannel: Send + Sync {
    /// Whether a credential is present
    fn is_configured(&self) -> bool;

    /// Look up the search side's view of one URL
    async fn inspect(&self, url: &str, site_base: &str) -> ChannelResult<InspectionSnapshot>;
}

/// The channel adapters handed to the engine, as trait objects so tests can
/// swap in fakes
#[derive(Clone)]
pub struct ChannelSet {
    pub push: Arc<dyn PushChannel>,
    pub sitemap: Arc<dyn SitemapChannel>,
    pub inspection: Arc<dyn InspectionChannel>,
}

impl ChannelSet {
    /// Build HTTP-backed adapters from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let timeout = config.request_timeout();
        let policy = config.backoff_policy();

        Ok(Self {
            push: Arc::new(HttpPushChannel::new(
                &config.channels.push,
                &config.channels.user_agent,
                timeout,
                policy.clone(),
            )?),
            sitemap: Arc::new(HttpSitemapChannel::new(
                &config.channels.sitemap,
                &config.channels.user_agent,
                timeout,
                policy.clone(),
            )?),
            inspection: Arc::new(HttpInspectionChannel::new(
                &config.channels.inspection,
                &config.channels.user_agent,
                timeout,
                policy,
            )?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_should_retry() {
        assert!(should_retry(429));
        assert!(should_retry(500));
        assert!(should_retry(502));
        assert!(should_retry(503));
        assert!(should_retry(504));

        assert!(!should_retry(400));
        assert!(!should_retry(403));
        assert!(!should_retry(404));
        assert!(!should_retry(422));
        assert!(!should_retry(200));
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(503, String::new(), Some(12)),
            ChannelError::Transient {
                status: Some(503),
                retry_after: Some(12),
                ..
            }
        ));
        assert!(matches!(
            classify_status(422, String::from("bad key"), None),
            ChannelError::Rejected { status: 422, .. }
        ));
    }

    #[test]
    fn test_transience() {
        let transient = ChannelError::Transient {
            status: Some(429),
            message: String::from("slow down"),
            retry_after: Some(30),
        };
        assert!(transient.is_transient());
        assert_eq!(transient.retry_after(), Some(Duration::from_secs(30)));

        let rejected = ChannelError::Rejected {
            status: 403,
            body: String::from("forbidden"),
        };
        assert!(!rejected.is_transient());
        assert_eq!(rejected.retry_after(), None);

        assert!(!ChannelError::NotConfigured("push").is_transient());
    }

    #[tokio::test]
    async fn test_send_with_retry_recovers_from_transient() {
        let policy = BackoffPolicy::with_delays(3, 1, 5);
        let calls = AtomicU32::new(0);

        let result = send_with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ChannelError::Transient {
                        status: Some(503),
                        message: String::from("overloaded"),
                        retry_after: None,
                    })
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
    async fn test_send_with_retry_stops_on_rejection() {
        let policy = BackoffPolicy::with_delays(3, 1, 5);
        let calls = AtomicU32::new(0);

        let result: ChannelResult<u32> = send_with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ChannelError::Rejected {
                    status: 422,
                    body: String::from("key mismatch"),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(ChannelError::Rejected { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_with_retry_exhaustion_returns_last_error() {
        let policy = BackoffPolicy::with_delays(2, 1, 5);

        let result: ChannelResult<u32> = send_with_retry(&policy, || async {
            Err(ChannelError::Transient {
                status: Some(500),
                message: String::from("still broken"),
                retry_after: None,
            })
        })
        .await;

        match result {
            Err(ChannelError::Transient { message, .. }) => assert_eq!(message, "still broken"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
