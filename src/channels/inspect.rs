//! URL inspection adapter
//!
//! Read-only lookups against the search side's inspection API. Calls are
//! rate limited with governor because the upstream quota is tight compared
//! to the other channels.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    classify_status, parse_retry_after, send_with_retry, ChannelError, ChannelResult,
    InspectionChannel,
};
use crate::config::InspectionConfig;
use crate::utils::backoff::BackoffPolicy;

/// What the inspection API currently knows about one URL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InspectionSnapshot {
    /// Human-oriented coverage summary ("Submitted and indexed", ...)
    pub coverage_state: Option<String>,
    /// Machine state: INDEXED, PARTIALLY_INDEXED, CRAWLED_NOT_INDEXED, ...
    pub indexing_state: Option<String>,
    pub last_crawl_time: Option<DateTime<Utc>>,
    /// ALLOWED or DISALLOWED per robots.txt
    pub robots_state: Option<String>,
    /// PASS/FAIL verdict for structured data, when evaluated
    pub rich_results_verdict: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectRequest<'a> {
    inspection_url: &'a str,
    site_url: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectResponse {
    inspection_result: Option<InspectionResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectionResult {
    index_status_result: Option<IndexStatusResult>,
    rich_results_result: Option<RichResultsResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStatusResult {
    coverage_state: Option<String>,
    indexing_state: Option<String>,
    last_crawl_time: Option<DateTime<Utc>>,
    robots_txt_state: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RichResultsResult {
    verdict: Option<String>,
}

impl From<InspectResponse> for InspectionSnapshot {
    fn from(response: InspectResponse) -> Self {
        let mut snapshot = InspectionSnapshot::default();

        if let Some(result) = response.inspection_result {
            if let Some(index) = result.index_status_result {
                snapshot.coverage_state = index.coverage_state;
                snapshot.indexing_state = index.indexing_state;
                snapshot.last_crawl_time = index.last_crawl_time;
                snapshot.robots_state = index.robots_txt_state;
            }
            if let Some(rich) = result.rich_results_result {
                snapshot.rich_results_verdict = rich.verdict;
            }
        }

        snapshot
    }
}

/// HTTP implementation of the inspection channel
pub struct HttpInspectionChannel {
    client: Client,
    endpoint: String,
    token: Option<String>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    policy: BackoffPolicy,
}

impl HttpInspectionChannel {
    pub fn new(
        config: &InspectionConfig,
        user_agent: &str,
        timeout: Duration,
        policy: BackoffPolicy,
    ) -> ChannelResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .gzip(true)
            .build()?;

        let rate = NonZeroU32::new(config.qps.max(1.0) as u32).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
            rate_limiter,
            policy,
        })
    }

    async fn lookup(
        &self,
        token: &str,
        url: &str,
        site_base: &str,
    ) -> ChannelResult<InspectionSnapshot> {
        let body = InspectRequest {
            inspection_url: url,
            site_url: site_base,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), text, retry_after));
        }

        let parsed: InspectResponse = response.json().await?;
        Ok(parsed.into())
    }
}

#[async_trait]
impl InspectionChannel for HttpInspectionChannel {
    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn inspect(&self, url: &str, site_base: &str) -> ChannelResult<InspectionSnapshot> {
        let Some(token) = self.token.clone() else {
            return Err(ChannelError::NotConfigured("inspection"));
        };

        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        let snapshot =
            send_with_retry(&self.policy, || self.lookup(&token, url, site_base)).await?;

        tracing::debug!(
            url = url,
            indexing_state = snapshot.indexing_state.as_deref().unwrap_or("-"),
            "inspection completed"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_mapping() {
        let raw = r#"{
            "inspectionResult": {
                "indexStatusResult": {
                    "coverageState": "Submitted and indexed",
                    "indexingState": "INDEXED",
                    "lastCrawlTime": "2025-06-01T04:30:00Z",
                    "robotsTxtState": "ALLOWED"
                },
                "richResultsResult": { "verdict": "PASS" }
            }
        }"#;

        let parsed: InspectResponse = serde_json::from_str(raw).unwrap();
        let snapshot: InspectionSnapshot = parsed.into();

        assert_eq!(snapshot.indexing_state.as_deref(), Some("INDEXED"));
        assert_eq!(snapshot.coverage_state.as_deref(), Some("Submitted and indexed"));
        assert_eq!(snapshot.robots_state.as_deref(), Some("ALLOWED"));
        assert_eq!(snapshot.rich_results_verdict.as_deref(), Some("PASS"));
        assert!(snapshot.last_crawl_time.is_some());
    }

    #[test]
    fn test_sparse_response_mapping() {
        // a URL the search side has never seen comes back nearly empty
        let raw = r#"{
            "inspectionResult": {
                "indexStatusResult": { "indexingState": "DISCOVERED_NOT_INDEXED" }
            }
        }"#;

        let parsed: InspectResponse = serde_json::from_str(raw).unwrap();
        let snapshot: InspectionSnapshot = parsed.into();

        assert_eq!(snapshot.indexing_state.as_deref(), Some("DISCOVERED_NOT_INDEXED"));
        assert!(snapshot.coverage_state.is_none());
        assert!(snapshot.rich_results_verdict.is_none());

        let empty: InspectionSnapshot = serde_json::from_str::<InspectResponse>("{}").unwrap().into();
        assert!(empty.indexing_state.is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let body = InspectRequest {
            inspection_url: "https://example.com/blog/x",
            site_url: "https://example.com",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["inspectionUrl"], "https://example.com/blog/x");
        assert_eq!(json["siteUrl"], "https://example.com");
    }

    #[tokio::test]
    async fn test_inspect_without_token_fails_fast() {
        let channel = HttpInspectionChannel::new(
            &InspectionConfig::default(),
            "indexwatch-test",
            Duration::from_secs(5),
            BackoffPolicy::default(),
        )
        .unwrap();

        let result = channel
            .inspect("https://example.com/blog/x", "https://example.com")
            .await;
        assert!(matches!(result, Err(ChannelError::NotConfigured("inspection"))));
    }
}
