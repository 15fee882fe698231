//! Batched push-notification adapter
//!
//! Speaks the IndexNow-style protocol: one POST per batch carrying the
//! host, the site key and a URL list. The endpoint answers for the batch
//! as a whole, so a rejection applies to every URL in it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{
    classify_status, parse_retry_after, send_with_retry, ChannelError, ChannelResult, PushChannel,
};
use crate::config::PushConfig;
use crate::utils::backoff::BackoffPolicy;

/// Outcome of a successful push submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReceipt {
    /// URLs the endpoint accepted
    pub accepted: usize,
    /// Requests it took (large lists are split)
    pub batches: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PushRequest<'a> {
    host: &'a str,
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_location: Option<&'a str>,
    url_list: &'a [String],
}

/// HTTP implementation of the push channel
pub struct HttpPushChannel {
    client: Client,
    endpoint: String,
    key: Option<String>,
    key_location: Option<String>,
    batch_ceiling: usize,
    policy: BackoffPolicy,
}

impl HttpPushChannel {
    pub fn new(
        config: &PushConfig,
        user_agent: &str,
        timeout: Duration,
        policy: BackoffPolicy,
    ) -> ChannelResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            key: config.key.clone(),
            key_location: config.key_location.clone(),
            batch_ceiling: config.batch_ceiling.max(1),
            policy,
        })
    }

    async fn post_batch(&self, host: &str, key: &str, urls: &[String]) -> ChannelResult<()> {
        let body = PushRequest {
            host,
            key,
            key_location: self.key_location.as_deref(),
            url_list: urls,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let retry_after = parse_retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), text, retry_after))
    }
}

#[async_trait]
impl PushChannel for HttpPushChannel {
    fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    async fn submit(&self, host: &str, urls: &[String]) -> ChannelResult<PushReceipt> {
        let Some(key) = self.key.clone() else {
            return Err(ChannelError::NotConfigured("push"));
        };

        if urls.is_empty() {
            return Ok(PushReceipt {
                accepted: 0,
                batches: 0,
            });
        }

        let mut accepted = 0;
        let mut batches = 0;

        for chunk in urls.chunks(self.batch_ceiling) {
            send_with_retry(&self.policy, || self.post_batch(host, &key, chunk)).await?;
            accepted += chunk.len();
            batches += 1;

            tracing::debug!(
                host = host,
                batch = batches,
                urls = chunk.len(),
                "push batch accepted"
            );
        }

        Ok(PushReceipt { accepted, batches })
    }
}
