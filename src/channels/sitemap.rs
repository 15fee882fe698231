//! Sitemap registration adapter
//!
//! A single authenticated GET asking the search side to (re)read a sitemap.
//! The call is cheap and idempotent, which is why the engine may also fire
//! it best-effort after an immediate submission.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{
    classify_status, parse_retry_after, send_with_retry, ChannelError, ChannelResult,
    SitemapChannel,
};
use crate::config::SitemapConfig;
use crate::utils::backoff::BackoffPolicy;

/// HTTP implementation of the sitemap channel
pub struct HttpSitemapChannel {
    client: Client,
    endpoint: String,
    token: Option<String>,
    policy: BackoffPolicy,
}

impl HttpSitemapChannel {
    pub fn new(
        config: &SitemapConfig,
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
            token: config.token.clone(),
            policy,
        })
    }

    async fn ping(&self, token: &str, sitemap_url: &str) -> ChannelResult<()> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("sitemap", sitemap_url)])
            .bearer_auth(token)
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
impl SitemapChannel for HttpSitemapChannel {
    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn register(&self, sitemap_url: &str) -> ChannelResult<()> {
        let Some(token) = self.token.clone() else {
            return Err(ChannelError::NotConfigured("sitemap"));
        };

        send_with_retry(&self.policy, || self.ping(&token, sitemap_url)).await?;
        tracing::debug!(sitemap = sitemap_url, "sitemap registered");
        Ok(())
    }
}
