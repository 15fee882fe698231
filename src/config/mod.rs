//! Configuration management for the indexing engine
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. Channel credentials are optional: a channel with
//! no credential is treated as unconfigured and reported through diagnostics
//! rather than failing operations.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::backoff::BackoffPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Engine thresholds and budgets
    #[serde(default)]
    pub engine: EngineConfig,

    /// Channel endpoints and credentials
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics export configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Sites under management
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

/// Engine thresholds and budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default cap on URLs handled by one retry run
    #[serde(default = "default_retry_batch_size")]
    pub retry_batch_size: usize,

    /// Default wall-clock budget for one retry run, in milliseconds
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,

    /// Attempts at which a failing URL is escalated to chronic failure
    #[serde(default = "default_chronic_threshold")]
    pub chronic_failure_threshold: u32,

    /// Hours a discovered record may sit before it is considered stale
    #[serde(default = "default_stale_discovered_hours")]
    pub stale_discovered_hours: i64,

    /// Days after which an unacknowledged submission is retried
    #[serde(default = "default_resubmit_after_days")]
    pub resubmit_after_days: i64,

    /// Days after which a submitted-but-not-indexed record counts as stale
    /// in the summary
    #[serde(default = "default_stale_submitted_days")]
    pub stale_submitted_days: i64,

    /// Pages below this word count are flagged as thin content
    #[serde(default = "default_min_word_count")]
    pub min_word_count: u32,

    /// Offset from UTC, in minutes, of the local midnight at which the
    /// daily submission quota resets
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

fn default_retry_batch_size() -> usize {
    50
}
fn default_budget_ms() -> u64 {
    30_000
}
fn default_chronic_threshold() -> u32 {
    5
}
fn default_stale_discovered_hours() -> i64 {
    6
}
fn default_resubmit_after_days() -> i64 {
    7
}
fn default_stale_submitted_days() -> i64 {
    14
}
fn default_min_word_count() -> u32 {
    300
}
fn default_utc_offset_minutes() -> i32 {
    180
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_batch_size: default_retry_batch_size(),
            budget_ms: default_budget_ms(),
            chronic_failure_threshold: default_chronic_threshold(),
            stale_discovered_hours: default_stale_discovered_hours(),
            resubmit_after_days: default_resubmit_after_days(),
            stale_submitted_days: default_stale_submitted_days(),
            min_word_count: default_min_word_count(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

/// HTTP behavior shared by all channel clients, plus per-channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum retry attempts for transient channel failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default)]
    pub push: PushConfig,

    #[serde(default)]
    pub sitemap: SitemapConfig,

    #[serde(default)]
    pub inspection: InspectionConfig,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("indexwatch/{}", env!("CARGO_PKG_VERSION"))
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            push: PushConfig::default(),
            sitemap: SitemapConfig::default(),
            inspection: InspectionConfig::default(),
        }
    }
}

/// Batched push-notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Submission endpoint URL
    #[serde(default = "default_push_endpoint")]
    pub endpoint: String,

    /// API key; channel is unconfigured without one
    pub key: Option<String>,

    /// Optional URL where the key file is hosted
    pub key_location: Option<String>,

    /// Protocol ceiling on URLs per request
    #[serde(default = "default_push_batch_ceiling")]
    pub batch_ceiling: usize,

    /// Daily submission quota per site (0 disables the cap)
    #[serde(default = "default_push_daily_quota")]
    pub daily_quota: u64,
}

fn default_push_endpoint() -> String {
    String::from("https://api.indexnow.org/indexnow")
}
fn default_push_batch_ceiling() -> usize {
    10_000
}
fn default_push_daily_quota() -> u64 {
    200
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: default_push_endpoint(),
            key: None,
            key_location: None,
            batch_ceiling: default_push_batch_ceiling(),
            daily_quota: default_push_daily_quota(),
        }
    }
}

/// Sitemap registration channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapConfig {
    /// Registration endpoint URL
    #[serde(default = "default_sitemap_endpoint")]
    pub endpoint: String,

    /// Bearer token; channel is unconfigured without one
    pub token: Option<String>,
}

fn default_sitemap_endpoint() -> String {
    String::from("https://search.example.com/webmasters/ping")
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            endpoint: default_sitemap_endpoint(),
            token: None,
        }
    }
}

/// Read-only URL inspection channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionConfig {
    /// Inspection endpoint URL
    #[serde(default = "default_inspection_endpoint")]
    pub endpoint: String,

    /// Bearer token; channel is unconfigured without one
    pub token: Option<String>,

    /// Requests per second cap toward the inspection API
    #[serde(default = "default_inspection_qps")]
    pub qps: f64,

    /// Daily inspection quota per site (0 disables the cap)
    #[serde(default = "default_inspection_daily_quota")]
    pub daily_quota: u64,
}

fn default_inspection_endpoint() -> String {
    String::from("https://search.example.com/v1/urlInspection/index:inspect")
}
fn default_inspection_qps() -> f64 {
    2.0
}
fn default_inspection_daily_quota() -> u64 {
    2000
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_inspection_endpoint(),
            token: None,
            qps: default_inspection_qps(),
            daily_quota: default_inspection_daily_quota(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("data/indexwatch.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("info")
}
fn default_log_format() -> String {
    String::from("text")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics export configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    /// When set, Prometheus metrics are written to this file in text
    /// exposition format after each command (node_exporter textfile style)
    pub textfile_path: Option<PathBuf>,
}

/// One site under management
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Stable site identifier used as the tracking key
    pub id: String,

    /// Bare host, e.g. "forge.example.com"
    pub domain: String,

    /// Site publishes Arabic variants under the /ar path prefix
    #[serde(default)]
    pub bilingual: bool,

    /// Site uses /articles instead of /blog for posts
    #[serde(default)]
    pub alt_taxonomy: bool,

    /// Path of the sitemap registered with the sitemap channel
    #[serde(default = "default_sitemap_path")]
    pub sitemap_path: String,
}

fn default_sitemap_path() -> String {
    String::from("/sitemap.xml")
}

impl SiteConfig {
    /// Canonical base URL for the site, no trailing slash
    pub fn base_url(&self) -> String {
        format!("https://{}", self.domain)
    }

    /// Absolute URL of the site's sitemap
    pub fn sitemap_url(&self) -> String {
        let path = if self.sitemap_path.starts_with('/') {
            self.sitemap_path.clone()
        } else {
            format!("/{}", self.sitemap_path)
        };
        format!("https://{}{}", self.domain, path)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Sites normally come from the config file; for single-site container
    /// deployments, `INDEXWATCH_SITE_ID` + `INDEXWATCH_SITE_DOMAIN` define
    /// one site.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse::<usize>("INDEXWATCH_RETRY_BATCH") {
            config.engine.retry_batch_size = v;
        }
        if let Some(v) = env_parse::<u64>("INDEXWATCH_BUDGET_MS") {
            config.engine.budget_ms = v;
        }
        if let Some(v) = env_parse::<i32>("INDEXWATCH_UTC_OFFSET_MINUTES") {
            config.engine.utc_offset_minutes = v;
        }

        if let Some(v) = env_parse::<u64>("INDEXWATCH_REQUEST_TIMEOUT") {
            config.channels.request_timeout_secs = v;
        }
        if let Ok(v) = std::env::var("INDEXWATCH_USER_AGENT") {
            config.channels.user_agent = v;
        }

        if let Ok(v) = std::env::var("INDEXWATCH_PUSH_ENDPOINT") {
            config.channels.push.endpoint = v;
        }
        config.channels.push.key = std::env::var("INDEXWATCH_PUSH_KEY").ok();
        config.channels.push.key_location = std::env::var("INDEXWATCH_PUSH_KEY_LOCATION").ok();

        if let Ok(v) = std::env::var("INDEXWATCH_SITEMAP_ENDPOINT") {
            config.channels.sitemap.endpoint = v;
        }
        config.channels.sitemap.token = std::env::var("INDEXWATCH_SITEMAP_TOKEN").ok();

        if let Ok(v) = std::env::var("INDEXWATCH_INSPECTION_ENDPOINT") {
            config.channels.inspection.endpoint = v;
        }
        config.channels.inspection.token = std::env::var("INDEXWATCH_INSPECTION_TOKEN").ok();
        if let Some(v) = env_parse::<f64>("INDEXWATCH_INSPECTION_QPS") {
            config.channels.inspection.qps = v;
        }

        if let Ok(v) = std::env::var("INDEXWATCH_SQLITE_PATH") {
            config.database.sqlite_path = v.into();
        }
        if let Ok(v) = std::env::var("INDEXWATCH_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("INDEXWATCH_LOG_FORMAT") {
            config.logging.format = v;
        }

        if let (Ok(id), Ok(domain)) = (
            std::env::var("INDEXWATCH_SITE_ID"),
            std::env::var("INDEXWATCH_SITE_DOMAIN"),
        ) {
            config.sites.push(SiteConfig {
                id,
                domain,
                bilingual: env_parse::<bool>("INDEXWATCH_SITE_BILINGUAL").unwrap_or(false),
                alt_taxonomy: env_parse::<bool>("INDEXWATCH_SITE_ALT_TAXONOMY").unwrap_or(false),
                sitemap_path: default_sitemap_path(),
            });
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.engine.retry_batch_size == 0 {
            anyhow::bail!("retry_batch_size must be greater than 0");
        }

        if self.engine.chronic_failure_threshold == 0 {
            anyhow::bail!("chronic_failure_threshold must be greater than 0");
        }

        if self.channels.push.batch_ceiling == 0 {
            anyhow::bail!("push batch_ceiling must be greater than 0");
        }

        if self.channels.inspection.qps <= 0.0 {
            anyhow::bail!("inspection qps must be positive");
        }

        let mut seen = std::collections::HashSet::new();
        for site in &self.sites {
            if site.id.is_empty() {
                anyhow::bail!("site id must not be empty");
            }
            if site.domain.is_empty() || site.domain.contains('/') {
                anyhow::bail!("site domain must be a bare host: {}", site.domain);
            }
            if !seen.insert(site.id.as_str()) {
                anyhow::bail!("duplicate site id: {}", site.id);
            }
        }

        Ok(())
    }

    /// Look up a site by id
    pub fn site(&self, id: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.id == id)
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.channels.request_timeout_secs)
    }

    /// Backoff policy for transient channel failures
    #[must_use]
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::with_delays(
            self.channels.max_retries,
            self.channels.base_delay_ms,
            self.channels.max_delay_ms,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            channels: ChannelsConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            sites: Vec::new(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}
