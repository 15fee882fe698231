//! Reconciliation engine
//!
//! Orchestrates everything the scheduled jobs and the publish path need:
//! discovery sync, the budgeted retry run, immediate single-URL submission
//! and inspection refresh. Expected channel failures become counts and
//! error strings inside the returned reports; `Err` is reserved for bad
//! input (unknown site, malformed URL) and store unavailability.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channels::ChannelSet;
use crate::config::{Config, SiteConfig};
use crate::discovery::{Discovery, SyncOutcome};
use crate::error::{Error, Result};
use crate::models::{is_indexed_state, local_day, ChannelKind};
use crate::storage::{SharedTrackingStore, TrackingStore};
use crate::summary::{IndexingSummary, SummaryComputer};
use crate::utils::extract_host;

/// Job name stamped after each retry run, read back by diagnostics
pub const RETRY_JOB: &str = "retry-submit";

/// Caps for one retry run. Unset fields fall back to the configured
/// defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOptions {
    pub max_urls: Option<usize>,
    pub budget: Option<Duration>,
}

impl RetryOptions {
    pub fn with_max_urls(mut self, max_urls: usize) -> Self {
        self.max_urls = Some(max_urls);
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// What one retry run did.
///
/// `succeeded` never exceeds `retried`; `errors` is best-effort context,
/// not an exhaustive log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryOutcome {
    /// Records picked by the selection query
    pub selected: usize,
    /// URLs actually sent to the push channel
    pub retried: usize,
    /// Records marked submitted in the store
    pub succeeded: usize,
    /// Channel and store failures encountered along the way
    pub errors: Vec<String>,
    /// The wall-clock budget ran out before all work was done
    pub budget_exhausted: bool,
}

/// Result of an immediate single-URL submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    /// The push channel accepted the URL
    pub submitted: bool,
    /// The best-effort sitemap ping went through
    pub sitemap_registered: bool,
    /// Push failure, when submission did not happen
    pub error: Option<String>,
}

/// Result of one inspection refresh pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InspectReport {
    /// Records picked for inspection
    pub selected: usize,
    /// Lookups applied to the store
    pub inspected: usize,
    /// Records that reached indexed for the first time
    pub newly_indexed: usize,
    /// Per-URL failures, the pass continues past them
    pub errors: Vec<String>,
}

/// The orchestrator tying store, channels and discovery together
pub struct ReconcileEngine {
    store: SharedTrackingStore,
    channels: ChannelSet,
    discovery: Arc<Discovery>,
    config: Arc<Config>,
}

impl ReconcileEngine {
    pub fn new(
        store: SharedTrackingStore,
        channels: ChannelSet,
        discovery: Arc<Discovery>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            channels,
            discovery,
            config,
        }
    }

    /// Open the configured store and build HTTP channel adapters
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let store = Arc::new(TrackingStore::new(&config.database.sqlite_path)?);
        let channels = ChannelSet::from_config(&config)?;
        let discovery = Arc::new(Discovery::with_catalog(Arc::clone(&store)));
        Ok(Self::new(store, channels, discovery, config))
    }

    /// The tracking store backing this engine
    pub fn store(&self) -> &SharedTrackingStore {
        &self.store
    }

    fn site(&self, site_id: &str) -> Result<&SiteConfig> {
        self.config
            .site(site_id)
            .ok_or_else(|| Error::invalid_argument(format!("unknown site id: {site_id}")))
    }

    /// Create tracking records for every publishable URL of a site
    pub async fn sync_to_tracking(&self, site_id: &str, now: DateTime<Utc>) -> Result<SyncOutcome> {
        let site = self.site(site_id)?;
        Ok(self.discovery.sync_to_tracking(site, now).await?)
    }

    /// Escalate chronic failures, then resubmit stale and failed records
    /// under a wall-clock budget.
    ///
    /// Store updates run oldest-first and stop once the budget is spent;
    /// committed updates stay committed. Expected channel failures land in
    /// the outcome, never in `Err`.
    pub async fn retry_stale_and_failed(
        &self,
        site_id: &str,
        options: RetryOptions,
        now: DateTime<Utc>,
    ) -> Result<RetryOutcome> {
        let site = self.site(site_id)?;
        let engine_cfg = &self.config.engine;

        let max_urls = options.max_urls.unwrap_or(engine_cfg.retry_batch_size);
        let budget = options
            .budget
            .unwrap_or(Duration::from_millis(engine_cfg.budget_ms));

        if budget.is_zero() {
            tracing::debug!(site = %site.id, "zero budget, retry run skipped");
            return Ok(RetryOutcome {
                budget_exhausted: true,
                ..RetryOutcome::default()
            });
        }
        let started = Instant::now();

        let escalated =
            self.store
                .escalate_chronic(&site.id, engine_cfg.chronic_failure_threshold, now)?;
        if escalated > 0 {
            tracing::info!(site = %site.id, escalated = escalated, "records escalated to chronic failure");
        }

        let candidates = self.store.select_retry_candidates(
            &site.id,
            max_urls,
            now,
            engine_cfg.stale_discovered_hours,
            engine_cfg.resubmit_after_days,
            engine_cfg.chronic_failure_threshold,
        )?;

        let mut outcome = RetryOutcome {
            selected: candidates.len(),
            ..RetryOutcome::default()
        };

        if candidates.is_empty() {
            self.store.record_job_run(RETRY_JOB, &site.id, now)?;
            tracing::debug!(site = %site.id, "no retry candidates");
            return Ok(outcome);
        }

        if started.elapsed() >= budget {
            outcome.budget_exhausted = true;
            self.store.record_job_run(RETRY_JOB, &site.id, now)?;
            return Ok(outcome);
        }

        let urls: Vec<String> = candidates.iter().map(|r| r.url.clone()).collect();
        outcome.retried = urls.len();

        match self.channels.push.submit(&site.domain, &urls).await {
            Ok(receipt) => {
                tracing::info!(
                    site = %site.id,
                    urls = urls.len(),
                    batches = receipt.batches,
                    "push batch accepted"
                );

                for record in &candidates {
                    if started.elapsed() >= budget {
                        outcome.budget_exhausted = true;
                        tracing::warn!(
                            site = %site.id,
                            marked = outcome.succeeded,
                            selected = outcome.selected,
                            "budget exhausted while marking submissions"
                        );
                        break;
                    }
                    match self.store.mark_submitted(
                        &site.id,
                        std::slice::from_ref(&record.url),
                        ChannelKind::Push,
                        now,
                    ) {
                        Ok(_) => outcome.succeeded += 1,
                        Err(e) => outcome.errors.push(format!("{}: {e}", record.url)),
                    }
                }

                if outcome.succeeded > 0 {
                    let day = local_day(now, engine_cfg.utc_offset_minutes);
                    self.store.record_channel_usage(
                        ChannelKind::Push,
                        &site.id,
                        &day,
                        outcome.succeeded as u64,
                    )?;
                }
            }
            Err(e) => {
                tracing::warn!(site = %site.id, error = %e, "push batch failed");
                let message = e.to_string();
                outcome.errors.push(message.clone());

                for record in &candidates {
                    if started.elapsed() >= budget {
                        outcome.budget_exhausted = true;
                        break;
                    }
                    if let Err(store_err) =
                        self.store.mark_error(&site.id, &record.url, &message, now)
                    {
                        outcome.errors.push(format!("{}: {store_err}", record.url));
                    }
                }
            }
        }

        self.store.record_job_run(RETRY_JOB, &site.id, now)?;
        Ok(outcome)
    }

    /// Submit one freshly published URL right away.
    ///
    /// The URL must belong to the site's domain. After the push attempt the
    /// site's sitemap is re-registered best-effort; that ping can fail
    /// without affecting the returned outcome's `error`.
    pub async fn submit_url_now(
        &self,
        site_id: &str,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome> {
        let site = self.site(site_id)?;

        let host = extract_host(url)
            .map_err(|_| Error::invalid_argument(format!("malformed URL: {url}")))?;
        if host != site.domain {
            return Err(Error::invalid_argument(format!(
                "URL host {host} does not belong to site {}",
                site.id
            )));
        }

        self.store.upsert_discovered(&site.id, url, now)?;

        let urls = vec![url.to_string()];
        let mut outcome = SubmitOutcome::default();

        match self.channels.push.submit(&site.domain, &urls).await {
            Ok(_) => {
                self.store
                    .mark_submitted(&site.id, &urls, ChannelKind::Push, now)?;
                let day = local_day(now, self.config.engine.utc_offset_minutes);
                self.store
                    .record_channel_usage(ChannelKind::Push, &site.id, &day, 1)?;
                outcome.submitted = true;
                tracing::info!(site = %site.id, url = url, "immediate submission accepted");
            }
            Err(e) => {
                tracing::warn!(site = %site.id, url = url, error = %e, "immediate submission failed");
                self.store.mark_error(&site.id, url, &e.to_string(), now)?;
                outcome.error = Some(e.to_string());
            }
        }

        match self.channels.sitemap.register(&site.sitemap_url()).await {
            Ok(()) => outcome.sitemap_registered = true,
            Err(e) => {
                tracing::warn!(site = %site.id, error = %e, "sitemap registration failed");
            }
        }

        Ok(outcome)
    }

    /// Ask the inspection channel about the least recently inspected
    /// records and fold the answers into the store.
    ///
    /// Per-URL failures are collected in the report; the pass keeps going.
    pub async fn refresh_inspections(
        &self,
        site_id: &str,
        max: usize,
        now: DateTime<Utc>,
    ) -> Result<InspectReport> {
        let site = self.site(site_id)?;

        if !self.channels.inspection.is_configured() {
            tracing::debug!(site = %site.id, "inspection channel not configured, refresh skipped");
            return Ok(InspectReport {
                errors: vec![String::from("inspection channel not configured")],
                ..InspectReport::default()
            });
        }

        let candidates = self.store.select_inspection_candidates(&site.id, max)?;
        let mut report = InspectReport {
            selected: candidates.len(),
            ..InspectReport::default()
        };
        let site_base = site.base_url();

        for record in &candidates {
            match self.channels.inspection.inspect(&record.url, &site_base).await {
                Ok(snapshot) => {
                    let state = snapshot.indexing_state.as_deref();
                    let newly_indexed =
                        record.indexed_at.is_none() && state.is_some_and(is_indexed_state);

                    match self.store.apply_inspection(&site.id, &record.url, state, now) {
                        Ok(_) => {
                            report.inspected += 1;
                            if newly_indexed {
                                report.newly_indexed += 1;
                            }
                        }
                        Err(e) => report.errors.push(format!("{}: {e}", record.url)),
                    }
                }
                Err(e) => {
                    tracing::warn!(site = %site.id, url = %record.url, error = %e, "inspection failed");
                    report.errors.push(format!("{}: {e}", record.url));
                }
            }
        }

        tracing::info!(
            site = %site.id,
            selected = report.selected,
            inspected = report.inspected,
            newly_indexed = report.newly_indexed,
            "inspection refresh completed"
        );
        Ok(report)
    }

    /// Compute the indexing summary for one site
    pub async fn summary(&self, site_id: &str, now: DateTime<Utc>) -> Result<IndexingSummary> {
        let site = self.site(site_id)?;
        let computer = SummaryComputer::new(
            Arc::clone(&self.store),
            Arc::clone(&self.discovery),
            Arc::clone(&self.config),
        );
        Ok(computer.compute(site, now).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{
        ChannelError, ChannelResult, InspectionChannel, InspectionSnapshot, PushChannel,
        PushReceipt, SitemapChannel,
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticPush {
        accept: bool,
        calls: AtomicUsize,
    }

    impl StaticPush {
        fn accepting() -> Self {
            Self {
                accept: true,
                calls: AtomicUsize::new(0),
            }
        }

        fn rejecting() -> Self {
            Self {
                accept: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PushChannel for StaticPush {
        fn is_configured(&self) -> bool {
            true
        }

        async fn submit(&self, _host: &str, urls: &[String]) -> ChannelResult<PushReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.accept {
                Ok(PushReceipt {
                    accepted: urls.len(),
                    batches: 1,
                })
            } else {
                Err(ChannelError::Rejected {
                    status: 422,
                    body: String::from("key mismatch"),
                })
            }
        }
    }

    struct StaticSitemap;

    #[async_trait]
    impl SitemapChannel for StaticSitemap {
        fn is_configured(&self) -> bool {
            true
        }

        async fn register(&self, _sitemap_url: &str) -> ChannelResult<()> {
            Ok(())
        }
    }

    struct StaticInspection;

    #[async_trait]
    impl InspectionChannel for StaticInspection {
        fn is_configured(&self) -> bool {
            false
        }

        async fn inspect(&self, _url: &str, _site_base: &str) -> ChannelResult<InspectionSnapshot> {
            Err(ChannelError::NotConfigured("inspection"))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn test_engine(push: StaticPush) -> ReconcileEngine {
        let store = Arc::new(TrackingStore::in_memory().unwrap());
        let mut config = Config::default();
        config.channels.push.key = Some(String::from("0123456789abcdef0123456789abcdef"));
        config.sites.push(SiteConfig {
            id: String::from("forge-main"),
            domain: String::from("forge.example.com"),
            bilingual: false,
            alt_taxonomy: false,
            sitemap_path: String::from("/sitemap.xml"),
        });

        let channels = ChannelSet {
            push: Arc::new(push),
            sitemap: Arc::new(StaticSitemap),
            inspection: Arc::new(StaticInspection),
        };
        let discovery = Arc::new(Discovery::with_catalog(Arc::clone(&store)));
        ReconcileEngine::new(store, channels, discovery, Arc::new(config))
    }

    #[tokio::test]
    async fn test_unknown_site_is_invalid_argument() {
        let engine = test_engine(StaticPush::accepting());
        let err = engine
            .retry_stale_and_failed("nope", RetryOptions::default(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_zero_budget_returns_immediately() {
        let engine = test_engine(StaticPush::accepting());

        // a candidate exists, but the run must not touch it
        engine
            .store()
            .upsert_discovered(
                "forge-main",
                "https://forge.example.com/blog/a",
                now() - chrono::Duration::hours(12),
            )
            .unwrap();

        let outcome = engine
            .retry_stale_and_failed(
                "forge-main",
                RetryOptions::default().with_budget(Duration::ZERO),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.selected, 0);
        assert_eq!(outcome.retried, 0);
        assert_eq!(outcome.succeeded, 0);
        assert!(outcome.budget_exhausted);
        assert!(outcome.succeeded <= outcome.retried);
    }

    #[tokio::test]
    async fn test_retry_marks_submitted_and_records_usage() {
        let engine = test_engine(StaticPush::accepting());
        let old = now() - chrono::Duration::hours(12);

        engine
            .store()
            .upsert_discovered("forge-main", "https://forge.example.com/blog/a", old)
            .unwrap();
        engine
            .store()
            .upsert_discovered("forge-main", "https://forge.example.com/blog/b", old)
            .unwrap();

        let outcome = engine
            .retry_stale_and_failed("forge-main", RetryOptions::default(), now())
            .await
            .unwrap();

        assert_eq!(outcome.selected, 2);
        assert_eq!(outcome.retried, 2);
        assert_eq!(outcome.succeeded, 2);
        assert!(!outcome.budget_exhausted);
        assert!(outcome.errors.is_empty());

        let record = engine
            .store()
            .get("forge-main", "https://forge.example.com/blog/a")
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "submitted");
        assert!(record.submitted_push);

        let day = local_day(now(), 180);
        assert_eq!(
            engine
                .store()
                .channel_usage(ChannelKind::Push, "forge-main", &day)
                .unwrap(),
            2
        );
        assert_eq!(
            engine.store().last_job_run(RETRY_JOB, "forge-main").unwrap(),
            Some(now())
        );
    }

    #[tokio::test]
    async fn test_rejected_batch_marks_errors() {
        let engine = test_engine(StaticPush::rejecting());
        let old = now() - chrono::Duration::hours(12);

        engine
            .store()
            .upsert_discovered("forge-main", "https://forge.example.com/blog/a", old)
            .unwrap();

        let outcome = engine
            .retry_stale_and_failed("forge-main", RetryOptions::default(), now())
            .await
            .unwrap();

        assert_eq!(outcome.selected, 1);
        assert_eq!(outcome.succeeded, 0);
        assert_eq!(outcome.errors.len(), 1);

        let record = engine
            .store()
            .get("forge-main", "https://forge.example.com/blog/a")
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "error");
        assert!(record.last_error.is_some());
        assert_eq!(record.submission_attempts, 1);
    }

    #[tokio::test]
    async fn test_submit_url_now_validates_host() {
        let engine = test_engine(StaticPush::accepting());

        let err = engine
            .submit_url_now("forge-main", "https://other.example.com/blog/a", now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = engine
            .submit_url_now("forge-main", "not a url", now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_submit_url_now_creates_and_marks() {
        let engine = test_engine(StaticPush::accepting());

        let outcome = engine
            .submit_url_now("forge-main", "https://forge.example.com/blog/fresh", now())
            .await
            .unwrap();

        assert!(outcome.submitted);
        assert!(outcome.sitemap_registered);
        assert!(outcome.error.is_none());

        let record = engine
            .store()
            .get("forge-main", "https://forge.example.com/blog/fresh")
            .unwrap()
            .unwrap();
        assert_eq!(record.status, "submitted");
        assert_eq!(record.submission_attempts, 1);
    }

    #[tokio::test]
    async fn test_unconfigured_inspection_short_circuits() {
        let engine = test_engine(StaticPush::accepting());

        let report = engine
            .refresh_inspections("forge-main", 10, now())
            .await
            .unwrap();
        assert_eq!(report.selected, 0);
        assert_eq!(report.inspected, 0);
        assert_eq!(report.errors.len(), 1);
    }
}
