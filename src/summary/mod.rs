//! Cross-cutting indexing summary
//!
//! Builds the one aggregate every dashboard and diagnostic surface reads.
//! The seven buckets are tallied by resolving each tracking record, the
//! total is constructed as their literal sum, and every store read
//! degrades to zero or empty on failure so the summary never aborts the
//! surrounding application.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::blockers::{self, Blocker, BlockerInputs};
use crate::config::{Config, SiteConfig};
use crate::discovery::{Discovery, UrlInventory, SYNC_JOB};
use crate::engine::RETRY_JOB;
use crate::models::{local_day, ChannelKind, ResolvedStatus};
use crate::resolver;
use crate::storage::SharedTrackingStore;

/// How many recently indexed records feed the days-to-index average
const INDEX_SAMPLE_SIZE: usize = 10;

/// Below this many samples the days-to-index average is withheld
const MIN_INDEX_SAMPLES: usize = 3;

/// Length of each indexing-velocity window
const VELOCITY_WINDOW_DAYS: i64 = 7;

const MINUTES_PER_DAY: f64 = 1440.0;

/// Direction of indexing velocity across the two most recent windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Stable,
    Falling,
}

impl Trend {
    /// Compare the current window against the prior one
    pub fn from_counts(recent: u64, prior: u64) -> Self {
        match recent.cmp(&prior) {
            std::cmp::Ordering::Greater => Trend::Rising,
            std::cmp::Ordering::Equal => Trend::Stable,
            std::cmp::Ordering::Less => Trend::Falling,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Stable => "stable",
            Trend::Falling => "falling",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Daily submission allowance for the push channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub daily_limit: u64,
    pub used_today: u64,
    /// Limit minus usage, floored at zero
    pub remaining: u64,
}

/// Point-in-time indexing aggregate for one site.
///
/// `total` always equals the sum of the seven buckets; it is built as that
/// sum and never recomputed elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingSummary {
    pub site_id: String,
    pub generated_at: DateTime<Utc>,

    pub total: u64,
    pub indexed: u64,
    pub submitted: u64,
    pub discovered: u64,
    pub never_submitted: u64,
    pub errors: u64,
    pub deindexed: u64,
    pub chronic_failures: u64,

    pub published_count: u64,
    pub tracked_count: u64,
    pub stale_count: u64,

    pub indexed_last_7d: u64,
    pub indexed_prior_7d: u64,
    pub trend: Trend,

    pub submitted_push: u64,
    pub submitted_sitemap: u64,
    pub inspected: u64,

    /// Withheld below [`MIN_INDEX_SAMPLES`] data points
    pub avg_days_to_index: Option<f64>,

    pub quota: QuotaStatus,

    pub hreflang_mismatches: u64,
    pub thin_content: u64,

    pub blockers: Vec<Blocker>,
    pub top_blocker: Option<String>,
}

/// Computes [`IndexingSummary`] from the store, discovery and config
pub struct SummaryComputer {
    store: SharedTrackingStore,
    discovery: Arc<Discovery>,
    config: Arc<Config>,
}

impl SummaryComputer {
    pub fn new(store: SharedTrackingStore, discovery: Arc<Discovery>, config: Arc<Config>) -> Self {
        Self {
            store,
            discovery,
            config,
        }
    }

    /// Build the summary for one site.
    ///
    /// Infallible: store and discovery failures are logged and the
    /// affected figures degrade to zero or empty.
    pub async fn compute(&self, site: &SiteConfig, now: DateTime<Utc>) -> IndexingSummary {
        let inventory = match self.discovery.inventory(site, now).await {
            Ok(inventory) => inventory,
            Err(e) => {
                tracing::warn!(site = %site.id, error = %e, "discovery failed, summary degrades");
                UrlInventory::default()
            }
        };

        let records = self.store.list_for_site(&site.id).unwrap_or_else(|e| {
            tracing::warn!(site = %site.id, error = %e, "record load failed, summary degrades");
            Vec::new()
        });

        let published_count = inventory.published_count() as u64;
        let tracked_count = records.len() as u64;
        let stale_cutoff = now - Duration::days(self.config.engine.stale_submitted_days);

        let mut indexed = 0u64;
        let mut submitted = 0u64;
        let mut discovered = 0u64;
        let mut errors = 0u64;
        let mut deindexed = 0u64;
        let mut chronic_failures = 0u64;
        let mut stale_count = 0u64;
        let mut submitted_push = 0u64;
        let mut submitted_sitemap = 0u64;
        let mut inspected = 0u64;
        let mut resolved_by_url: HashMap<&str, ResolvedStatus> = HashMap::new();

        for record in &records {
            let resolved = resolver::resolve(record);
            match resolved {
                ResolvedStatus::Indexed => indexed += 1,
                ResolvedStatus::Submitted => submitted += 1,
                ResolvedStatus::Discovered => discovered += 1,
                ResolvedStatus::Error => errors += 1,
                ResolvedStatus::Deindexed => deindexed += 1,
                ResolvedStatus::ChronicFailure => chronic_failures += 1,
                // the resolver never yields this for an existing record
                ResolvedStatus::NeverSubmitted => discovered += 1,
            }

            if resolved == ResolvedStatus::Submitted
                && record
                    .last_submitted_at
                    .is_some_and(|at| at < stale_cutoff)
            {
                stale_count += 1;
            }

            if record.submitted_push {
                submitted_push += 1;
            }
            if record.submitted_sitemap {
                submitted_sitemap += 1;
            }
            if record.inspected {
                inspected += 1;
            }

            resolved_by_url.insert(record.url.as_str(), resolved);
        }

        // the one bucket not derived from per-record resolution
        let never_submitted = published_count.saturating_sub(tracked_count);

        let total = indexed
            + submitted
            + discovered
            + never_submitted
            + errors
            + deindexed
            + chronic_failures;

        let window = Duration::days(VELOCITY_WINDOW_DAYS);
        let indexed_last_7d = self.indexed_in_window(&site.id, now - window, now);
        let indexed_prior_7d = self.indexed_in_window(&site.id, now - window - window, now - window);
        let trend = Trend::from_counts(indexed_last_7d, indexed_prior_7d);

        let avg_days_to_index = self.avg_days_to_index(&site.id);
        let quota = self.push_quota(&site.id, now);

        let hreflang_mismatches = count_hreflang_mismatches(&inventory, &resolved_by_url);
        let thin_content = inventory.thin_content_count(self.config.engine.min_word_count) as u64;

        let inputs = BlockerInputs {
            published_count,
            never_submitted,
            stale_count,
            errors,
            deindexed,
            chronic_failures,
            discovered,
            thin_content,
            hreflang_mismatches,
            push_configured: self.config.channels.push.key.is_some(),
            sitemap_configured: self.config.channels.sitemap.token.is_some(),
            inspection_configured: self.config.channels.inspection.token.is_some(),
            sync_job_age_days: self.job_age_days(SYNC_JOB, &site.id, now),
            retry_job_age_days: self.job_age_days(RETRY_JOB, &site.id, now),
        };
        let blockers = blockers::evaluate(&inputs);
        let top_blocker = blockers.first().map(|b| b.reason.clone());

        IndexingSummary {
            site_id: site.id.clone(),
            generated_at: now,
            total,
            indexed,
            submitted,
            discovered,
            never_submitted,
            errors,
            deindexed,
            chronic_failures,
            published_count,
            tracked_count,
            stale_count,
            indexed_last_7d,
            indexed_prior_7d,
            trend,
            submitted_push,
            submitted_sitemap,
            inspected,
            avg_days_to_index,
            quota,
            hreflang_mismatches,
            thin_content,
            blockers,
            top_blocker,
        }
    }

    fn indexed_in_window(&self, site_id: &str, after: DateTime<Utc>, until: DateTime<Utc>) -> u64 {
        self.store
            .count_indexed_between(site_id, after, until)
            .unwrap_or_else(|e| {
                tracing::warn!(site = site_id, error = %e, "velocity window read failed");
                0
            })
    }

    fn avg_days_to_index(&self, site_id: &str) -> Option<f64> {
        let samples = self
            .store
            .recent_index_samples(site_id, INDEX_SAMPLE_SIZE)
            .unwrap_or_else(|e| {
                tracing::warn!(site = site_id, error = %e, "index sample read failed");
                Vec::new()
            });

        if samples.len() < MIN_INDEX_SAMPLES {
            return None;
        }

        let total_days: f64 = samples
            .iter()
            .map(|(submitted, indexed)| (*indexed - *submitted).num_minutes() as f64 / MINUTES_PER_DAY)
            .sum();

        Some(total_days / samples.len() as f64)
    }

    fn push_quota(&self, site_id: &str, now: DateTime<Utc>) -> QuotaStatus {
        let daily_limit = self.config.channels.push.daily_quota;
        let day = local_day(now, self.config.engine.utc_offset_minutes);
        let used_today = self
            .store
            .channel_usage(ChannelKind::Push, site_id, &day)
            .unwrap_or_else(|e| {
                tracing::warn!(site = site_id, error = %e, "quota usage read failed");
                0
            });

        QuotaStatus {
            daily_limit,
            used_today,
            remaining: daily_limit.saturating_sub(used_today),
        }
    }

    fn job_age_days(&self, job: &str, site_id: &str, now: DateTime<Utc>) -> Option<i64> {
        match self.store.last_job_run(job, site_id) {
            Ok(Some(last_run)) => Some((now - last_run).num_days()),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(job = job, site = site_id, error = %e, "job heartbeat read failed");
                None
            }
        }
    }
}

/// Count bilingual pairs whose two sides disagree on indexing.
///
/// A pair mismatches when one side resolves indexed and the other side is
/// tracked but not indexed. Each pair contributes at most one mismatch no
/// matter which side lags.
fn count_hreflang_mismatches(
    inventory: &UrlInventory,
    resolved_by_url: &HashMap<&str, ResolvedStatus>,
) -> u64 {
    let is_indexed =
        |url: &str| resolved_by_url.get(url) == Some(&ResolvedStatus::Indexed);
    let tracked_not_indexed = |url: &str| {
        resolved_by_url
            .get(url)
            .is_some_and(|resolved| *resolved != ResolvedStatus::Indexed)
    };

    inventory
        .bilingual_pairs()
        .iter()
        .filter(|(canonical, variant)| {
            (is_indexed(canonical) && tracked_not_indexed(variant))
                || (is_indexed(variant) && tracked_not_indexed(canonical))
        })
        .count() as u64
}
