//! Operational diagnostics for indexing progress
//!
//! Each rule looks at one aggregate signal and is evaluated independently;
//! the output list is sorted critical-first so callers can surface the top
//! blocker without re-ranking. Rules never read the store or the network,
//! they only classify numbers the summary has already computed.

use serde::{Deserialize, Serialize};

/// A scheduled job is reported absent after this many days without a run
pub const JOB_ABSENCE_DAYS: i64 = 3;

/// How urgently a blocker needs operator attention.
///
/// Declaration order doubles as sort order: critical sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Indexing progress is actively impeded
    Critical,

    /// Worth attention, indexing still moves
    Warning,

    /// Informational only
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ranked diagnostic describing why indexing progress is impeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocker {
    /// Human-readable description of the problem
    pub reason: String,

    /// How many entities are affected
    pub count: u64,

    /// Urgency rank
    pub severity: Severity,
}

impl Blocker {
    fn critical(reason: &str, count: u64) -> Self {
        Self {
            reason: reason.to_string(),
            count,
            severity: Severity::Critical,
        }
    }

    fn warning(reason: &str, count: u64) -> Self {
        Self {
            reason: reason.to_string(),
            count,
            severity: Severity::Warning,
        }
    }
}

/// Aggregate signals the blocker rules evaluate.
///
/// Bucket counts come from the summary's per-record resolution; channel
/// flags from the channel configuration; job ages from the store's job
/// heartbeats (`None` means the job has never run).
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockerInputs {
    pub published_count: u64,
    pub never_submitted: u64,
    pub stale_count: u64,
    pub errors: u64,
    pub deindexed: u64,
    pub chronic_failures: u64,
    pub discovered: u64,
    pub thin_content: u64,
    pub hreflang_mismatches: u64,
    pub push_configured: bool,
    pub sitemap_configured: bool,
    pub inspection_configured: bool,
    pub sync_job_age_days: Option<i64>,
    pub retry_job_age_days: Option<i64>,
}

fn job_absent(age_days: Option<i64>) -> bool {
    match age_days {
        None => true,
        Some(days) => days >= JOB_ABSENCE_DAYS,
    }
}

fn job_absence_count(age_days: Option<i64>) -> u64 {
    age_days.unwrap_or(0).max(0) as u64
}

/// Run every rule and return the matching blockers, critical first.
///
/// Within one severity, rule declaration order is preserved, so the
/// returned list is fully deterministic for a given input.
pub fn evaluate(inputs: &BlockerInputs) -> Vec<Blocker> {
    let mut blockers = Vec::new();

    if !inputs.push_configured {
        blockers.push(Blocker::critical(
            "Push channel credentials are not configured",
            inputs.published_count,
        ));
    }
    if inputs.never_submitted > 0 {
        blockers.push(Blocker::critical(
            "Published URLs have never been submitted",
            inputs.never_submitted,
        ));
    }
    if inputs.stale_count > 0 {
        blockers.push(Blocker::critical(
            "Submitted URLs are stale with no indexing confirmation",
            inputs.stale_count,
        ));
    }
    if inputs.errors > 0 {
        blockers.push(Blocker::critical(
            "Submissions are failing with errors",
            inputs.errors,
        ));
    }
    if inputs.deindexed > 0 {
        blockers.push(Blocker::critical(
            "Previously indexed URLs have been deindexed",
            inputs.deindexed,
        ));
    }
    if inputs.chronic_failures > 0 {
        blockers.push(Blocker::critical(
            "URLs gave up after repeated submission failures",
            inputs.chronic_failures,
        ));
    }

    if inputs.discovered > 0 {
        blockers.push(Blocker::warning(
            "Discovered URLs are awaiting their first submission",
            inputs.discovered,
        ));
    }
    if job_absent(inputs.sync_job_age_days) {
        blockers.push(Blocker::warning(
            "Discovery sync job has not run recently",
            job_absence_count(inputs.sync_job_age_days),
        ));
    }
    if job_absent(inputs.retry_job_age_days) {
        blockers.push(Blocker::warning(
            "Retry job has not run recently",
            job_absence_count(inputs.retry_job_age_days),
        ));
    }
    if !inputs.sitemap_configured {
        blockers.push(Blocker::warning(
            "Sitemap channel token is not configured",
            1,
        ));
    }
    if !inputs.inspection_configured {
        blockers.push(Blocker::warning(
            "Inspection channel token is not configured",
            1,
        ));
    }
    if inputs.thin_content > 0 {
        blockers.push(Blocker::warning(
            "Pages fall below the minimum word count",
            inputs.thin_content,
        ));
    }
    if inputs.hreflang_mismatches > 0 {
        blockers.push(Blocker::warning(
            "Bilingual page pairs are indexed unevenly",
            inputs.hreflang_mismatches,
        ));
    }

    // stable sort keeps rule order within a severity
    blockers.sort_by_key(|b| b.severity);
    blockers
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inputs for a healthy site: everything configured, jobs fresh,
    /// every counter zero
    fn healthy() -> BlockerInputs {
        BlockerInputs {
            push_configured: true,
            sitemap_configured: true,
            inspection_configured: true,
            sync_job_age_days: Some(0),
            retry_job_age_days: Some(1),
            ..BlockerInputs::default()
        }
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical < Severity::Warning);
        assert!(Severity::Warning < Severity::Info);
        assert_eq!(Severity::Critical.as_str(), "critical");
    }

    #[test]
    fn test_healthy_site_has_no_blockers() {
        assert!(evaluate(&healthy()).is_empty());
    }

    #[test]
    fn test_missing_push_credentials_counts_published() {
        let inputs = BlockerInputs {
            push_configured: false,
            published_count: 42,
            ..healthy()
        };

        let blockers = evaluate(&inputs);
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].severity, Severity::Critical);
        assert_eq!(blockers[0].count, 42);
    }

    #[test]
    fn test_critical_sorts_before_warning() {
        // hreflang (warning) is declared after every critical rule but
        // discovered (warning) fires first in declaration order
        let inputs = BlockerInputs {
            discovered: 3,
            hreflang_mismatches: 1,
            errors: 2,
            ..healthy()
        };

        let blockers = evaluate(&inputs);
        assert_eq!(blockers.len(), 3);
        assert_eq!(blockers[0].severity, Severity::Critical);
        assert_eq!(blockers[0].reason, "Submissions are failing with errors");
        assert_eq!(blockers[1].reason, "Discovered URLs are awaiting their first submission");
        assert_eq!(blockers[2].reason, "Bilingual page pairs are indexed unevenly");
    }

    #[test]
    fn test_every_bucket_rule_fires() {
        let inputs = BlockerInputs {
            never_submitted: 1,
            stale_count: 2,
            errors: 3,
            deindexed: 4,
            chronic_failures: 5,
            discovered: 6,
            thin_content: 7,
            hreflang_mismatches: 8,
            ..healthy()
        };

        let blockers = evaluate(&inputs);
        assert_eq!(blockers.len(), 8);
        let criticals = blockers
            .iter()
            .filter(|b| b.severity == Severity::Critical)
            .count();
        assert_eq!(criticals, 5);
    }

    #[test]
    fn test_job_absence_threshold() {
        let fresh = BlockerInputs {
            sync_job_age_days: Some(2),
            ..healthy()
        };
        assert!(evaluate(&fresh).is_empty());

        let stale = BlockerInputs {
            sync_job_age_days: Some(3),
            ..healthy()
        };
        let blockers = evaluate(&stale);
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].reason, "Discovery sync job has not run recently");
        assert_eq!(blockers[0].count, 3);
    }

    #[test]
    fn test_job_never_run_is_absent() {
        let inputs = BlockerInputs {
            retry_job_age_days: None,
            ..healthy()
        };

        let blockers = evaluate(&inputs);
        assert_eq!(blockers.len(), 1);
        assert_eq!(blockers[0].reason, "Retry job has not run recently");
        assert_eq!(blockers[0].count, 0);
    }

    #[test]
    fn test_jobs_checked_independently() {
        let inputs = BlockerInputs {
            sync_job_age_days: Some(10),
            retry_job_age_days: None,
            ..healthy()
        };

        let blockers = evaluate(&inputs);
        assert_eq!(blockers.len(), 2);
    }

    #[test]
    fn test_unconfigured_side_channels_warn() {
        let inputs = BlockerInputs {
            sitemap_configured: false,
            inspection_configured: false,
            ..healthy()
        };

        let blockers = evaluate(&inputs);
        assert_eq!(blockers.len(), 2);
        assert!(blockers.iter().all(|b| b.severity == Severity::Warning));
    }
}
