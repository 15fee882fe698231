//! Status resolution
//!
//! A tracking record carries two signals that can disagree: the stored
//! lifecycle `status` written by the engine, and the `indexing_state`
//! reported by the inspection channel. This module arbitrates them into
//! a single [`ResolvedStatus`] with a fixed precedence, so every caller
//! (summary buckets, retry selection, CLI output) classifies a URL the
//! same way.

use crate::models::{is_indexed_state, IndexStatus, ResolvedStatus, TrackingRecord};

/// Resolve a record's canonical status.
///
/// Precedence, first match wins:
/// 1. stored `chronic_failure` (terminal, inspection cannot revive it)
/// 2. stored `deindexed` (terminal)
/// 3. inspection reported an indexed state
/// 4. stored `indexed`
/// 5. stored `error`
/// 6. stored `submitted` or `pending`
/// 7. stored `discovered`
/// 8. anything else falls open to discovered, keeping unknown legacy
///    values inside the pipeline instead of dropping them
pub fn resolve(record: &TrackingRecord) -> ResolvedStatus {
    resolve_parts(&record.status, record.indexing_state.as_deref())
}

/// Same precedence over raw fields, for callers that do not hold a full record
pub fn resolve_parts(status: &str, indexing_state: Option<&str>) -> ResolvedStatus {
    match IndexStatus::parse(status) {
        Some(IndexStatus::ChronicFailure) => return ResolvedStatus::ChronicFailure,
        Some(IndexStatus::Deindexed) => return ResolvedStatus::Deindexed,
        _ => {}
    }

    if indexing_state.is_some_and(is_indexed_state) {
        return ResolvedStatus::Indexed;
    }

    match IndexStatus::parse(status) {
        Some(IndexStatus::Indexed) => ResolvedStatus::Indexed,
        Some(IndexStatus::Error) => ResolvedStatus::Error,
        Some(IndexStatus::Submitted) | Some(IndexStatus::Pending) => ResolvedStatus::Submitted,
        Some(IndexStatus::Discovered) => ResolvedStatus::Discovered,
        // ChronicFailure/Deindexed handled above; None is unknown
        _ => ResolvedStatus::Discovered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(status: &str, indexing_state: Option<&str>) -> TrackingRecord {
        let mut r = TrackingRecord::discovered("site-a", "https://a.test/blog/x", Utc::now());
        r.status = status.to_string();
        r.indexing_state = indexing_state.map(String::from);
        r
    }

    #[test]
    fn test_chronic_failure_outranks_inspection() {
        let r = record("chronic_failure", Some("INDEXED"));
        assert_eq!(resolve(&r), ResolvedStatus::ChronicFailure);
    }

    #[test]
    fn test_deindexed_outranks_inspection() {
        let r = record("deindexed", Some("PARTIALLY_INDEXED"));
        assert_eq!(resolve(&r), ResolvedStatus::Deindexed);
    }

    #[test]
    fn test_inspection_overrides_stale_status() {
        // submitted long ago, inspection has since seen it indexed
        let r = record("submitted", Some("INDEXED"));
        assert_eq!(resolve(&r), ResolvedStatus::Indexed);

        let r = record("error", Some("PARTIALLY_INDEXED"));
        assert_eq!(resolve(&r), ResolvedStatus::Indexed);
    }

    #[test]
    fn test_non_indexed_inspection_does_not_override() {
        let r = record("submitted", Some("CRAWLED_NOT_INDEXED"));
        assert_eq!(resolve(&r), ResolvedStatus::Submitted);

        let r = record("error", Some("DISCOVERED_NOT_INDEXED"));
        assert_eq!(resolve(&r), ResolvedStatus::Error);
    }

    #[test]
    fn test_stored_status_mapping() {
        assert_eq!(resolve(&record("indexed", None)), ResolvedStatus::Indexed);
        assert_eq!(resolve(&record("error", None)), ResolvedStatus::Error);
        assert_eq!(resolve(&record("submitted", None)), ResolvedStatus::Submitted);
        assert_eq!(resolve(&record("pending", None)), ResolvedStatus::Submitted);
        assert_eq!(resolve(&record("discovered", None)), ResolvedStatus::Discovered);
    }

    #[test]
    fn test_unknown_status_falls_open() {
        assert_eq!(resolve(&record("queued", None)), ResolvedStatus::Discovered);
        assert_eq!(resolve(&record("", None)), ResolvedStatus::Discovered);
        assert_eq!(
            resolve(&record("INDEXED", None)), // wrong case is unknown
            ResolvedStatus::Discovered
        );
    }

    #[test]
    fn test_unknown_status_with_indexed_inspection() {
        // fail-open still lets a live inspection signal through
        let r = record("queued", Some("INDEXED"));
        assert_eq!(resolve(&r), ResolvedStatus::Indexed);
    }

    #[test]
    fn test_resolver_never_yields_never_submitted() {
        // never_submitted is an arithmetic bucket, not a per-record state
        for status in ["discovered", "submitted", "pending", "indexed", "error", "junk"] {
            for state in [None, Some("INDEXED"), Some("CRAWLED_NOT_INDEXED")] {
                assert_ne!(
                    resolve(&record(status, state)),
                    ResolvedStatus::NeverSubmitted
                );
            }
        }
    }
}
