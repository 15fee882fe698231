//! Tracking store durability tests
//!
//! The storage module's unit tests run in memory; these cover the on-disk
//! lifecycle: reopening an existing database, nested data directories and
//! repeated schema creation.

mod common;

use tempfile::TempDir;

use indexwatch::models::ChannelKind;
use indexwatch::storage::TrackingStore;

/// Test that records and channel usage survive a close-and-reopen cycle
#[test]
fn test_state_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("indexwatch.db");
    let t0 = common::reference_time();
    let url = common::post_url("durable");

    {
        let store = TrackingStore::new(&path).unwrap();
        store.upsert_discovered("forge-main", &url, t0).unwrap();
        store
            .mark_submitted("forge-main", &[url.clone()], ChannelKind::Push, t0)
            .unwrap();
        store
            .record_channel_usage(ChannelKind::Push, "forge-main", "2025-06-10", 7)
            .unwrap();
        store.record_job_run("discovery-sync", "forge-main", t0).unwrap();
    }

    let reopened = TrackingStore::new(&path).unwrap();

    let record = reopened
        .get("forge-main", &url)
        .unwrap()
        .expect("record survives reopen");
    assert_eq!(record.status, "submitted");
    assert_eq!(record.submission_attempts, 1);
    assert_eq!(record.last_submitted_at, Some(t0));

    assert_eq!(
        reopened
            .channel_usage(ChannelKind::Push, "forge-main", "2025-06-10")
            .unwrap(),
        7
    );
    assert_eq!(
        reopened.last_job_run("discovery-sync", "forge-main").unwrap(),
        Some(t0)
    );
}

/// Test that missing parent directories are created on open
#[test]
fn test_open_creates_parent_directories() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested/data/dir/indexwatch.db");

    let store = TrackingStore::new(&path).unwrap();
    store
        .upsert_discovered(
            "forge-main",
            &common::post_url("first"),
            common::reference_time(),
        )
        .unwrap();

    assert!(path.exists());
}

/// Test that reopening re-runs schema creation without touching rows
#[test]
fn test_schema_creation_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("indexwatch.db");
    let t0 = common::reference_time();

    let first = TrackingStore::new(&path).unwrap();
    first
        .upsert_discovered("forge-main", &common::post_url("kept"), t0)
        .unwrap();
    drop(first);

    let second = TrackingStore::new(&path).unwrap();
    assert_eq!(second.count_for_site("forge-main").unwrap(), 1);

    // the reopened handle keeps writing into the same tables
    second
        .upsert_discovered("forge-main", &common::post_url("added"), t0)
        .unwrap();
    assert_eq!(second.count_for_site("forge-main").unwrap(), 2);
}
