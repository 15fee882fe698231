//! Tracking store: the single writer for indexing state
//!
//! One row per (site, URL). Discovery inserts rows exactly once; submission
//! and inspection outcomes update them; the summary reads aggregate counts.
//! All timestamps are stored as RFC3339 text with a fixed UTC offset, which
//! makes them comparable as strings inside SQL.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{is_indexed_state, ChannelKind, PublishedItem, TrackingRecord};
use crate::models::{ContentKind, Locale};
use crate::utils::truncate_text;

/// Stored error messages are capped so a verbose upstream body cannot
/// bloat the table
const MAX_ERROR_LEN: usize = 500;

const RECORD_COLUMNS: &str = "site_id, url, status, indexing_state, \
     submitted_push, submitted_sitemap, inspected, submission_attempts, \
     last_submitted_at, first_submitted_at, last_inspected_at, indexed_at, \
     last_error, created_at, updated_at";

/// SQLite-backed tracking store
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct TrackingStore {
    conn: Mutex<Connection>,
}

/// Thread-safe shared store handle
pub type SharedTrackingStore = Arc<TrackingStore>;

impl TrackingStore {
    /// Open (or create) the store at the given path
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "tracking store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS tracking (
                    site_id TEXT NOT NULL,
                    url TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'discovered',
                    indexing_state TEXT,
                    submitted_push INTEGER NOT NULL DEFAULT 0,
                    submitted_sitemap INTEGER NOT NULL DEFAULT 0,
                    inspected INTEGER NOT NULL DEFAULT 0,
                    submission_attempts INTEGER NOT NULL DEFAULT 0,
                    last_submitted_at TEXT,
                    first_submitted_at TEXT,
                    last_inspected_at TEXT,
                    indexed_at TEXT,
                    last_error TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (site_id, url)
                );

                CREATE INDEX IF NOT EXISTS idx_tracking_site_status
                    ON tracking(site_id, status);

                CREATE INDEX IF NOT EXISTS idx_tracking_site_submitted
                    ON tracking(site_id, last_submitted_at);

                CREATE TABLE IF NOT EXISTS channel_usage (
                    channel TEXT NOT NULL,
                    site_id TEXT NOT NULL,
                    day TEXT NOT NULL,
                    submitted INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (channel, site_id, day)
                );

                CREATE TABLE IF NOT EXISTS job_runs (
                    job TEXT NOT NULL,
                    site_id TEXT NOT NULL,
                    last_run_at TEXT NOT NULL,
                    PRIMARY KEY (job, site_id)
                );

                CREATE TABLE IF NOT EXISTS content_items (
                    site_id TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    slug TEXT NOT NULL,
                    locale TEXT NOT NULL DEFAULT 'en',
                    published INTEGER NOT NULL DEFAULT 1,
                    published_at TEXT,
                    updated_at TEXT,
                    expires_at TEXT,
                    word_count INTEGER,
                    PRIMARY KEY (site_id, kind, slug, locale)
                );
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    // ========================================================================
    // Tracking records
    // ========================================================================

    /// Insert a freshly discovered URL. Idempotent: an existing row is left
    /// untouched. Returns whether a new row was created.
    pub fn upsert_discovered(&self, site_id: &str, url: &str, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let ts = now.to_rfc3339();

        let inserted = conn
            .execute(
                r#"
                INSERT INTO tracking (site_id, url, status, created_at, updated_at)
                VALUES (?1, ?2, 'discovered', ?3, ?3)
                ON CONFLICT(site_id, url) DO NOTHING
                "#,
                params![site_id, url, ts],
            )
            .context("Failed to insert discovered URL")?;

        Ok(inserted > 0)
    }

    /// Get a single record
    pub fn get(&self, site_id: &str, url: &str) -> Result<Option<TrackingRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM tracking WHERE site_id = ?1 AND url = ?2"),
                params![site_id, url],
                row_to_record,
            )
            .optional()
            .context("Failed to get tracking record")?;

        Ok(record)
    }

    /// All records for a site, URL order
    pub fn list_for_site(&self, site_id: &str) -> Result<Vec<TrackingRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM tracking WHERE site_id = ?1 ORDER BY url"
            ))
            .context("Failed to prepare list query")?;

        let records: Vec<TrackingRecord> = stmt
            .query_map(params![site_id], row_to_record)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }

    /// Number of tracked URLs for a site
    pub fn count_for_site(&self, site_id: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tracking WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    /// Grouped (status, indexing_state) counts, one row per distinct pair.
    /// The summary resolves each pair once instead of loading every record.
    pub fn status_state_counts(&self, site_id: &str) -> Result<Vec<(String, Option<String>, u64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT status, indexing_state, COUNT(*) FROM tracking
                 WHERE site_id = ?1 GROUP BY status, indexing_state",
            )
            .context("Failed to prepare count query")?;

        let counts: Vec<(String, Option<String>, u64)> = stmt
            .query_map(params![site_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)? as u64,
                ))
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(counts)
    }

    /// Record a successful submission for a batch of URLs.
    ///
    /// Sets status to submitted, bumps the attempt counter, stamps the
    /// submission times and raises the channel flag. A prior error message
    /// is cleared. Returns how many rows matched.
    pub fn mark_submitted(
        &self,
        site_id: &str,
        urls: &[String],
        channel: ChannelKind,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if urls.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let ts = now.to_rfc3339();
        let mut updated = 0;

        {
            let mut stmt = tx
                .prepare(
                    r#"
                    UPDATE tracking SET
                        status = 'submitted',
                        submission_attempts = submission_attempts + 1,
                        last_submitted_at = ?3,
                        first_submitted_at = COALESCE(first_submitted_at, ?3),
                        submitted_push = CASE WHEN ?4 = 'push' THEN 1 ELSE submitted_push END,
                        submitted_sitemap = CASE WHEN ?4 = 'sitemap' THEN 1 ELSE submitted_sitemap END,
                        last_error = NULL,
                        updated_at = ?3
                    WHERE site_id = ?1 AND url = ?2
                    "#,
                )
                .context("Failed to prepare submission update")?;

            for url in urls {
                updated += stmt.execute(params![site_id, url, ts, channel.as_str()])?;
            }
        }

        tx.commit().context("Failed to commit submission batch")?;
        Ok(updated)
    }

    /// Record a failed submission. Counts as an attempt toward the chronic
    /// failure ceiling.
    pub fn mark_error(
        &self,
        site_id: &str,
        url: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let ts = now.to_rfc3339();

        conn.execute(
            r#"
            UPDATE tracking SET
                status = 'error',
                submission_attempts = submission_attempts + 1,
                last_error = ?3,
                updated_at = ?4
            WHERE site_id = ?1 AND url = ?2
            "#,
            params![site_id, url, truncate_text(message, MAX_ERROR_LEN), ts],
        )
        .context("Failed to record submission error")?;

        Ok(())
    }

    /// Apply a fresh inspection result.
    ///
    /// Stores the reported state and inspection time. An indexed state
    /// promotes the record to indexed (stamping `indexed_at` once); a
    /// definite non-indexed state on a previously indexed record demotes it
    /// to deindexed. Returns whether a record existed.
    pub fn apply_inspection(
        &self,
        site_id: &str,
        url: &str,
        indexing_state: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();

        let existing: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT status, indexed_at FROM tracking WHERE site_id = ?1 AND url = ?2",
                params![site_id, url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to read record for inspection")?;

        let Some((status, indexed_at)) = existing else {
            return Ok(false);
        };

        let was_indexed = status == "indexed" || indexed_at.is_some();
        let now_indexed = indexing_state.is_some_and(is_indexed_state);

        let new_status: Option<&str> = if now_indexed {
            Some("indexed")
        } else if was_indexed && indexing_state.is_some() {
            // previously indexed, a definite non-indexed state demotes
            Some("deindexed")
        } else {
            None
        };

        let ts = now.to_rfc3339();
        conn.execute(
            r#"
            UPDATE tracking SET
                indexing_state = ?3,
                inspected = 1,
                last_inspected_at = ?4,
                status = COALESCE(?5, status),
                indexed_at = CASE WHEN ?6 THEN COALESCE(indexed_at, ?4) ELSE indexed_at END,
                updated_at = ?4
            WHERE site_id = ?1 AND url = ?2
            "#,
            params![site_id, url, indexing_state, ts, new_status, now_indexed],
        )
        .context("Failed to apply inspection result")?;

        Ok(true)
    }

    /// Select records due for (re)submission, oldest activity first.
    ///
    /// Eligible are discovered records older than `stale_hours`, records in
    /// error below the chronic ceiling, and submitted records unacknowledged
    /// for `resubmit_days` with attempts left. Records the inspection channel
    /// already reports as indexed are never selected.
    pub fn select_retry_candidates(
        &self,
        site_id: &str,
        max: usize,
        now: DateTime<Utc>,
        stale_hours: i64,
        resubmit_days: i64,
        chronic_threshold: u32,
    ) -> Result<Vec<TrackingRecord>> {
        let stale_cutoff = (now - chrono::Duration::hours(stale_hours)).to_rfc3339();
        let resubmit_cutoff = (now - chrono::Duration::days(resubmit_days)).to_rfc3339();

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                r#"
                SELECT {RECORD_COLUMNS} FROM tracking
                WHERE site_id = ?1
                  AND (indexing_state IS NULL
                       OR indexing_state NOT IN ('INDEXED', 'PARTIALLY_INDEXED'))
                  AND (
                        (status = 'discovered' AND created_at < ?2)
                     OR (status = 'error' AND submission_attempts < ?4)
                     OR (status IN ('submitted', 'pending')
                         AND last_submitted_at < ?3
                         AND submission_attempts < ?4)
                  )
                ORDER BY COALESCE(last_submitted_at, created_at) ASC
                LIMIT ?5
                "#
            ))
            .context("Failed to prepare retry selection")?;

        let records: Vec<TrackingRecord> = stmt
            .query_map(
                params![site_id, stale_cutoff, resubmit_cutoff, chronic_threshold, max as i64],
                row_to_record,
            )?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }

    /// Escalate exhausted records to chronic failure. A record qualifies once
    /// its attempts reach the ceiling while the inspection channel still does
    /// not report it indexed. Returns how many records were escalated.
    pub fn escalate_chronic(
        &self,
        site_id: &str,
        chronic_threshold: u32,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let ts = now.to_rfc3339();

        let escalated = conn
            .execute(
                r#"
                UPDATE tracking SET status = 'chronic_failure', updated_at = ?3
                WHERE site_id = ?1
                  AND submission_attempts >= ?2
                  AND status IN ('error', 'submitted', 'pending')
                  AND (indexing_state IS NULL
                       OR indexing_state NOT IN ('INDEXED', 'PARTIALLY_INDEXED'))
                "#,
                params![site_id, chronic_threshold, ts],
            )
            .context("Failed to escalate chronic failures")?;

        Ok(escalated as u64)
    }

    /// Records whose inspection data is oldest, for periodic refresh.
    /// Only submitted and indexed records are worth inspecting.
    pub fn select_inspection_candidates(
        &self,
        site_id: &str,
        max: usize,
    ) -> Result<Vec<TrackingRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                r#"
                SELECT {RECORD_COLUMNS} FROM tracking
                WHERE site_id = ?1 AND status IN ('submitted', 'pending', 'indexed')
                ORDER BY COALESCE(last_inspected_at, '1970-01-01T00:00:00+00:00') ASC, url ASC
                LIMIT ?2
                "#
            ))
            .context("Failed to prepare inspection selection")?;

        let records: Vec<TrackingRecord> = stmt
            .query_map(params![site_id, max as i64], row_to_record)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }

    /// Most recent (first_submitted_at, indexed_at) pairs among indexed
    /// records, newest first. Feeds the average-days-to-index figure.
    pub fn recent_index_samples(
        &self,
        site_id: &str,
        limit: usize,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT first_submitted_at, indexed_at FROM tracking
                WHERE site_id = ?1
                  AND first_submitted_at IS NOT NULL
                  AND indexed_at IS NOT NULL
                ORDER BY indexed_at DESC
                LIMIT ?2
                "#,
            )
            .context("Failed to prepare sample query")?;

        let samples: Vec<(DateTime<Utc>, DateTime<Utc>)> = stmt
            .query_map(params![site_id, limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(submitted, indexed)| {
                Some((parse_ts(&submitted)?, parse_ts(&indexed)?))
            })
            .collect();

        Ok(samples)
    }

    /// How many records reached indexed inside the window (after, until]
    pub fn count_indexed_between(
        &self,
        site_id: &str,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tracking
             WHERE site_id = ?1 AND indexed_at > ?2 AND indexed_at <= ?3",
            params![site_id, after.to_rfc3339(), until.to_rfc3339()],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    // ========================================================================
    // Channel usage (daily quotas)
    // ========================================================================

    /// Add to a channel's usage counter for a local day
    pub fn record_channel_usage(
        &self,
        channel: ChannelKind,
        site_id: &str,
        day: &str,
        submitted: u64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO channel_usage (channel, site_id, day, submitted)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(channel, site_id, day) DO UPDATE SET
                submitted = submitted + excluded.submitted
            "#,
            params![channel.as_str(), site_id, day, submitted as i64],
        )
        .context("Failed to record channel usage")?;

        Ok(())
    }

    /// Usage counter for a channel on a local day (0 when absent)
    pub fn channel_usage(&self, channel: ChannelKind, site_id: &str, day: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let used: Option<i64> = conn
            .query_row(
                "SELECT submitted FROM channel_usage
                 WHERE channel = ?1 AND site_id = ?2 AND day = ?3",
                params![channel.as_str(), site_id, day],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read channel usage")?;

        Ok(used.unwrap_or(0) as u64)
    }

    // ========================================================================
    // Job bookkeeping
    // ========================================================================

    /// Stamp a job run (discovery sync, retry sweep) for a site
    pub fn record_job_run(&self, job: &str, site_id: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO job_runs (job, site_id, last_run_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(job, site_id) DO UPDATE SET
                last_run_at = excluded.last_run_at
            "#,
            params![job, site_id, now.to_rfc3339()],
        )
        .context("Failed to record job run")?;

        Ok(())
    }

    /// When a job last ran for a site, if ever
    pub fn last_job_run(&self, job: &str, site_id: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let ts: Option<String> = conn
            .query_row(
                "SELECT last_run_at FROM job_runs WHERE job = ?1 AND site_id = ?2",
                params![job, site_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read job run")?;

        Ok(ts.as_deref().and_then(parse_ts))
    }

    // ========================================================================
    // Content catalog
    // ========================================================================

    /// Upsert a content item synced from the CMS. `published = false`
    /// removes it from discovery without deleting history.
    pub fn upsert_content_item(
        &self,
        site_id: &str,
        item: &PublishedItem,
        published: bool,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO content_items
                (site_id, kind, slug, locale, published, published_at, updated_at, expires_at, word_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(site_id, kind, slug, locale) DO UPDATE SET
                published = excluded.published,
                published_at = excluded.published_at,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at,
                word_count = excluded.word_count
            "#,
            params![
                site_id,
                item.kind.as_str(),
                item.slug,
                item.locale.as_str(),
                published,
                item.published_at.map(|t| t.to_rfc3339()),
                item.updated_at.map(|t| t.to_rfc3339()),
                item.expires_at.map(|t| t.to_rfc3339()),
                item.word_count,
            ],
        )
        .context("Failed to upsert content item")?;

        Ok(())
    }

    /// All published content items for a site
    pub fn published_items(&self, site_id: &str) -> Result<Vec<PublishedItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT kind, slug, locale, published_at, updated_at, expires_at, word_count
                 FROM content_items
                 WHERE site_id = ?1 AND published = 1
                 ORDER BY kind, slug, locale",
            )
            .context("Failed to prepare content query")?;

        let items: Vec<PublishedItem> = stmt
            .query_map(params![site_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<u32>>(6)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .filter_map(
                |(kind, slug, locale, published_at, updated_at, expires_at, word_count)| {
                    Some(PublishedItem {
                        slug,
                        kind: ContentKind::parse(&kind)?,
                        locale: Locale::parse(&locale)?,
                        published_at: published_at.as_deref().and_then(parse_ts),
                        updated_at: updated_at.as_deref().and_then(parse_ts),
                        expires_at: expires_at.as_deref().and_then(parse_ts),
                        word_count,
                    })
                },
            )
            .collect();

        Ok(items)
    }
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackingRecord> {
    let parse_opt = |v: Option<String>| v.as_deref().and_then(parse_ts);

    Ok(TrackingRecord {
        site_id: row.get(0)?,
        url: row.get(1)?,
        status: row.get(2)?,
        indexing_state: row.get(3)?,
        submitted_push: row.get(4)?,
        submitted_sitemap: row.get(5)?,
        inspected: row.get(6)?,
        submission_attempts: row.get::<_, i64>(7)? as u32,
        last_submitted_at: parse_opt(row.get(8)?),
        first_submitted_at: parse_opt(row.get(9)?),
        last_inspected_at: parse_opt(row.get(10)?),
        indexed_at: parse_opt(row.get(11)?),
        last_error: row.get(12)?,
        created_at: parse_ts(&row.get::<_, String>(13)?).unwrap_or_else(Utc::now),
        updated_at: parse_ts(&row.get::<_, String>(14)?).unwrap_or_else(Utc::now),
    })
}
