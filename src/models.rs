// Core data structures for the indexing reconciliation engine

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Stored lifecycle status of a tracking record.
///
/// This is what the engine writes; reads keep the raw string so that
/// unrecognized legacy values survive until the resolver maps them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexStatus {
    Discovered,
    Submitted,
    Pending,
    Indexed,
    Error,
    Deindexed,
    ChronicFailure,
}

impl IndexStatus {
    /// Get string representation as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Submitted => "submitted",
            Self::Pending => "pending",
            Self::Indexed => "indexed",
            Self::Error => "error",
            Self::Deindexed => "deindexed",
            Self::ChronicFailure => "chronic_failure",
        }
    }

    /// Parse a stored status string; `None` for unknown/legacy values
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(Self::Discovered),
            "submitted" => Some(Self::Submitted),
            "pending" => Some(Self::Pending),
            "indexed" => Some(Self::Indexed),
            "error" => Some(Self::Error),
            "deindexed" => Some(Self::Deindexed),
            "chronic_failure" => Some(Self::ChronicFailure),
            _ => None,
        }
    }
}

impl std::fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical status a record resolves to after reconciling the stored
/// status with the inspection channel's signal.
///
/// This is the vocabulary of the summary buckets; one URL lands in exactly
/// one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolvedStatus {
    Indexed,
    Submitted,
    Discovered,
    NeverSubmitted,
    Error,
    Deindexed,
    ChronicFailure,
}

impl ResolvedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indexed => "indexed",
            Self::Submitted => "submitted",
            Self::Discovered => "discovered",
            Self::NeverSubmitted => "never_submitted",
            Self::Error => "error",
            Self::Deindexed => "deindexed",
            Self::ChronicFailure => "chronic_failure",
        }
    }

    /// All bucket values in summary display order
    pub fn all() -> [Self; 7] {
        [
            Self::Indexed,
            Self::Submitted,
            Self::Discovered,
            Self::NeverSubmitted,
            Self::Error,
            Self::Deindexed,
            Self::ChronicFailure,
        ]
    }
}

impl std::fmt::Display for ResolvedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inspection states that count as indexed regardless of the stored status
pub fn is_indexed_state(state: &str) -> bool {
    matches!(state, "INDEXED" | "PARTIALLY_INDEXED")
}

/// The three external channels a URL can be pushed through or checked by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Batched push-notification endpoint (host + key + URL list)
    Push,
    /// Sitemap registration endpoint (one sitemap URL per call)
    Sitemap,
    /// Read-only URL inspection endpoint
    Inspection,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Sitemap => "sitemap",
            Self::Inspection => "inspection",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-(site, URL) tracking record. Created exactly once by discovery sync;
/// the tracking store is the only writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub site_id: String,
    pub url: String,

    /// Raw stored status. Authoritative when recognized; unknown values
    /// fall open to `discovered` in the resolver.
    pub status: String,

    /// Secondary signal from the inspection channel (e.g. "INDEXED").
    /// May disagree with `status`; the resolver arbitrates.
    pub indexing_state: Option<String>,

    /// Monotone per-channel flags, set true and never reset
    pub submitted_push: bool,
    pub submitted_sitemap: bool,
    pub inspected: bool,

    pub submission_attempts: u32,
    pub last_submitted_at: Option<DateTime<Utc>>,
    pub first_submitted_at: Option<DateTime<Utc>>,
    pub last_inspected_at: Option<DateTime<Utc>>,
    pub indexed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackingRecord {
    /// Fresh record as discovery sync creates it
    pub fn discovered(site_id: impl Into<String>, url: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            site_id: site_id.into(),
            url: url.into(),
            status: IndexStatus::Discovered.as_str().to_string(),
            indexing_state: None,
            submitted_push: false,
            submitted_sitemap: false,
            inspected: false,
            submission_attempts: 0,
            last_submitted_at: None,
            first_submitted_at: None,
            last_inspected_at: None,
            indexed_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Hours since the record was created
    pub fn age_hours(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_hours()
    }

    /// Days since the most recent submission, if any
    pub fn days_since_submission(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_submitted_at.map(|t| (now - t).num_days())
    }

    /// Days between first submission and reaching indexed, if both known
    pub fn days_to_index(&self) -> Option<f64> {
        match (self.first_submitted_at, self.indexed_at) {
            (Some(submitted), Some(indexed)) if indexed >= submitted => {
                Some((indexed - submitted).num_minutes() as f64 / (60.0 * 24.0))
            }
            _ => None,
        }
    }
}

/// Content type a publishable URL belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Home,
    Post,
    News,
    Event,
    Product,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Post => "post",
            Self::News => "news",
            Self::Event => "event",
            Self::Product => "product",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "home" => Some(Self::Home),
            "post" => Some(Self::Post),
            "news" => Some(Self::News),
            "event" => Some(Self::Event),
            "product" => Some(Self::Product),
            _ => None,
        }
    }

    /// URL path segment for this kind. Posts move from `/blog` to
    /// `/articles` on sites using the alternate taxonomy.
    pub fn path_segment(&self, alt_taxonomy: bool) -> &'static str {
        match self {
            Self::Home => "",
            Self::Post => {
                if alt_taxonomy {
                    "articles"
                } else {
                    "blog"
                }
            }
            Self::News => "news",
            Self::Event => "events",
            Self::Product => "products",
        }
    }

    /// All kinds discovery enumerates from content sources (home is
    /// synthesized separately)
    pub fn sourced() -> [Self; 4] {
        [Self::Post, Self::News, Self::Event, Self::Product]
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Locale of a publishable URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    En,
    Ar,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "en" => Some(Self::En),
            "ar" => Some(Self::Ar),
            _ => None,
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One published content item as reported by a content source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedItem {
    pub slug: String,
    pub kind: ContentKind,
    pub locale: Locale,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// News-style items expire; expired items are not indexable
    pub expires_at: Option<DateTime<Utc>>,
    /// Word count when the source knows it; feeds the thin-content check
    pub word_count: Option<u32>,
}

impl PublishedItem {
    pub fn new(slug: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            slug: slug.into(),
            kind,
            locale: Locale::En,
            published_at: None,
            updated_at: None,
            expires_at: None,
            word_count: None,
        }
    }

    /// Whether the item is live at `now` (unexpired)
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => expiry > now,
            None => true,
        }
    }
}

/// Day key ("YYYY-MM-DD") for quota accounting, shifted to the site's
/// local offset so the daily cap resets at local midnight.
///
/// Out-of-range offsets fall back to UTC.
pub fn local_day(now: DateTime<Utc>, utc_offset_minutes: i32) -> String {
    match FixedOffset::east_opt(utc_offset_minutes * 60) {
        Some(offset) => now.with_timezone(&offset).format("%Y-%m-%d").to_string(),
        None => now.format("%Y-%m-%d").to_string(),
    }
}

/// Window edge helper: `now` minus `days`
pub fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}
