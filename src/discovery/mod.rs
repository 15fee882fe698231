//! URL discovery and tracking sync
//!
//! Turns the published content of a site into the full set of page URLs
//! that should exist, then makes sure every one of them has a tracking
//! record. Discovery is append-only toward the store: it creates missing
//! records and never touches existing ones, so submission history survives
//! repeated syncs.

pub mod sources;

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::SiteConfig;
use crate::models::{ContentKind, Locale, PublishedItem};
use crate::storage::SharedTrackingStore;

pub use sources::{CatalogSource, ContentSource, StaticSource};

/// Job name stamped on every successful sync, read back by diagnostics
pub const SYNC_JOB: &str = "discovery-sync";

fn slug_pattern() -> &'static Regex {
    static SLUG_RE: OnceLock<Regex> = OnceLock::new();
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("Invalid regex pattern"))
}

/// Check that a slug is usable in a URL path
pub fn is_valid_slug(slug: &str) -> bool {
    slug_pattern().is_match(slug)
}

/// Build the page URL for one item in one locale.
///
/// English pages live under the kind's path segment; Arabic variants (on
/// bilingual sites only) repeat the path under the `/ar` prefix.
pub fn page_url(site: &SiteConfig, kind: ContentKind, slug: &str, locale: Locale) -> Option<String> {
    if !is_valid_slug(slug) {
        return None;
    }
    if locale == Locale::Ar && !site.bilingual {
        return None;
    }

    let segment = kind.path_segment(site.alt_taxonomy);
    if segment.is_empty() {
        // home pages are synthesized separately
        return None;
    }

    let url = match locale {
        Locale::En => format!("https://{}/{}/{}", site.domain, segment, slug),
        Locale::Ar => format!("https://{}/ar/{}/{}", site.domain, segment, slug),
    };

    Some(url)
}

/// Home page URLs for a site. The Arabic home is the bare `/ar` path with
/// no trailing slash, matching how the platform links it.
pub fn home_urls(site: &SiteConfig) -> Vec<String> {
    let mut urls = vec![format!("https://{}/", site.domain)];
    if site.bilingual {
        urls.push(format!("https://{}/ar", site.domain));
    }
    urls
}

/// Point-in-time snapshot of every URL a site should have.
///
/// `published_count` counts canonical (English) pages only, the unit
/// operators reason about; `all_urls` additionally carries the Arabic
/// variants that still get tracking records.
#[derive(Debug, Clone, Default)]
pub struct UrlInventory {
    urls: Vec<String>,
    canonical_count: usize,
    pairs: Vec<(String, String)>,
    word_counts: Vec<u32>,
}

impl UrlInventory {
    /// Every URL the site should have, canonical and variants, sorted
    pub fn all_urls(&self) -> &[String] {
        &self.urls
    }

    /// Canonical (English) page count
    pub fn published_count(&self) -> usize {
        self.canonical_count
    }

    /// (canonical, variant) URL pairs on bilingual sites, sorted
    pub fn bilingual_pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Canonical pages whose known word count falls below `min_words`
    pub fn thin_content_count(&self, min_words: u32) -> usize {
        self.word_counts.iter().filter(|w| **w < min_words).count()
    }
}

#[derive(Default)]
struct InventoryBuilder {
    all: HashSet<String>,
    canonical: HashSet<String>,
    pairs: HashSet<(String, String)>,
    word_counts: Vec<u32>,
}

impl InventoryBuilder {
    fn add_homes(&mut self, site: &SiteConfig) {
        let homes = home_urls(site);
        self.canonical.insert(homes[0].clone());
        if let Some(ar_home) = homes.get(1) {
            self.pairs.insert((homes[0].clone(), ar_home.clone()));
        }
        self.all.extend(homes);
    }

    fn add_item(&mut self, site: &SiteConfig, item: &PublishedItem) {
        match item.locale {
            Locale::En => {
                let Some(url) = page_url(site, item.kind, &item.slug, Locale::En) else {
                    tracing::warn!(site = %site.id, slug = %item.slug, "skipping invalid slug");
                    return;
                };
                if self.canonical.insert(url.clone()) {
                    if let Some(words) = item.word_count {
                        self.word_counts.push(words);
                    }
                }
                // bilingual sites mirror every English page under /ar
                if let Some(variant) = page_url(site, item.kind, &item.slug, Locale::Ar) {
                    self.pairs.insert((url.clone(), variant.clone()));
                    self.all.insert(variant);
                }
                self.all.insert(url);
            }
            Locale::Ar => {
                if let Some(url) = page_url(site, item.kind, &item.slug, Locale::Ar) {
                    self.all.insert(url);
                }
            }
        }
    }

    fn finish(self) -> UrlInventory {
        let mut urls: Vec<String> = self.all.into_iter().collect();
        urls.sort();
        let mut pairs: Vec<(String, String)> = self.pairs.into_iter().collect();
        pairs.sort();

        UrlInventory {
            urls,
            canonical_count: self.canonical.len(),
            pairs,
            word_counts: self.word_counts,
        }
    }
}

/// Result of one discovery sync
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SyncOutcome {
    /// URLs the site should currently have
    pub total: usize,
    /// Tracking records newly created by this sync
    pub created: usize,
}

/// Discovery engine for one store and a set of content sources
pub struct Discovery {
    store: SharedTrackingStore,
    sources: Vec<Arc<dyn ContentSource>>,
}

impl Discovery {
    pub fn new(store: SharedTrackingStore, sources: Vec<Arc<dyn ContentSource>>) -> Self {
        Self { store, sources }
    }

    /// Discovery over the site's own catalog table
    pub fn with_catalog(store: SharedTrackingStore) -> Self {
        let catalog = Arc::new(CatalogSource::new(Arc::clone(&store)));
        Self::new(store, vec![catalog])
    }

    /// Build the full URL inventory for a site.
    ///
    /// Items from all sources are merged; expired items are dropped; on
    /// bilingual sites each English page also yields its Arabic variant.
    /// Output is deduplicated and sorted for deterministic results.
    pub async fn inventory(&self, site: &SiteConfig, now: DateTime<Utc>) -> Result<UrlInventory> {
        let mut builder = InventoryBuilder::default();
        builder.add_homes(site);

        for source in &self.sources {
            let items = source.published_items(&site.id).await?;
            tracing::debug!(
                site = %site.id,
                source = source.name(),
                items = items.len(),
                "enumerated content source"
            );

            for item in &items {
                if !item.is_live(now) {
                    continue;
                }
                builder.add_item(site, item);
            }
        }

        Ok(builder.finish())
    }

    /// Every URL the site should have right now, sorted
    pub async fn enumerate(&self, site: &SiteConfig, now: DateTime<Utc>) -> Result<Vec<String>> {
        Ok(self.inventory(site, now).await?.urls)
    }

    /// Canonical published page count, see [`UrlInventory::published_count`]
    pub async fn published_count(&self, site: &SiteConfig, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.inventory(site, now).await?.published_count())
    }

    /// Ensure a tracking record exists for every publishable URL.
    ///
    /// Idempotent: existing records keep their status, attempts and
    /// timestamps. Stamps the sync job time on success.
    pub async fn sync_to_tracking(
        &self,
        site: &SiteConfig,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        let urls = self.enumerate(site, now).await?;
        let mut created = 0;

        for url in &urls {
            if self.store.upsert_discovered(&site.id, url, now)? {
                created += 1;
            }
        }

        self.store.record_job_run(SYNC_JOB, &site.id, now)?;

        tracing::info!(
            site = %site.id,
            total = urls.len(),
            created = created,
            "discovery sync completed"
        );

        Ok(SyncOutcome {
            total: urls.len(),
            created,
        })
    }
}
