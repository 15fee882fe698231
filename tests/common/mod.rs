//! Common test utilities

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use indexwatch::config::{Config, SiteConfig};
use indexwatch::models::{ContentKind, PublishedItem};
use indexwatch::storage::SharedTrackingStore;

/// Fixed reference instant so assertions do not depend on wall-clock time
#[allow(dead_code)]
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
}

/// A single-site config with every channel pointed at mock endpoints
#[allow(dead_code)]
pub fn wired_config(db_path: &Path, push_uri: &str, sitemap_uri: &str, inspect_uri: &str) -> Config {
    let mut config = Config::default();

    config.database.sqlite_path = db_path.to_path_buf();

    config.channels.push.endpoint = format!("{push_uri}/indexnow");
    config.channels.push.key = Some("0123456789abcdef0123456789abcdef".to_string());
    config.channels.sitemap.endpoint = format!("{sitemap_uri}/webmasters/ping");
    config.channels.sitemap.token = Some("sitemap-token".to_string());
    config.channels.inspection.endpoint = format!("{inspect_uri}/v1/urlInspection/index:inspect");
    config.channels.inspection.token = Some("inspect-token".to_string());

    // keep retries fast under test
    config.channels.max_retries = 2;
    config.channels.base_delay_ms = 1;
    config.channels.max_delay_ms = 5;

    config.sites.push(test_site());
    config
}

/// The site used across integration tests
#[allow(dead_code)]
pub fn test_site() -> SiteConfig {
    SiteConfig {
        id: "forge-main".to_string(),
        domain: "forge.example.com".to_string(),
        bilingual: false,
        alt_taxonomy: false,
        sitemap_path: "/sitemap.xml".to_string(),
    }
}

/// Seed published blog posts into the content catalog
#[allow(dead_code)]
pub fn seed_posts(store: &SharedTrackingStore, site_id: &str, slugs: &[&str]) {
    for slug in slugs {
        let item = PublishedItem::new(*slug, ContentKind::Post);
        store.upsert_content_item(site_id, &item, true).unwrap();
    }
}

/// Blog post URL for the test site
#[allow(dead_code)]
pub fn post_url(slug: &str) -> String {
    format!("https://forge.example.com/blog/{slug}")
}
