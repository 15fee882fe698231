//! Content sources feeding URL discovery
//!
//! A source enumerates the published content items of one site. Production
//! uses the catalog table kept in sync from the CMS; tests and one-off
//! tooling use a static in-memory list.

use async_trait::async_trait;

use crate::models::PublishedItem;
use crate::storage::SharedTrackingStore;

/// Enumerates published content for a site
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Source name for logs and diagnostics
    fn name(&self) -> &'static str;

    /// All currently published items for the site
    async fn published_items(&self, site_id: &str) -> anyhow::Result<Vec<PublishedItem>>;
}

/// Source backed by the content catalog table
pub struct CatalogSource {
    store: SharedTrackingStore,
}

impl CatalogSource {
    pub fn new(store: SharedTrackingStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ContentSource for CatalogSource {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn published_items(&self, site_id: &str) -> anyhow::Result<Vec<PublishedItem>> {
        self.store.published_items(site_id)
    }
}

/// Fixed item list, mainly for tests and seeding
pub struct StaticSource {
    items: Vec<PublishedItem>,
}

impl StaticSource {
    pub fn new(items: Vec<PublishedItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn published_items(&self, _site_id: &str) -> anyhow::Result<Vec<PublishedItem>> {
        Ok(self.items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKind;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_catalog_source_reads_store() {
        let store = Arc::new(crate::storage::TrackingStore::in_memory().unwrap());
        let item = PublishedItem::new("hello-world", ContentKind::Post);
        store.upsert_content_item("site-a", &item, true).unwrap();

        let source = CatalogSource::new(store);
        let items = source.published_items("site-a").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "hello-world");

        assert!(source.published_items("site-b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_source_ignores_site() {
        let source = StaticSource::new(vec![PublishedItem::new("fixed", ContentKind::News)]);
        assert_eq!(source.published_items("anything").await.unwrap().len(), 1);
        assert_eq!(source.name(), "static");
    }
}
