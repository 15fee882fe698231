use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use indexwatch::config::Config;
use indexwatch::engine::ReconcileEngine;
use indexwatch::metrics;

pub async fn inspect(config: Config, site: String, max_urls: usize) -> Result<()> {
    println!("Inspection Refresh");
    println!("==================");

    let config = Arc::new(config);
    let engine = ReconcileEngine::from_config(Arc::clone(&config))?;

    let report = engine.refresh_inspections(&site, max_urls, Utc::now()).await?;
    metrics::record_inspection_pass(&site, report.inspected, report.newly_indexed);

    println!("Site: {site}");
    println!("Selected: {}", report.selected);
    println!("Inspected: {}", report.inspected);
    println!("Newly indexed: {}", report.newly_indexed);

    if !report.errors.is_empty() {
        println!("\nErrors ({})", report.errors.len());
        println!("------");
        for error in &report.errors {
            println!("  {error}");
        }
    }

    super::export_metrics(&config);
    Ok(())
}
