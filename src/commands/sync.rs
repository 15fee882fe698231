use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use indexwatch::config::Config;
use indexwatch::engine::ReconcileEngine;
use indexwatch::metrics;

pub async fn sync(config: Config, site: String) -> Result<()> {
    println!("Discovery Sync");
    println!("==============");

    let config = Arc::new(config);
    let engine = ReconcileEngine::from_config(Arc::clone(&config))?;

    let outcome = engine.sync_to_tracking(&site, Utc::now()).await?;
    metrics::record_sync_run(&site, outcome.created);

    println!("Site: {site}");
    println!("Publishable URLs: {}", outcome.total);
    println!("New tracking records: {}", outcome.created);
    println!(
        "Already tracked: {}",
        outcome.total.saturating_sub(outcome.created)
    );

    super::export_metrics(&config);
    Ok(())
}
