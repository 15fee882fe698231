use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use indexwatch::config::Config;
use indexwatch::engine::ReconcileEngine;
use indexwatch::metrics;
use indexwatch::models::ChannelKind;

pub async fn submit(config: Config, site: String, url: String) -> Result<()> {
    println!("Immediate Submission");
    println!("====================");

    let config = Arc::new(config);
    let engine = ReconcileEngine::from_config(Arc::clone(&config))?;

    let outcome = engine.submit_url_now(&site, &url, Utc::now()).await?;
    metrics::record_submission(&site, ChannelKind::Push.as_str(), outcome.submitted);
    if outcome.sitemap_registered {
        metrics::record_submission(&site, ChannelKind::Sitemap.as_str(), true);
    }

    println!("Site: {site}");
    println!("URL: {url}");
    match &outcome.error {
        None => println!("Push channel: accepted"),
        Some(error) => println!("Push channel: failed ({error})"),
    }
    println!(
        "Sitemap ping: {}",
        if outcome.sitemap_registered {
            "sent"
        } else {
            "skipped"
        }
    );

    super::export_metrics(&config);
    Ok(())
}
