use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use indexwatch::config::Config;
use indexwatch::engine::{ReconcileEngine, RetryOptions};
use indexwatch::metrics;

pub async fn retry(
    config: Config,
    site: String,
    max_urls: Option<usize>,
    budget_ms: Option<u64>,
) -> Result<()> {
    println!("Retry Stale and Failed Submissions");
    println!("==================================");

    let config = Arc::new(config);
    let engine = ReconcileEngine::from_config(Arc::clone(&config))?;

    let mut options = RetryOptions::default();
    if let Some(max) = max_urls {
        options = options.with_max_urls(max);
    }
    if let Some(ms) = budget_ms {
        options = options.with_budget(Duration::from_millis(ms));
    }

    let timer = metrics::start_retry_timer(&site);
    let outcome = engine
        .retry_stale_and_failed(&site, options, Utc::now())
        .await?;
    drop(timer);
    metrics::record_retry_run(
        &site,
        outcome.succeeded,
        outcome.errors.len(),
        outcome.budget_exhausted,
    );

    println!("Site: {site}");
    println!("Selected: {}", outcome.selected);
    println!("Sent to push channel: {}", outcome.retried);
    println!("Marked submitted: {}", outcome.succeeded);
    if outcome.budget_exhausted {
        println!("Stopped early: wall-clock budget exhausted");
    }

    if !outcome.errors.is_empty() {
        println!("\nErrors ({})", outcome.errors.len());
        println!("------");
        for error in &outcome.errors {
            println!("  {error}");
        }
    }

    super::export_metrics(&config);
    Ok(())
}
