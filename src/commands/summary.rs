use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use indexwatch::config::Config;
use indexwatch::engine::ReconcileEngine;
use indexwatch::metrics;
use indexwatch::summary::IndexingSummary;

pub async fn summary(config: Config, site: String, json: bool) -> Result<()> {
    let config = Arc::new(config);
    let engine = ReconcileEngine::from_config(Arc::clone(&config))?;

    let summary = engine.summary(&site, Utc::now()).await?;

    metrics::set_summary_gauges(&summary);
    match engine.store().status_state_counts(&site) {
        Ok(counts) => metrics::set_tracking_status_counts(&site, &counts),
        Err(e) => tracing::warn!(site = %site, error = %e, "Status counts unavailable"),
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_report(&summary);
    }

    super::export_metrics(&config);
    Ok(())
}

fn print_report(summary: &IndexingSummary) {
    println!("Indexing Summary");
    println!("================");
    println!("Site: {}", summary.site_id);
    println!("Generated: {}", summary.generated_at.to_rfc3339());

    println!("\nStatus Buckets");
    println!("--------------");
    println!("Total tracked: {}", summary.total);
    println!("  Indexed:          {}", summary.indexed);
    println!("  Submitted:        {}", summary.submitted);
    println!("  Discovered:       {}", summary.discovered);
    println!("  Never submitted:  {}", summary.never_submitted);
    println!("  Errors:           {}", summary.errors);
    println!("  Deindexed:        {}", summary.deindexed);
    println!("  Chronic failures: {}", summary.chronic_failures);

    println!("\nCoverage");
    println!("--------");
    println!("Published URLs: {}", summary.published_count);
    println!("Tracked URLs:   {}", summary.tracked_count);
    println!("Stale submissions: {}", summary.stale_count);

    println!("\nVelocity");
    println!("--------");
    println!("Indexed last 7 days:  {}", summary.indexed_last_7d);
    println!("Indexed prior 7 days: {}", summary.indexed_prior_7d);
    println!("Trend: {}", summary.trend);
    match summary.avg_days_to_index {
        Some(days) => println!("Avg days to index: {days:.1}"),
        None => println!("Avg days to index: insufficient data"),
    }

    println!("\nChannels");
    println!("--------");
    println!("Submitted via push:    {}", summary.submitted_push);
    println!("Submitted via sitemap: {}", summary.submitted_sitemap);
    println!("Inspected:             {}", summary.inspected);
    println!(
        "Push quota: {} of {} used today, {} remaining",
        summary.quota.used_today, summary.quota.daily_limit, summary.quota.remaining
    );

    println!("\nContent");
    println!("-------");
    println!("Thin pages: {}", summary.thin_content);
    println!("Hreflang mismatches: {}", summary.hreflang_mismatches);

    if summary.blockers.is_empty() {
        println!("\nNo blockers");
    } else {
        println!("\nBlockers ({})", summary.blockers.len());
        println!("--------");
        for blocker in &summary.blockers {
            println!(
                "  [{}] {}: {}",
                blocker.severity, blocker.reason, blocker.count
            );
        }
    }
}
