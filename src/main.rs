use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use indexwatch::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "indexwatch",
    version,
    about = "Search-engine indexing tracker for published content",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// TOML config file; environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create tracking records for newly published URLs
    Sync {
        /// Site identifier from the configuration
        #[arg(short, long)]
        site: String,
    },

    /// Resubmit stale and failed URLs under a wall-clock budget
    Retry {
        /// Site identifier from the configuration
        #[arg(short, long)]
        site: String,

        /// Cap on URLs handled in this run
        #[arg(short, long)]
        max_urls: Option<usize>,

        /// Wall-clock budget in milliseconds
        #[arg(long)]
        budget_ms: Option<u64>,
    },

    /// Submit one URL to the push channel right away
    Submit {
        /// Site identifier from the configuration
        #[arg(short, long)]
        site: String,

        /// Absolute URL on the site's domain
        url: String,
    },

    /// Refresh indexing verdicts from the inspection channel
    Inspect {
        /// Site identifier from the configuration
        #[arg(short, long)]
        site: String,

        /// Cap on URLs inspected in this run
        #[arg(short, long, default_value = "20")]
        max_urls: usize,
    },

    /// Print the indexing summary for a site
    Summary {
        /// Site identifier from the configuration
        #[arg(short, long)]
        site: String,

        /// Emit JSON instead of text
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    setup_tracing(&cli.log_format, cli.verbose)?;

    tracing::info!("indexwatch starting");

    let config = load_config(cli.config.as_deref())?;

    if let Err(e) = indexwatch::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics registry init failed, metrics disabled");
    }

    match cli.command {
        Commands::Sync { site } => {
            tracing::info!(site = %site, "Starting sync command");
            commands::sync(config, site).await?;
        }

        Commands::Retry {
            site,
            max_urls,
            budget_ms,
        } => {
            tracing::info!(
                site = %site,
                max_urls = ?max_urls,
                budget_ms = ?budget_ms,
                "Starting retry command"
            );
            commands::retry(config, site, max_urls, budget_ms).await?;
        }

        Commands::Submit { site, url } => {
            tracing::info!(
                site = %site,
                url = %url,
                "Starting submit command"
            );
            commands::submit(config, site, url).await?;
        }

        Commands::Inspect { site, max_urls } => {
            tracing::info!(
                site = %site,
                max_urls = %max_urls,
                "Starting inspect command"
            );
            commands::inspect(config, site, max_urls).await?;
        }

        Commands::Summary { site, json } => {
            tracing::info!(
                site = %site,
                json = %json,
                "Starting summary command"
            );
            commands::summary(config, site, json).await?;
        }
    }

    tracing::info!("indexwatch completed successfully");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("indexwatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("indexwatch=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
