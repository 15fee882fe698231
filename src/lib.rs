//! indexwatch - Search-engine indexing reconciliation
//!
//! Tracks every publishable URL of a site through discovery, submission and
//! verification, and reconciles the recorded state against what the search
//! engine actually reports.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures and types
//! - [`resolver`] - Effective-status resolution for tracking records
//! - [`storage`] - Tracking store operations (SQLite)
//! - [`discovery`] - URL enumeration from published content
//! - [`channels`] - Push, sitemap and inspection channel adapters
//! - [`engine`] - The reconciliation orchestrator
//! - [`summary`] - Cross-cutting indexing aggregate
//! - [`blockers`] - Indexing blocker diagnostics
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use indexwatch::config::Config;
//! use indexwatch::engine::ReconcileEngine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(Config::from_env()?);
//!     let engine = ReconcileEngine::from_config(config)?;
//!     let outcome = engine.sync_to_tracking("forge-main", chrono::Utc::now()).await?;
//!     println!("created {} records", outcome.created);
//!     Ok(())
//! }
//! ```

pub mod blockers;
pub mod channels;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod models;
pub mod resolver;
pub mod storage;
pub mod summary;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::blockers::{Blocker, Severity};
    pub use crate::config::Config;
    pub use crate::engine::{ReconcileEngine, RetryOptions, RetryOutcome};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{ChannelKind, IndexStatus, ResolvedStatus, TrackingRecord};
    pub use crate::storage::{SharedTrackingStore, TrackingStore};
    pub use crate::summary::{IndexingSummary, SummaryComputer};
}

// Direct re-exports for convenience
pub use models::{ChannelKind, IndexStatus, ResolvedStatus, TrackingRecord};
