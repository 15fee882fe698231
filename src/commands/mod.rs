pub mod inspect;
pub mod retry;
pub mod submit;
pub mod summary;
pub mod sync;

// Re-export command functions for convenience
pub use inspect::inspect;
pub use retry::retry;
pub use submit::submit;
pub use summary::summary;
pub use sync::sync;

use indexwatch::config::Config;
use indexwatch::metrics;

/// Flush metrics to the configured textfile, if any. Export failures are
/// logged and never fail the command.
pub(crate) fn export_metrics(config: &Config) {
    if let Some(path) = &config.metrics.textfile_path {
        if let Err(e) = metrics::write_textfile(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics textfile");
        }
    }
}
