//! Persistent state for the indexing engine
//!
//! SQLite is the single backing store: tracking records, daily channel
//! usage, job bookkeeping and the synced content catalog live in one file,
//! so a deployment is a binary plus a database path.

pub mod tracking;

pub use tracking::{SharedTrackingStore, TrackingStore};
