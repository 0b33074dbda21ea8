//! staffing-sync library
//!
//! Reconciles the VSA HR extract (person roster plus mission history) into
//! business managers, consultants and canonical missions.

pub mod classifier;
pub mod config;
pub mod consolidator;
pub mod context;
pub mod db;
pub mod error;
pub mod history;
pub mod identity;
pub mod loader;
pub mod models;
pub mod normalizer;
pub mod persons;
pub mod pipeline;
pub mod utils;

pub use config::{CliOverrides, ImportConfig};
pub use error::{SyncError, SyncResult};
pub use models::ImportSummary;
pub use pipeline::{run_import, run_with_records};
