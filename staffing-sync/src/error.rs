//! Error types for staffing-sync
//!
//! Fatal errors (`SourceUnavailable`, `SheetNotFound`, `ResetNotConfirmed`,
//! database failures while opening the store) abort the run. Row-level
//! problems never surface as `SyncError` from the pipeline; they are counted
//! in the run summary instead. `MissingExternalId` is only returned by the
//! normalizer, which the pipeline turns into a skipped row.

use std::path::PathBuf;
use thiserror::Error;

/// Sync error type
#[derive(Debug, Error)]
pub enum SyncError {
    /// Workbook missing or unreadable
    #[error("Source workbook unavailable: {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// Named sheet absent from the workbook
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Mission row without external person identifier
    #[error("Mission row {row} has no external person identifier")]
    MissingExternalId { row: usize },

    /// Full reset requested without the separate confirmation flag
    #[error("Full reset requested without --confirm-reset; refusing to drop tables")]
    ResetNotConfirmed,

    /// Store or configuration failure outside any single row
    #[error("Common error: {0}")]
    Common(#[from] staffing_common::Error),
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
