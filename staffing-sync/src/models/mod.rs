//! Data models for staffing-sync
//!
//! - Raw rows as read from the VSA workbook
//! - Validated mission fragments
//! - Per-fragment outcomes and the run summary

pub mod fragment;
pub mod rows;
pub mod summary;

pub use fragment::{
    FieldIssue, FieldOutcome, ValidatedMissionFragment, DAILY_RATE_FIELD, END_DATE_FIELD,
    FRAGMENT_STATUS, MARGIN_RATE_FIELD, START_DATE_FIELD, UNKNOWN_CLIENT,
};
pub use rows::{is_placeholder, ExternalMissionRow, ExternalPersonRow, RawValue};
pub use summary::{FragmentOutcome, ImportSummary, IssueSeverity, RunIssue, TruncatedHistory};
