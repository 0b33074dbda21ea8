//! Validated mission fragments
//!
//! A fragment is one external mission row after normalization. Several
//! fragments (one per contract amendment) usually describe the same
//! engagement; the consolidator merges them.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// Sentinel client name used when the export leaves it blank
pub const UNKNOWN_CLIENT: &str = "Client non spécifié";

/// Status every fragment carries at load time
pub const FRAGMENT_STATUS: &str = "active";

/// Field names used in field issues (the export's column names)
pub const START_DATE_FIELD: &str = "DateDebutMission";
pub const END_DATE_FIELD: &str = "DateFinMission";
pub const DAILY_RATE_FIELD: &str = "TJM";
pub const MARGIN_RATE_FIELD: &str = "CJM";

/// Result of interpreting one loosely-typed field
///
/// `Absent` and `Invalid` both degrade to null downstream; only `Invalid`
/// is reported as a field issue.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome<T> {
    Parsed(T),
    Absent,
    Invalid(String),
}

impl<T> FieldOutcome<T> {
    /// Keep the parsed value, recording `Invalid` reasons under `field`
    pub fn into_option(self, field: &'static str, issues: &mut Vec<FieldIssue>) -> Option<T> {
        match self {
            FieldOutcome::Parsed(value) => Some(value),
            FieldOutcome::Absent => None,
            FieldOutcome::Invalid(reason) => {
                issues.push(FieldIssue { field, reason });
                None
            }
        }
    }
}

/// A present-but-unusable field that was degraded to null
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: &'static str,
    pub reason: String,
}

/// Typed, validated form of one mission row
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMissionFragment {
    /// Sheet row the fragment came from; orders ties during consolidation
    pub row_number: usize,
    /// Never empty
    pub external_person_id: String,
    /// Filled by the consolidator from the identity map
    pub consultant_id: Option<Uuid>,
    /// Never empty (synthesized when the export has none)
    pub mission_code: String,
    /// Never empty (synthesized when the export has none)
    pub order_id: String,
    pub client_name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Non-negative when present; unknown is `None`, never zero
    pub daily_rate: Option<f64>,
    /// Non-negative when present
    pub margin_rate: Option<f64>,
    pub description: Option<String>,
    pub status: String,
    pub issues: Vec<FieldIssue>,
}

impl ValidatedMissionFragment {
    pub fn has_known_client(&self) -> bool {
        self.client_name != UNKNOWN_CLIENT
    }

    /// No end date in the export at all
    ///
    /// An end that was present but unusable (garbage, or before the start)
    /// says the engagement has an end we could not read, not that it is open.
    pub fn is_open_ended(&self) -> bool {
        self.end_date.is_none() && !self.issues.iter().any(|i| i.field == END_DATE_FIELD)
    }
}
