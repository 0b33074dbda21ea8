//! Run outcomes and the end-of-run summary
//!
//! Every fragment ends in exactly one `FragmentOutcome`; every exceptional
//! outcome also leaves a `RunIssue` so nothing is dropped without a trace.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Per-fragment outcome classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentOutcome {
    /// Merged into a newly created canonical mission
    Imported,
    /// Merged into an existing canonical mission, overwritten in place
    Updated,
    /// Owner not present in the identity map
    SkippedUnmapped,
    /// Row unusable before consolidation (no external person id)
    SkippedInvalid,
    /// Recovered fragment already present in its group
    Duplicate,
    /// Persistence failure or inconsistent merge
    Error,
}

/// Severity of a run issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    /// Recorded, nothing skipped
    Warning,
    /// Row skipped, run continues
    Skip,
    /// Row failed, run continues
    Error,
}

/// One exceptional event during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIssue {
    /// Sheet row number when the issue is tied to one row (0 otherwise)
    pub row_number: usize,

    /// Short machine code (e.g. "UNMAPPED", "PERSIST_ERROR")
    pub code: String,

    pub message: String,

    pub severity: IssueSeverity,

    pub occurred_at: DateTime<Utc>,
}

impl RunIssue {
    pub fn warning(row_number: usize, code: &str, message: String) -> Self {
        Self::new(row_number, code, message, IssueSeverity::Warning)
    }

    pub fn skip(row_number: usize, code: &str, message: String) -> Self {
        Self::new(row_number, code, message, IssueSeverity::Skip)
    }

    pub fn error(row_number: usize, code: &str, message: String) -> Self {
        Self::new(row_number, code, message, IssueSeverity::Error)
    }

    fn new(row_number: usize, code: &str, message: String, severity: IssueSeverity) -> Self {
        Self {
            row_number,
            code: code.to_string(),
            message,
            severity,
            occurred_at: Utc::now(),
        }
    }
}

/// Consultant whose mission history starts after their company entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruncatedHistory {
    pub consultant_id: Uuid,
    pub external_id: String,
    pub name: String,
    pub contract_date: NaiveDate,
    pub earliest_mission_start: NaiveDate,
}

/// End-of-run tally
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub dry_run: bool,

    // Fragment outcomes
    pub imported: usize,
    pub updated: usize,
    pub skipped_unmapped: usize,
    pub skipped_invalid: usize,
    pub duplicate: usize,
    pub error: usize,

    // Canonical missions written
    pub missions_created: usize,
    pub missions_updated: usize,

    // People
    pub managers_written: usize,
    pub managers_dropped: usize,
    pub consultants_written: usize,
    pub persons_skipped: usize,
    pub person_errors: usize,

    /// Fields present in the export but degraded to null
    pub field_issues: usize,

    pub truncated_history: Vec<TruncatedHistory>,

    pub issues: Vec<RunIssue>,

    pub duration_seconds: u64,
}

impl ImportSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Count one fragment outcome
    pub fn record(&mut self, outcome: FragmentOutcome) {
        match outcome {
            FragmentOutcome::Imported => self.imported += 1,
            FragmentOutcome::Updated => self.updated += 1,
            FragmentOutcome::SkippedUnmapped => self.skipped_unmapped += 1,
            FragmentOutcome::SkippedInvalid => self.skipped_invalid += 1,
            FragmentOutcome::Duplicate => self.duplicate += 1,
            FragmentOutcome::Error => self.error += 1,
        }
    }

    pub fn push_issue(&mut self, issue: RunIssue) {
        self.issues.push(issue);
    }

    /// Total fragments accounted for
    pub fn fragments_seen(&self) -> usize {
        self.imported
            + self.updated
            + self.skipped_unmapped
            + self.skipped_invalid
            + self.duplicate
            + self.error
    }

    /// True when any row-level error happened (drives the exit code)
    pub fn has_errors(&self) -> bool {
        self.error > 0 || self.person_errors > 0
    }

    pub fn count_by_severity(&self, severity: IssueSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "Import summary (dry run, nothing committed)")?;
        } else {
            writeln!(f, "Import summary")?;
        }
        writeln!(f, "  Mission fragments:   {}", self.fragments_seen())?;
        writeln!(f, "    imported:          {}", self.imported)?;
        writeln!(f, "    updated:           {}", self.updated)?;
        writeln!(f, "    skipped (unmapped): {}", self.skipped_unmapped)?;
        writeln!(f, "    skipped (invalid): {}", self.skipped_invalid)?;
        writeln!(f, "    duplicate:         {}", self.duplicate)?;
        writeln!(f, "    error:             {}", self.error)?;
        writeln!(
            f,
            "  Canonical missions:  {} created, {} updated",
            self.missions_created, self.missions_updated
        )?;
        writeln!(
            f,
            "  People:              {} consultants, {} managers ({} dropped), {} skipped, {} errors",
            self.consultants_written,
            self.managers_written,
            self.managers_dropped,
            self.persons_skipped,
            self.person_errors
        )?;
        writeln!(f, "  Field issues:        {}", self.field_issues)?;
        writeln!(
            f,
            "  Run issues:          {} errors, {} skipped, {} warnings",
            self.count_by_severity(IssueSeverity::Error),
            self.count_by_severity(IssueSeverity::Skip),
            self.count_by_severity(IssueSeverity::Warning)
        )?;
        if !self.truncated_history.is_empty() {
            writeln!(f, "  Possible truncated history:")?;
            for flag in &self.truncated_history {
                writeln!(
                    f,
                    "    {} ({}): joined {}, earliest mission {}",
                    flag.name, flag.external_id, flag.contract_date, flag.earliest_mission_start
                )?;
            }
        }
        write!(f, "  Duration:            {}s", self.duration_seconds)
    }
}
