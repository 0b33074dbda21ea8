//! Per-run state
//!
//! Passed by reference through every stage instead of living in globals:
//! configuration, the reference date, the identity map and the summary.

use crate::config::ImportConfig;
use crate::identity::IdentityMap;
use crate::models::{FragmentOutcome, ImportSummary, RunIssue};
use chrono::NaiveDate;

pub struct RunContext {
    pub config: ImportConfig,
    /// Reference date for mission status and default link dates
    pub today: NaiveDate,
    /// Empty until people are persisted
    pub identity_map: IdentityMap,
    pub summary: ImportSummary,
}

impl RunContext {
    pub fn new(config: ImportConfig, today: NaiveDate) -> Self {
        let summary = ImportSummary::new(config.dry_run);
        Self {
            config,
            today,
            identity_map: IdentityMap::new(),
            summary,
        }
    }

    /// Count a fragment outcome together with the issue explaining it
    pub fn record_with_issue(&mut self, outcome: FragmentOutcome, issue: RunIssue) {
        self.summary.record(outcome);
        self.summary.push_issue(issue);
    }
}
