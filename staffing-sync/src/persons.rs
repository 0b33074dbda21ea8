//! Person persistence
//!
//! Writes the classified roster: business managers first, then consultants
//! with their manager link. Every person is upserted on email, so reruns
//! update people in place. Rows without a usable identity are skipped; a
//! failed write is recorded and the run continues.

use crate::classifier::{display_name_key, ClassifiedPeople};
use crate::context::RunContext;
use crate::db::consultants::{link_consultant_to_manager, save_consultant};
use crate::db::managers::save_manager;
use crate::error::SyncResult;
use crate::identity::normalize_email;
use crate::models::{ExternalPersonRow, RawValue, RunIssue};
use crate::normalizer::{parse_amount, parse_date};
use crate::utils::BatchWriter;
use chrono::NaiveDate;
use staffing_common::db::{BusinessManager, Consultant};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ACTIVE_LABELS: [&str; 8] = ["actif", "active", "oui", "yes", "true", "1", "o", "y"];
const INACTIVE_LABELS: [&str; 7] = ["inactif", "inactive", "non", "no", "false", "0", "n"];

/// Interpreted `UseActive` label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveFlag {
    Known(bool),
    /// Absent from the export; treated as active
    Missing,
    /// Unrecognized text; treated as active
    Unrecognized,
}

impl ActiveFlag {
    pub fn is_active(self) -> bool {
        match self {
            ActiveFlag::Known(active) => active,
            ActiveFlag::Missing | ActiveFlag::Unrecognized => true,
        }
    }
}

pub fn parse_active_label(value: &RawValue) -> ActiveFlag {
    match value {
        RawValue::Bool(b) => ActiveFlag::Known(*b),
        _ => match value.as_text().map(|t| t.to_lowercase()) {
            None => ActiveFlag::Missing,
            Some(label) if ACTIVE_LABELS.contains(&label.as_str()) => ActiveFlag::Known(true),
            Some(label) if INACTIVE_LABELS.contains(&label.as_str()) => ActiveFlag::Known(false),
            Some(_) => ActiveFlag::Unrecognized,
        },
    }
}

/// Source email, or `first.last@domain` when the export has none
pub fn derive_email(row: &ExternalPersonRow, default_domain: &str) -> Option<String> {
    if let Some(email) = row.email.as_text() {
        return Some(normalize_email(&email));
    }

    let slug = |value: &RawValue| {
        value.as_text().map(|s| {
            s.to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("-")
        })
    };

    match (slug(&row.firstname), slug(&row.lastname)) {
        (Some(first), Some(last)) => Some(format!("{}.{}@{}", first, last, default_domain)),
        _ => None,
    }
}

/// Consultant written by this run, kept for history checks
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedConsultant {
    pub consultant_id: Uuid,
    pub external_id: Option<String>,
    pub name: String,
    pub contract_date: Option<NaiveDate>,
}

fn names(row: &ExternalPersonRow) -> (String, String) {
    (
        row.lastname.as_text().unwrap_or_default(),
        row.firstname.as_text().unwrap_or_default(),
    )
}

fn active_flag(row: &ExternalPersonRow, ctx: &mut RunContext) -> bool {
    let flag = parse_active_label(&row.active_label);
    if flag == ActiveFlag::Unrecognized {
        let message = format!(
            "Unrecognized active label {:?} for {}; treated as active",
            row.active_label.as_text().unwrap_or_default(),
            row.display_name()
        );
        warn!(row = row.row_number, "{}", message);
        ctx.summary
            .push_issue(RunIssue::warning(row.row_number, "ACTIVE_LABEL", message));
    }
    flag.is_active()
}

fn skip_person(row: &ExternalPersonRow, ctx: &mut RunContext) {
    let message = format!(
        "Person {:?} has neither email nor first and last name; skipped",
        row.display_name()
    );
    warn!(row = row.row_number, "{}", message);
    ctx.summary.persons_skipped += 1;
    ctx.summary
        .push_issue(RunIssue::skip(row.row_number, "NO_IDENTITY", message));
}

fn person_error(row: &ExternalPersonRow, ctx: &mut RunContext, error: impl std::fmt::Display) {
    let message = format!("Failed to persist {}: {}", row.display_name(), error);
    warn!(row = row.row_number, "{}", message);
    ctx.summary.person_errors += 1;
    ctx.summary
        .push_issue(RunIssue::error(row.row_number, "PERSON_ERROR", message));
}

/// Persist managers, consultants and their links
///
/// Returns the consultants written, in roster order.
pub async fn persist_people(
    writer: &mut BatchWriter<'_>,
    people: &ClassifiedPeople,
    ctx: &mut RunContext,
) -> SyncResult<Vec<PersistedConsultant>> {
    ctx.summary.managers_dropped = people.dropped_managers.len();

    let domain = ctx.config.default_email_domain.clone();
    let mut managers_by_name: HashMap<String, Uuid> = HashMap::new();

    for row in &people.managers {
        let Some(email) = derive_email(row, &domain) else {
            skip_person(row, ctx);
            continue;
        };
        let (last_name, first_name) = names(row);

        let mut manager = BusinessManager::new(last_name, first_name, email);
        manager.phone = row.mobile_number.as_text();
        manager.active = active_flag(row, ctx);

        match save_manager(writer.conn()?, &manager).await {
            Ok(guid) => {
                debug!(row = row.row_number, %guid, "Business manager saved");
                managers_by_name.insert(display_name_key(&row.display_name()), guid);
                ctx.summary.managers_written += 1;
                writer.record_success(1).await?;
            }
            Err(e) => person_error(row, ctx, e),
        }
    }

    let mut persisted = Vec::with_capacity(people.consultants.len());

    for row in &people.consultants {
        let Some(email) = derive_email(row, &domain) else {
            skip_person(row, ctx);
            continue;
        };
        let (last_name, first_name) = names(row);

        let mut consultant = Consultant::new(last_name, first_name, email);
        consultant.phone = row.mobile_number.as_text();
        consultant.active = active_flag(row, ctx);
        consultant.company = row.entity.as_text();

        let mut issues = Vec::new();
        consultant.contract_date = parse_date(&row.contract_date).into_option("contract_date", &mut issues);
        consultant.salary = parse_amount(&row.salary).into_option("Salaire", &mut issues);
        for issue in &issues {
            debug!(row = row.row_number, field = issue.field, reason = %issue.reason, "Field degraded to null");
        }
        ctx.summary.field_issues += issues.len();

        let consultant_id = match save_consultant(writer.conn()?, &consultant).await {
            Ok(guid) => guid,
            Err(e) => {
                person_error(row, ctx, e);
                continue;
            }
        };

        if let Some(manager_name) = row.manager_name.as_text() {
            match managers_by_name.get(&display_name_key(&manager_name)) {
                Some(&manager_id) => {
                    let since = consultant.contract_date.unwrap_or(ctx.today);
                    if let Err(e) =
                        link_consultant_to_manager(writer.conn()?, consultant_id, manager_id, since).await
                    {
                        person_error(row, ctx, e);
                        continue;
                    }
                }
                None => {
                    warn!(
                        row = row.row_number,
                        manager = %manager_name,
                        "Manager named by consultant was not materialized; no link written"
                    );
                }
            }
        }

        ctx.summary.consultants_written += 1;
        writer.record_success(1).await?;

        persisted.push(PersistedConsultant {
            consultant_id,
            external_id: row.external_id(),
            name: row.display_name(),
            contract_date: consultant.contract_date,
        });
    }

    info!(
        "People persisted: {} managers, {} consultants, {} skipped, {} errors",
        ctx.summary.managers_written,
        ctx.summary.consultants_written,
        ctx.summary.persons_skipped,
        ctx.summary.person_errors
    );

    Ok(persisted)
}
