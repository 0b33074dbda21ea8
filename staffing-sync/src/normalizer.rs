//! Field Validator / Normalizer
//!
//! Turns one raw mission row into a `ValidatedMissionFragment`. Every field is
//! interpreted independently and yields an explicit `FieldOutcome`; bad data
//! degrades to null or a sentinel instead of failing the row. The only
//! row-fatal condition is a missing external person identifier.
//!
//! # Field rules
//! - **Mission code**: trimmed; blank or placeholder → `VSA-{person}-{order}`
//! - **Order id**: trimmed; blank → `ORDER-{person}`
//! - **Client**: trimmed; blank → `"Client non spécifié"`
//! - **Dates**: spreadsheet dates, Excel serials, or common text formats
//! - **Rates**: non-negative numbers; unknown is null, never zero
//! - **Description**: up to four free-text fields, deduplicated, joined

use crate::error::{SyncError, SyncResult};
use crate::models::{
    is_placeholder, ExternalMissionRow, FieldIssue, FieldOutcome, RawValue,
    ValidatedMissionFragment, DAILY_RATE_FIELD, END_DATE_FIELD, FRAGMENT_STATUS,
    MARGIN_RATE_FIELD, START_DATE_FIELD, UNKNOWN_CLIENT,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::debug;

/// Separator between description parts
pub const DESCRIPTION_SEPARATOR: &str = " | ";

/// Text date formats accepted, tried in order
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// Excel serial dates count days from 1899-12-30
fn excel_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Interpret a cell as a calendar date
pub fn parse_date(value: &RawValue) -> FieldOutcome<NaiveDate> {
    if value.is_blank() {
        return FieldOutcome::Absent;
    }

    match value {
        RawValue::DateTime(dt) => FieldOutcome::Parsed(dt.date()),
        RawValue::Number(serial) => {
            // Plausible serial range: 1900-01-01 .. 2173-10-14
            if serial.fract() == 0.0 && (1.0..=100_000.0).contains(serial) {
                FieldOutcome::Parsed(excel_epoch() + Duration::days(*serial as i64))
            } else {
                FieldOutcome::Invalid(format!("not a date serial: {}", serial))
            }
        }
        RawValue::Text(text) => {
            let text = text.trim();
            for format in DATE_FORMATS {
                if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                    return FieldOutcome::Parsed(date);
                }
            }
            for format in DATETIME_FORMATS {
                if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
                    return FieldOutcome::Parsed(dt.date());
                }
            }
            FieldOutcome::Invalid(format!("unrecognized date: {:?}", text))
        }
        RawValue::Bool(b) => FieldOutcome::Invalid(format!("boolean is not a date: {}", b)),
        RawValue::Empty => FieldOutcome::Absent,
    }
}

/// Interpret a cell as a non-negative amount
///
/// Accepts numeric text with a comma decimal separator, inner spaces and a
/// euro sign ("1 250,50 €").
pub fn parse_amount(value: &RawValue) -> FieldOutcome<f64> {
    if value.is_blank() {
        return FieldOutcome::Absent;
    }

    let number = match value {
        RawValue::Number(n) => *n,
        RawValue::Text(text) => {
            let cleaned: String = text
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '€')
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            match cleaned.parse::<f64>() {
                Ok(n) => n,
                Err(_) => return FieldOutcome::Invalid(format!("not a number: {:?}", text.trim())),
            }
        }
        other => return FieldOutcome::Invalid(format!("not a number: {:?}", other)),
    };

    if !number.is_finite() {
        FieldOutcome::Invalid(format!("not a finite number: {}", number))
    } else if number < 0.0 {
        FieldOutcome::Invalid(format!("negative amount: {}", number))
    } else {
        FieldOutcome::Parsed(number)
    }
}

/// First present value wins; an invalid first column is still reported
fn first_amount(
    primary: &RawValue,
    secondary: &RawValue,
    field: &'static str,
    issues: &mut Vec<FieldIssue>,
) -> Option<f64> {
    match parse_amount(primary) {
        FieldOutcome::Parsed(n) => Some(n),
        FieldOutcome::Absent => parse_amount(secondary).into_option(field, issues),
        FieldOutcome::Invalid(reason) => {
            issues.push(FieldIssue { field, reason });
            parse_amount(secondary).into_option(field, issues)
        }
    }
}

/// Concatenate free-text parts, skipping blanks and exact duplicates
pub fn build_description(parts: &[&RawValue]) -> Option<String> {
    let mut kept: Vec<String> = Vec::new();

    for part in parts {
        if let Some(text) = part.as_text() {
            if !is_placeholder(&text) && !kept.contains(&text) {
                kept.push(text);
            }
        }
    }

    if kept.is_empty() {
        None
    } else {
        Some(kept.join(DESCRIPTION_SEPARATOR))
    }
}

/// Normalize one mission row
///
/// Fails only with `SyncError::MissingExternalId`.
pub fn normalize(row: &ExternalMissionRow) -> SyncResult<ValidatedMissionFragment> {
    let person_id = row
        .user_id
        .as_text()
        .ok_or(SyncError::MissingExternalId { row: row.row_number })?;

    let mut issues = Vec::new();

    let order_id = row
        .order_id
        .as_text()
        .unwrap_or_else(|| format!("ORDER-{}", person_id));

    let mission_code = row
        .code
        .as_text()
        .unwrap_or_else(|| format!("VSA-{}-{}", person_id, order_id));

    let client_name = row
        .client_name
        .as_text()
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    let start_date = parse_date(&row.start_date).into_option(START_DATE_FIELD, &mut issues);
    let mut end_date = parse_date(&row.end_date).into_option(END_DATE_FIELD, &mut issues);

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            issues.push(FieldIssue {
                field: END_DATE_FIELD,
                reason: format!("end {} precedes start {}", end, start),
            });
            end_date = None;
        }
    }

    let daily_rate = parse_amount(&row.tjm).into_option(DAILY_RATE_FIELD, &mut issues);
    let margin_rate = first_amount(&row.cjm_f1, &row.cjm_f2, MARGIN_RATE_FIELD, &mut issues);

    let description = build_description(&[
        &row.title,
        &row.header_description,
        &row.summary,
        &row.description,
    ]);

    for issue in &issues {
        debug!(
            row = row.row_number,
            field = issue.field,
            reason = %issue.reason,
            "Field degraded to null"
        );
    }

    Ok(ValidatedMissionFragment {
        row_number: row.row_number,
        external_person_id: person_id,
        consultant_id: None,
        mission_code,
        order_id,
        client_name,
        start_date,
        end_date,
        daily_rate,
        margin_rate,
        description,
        status: FRAGMENT_STATUS.to_string(),
        issues,
    })
}
