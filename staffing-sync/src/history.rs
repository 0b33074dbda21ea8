//! Truncated-history detection
//!
//! Flags consultants whose earliest known mission starts after they joined
//! the company. Such gaps usually mean the export dropped older fragments.

use crate::consolidator::ConsolidatedGroup;
use crate::models::TruncatedHistory;
use crate::persons::PersistedConsultant;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Earliest fragment start per consultant across all groups
fn earliest_starts(groups: &[ConsolidatedGroup]) -> HashMap<Uuid, NaiveDate> {
    let mut earliest: HashMap<Uuid, NaiveDate> = HashMap::new();

    for consolidated in groups {
        let group = &consolidated.group;
        if let Some(start) = group.fragments.iter().filter_map(|f| f.start_date).min() {
            earliest
                .entry(group.consultant_id)
                .and_modify(|current| *current = (*current).min(start))
                .or_insert(start);
        }
    }

    earliest
}

/// Consultants whose first mission trails their contract date by more than
/// `grace_days`
///
/// Consultants without a contract date or without any dated mission are not
/// flagged.
pub fn detect_truncated_history(
    consultants: &[PersistedConsultant],
    groups: &[ConsolidatedGroup],
    grace_days: i64,
) -> Vec<TruncatedHistory> {
    let earliest = earliest_starts(groups);
    let grace = Duration::try_days(grace_days).unwrap_or(Duration::MAX);

    consultants
        .iter()
        .filter_map(|consultant| {
            let contract_date = consultant.contract_date?;
            let first_mission = *earliest.get(&consultant.consultant_id)?;

            if first_mission - contract_date <= grace {
                return None;
            }

            warn!(
                consultant_id = %consultant.consultant_id,
                name = %consultant.name,
                %contract_date,
                %first_mission,
                "Earliest mission starts after contract date; history may be truncated"
            );

            Some(TruncatedHistory {
                consultant_id: consultant.consultant_id,
                external_id: consultant.external_id.clone().unwrap_or_default(),
                name: consultant.name.clone(),
                contract_date,
                earliest_mission_start: first_mission,
            })
        })
        .collect()
}
