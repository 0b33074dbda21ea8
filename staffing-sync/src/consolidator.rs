//! Consolidator
//!
//! Collapses the many fragments describing one engagement into a single
//! canonical mission per (consultant, mission code):
//!
//! 1. Resolve each fragment's owner through the identity map (unmapped
//!    fragments are skipped and logged)
//! 2. Group by (consultant id, mission code), keeping first-seen order
//! 3. Insert configured recovered fragments, skipping ones already present
//! 4. Merge each group: earliest start, latest end, rate of the latest-start
//!    fragment
//! 5. Upsert the canonical mission; every fragment of the group shares the
//!    group's outcome
//!
//! Merging is pure and deterministic, so running it twice over the same input
//! yields identical canonical values.

use crate::context::RunContext;
use crate::db::missions::{upsert_mission, UpsertOutcome};
use crate::error::SyncResult;
use crate::models::{
    ExternalMissionRow, FragmentOutcome, RawValue, RunIssue, ValidatedMissionFragment,
    UNKNOWN_CLIENT,
};
use crate::utils::BatchWriter;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use staffing_common::db::{CanonicalMission, MissionStatus};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Mission fragment missing from the export, re-inserted from configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecoveredFragment {
    pub external_person_id: String,
    pub mission_code: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub daily_rate: Option<f64>,
}

impl RecoveredFragment {
    /// Raw row equivalent, so recovered data goes through the normalizer
    /// like any exported row. Row number 0 ranks it before every sheet row.
    pub fn to_row(&self) -> ExternalMissionRow {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .map(RawValue::text)
                .unwrap_or_default()
        };
        let date = |value: Option<NaiveDate>| {
            value
                .map(|d| RawValue::DateTime(d.and_time(NaiveTime::MIN)))
                .unwrap_or_default()
        };

        ExternalMissionRow {
            row_number: 0,
            user_id: RawValue::text(&self.external_person_id),
            order_id: text(&self.order_id),
            code: RawValue::text(&self.mission_code),
            client_name: text(&self.client_name),
            start_date: date(self.start_date),
            end_date: date(self.end_date),
            tjm: self.daily_rate.map(RawValue::Number).unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// Fragments sharing one (consultant, mission code)
#[derive(Debug, Clone, PartialEq)]
pub struct MissionGroup {
    pub consultant_id: Uuid,
    pub mission_code: String,
    pub fragments: Vec<ValidatedMissionFragment>,
}

impl MissionGroup {
    fn row_numbers(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.row_number.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A group whose merged values cannot form a valid mission
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("consolidated start {start} is after consolidated end {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

/// One group and the canonical mission merged from it
#[derive(Debug, Clone)]
pub struct ConsolidatedGroup {
    pub group: MissionGroup,
    pub merged: Result<CanonicalMission, MergeError>,
}

/// Resolve owners and group fragments, adding recovered fragments
///
/// Unmapped and duplicate fragments are counted in the run summary here and
/// do not appear in any group.
pub fn group_fragments(
    fragments: Vec<ValidatedMissionFragment>,
    recovered: Vec<ValidatedMissionFragment>,
    ctx: &mut RunContext,
) -> Vec<MissionGroup> {
    let mut groups: Vec<MissionGroup> = Vec::new();
    let mut index: HashMap<(Uuid, String), usize> = HashMap::new();

    for fragment in fragments {
        let Some(fragment) = resolve_owner(fragment, ctx, "UNMAPPED") else {
            continue;
        };
        let slot = group_slot(&mut groups, &mut index, &fragment);
        groups[slot].fragments.push(fragment);
    }

    for fragment in recovered {
        let Some(fragment) = resolve_owner(fragment, ctx, "RECOVERED_UNMAPPED") else {
            continue;
        };
        let slot = group_slot(&mut groups, &mut index, &fragment);

        let already_present = groups[slot]
            .fragments
            .iter()
            .any(|f| f.start_date == fragment.start_date);
        if already_present {
            let message = format!(
                "Recovered fragment {} starting {} already present in the export",
                fragment.mission_code,
                fragment
                    .start_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "(no start)".to_string())
            );
            warn!(
                external_id = %fragment.external_person_id,
                mission_code = %fragment.mission_code,
                "{}",
                message
            );
            ctx.record_with_issue(FragmentOutcome::Duplicate, RunIssue::skip(0, "DUPLICATE", message));
            continue;
        }

        info!(
            external_id = %fragment.external_person_id,
            mission_code = %fragment.mission_code,
            "Recovered fragment inserted before merge"
        );
        groups[slot].fragments.push(fragment);
    }

    debug!("Grouped mission fragments into {} groups", groups.len());
    groups
}

fn resolve_owner(
    mut fragment: ValidatedMissionFragment,
    ctx: &mut RunContext,
    code: &str,
) -> Option<ValidatedMissionFragment> {
    match ctx.identity_map.resolve(&fragment.external_person_id) {
        Some(consultant_id) => {
            fragment.consultant_id = Some(consultant_id);
            Some(fragment)
        }
        None => {
            let message = format!(
                "No consultant for external id {} (mission {})",
                fragment.external_person_id, fragment.mission_code
            );
            warn!(row = fragment.row_number, "{}; fragment skipped", message);
            ctx.record_with_issue(
                FragmentOutcome::SkippedUnmapped,
                RunIssue::skip(fragment.row_number, code, message),
            );
            None
        }
    }
}

fn group_slot(
    groups: &mut Vec<MissionGroup>,
    index: &mut HashMap<(Uuid, String), usize>,
    fragment: &ValidatedMissionFragment,
) -> usize {
    let consultant_id = fragment.consultant_id.unwrap_or_default();
    *index
        .entry((consultant_id, fragment.mission_code.clone()))
        .or_insert_with(|| {
            groups.push(MissionGroup {
                consultant_id,
                mission_code: fragment.mission_code.clone(),
                fragments: Vec::new(),
            });
            groups.len() - 1
        })
}

/// Fragment whose rate represents the group: latest start date, undated
/// fragments last, later source row on ties
pub fn representative_fragment(
    fragments: &[ValidatedMissionFragment],
) -> Option<&ValidatedMissionFragment> {
    fragments.iter().max_by_key(|f| (f.start_date, f.row_number))
}

/// Merge one group into its canonical mission
pub fn merge_group(group: &MissionGroup, today: NaiveDate) -> Result<CanonicalMission, MergeError> {
    let fragments = &group.fragments;

    let start_date = fragments.iter().filter_map(|f| f.start_date).min();
    let end_date = fragments.iter().filter_map(|f| f.end_date).max();

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(MergeError::InvertedRange { start, end });
        }
    }

    let representative = representative_fragment(fragments);
    let daily_rate = representative.and_then(|f| f.daily_rate);

    let client_name = representative
        .filter(|f| f.has_known_client())
        .or_else(|| fragments.iter().find(|f| f.has_known_client()))
        .map(|f| f.client_name.clone())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    let open_ended = fragments.iter().any(|f| f.is_open_ended());
    let status = if open_ended {
        MissionStatus::Active
    } else {
        MissionStatus::from_end_date(end_date, today)
    };

    Ok(CanonicalMission {
        consultant_id: group.consultant_id,
        mission_code: group.mission_code.clone(),
        client_name,
        start_date,
        end_date,
        daily_rate,
        status,
    })
}

/// Group, then merge every group
pub fn consolidate(
    fragments: Vec<ValidatedMissionFragment>,
    recovered: Vec<ValidatedMissionFragment>,
    ctx: &mut RunContext,
) -> Vec<ConsolidatedGroup> {
    group_fragments(fragments, recovered, ctx)
        .into_iter()
        .map(|group| {
            let merged = merge_group(&group, ctx.today);
            ConsolidatedGroup { group, merged }
        })
        .collect()
}

/// Upsert every consolidated group and record fragment outcomes
///
/// Merge and persistence failures are recorded per group; only failures of
/// the batch transaction itself abort the run.
pub async fn persist_groups(
    writer: &mut BatchWriter<'_>,
    groups: &[ConsolidatedGroup],
    ctx: &mut RunContext,
) -> SyncResult<()> {
    for consolidated in groups {
        let group = &consolidated.group;
        let fragment_count = group.fragments.len();

        let mission = match &consolidated.merged {
            Ok(mission) => mission,
            Err(e) => {
                let message = format!("Mission {} (rows {}): {}", group.mission_code, group.row_numbers(), e);
                warn!(consultant_id = %group.consultant_id, "{}", message);
                record_group(ctx, group, FragmentOutcome::Error, Some(("MERGE_ERROR", message)));
                continue;
            }
        };

        match upsert_mission(writer.conn()?, mission).await {
            Ok(UpsertOutcome::Created(guid)) => {
                debug!(%guid, mission_code = %mission.mission_code, fragments = fragment_count, "Mission created");
                ctx.summary.missions_created += 1;
                record_group(ctx, group, FragmentOutcome::Imported, None);
                writer.record_success(fragment_count).await?;
            }
            Ok(UpsertOutcome::Updated(guid)) => {
                debug!(%guid, mission_code = %mission.mission_code, fragments = fragment_count, "Mission updated");
                ctx.summary.missions_updated += 1;
                record_group(ctx, group, FragmentOutcome::Updated, None);
                writer.record_success(fragment_count).await?;
            }
            Err(e) => {
                let message = format!(
                    "Failed to persist mission {} (rows {}): {}",
                    group.mission_code,
                    group.row_numbers(),
                    e
                );
                warn!(consultant_id = %group.consultant_id, "{}", message);
                record_group(ctx, group, FragmentOutcome::Error, Some(("PERSIST_ERROR", message)));
            }
        }
    }

    info!(
        "Missions consolidated: {} created, {} updated, {} fragments in error",
        ctx.summary.missions_created, ctx.summary.missions_updated, ctx.summary.error
    );

    Ok(())
}

fn record_group(
    ctx: &mut RunContext,
    group: &MissionGroup,
    outcome: FragmentOutcome,
    issue: Option<(&str, String)>,
) {
    for _ in &group.fragments {
        ctx.summary.record(outcome);
    }
    if let Some((code, message)) = issue {
        let row = group.fragments.first().map(|f| f.row_number).unwrap_or(0);
        ctx.summary.push_issue(RunIssue::error(row, code, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportConfig;
    use crate::normalizer::normalize;
    use std::path::PathBuf;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn context(mapped: &[(&str, Uuid)]) -> RunContext {
        let mut ctx = RunContext::new(ImportConfig::with_root(PathBuf::from("/tmp")), date(2024, 6, 1));
        for (external_id, consultant_id) in mapped {
            ctx.identity_map.insert(external_id.to_string(), *consultant_id);
        }
        ctx
    }

    fn fragment(
        row: usize,
        person: &str,
        code: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        rate: Option<f64>,
    ) -> ValidatedMissionFragment {
        let mut f = normalize(&ExternalMissionRow {
            row_number: row,
            user_id: RawValue::text(person),
            code: RawValue::text(code),
            client_name: RawValue::text("ACME"),
            ..Default::default()
        })
        .unwrap();
        f.start_date = start;
        f.end_date = end;
        f.daily_rate = rate;
        f
    }

    #[test]
    fn test_affas263_fragments_merge_into_one_mission() {
        let eric = Uuid::new_v4();
        let mut ctx = context(&[("190", eric)]);

        let fragments = vec![
            fragment(2, "190", "AFFAS263", Some(date(2023, 1, 1)), Some(date(2023, 6, 30)), Some(500.0)),
            fragment(3, "190", "AFFAS263", Some(date(2023, 8, 21)), Some(date(2023, 12, 31)), Some(550.0)),
        ];

        let consolidated = consolidate(fragments, Vec::new(), &mut ctx);
        assert_eq!(consolidated.len(), 1);

        let mission = consolidated[0].merged.as_ref().unwrap();
        assert_eq!(mission.consultant_id, eric);
        assert_eq!(mission.start_date, Some(date(2023, 1, 1)));
        assert_eq!(mission.end_date, Some(date(2023, 12, 31)));
        assert_eq!(mission.daily_rate, Some(550.0));
        assert_eq!(mission.status, MissionStatus::Terminee);
    }

    #[test]
    fn test_rate_follows_latest_start_not_row_order() {
        let consultant = Uuid::new_v4();
        let group = MissionGroup {
            consultant_id: consultant,
            mission_code: "C1".into(),
            fragments: vec![
                fragment(2, "1", "C1", Some(date(2023, 9, 1)), None, Some(700.0)),
                fragment(3, "1", "C1", Some(date(2023, 1, 1)), None, Some(600.0)),
                fragment(4, "1", "C1", None, None, Some(999.0)),
            ],
        };

        let mission = merge_group(&group, date(2024, 6, 1)).unwrap();
        assert_eq!(mission.daily_rate, Some(700.0));
        assert_eq!(mission.status, MissionStatus::Active, "open-ended fragment");
    }

    #[test]
    fn test_tie_on_start_goes_to_later_row() {
        let group = MissionGroup {
            consultant_id: Uuid::new_v4(),
            mission_code: "C1".into(),
            fragments: vec![
                fragment(5, "1", "C1", Some(date(2023, 1, 1)), None, Some(500.0)),
                fragment(9, "1", "C1", Some(date(2023, 1, 1)), None, Some(520.0)),
            ],
        };
        assert_eq!(merge_group(&group, date(2024, 1, 1)).unwrap().daily_rate, Some(520.0));
    }

    #[test]
    fn test_unknown_rate_stays_null() {
        let group = MissionGroup {
            consultant_id: Uuid::new_v4(),
            mission_code: "C1".into(),
            fragments: vec![
                fragment(2, "1", "C1", Some(date(2023, 1, 1)), None, Some(500.0)),
                fragment(3, "1", "C1", Some(date(2023, 6, 1)), None, None),
            ],
        };
        assert_eq!(merge_group(&group, date(2024, 1, 1)).unwrap().daily_rate, None);
    }

    #[test]
    fn test_inverted_range_after_merge_is_error() {
        let group = MissionGroup {
            consultant_id: Uuid::new_v4(),
            mission_code: "C1".into(),
            fragments: vec![
                fragment(2, "1", "C1", Some(date(2023, 9, 1)), None, None),
                fragment(3, "1", "C1", None, Some(date(2023, 3, 1)), None),
            ],
        };
        assert!(matches!(
            merge_group(&group, date(2024, 1, 1)),
            Err(MergeError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_unreadable_end_does_not_reopen_mission() {
        // Second amendment's end precedes its own start, so the normalizer drops it
        let inverted = normalize(&ExternalMissionRow {
            row_number: 3,
            user_id: RawValue::text("190"),
            code: RawValue::text("AFFAS263"),
            start_date: RawValue::text("2023-08-01"),
            end_date: RawValue::text("2023-07-31"),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(inverted.end_date, None);
        assert!(!inverted.is_open_ended());

        let group = MissionGroup {
            consultant_id: Uuid::new_v4(),
            mission_code: "AFFAS263".into(),
            fragments: vec![
                fragment(2, "190", "AFFAS263", Some(date(2023, 1, 1)), Some(date(2023, 6, 30)), Some(500.0)),
                inverted,
            ],
        };
        let mission = merge_group(&group, date(2024, 6, 1)).unwrap();
        assert_eq!(mission.end_date, Some(date(2023, 6, 30)));
        assert_eq!(mission.status, MissionStatus::Terminee);
    }

    #[test]
    fn test_missing_end_keeps_mission_active() {
        let group = MissionGroup {
            consultant_id: Uuid::new_v4(),
            mission_code: "C1".into(),
            fragments: vec![
                fragment(2, "1", "C1", Some(date(2022, 1, 1)), Some(date(2022, 6, 30)), None),
                fragment(3, "1", "C1", Some(date(2022, 7, 1)), None, None),
            ],
        };
        assert_eq!(merge_group(&group, date(2024, 6, 1)).unwrap().status, MissionStatus::Active);
    }

    #[test]
    fn test_client_falls_back_to_first_known() {
        let mut recent = fragment(3, "1", "C1", Some(date(2023, 9, 1)), None, None);
        recent.client_name = UNKNOWN_CLIENT.to_string();
        let mut older = fragment(2, "1", "C1", Some(date(2023, 1, 1)), None, None);
        older.client_name = "Banque Alpha".to_string();

        let group = MissionGroup {
            consultant_id: Uuid::new_v4(),
            mission_code: "C1".into(),
            fragments: vec![older, recent],
        };
        assert_eq!(merge_group(&group, date(2024, 1, 1)).unwrap().client_name, "Banque Alpha");
    }

    #[test]
    fn test_unmapped_fragments_are_excluded() {
        let known = Uuid::new_v4();
        let mut ctx = context(&[("1", known)]);

        let fragments = vec![
            fragment(2, "1", "C1", None, None, None),
            fragment(3, "404", "C1", None, None, None),
        ];

        let groups = group_fragments(fragments, Vec::new(), &mut ctx);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].fragments.len(), 1);
        assert_eq!(groups[0].consultant_id, known);
        assert_eq!(ctx.summary.skipped_unmapped, 1);
        assert_eq!(ctx.summary.issues[0].code, "UNMAPPED");
    }

    #[test]
    fn test_groups_keep_first_seen_order_and_split_by_consultant() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut ctx = context(&[("1", a), ("2", b)]);

        let fragments = vec![
            fragment(2, "1", "Z", None, None, None),
            fragment(3, "2", "Z", None, None, None),
            fragment(4, "1", "A", None, None, None),
            fragment(5, "1", "Z", None, None, None),
        ];

        let groups = group_fragments(fragments, Vec::new(), &mut ctx);
        let keys: Vec<(Uuid, &str)> = groups
            .iter()
            .map(|g| (g.consultant_id, g.mission_code.as_str()))
            .collect();
        assert_eq!(keys, vec![(a, "Z"), (b, "Z"), (a, "A")]);
        assert_eq!(groups[0].fragments.len(), 2);
    }

    #[test]
    fn test_recovered_fragment_joins_group_or_is_duplicate() {
        let eric = Uuid::new_v4();
        let mut ctx = context(&[("190", eric)]);

        let exported = vec![fragment(
            2,
            "190",
            "AFFAS263",
            Some(date(2023, 8, 21)),
            Some(date(2023, 12, 31)),
            Some(550.0),
        )];

        let missing = RecoveredFragment {
            external_person_id: "190".into(),
            mission_code: "AFFAS263".into(),
            order_id: None,
            client_name: Some("ACME".into()),
            start_date: Some(date(2023, 1, 1)),
            end_date: Some(date(2023, 6, 30)),
            daily_rate: Some(500.0),
        };
        let already_there = RecoveredFragment {
            start_date: Some(date(2023, 8, 21)),
            ..missing.clone()
        };
        let recovered = vec![
            normalize(&missing.to_row()).unwrap(),
            normalize(&already_there.to_row()).unwrap(),
        ];

        let consolidated = consolidate(exported, recovered, &mut ctx);
        assert_eq!(ctx.summary.duplicate, 1);
        assert_eq!(consolidated.len(), 1);
        assert_eq!(consolidated[0].group.fragments.len(), 2);

        let mission = consolidated[0].merged.as_ref().unwrap();
        assert_eq!(mission.start_date, Some(date(2023, 1, 1)));
        assert_eq!(mission.daily_rate, Some(550.0));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let group = MissionGroup {
            consultant_id: Uuid::new_v4(),
            mission_code: "C1".into(),
            fragments: vec![
                fragment(2, "1", "C1", Some(date(2023, 1, 1)), Some(date(2023, 6, 30)), Some(500.0)),
                fragment(3, "1", "C1", Some(date(2023, 8, 21)), Some(date(2023, 12, 31)), Some(550.0)),
            ],
        };
        let today = date(2024, 6, 1);
        assert_eq!(merge_group(&group, today), merge_group(&group, today));
    }
}
