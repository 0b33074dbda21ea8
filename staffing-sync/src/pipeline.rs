//! Import pipeline
//!
//! One sequential batch pass over the VSA extract:
//!
//! 1. Load both sheets
//! 2. Classify people and persist managers and consultants
//! 3. Build the identity map from the consultants now in the store
//! 4. Normalize mission rows (rows without a person id are skipped)
//! 5. Consolidate fragments and upsert canonical missions
//! 6. Flag consultants whose mission history looks truncated
//!
//! Every write goes through one `BatchWriter`, so a dry run sees its own
//! writes and leaves nothing behind.

use crate::classifier::{partition_people, RoleClassifier};
use crate::config::ImportConfig;
use crate::consolidator::{consolidate, persist_groups};
use crate::context::RunContext;
use crate::db::consultants::load_email_index;
use crate::error::{SyncError, SyncResult};
use crate::history::detect_truncated_history;
use crate::identity::build_identity_map;
use crate::loader::{load_workbook, LoadedRecords};
use crate::models::{
    ExternalMissionRow, FragmentOutcome, ImportSummary, RunIssue, ValidatedMissionFragment,
};
use crate::normalizer::normalize;
use crate::persons::persist_people;
use crate::utils::BatchWriter;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::{info, warn};

/// Load the configured workbook and run the import
pub async fn run_import(
    pool: &SqlitePool,
    config: ImportConfig,
    today: NaiveDate,
) -> SyncResult<ImportSummary> {
    let records = load_workbook(&config.workbook_path, &config.person_sheet, &config.mission_sheet)?;
    run_with_records(pool, config, records, today).await
}

/// Run the import over rows already in memory
pub async fn run_with_records(
    pool: &SqlitePool,
    config: ImportConfig,
    records: LoadedRecords,
    today: NaiveDate,
) -> SyncResult<ImportSummary> {
    let started = Instant::now();
    let LoadedRecords { persons, missions } = records;

    info!(
        "Starting import: {} person rows, {} mission rows{}",
        persons.len(),
        missions.len(),
        if config.dry_run { " (dry run)" } else { "" }
    );

    let mut ctx = RunContext::new(config, today);
    let mut writer = BatchWriter::begin(
        pool,
        ctx.config.batch_size,
        ctx.config.dry_run,
        "pipeline::run_with_records",
    )
    .await?;

    // People
    let classifier = RoleClassifier::new(&ctx.config.classifier);
    let people = partition_people(&persons, &classifier);
    let consultants = persist_people(&mut writer, &people, &mut ctx).await?;

    // Identity
    let email_index = load_email_index(writer.conn()?).await?;
    ctx.identity_map = build_identity_map(&persons, &email_index);

    // Fragments
    let fragments = normalize_rows(&missions, &mut ctx)?;
    let recovered: Vec<ExternalMissionRow> = ctx
        .config
        .recovered_fragments
        .iter()
        .map(|r| r.to_row())
        .collect();
    let recovered = normalize_rows(&recovered, &mut ctx)?;

    // Missions
    let groups = consolidate(fragments, recovered, &mut ctx);
    persist_groups(&mut writer, &groups, &mut ctx).await?;

    ctx.summary.truncated_history =
        detect_truncated_history(&consultants, &groups, ctx.config.history_grace_days);

    let commits = writer.finish().await?;

    let mut summary = ctx.summary;
    summary.duration_seconds = started.elapsed().as_secs();

    info!(
        "Import finished in {}s: {} imported, {} updated, {} skipped, {} duplicate, {} error ({} commits)",
        summary.duration_seconds,
        summary.imported,
        summary.updated,
        summary.skipped_unmapped + summary.skipped_invalid,
        summary.duplicate,
        summary.error,
        commits
    );

    Ok(summary)
}

/// Normalize mission rows, turning rows without a person id into
/// `skipped_invalid`
fn normalize_rows(
    rows: &[ExternalMissionRow],
    ctx: &mut RunContext,
) -> SyncResult<Vec<ValidatedMissionFragment>> {
    let mut fragments = Vec::with_capacity(rows.len());

    for row in rows {
        match normalize(row) {
            Ok(fragment) => {
                ctx.summary.field_issues += fragment.issues.len();
                fragments.push(fragment);
            }
            Err(SyncError::MissingExternalId { row: row_number }) => {
                let message = format!("Mission row {} has no external person id; skipped", row_number);
                warn!(row = row_number, "{}", message);
                ctx.record_with_issue(
                    FragmentOutcome::SkippedInvalid,
                    RunIssue::skip(row_number, "MISSING_EXTERNAL_ID", message),
                );
            }
            Err(e) => return Err(e),
        }
    }

    Ok(fragments)
}
