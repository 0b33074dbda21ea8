//! End-to-end import runs over in-memory rosters
//!
//! Each test opens a fresh database in a temp directory, runs the pipeline
//! on hand-built rows and checks what landed in the store.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use staffing_common::db::{init_database, MissionStatus};
use staffing_sync::classifier::{Role, RoleOverride};
use staffing_sync::config::ImportConfig;
use staffing_sync::consolidator::RecoveredFragment;
use staffing_sync::db::consultants::{load_consultant_by_email, load_manager_links};
use staffing_sync::db::managers::load_manager_by_email;
use staffing_sync::db::missions::load_all_missions;
use staffing_sync::loader::LoadedRecords;
use staffing_sync::models::{ExternalMissionRow, ExternalPersonRow, IssueSeverity, RawValue};
use staffing_sync::run_with_records;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2024, 6, 1)
}

async fn setup() -> (TempDir, SqlitePool, ImportConfig) {
    let temp_dir = TempDir::new().unwrap();
    let config = ImportConfig::with_root(temp_dir.path().to_path_buf());
    let pool = init_database(&config.database_path)
        .await
        .expect("Failed to initialize database");
    (temp_dir, pool, config)
}

fn person(id: i64, first: &str, last: &str, email: &str, title: &str, manager: &str) -> ExternalPersonRow {
    ExternalPersonRow {
        row_number: id as usize,
        user_id: RawValue::Number(id as f64),
        firstname: RawValue::text(first),
        lastname: RawValue::text(last),
        email: RawValue::text(email),
        job_title: RawValue::text(title),
        manager_name: RawValue::text(manager),
        ..Default::default()
    }
}

fn mission(row: usize, user_id: f64, code: &str, start: &str, end: &str, tjm: f64) -> ExternalMissionRow {
    ExternalMissionRow {
        row_number: row,
        user_id: RawValue::Number(user_id),
        order_id: RawValue::Number(row as f64),
        code: RawValue::text(code),
        client_name: RawValue::text("ACME"),
        start_date: RawValue::text(start),
        end_date: RawValue::text(end),
        tjm: RawValue::Number(tjm),
        ..Default::default()
    }
}

/// Eric (consultant, reports to Jane) with the two AFFAS263 fragments
fn affas263_records() -> LoadedRecords {
    LoadedRecords {
        persons: vec![
            person(190, "Eric", "LAPINA", "eric.lapina@x.fr", "Consultant SAP", "DOE Jane"),
            person(200, "Jane", "Doe", "jane.doe@x.fr", "Business Manager", ""),
        ],
        missions: vec![
            mission(2, 190.0, "AFFAS263", "2023-01-01", "2023-06-30", 500.0),
            mission(3, 190.0, "AFFAS263", "2023-08-21", "2023-12-31", 550.0),
        ],
    }
}

#[tokio::test]
async fn test_affas263_consolidates_into_one_mission() {
    let (_dir, pool, config) = setup().await;

    let summary = run_with_records(&pool, config, affas263_records(), today())
        .await
        .expect("Import failed");

    assert_eq!(summary.imported, 2);
    assert_eq!(summary.missions_created, 1);
    assert_eq!(summary.consultants_written, 1);
    assert_eq!(summary.managers_written, 1);
    assert!(!summary.has_errors());

    let mut conn = pool.acquire().await.unwrap();
    let missions = load_all_missions(&mut conn).await.unwrap();
    assert_eq!(missions.len(), 1);

    let eric = load_consultant_by_email(&mut conn, "eric.lapina@x.fr")
        .await
        .unwrap()
        .expect("Consultant not persisted");
    let m = &missions[0];
    assert_eq!(m.consultant_id, eric.guid);
    assert_eq!(m.mission_code, "AFFAS263");
    assert_eq!(m.start_date, Some(date(2023, 1, 1)));
    assert_eq!(m.end_date, Some(date(2023, 12, 31)));
    assert_eq!(m.daily_rate, Some(550.0));
    assert_eq!(m.status, MissionStatus::Terminee);

    let jane = load_manager_by_email(&mut conn, "jane.doe@x.fr")
        .await
        .unwrap()
        .expect("Manager not persisted");
    let links = load_manager_links(&mut conn, eric.guid).await.unwrap();
    assert_eq!(links, vec![(jane.guid, today())]);
}

#[tokio::test]
async fn test_rerun_updates_in_place() {
    let (_dir, pool, config) = setup().await;

    run_with_records(&pool, config.clone(), affas263_records(), today())
        .await
        .unwrap();
    let first = {
        let mut conn = pool.acquire().await.unwrap();
        load_all_missions(&mut conn).await.unwrap()
    };

    let summary = run_with_records(&pool, config, affas263_records(), today())
        .await
        .unwrap();
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.missions_created, 0);
    assert_eq!(summary.missions_updated, 1);

    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(load_all_missions(&mut conn).await.unwrap(), first);
}

#[tokio::test]
async fn test_dry_run_leaves_store_untouched() {
    let (_dir, pool, mut config) = setup().await;
    config.dry_run = true;

    let summary = run_with_records(&pool, config, affas263_records(), today())
        .await
        .unwrap();

    // Identity resolution saw the consultants written inside the run
    assert_eq!(summary.imported, 2);
    assert!(summary.dry_run);

    let mut conn = pool.acquire().await.unwrap();
    assert!(load_all_missions(&mut conn).await.unwrap().is_empty());
    assert!(load_consultant_by_email(&mut conn, "eric.lapina@x.fr")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_unmapped_and_invalid_rows_are_counted() {
    let (_dir, pool, config) = setup().await;

    let mut records = affas263_records();
    records.missions.push(mission(4, 404.0, "GHOST", "2023-01-01", "2023-02-01", 400.0));
    records.missions.push(ExternalMissionRow {
        row_number: 5,
        user_id: RawValue::text("nan"),
        code: RawValue::text("ORPHAN"),
        ..Default::default()
    });

    let summary = run_with_records(&pool, config, records, today()).await.unwrap();
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.skipped_unmapped, 1);
    assert_eq!(summary.skipped_invalid, 1);
    assert_eq!(summary.fragments_seen(), 4);
    assert!(!summary.has_errors());
    assert!(summary.issues.iter().any(|i| i.code == "UNMAPPED" && i.row_number == 4));

    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(load_all_missions(&mut conn).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_override_keeps_manager_titled_person_as_consultant() {
    let (_dir, pool, mut config) = setup().await;
    config.classifier.overrides.push(RoleOverride {
        first_name: Some("Eric".into()),
        last_name: Some("Lapina".into()),
        email: None,
        role: Role::Consultant,
    });

    let records = LoadedRecords {
        persons: vec![person(190, "Eric", "LAPINA", "eric.lapina@x.fr", "Senior Business Manager", "")],
        missions: vec![mission(2, 190.0, "AFFAS263", "2023-01-01", "2023-06-30", 500.0)],
    };

    let summary = run_with_records(&pool, config, records, today()).await.unwrap();
    assert_eq!(summary.consultants_written, 1);
    assert_eq!(summary.managers_written, 0);
    assert_eq!(summary.imported, 1);
}

#[tokio::test]
async fn test_unreferenced_manager_is_not_materialized() {
    let (_dir, pool, config) = setup().await;

    let records = LoadedRecords {
        persons: vec![person(190, "Eric", "LAPINA", "eric.lapina@x.fr", "Senior Business Manager", "")],
        missions: vec![mission(2, 190.0, "AFFAS263", "2023-01-01", "2023-06-30", 500.0)],
    };

    let summary = run_with_records(&pool, config, records, today()).await.unwrap();
    assert_eq!(summary.managers_dropped, 1);
    assert_eq!(summary.managers_written, 0);
    // Nobody to own the mission
    assert_eq!(summary.skipped_unmapped, 1);
}

#[tokio::test]
async fn test_recovered_fragment_restores_missing_history() {
    let (_dir, pool, mut config) = setup().await;
    config.recovered_fragments.push(RecoveredFragment {
        external_person_id: "190".into(),
        mission_code: "AFFAS263".into(),
        order_id: None,
        client_name: Some("ACME".into()),
        start_date: Some(date(2023, 1, 1)),
        end_date: Some(date(2023, 6, 30)),
        daily_rate: Some(500.0),
    });

    let mut records = affas263_records();
    records.missions.remove(0);

    let summary = run_with_records(&pool, config, records, today()).await.unwrap();
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.duplicate, 0);

    let mut conn = pool.acquire().await.unwrap();
    let missions = load_all_missions(&mut conn).await.unwrap();
    assert_eq!(missions[0].start_date, Some(date(2023, 1, 1)));
    assert_eq!(missions[0].daily_rate, Some(550.0));
}

#[tokio::test]
async fn test_truncated_history_is_flagged() {
    let (_dir, pool, config) = setup().await;

    let mut records = affas263_records();
    records.persons[0].contract_date = RawValue::text("2020-09-01");
    records.missions.remove(0);

    let summary = run_with_records(&pool, config, records, today()).await.unwrap();
    assert_eq!(summary.truncated_history.len(), 1);
    let flag = &summary.truncated_history[0];
    assert_eq!(flag.external_id, "190");
    assert_eq!(flag.contract_date, date(2020, 9, 1));
    assert_eq!(flag.earliest_mission_start, date(2023, 8, 21));

    // Link start follows the contract date
    let mut conn = pool.acquire().await.unwrap();
    let eric = load_consultant_by_email(&mut conn, "eric.lapina@x.fr").await.unwrap().unwrap();
    let links = load_manager_links(&mut conn, eric.guid).await.unwrap();
    assert_eq!(links[0].1, date(2020, 9, 1));
}

#[tokio::test]
async fn test_small_batches_commit_everything() {
    let (_dir, pool, mut config) = setup().await;
    config.batch_size = 1;

    let mut records = affas263_records();
    records.missions.push(mission(4, 190.0, "BNP-12", "2024-01-15", "2024-12-31", 610.0));

    let summary = run_with_records(&pool, config, records, today()).await.unwrap();
    assert_eq!(summary.missions_created, 2);

    let mut conn = pool.acquire().await.unwrap();
    let missions = load_all_missions(&mut conn).await.unwrap();
    assert_eq!(missions.len(), 2);
    let bnp = missions.iter().find(|m| m.mission_code == "BNP-12").unwrap();
    assert_eq!(bnp.status, MissionStatus::Active);
}

#[tokio::test]
async fn test_unreadable_end_on_later_amendment_keeps_mission_closed() {
    let (_dir, pool, config) = setup().await;

    let mut records = affas263_records();
    records.missions[1] = mission(3, 190.0, "AFFAS263", "2023-08-01", "2023-07-31", 550.0);

    let summary = run_with_records(&pool, config, records, today()).await.unwrap();
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.field_issues, 1);

    let mut conn = pool.acquire().await.unwrap();
    let missions = load_all_missions(&mut conn).await.unwrap();
    assert_eq!(missions.len(), 1);
    assert_eq!(missions[0].end_date, Some(date(2023, 6, 30)));
    assert_eq!(missions[0].status, MissionStatus::Terminee);
}

#[tokio::test]
async fn test_failed_group_does_not_stop_the_run() {
    let (_dir, pool, config) = setup().await;
    sqlx::query(
        "CREATE TRIGGER reject_broken BEFORE INSERT ON missions \
         WHEN NEW.mission_code = 'BROKEN' \
         BEGIN SELECT RAISE(ABORT, 'mission code rejected'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let mut records = affas263_records();
    records.missions.push(mission(4, 190.0, "BROKEN", "2024-01-01", "2024-03-31", 600.0));
    records.missions.push(mission(5, 190.0, "BROKEN", "2024-04-01", "2024-12-31", 620.0));
    records.missions.push(mission(6, 190.0, "BNP-12", "2024-01-15", "2024-12-31", 610.0));

    let summary = run_with_records(&pool, config, records, today()).await.unwrap();
    assert_eq!(summary.error, 2);
    assert_eq!(summary.imported, 3);
    assert_eq!(summary.missions_created, 2);
    assert!(summary.has_errors());

    let issue = summary
        .issues
        .iter()
        .find(|i| i.code == "PERSIST_ERROR")
        .expect("Persistence failure not recorded");
    assert_eq!(issue.severity, IssueSeverity::Error);
    assert!(issue.message.contains("BROKEN"));

    let mut conn = pool.acquire().await.unwrap();
    let mut codes: Vec<String> = load_all_missions(&mut conn)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.mission_code)
        .collect();
    codes.sort();
    assert_eq!(codes, vec!["AFFAS263", "BNP-12"]);
}
