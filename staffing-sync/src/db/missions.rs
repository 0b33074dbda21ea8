//! Canonical mission database operations
//!
//! One row per (consultant, mission code). Reconciliation overwrites the
//! mutable fields in place and never creates a second row for the same key.

use chrono::NaiveDate;
use sqlx::{Row, SqliteConnection};
use staffing_common::db::{CanonicalMission, MissionStatus};
use staffing_common::Result;
use uuid::Uuid;

use super::parse_guid;

/// Whether an upsert created or overwrote the mission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(Uuid),
    Updated(Uuid),
}

/// Create or overwrite the canonical mission for (consultant, code)
pub async fn upsert_mission(
    conn: &mut SqliteConnection,
    mission: &CanonicalMission,
) -> Result<UpsertOutcome> {
    let existing: Option<String> = sqlx::query_scalar(
        "SELECT guid FROM missions WHERE consultant_id = ? AND mission_code = ?",
    )
    .bind(mission.consultant_id.to_string())
    .bind(&mission.mission_code)
    .fetch_optional(&mut *conn)
    .await?;

    match existing {
        Some(guid) => {
            sqlx::query(
                r#"
                UPDATE missions SET
                    client_name = ?,
                    start_date = ?,
                    end_date = ?,
                    daily_rate = ?,
                    status = ?,
                    updated_at = CURRENT_TIMESTAMP
                WHERE guid = ?
                "#,
            )
            .bind(&mission.client_name)
            .bind(mission.start_date)
            .bind(mission.end_date)
            .bind(mission.daily_rate)
            .bind(mission.status.as_str())
            .bind(&guid)
            .execute(&mut *conn)
            .await?;

            Ok(UpsertOutcome::Updated(parse_guid(&guid)?))
        }
        None => {
            let guid = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO missions (
                    guid, consultant_id, mission_code, client_name, start_date, end_date,
                    daily_rate, status, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
                "#,
            )
            .bind(guid.to_string())
            .bind(mission.consultant_id.to_string())
            .bind(&mission.mission_code)
            .bind(&mission.client_name)
            .bind(mission.start_date)
            .bind(mission.end_date)
            .bind(mission.daily_rate)
            .bind(mission.status.as_str())
            .execute(&mut *conn)
            .await?;

            Ok(UpsertOutcome::Created(guid))
        }
    }
}

fn mission_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<CanonicalMission> {
    let consultant_id: String = row.get("consultant_id");
    let status: String = row.get("status");

    Ok(CanonicalMission {
        consultant_id: parse_guid(&consultant_id)?,
        mission_code: row.get("mission_code"),
        client_name: row.get("client_name"),
        start_date: row.get::<Option<NaiveDate>, _>("start_date"),
        end_date: row.get::<Option<NaiveDate>, _>("end_date"),
        daily_rate: row.get("daily_rate"),
        status: status.parse::<MissionStatus>()?,
    })
}

/// Load every canonical mission, ordered by consultant then code
pub async fn load_all_missions(conn: &mut SqliteConnection) -> Result<Vec<CanonicalMission>> {
    let rows = sqlx::query(
        r#"
        SELECT consultant_id, mission_code, client_name, start_date, end_date, daily_rate, status
        FROM missions
        ORDER BY consultant_id, mission_code
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(mission_from_row).collect()
}
