//! Consultant database operations
//!
//! Consultants are keyed by email, the join key used by identity resolution.

use chrono::NaiveDate;
use sqlx::{Row, SqliteConnection};
use staffing_common::db::Consultant;
use staffing_common::Result;
use std::collections::HashMap;
use uuid::Uuid;

use super::parse_guid;

/// Save consultant, keyed by email
///
/// Returns the guid of the stored row (the existing one on conflict).
pub async fn save_consultant(conn: &mut SqliteConnection, consultant: &Consultant) -> Result<Uuid> {
    let guid: String = sqlx::query_scalar(
        r#"
        INSERT INTO consultants (
            guid, last_name, first_name, email, phone, salary, active, company,
            contract_date, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(email) DO UPDATE SET
            last_name = excluded.last_name,
            first_name = excluded.first_name,
            phone = excluded.phone,
            salary = excluded.salary,
            active = excluded.active,
            company = excluded.company,
            contract_date = excluded.contract_date,
            updated_at = CURRENT_TIMESTAMP
        RETURNING guid
        "#,
    )
    .bind(consultant.guid.to_string())
    .bind(&consultant.last_name)
    .bind(&consultant.first_name)
    .bind(&consultant.email)
    .bind(&consultant.phone)
    .bind(consultant.salary)
    .bind(consultant.active)
    .bind(&consultant.company)
    .bind(consultant.contract_date)
    .fetch_one(&mut *conn)
    .await?;

    parse_guid(&guid)
}

/// Load consultant by email
pub async fn load_consultant_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<Consultant>> {
    let row = sqlx::query(
        r#"
        SELECT guid, last_name, first_name, email, phone, salary, active, company, contract_date
        FROM consultants
        WHERE email = ?
        "#,
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let guid: String = row.get("guid");

            Ok(Some(Consultant {
                guid: parse_guid(&guid)?,
                last_name: row.get("last_name"),
                first_name: row.get("first_name"),
                email: row.get("email"),
                phone: row.get("phone"),
                salary: row.get("salary"),
                active: row.get("active"),
                company: row.get("company"),
                contract_date: row.get::<Option<NaiveDate>, _>("contract_date"),
            }))
        }
        None => Ok(None),
    }
}

/// Normalized email → consultant guid for every persisted consultant
pub async fn load_email_index(conn: &mut SqliteConnection) -> Result<HashMap<String, Uuid>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT email, guid FROM consultants")
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter()
        .map(|(email, guid)| -> Result<(String, Uuid)> {
            Ok((email.trim().to_lowercase(), parse_guid(&guid)?))
        })
        .collect()
}

/// Link consultant to business manager with a validity start date
pub async fn link_consultant_to_manager(
    conn: &mut SqliteConnection,
    consultant_id: Uuid,
    manager_id: Uuid,
    start_date: NaiveDate,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO consultant_managers (consultant_id, manager_id, start_date, created_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(consultant_id, manager_id) DO UPDATE SET
            start_date = excluded.start_date
        "#,
    )
    .bind(consultant_id.to_string())
    .bind(manager_id.to_string())
    .bind(start_date)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Managers linked to a consultant, with link start dates
pub async fn load_manager_links(
    conn: &mut SqliteConnection,
    consultant_id: Uuid,
) -> Result<Vec<(Uuid, NaiveDate)>> {
    let rows: Vec<(String, NaiveDate)> = sqlx::query_as(
        "SELECT manager_id, start_date FROM consultant_managers WHERE consultant_id = ? ORDER BY start_date",
    )
    .bind(consultant_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(manager_id, start)| -> Result<(Uuid, NaiveDate)> {
            Ok((parse_guid(&manager_id)?, start))
        })
        .collect()
}
