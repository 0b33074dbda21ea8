//! Business manager database operations

use sqlx::{Row, SqliteConnection};
use staffing_common::db::BusinessManager;
use staffing_common::Result;
use uuid::Uuid;

use super::parse_guid;

/// Save business manager, keyed by email
///
/// Returns the guid of the stored row: the existing one when the email is
/// already known (its creation timestamp is kept), otherwise `manager.guid`.
pub async fn save_manager(conn: &mut SqliteConnection, manager: &BusinessManager) -> Result<Uuid> {
    let guid: String = sqlx::query_scalar(
        r#"
        INSERT INTO business_managers (
            guid, last_name, first_name, email, phone, active, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(email) DO UPDATE SET
            last_name = excluded.last_name,
            first_name = excluded.first_name,
            phone = excluded.phone,
            active = excluded.active,
            updated_at = CURRENT_TIMESTAMP
        RETURNING guid
        "#,
    )
    .bind(manager.guid.to_string())
    .bind(&manager.last_name)
    .bind(&manager.first_name)
    .bind(&manager.email)
    .bind(&manager.phone)
    .bind(manager.active)
    .bind(manager.created_at.to_rfc3339())
    .fetch_one(&mut *conn)
    .await?;

    parse_guid(&guid)
}

/// Load business manager by email
pub async fn load_manager_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<BusinessManager>> {
    let row = sqlx::query(
        r#"
        SELECT guid, last_name, first_name, email, phone, active, created_at
        FROM business_managers
        WHERE email = ?
        "#,
    )
    .bind(email)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let guid: String = row.get("guid");
            let created_at: String = row.get("created_at");
            let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| {
                    staffing_common::Error::Internal(format!("Failed to parse created_at: {}", e))
                })?
                .with_timezone(&chrono::Utc);

            Ok(Some(BusinessManager {
                guid: parse_guid(&guid)?,
                last_name: row.get("last_name"),
                first_name: row.get("first_name"),
                email: row.get("email"),
                phone: row.get("phone"),
                active: row.get("active"),
                created_at,
            }))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_save_is_idempotent_on_email() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        staffing_common::db::init_schema(&pool)
            .await
            .expect("Schema initialization failed");
        let mut conn = pool.acquire().await.unwrap();

        let first = BusinessManager::new("LAPINA".into(), "Eric".into(), "eric.lapina@x.fr".into());
        let stored = save_manager(&mut conn, &first).await.expect("Failed to save manager");
        assert_eq!(stored, first.guid);

        let mut again = BusinessManager::new("Lapina".into(), "Eric".into(), "eric.lapina@x.fr".into());
        again.phone = Some("0600000000".into());
        let stored_again = save_manager(&mut conn, &again).await.unwrap();
        assert_eq!(stored_again, first.guid, "existing guid is kept");

        let loaded = load_manager_by_email(&mut conn, "eric.lapina@x.fr")
            .await
            .unwrap()
            .expect("Manager not found");
        assert_eq!(loaded.last_name, "Lapina");
        assert_eq!(loaded.phone.as_deref(), Some("0600000000"));
        assert!(loaded.active);
    }
}
