//! Database initialization
//!
//! Opens (creating if needed) the staffing database and ensures every managed
//! table exists. `reset_schema` is the destructive full-reset path: it drops
//! and recreates all managed tables and must only run when no other writer is
//! using the store.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Managed tables in drop order (children first)
pub const MANAGED_TABLES: [&str; 4] = [
    "missions",
    "consultant_managers",
    "consultants",
    "business_managers",
];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // The import runs as a single sequential writer
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all managed tables (idempotent - safe to call multiple times)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_business_managers_table(pool).await?;
    create_consultants_table(pool).await?;
    create_consultant_managers_table(pool).await?;
    create_missions_table(pool).await?;

    Ok(())
}

/// Drop and recreate every managed table
///
/// All persisted managers, consultants, links and missions are lost.
pub async fn reset_schema(pool: &SqlitePool) -> Result<()> {
    warn!("Full reset requested: dropping all managed tables");

    for table in MANAGED_TABLES {
        let sql = format!("DROP TABLE IF EXISTS {}", table);
        sqlx::query(&sql).execute(pool).await?;
        info!("Dropped table {}", table);
    }

    init_schema(pool).await?;
    info!("Managed tables recreated");

    Ok(())
}

async fn create_business_managers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS business_managers (
            guid TEXT PRIMARY KEY,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_consultants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consultants (
            guid TEXT PRIMARY KEY,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            salary REAL,
            active INTEGER NOT NULL DEFAULT 1,
            company TEXT,
            contract_date TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_consultant_managers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consultant_managers (
            consultant_id TEXT NOT NULL REFERENCES consultants(guid) ON DELETE CASCADE,
            manager_id TEXT NOT NULL REFERENCES business_managers(guid) ON DELETE CASCADE,
            start_date TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (consultant_id, manager_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_missions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS missions (
            guid TEXT PRIMARY KEY,
            consultant_id TEXT NOT NULL REFERENCES consultants(guid) ON DELETE CASCADE,
            mission_code TEXT NOT NULL,
            client_name TEXT NOT NULL,
            start_date TEXT,
            end_date TEXT,
            daily_rate REAL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (consultant_id, mission_code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
