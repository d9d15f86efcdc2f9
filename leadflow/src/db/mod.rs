//! Store layer: connection setup, migrations and typed repositories.
//!
//! All core logic goes through the repositories in [`handlers`]; SQL lives
//! here and nowhere else. The bundled driver is SQLite so the engine is
//! self-contained; the repository seam keeps a server-backed store swappable.

pub mod errors;
pub mod handlers;
pub mod models;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Get the store migrator (embedded from `./migrations`).
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to the store, run migrations and the lazy column upgrades.
///
/// An unreachable or malformed URL is an init failure: the caller is expected
/// to log it and exit non-zero.
pub async fn connect(url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid database URL: {url}"))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("store unavailable")?;

    prepare(&pool).await?;
    info!(url, "store ready");
    Ok(pool)
}

/// In-memory store, mostly for tests and demos. A single connection keeps
/// every handle on the same memory database.
pub async fn connect_memory() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .context("open in-memory store")?;
    prepare(&pool).await?;
    Ok(pool)
}

/// Run migrations plus the idempotent schema upgrades.
pub async fn prepare(pool: &SqlitePool) -> anyhow::Result<()> {
    migrator().run(pool).await.context("run migrations")?;
    ensure_client_soft_delete_columns(pool).await?;
    Ok(())
}

/// Add `is_deleted`/`deleted_at` to `business_clients` when absent.
///
/// Stores created before soft delete existed lack these columns; the check
/// runs on every startup and is a no-op once they are present.
pub async fn ensure_client_soft_delete_columns(pool: &SqlitePool) -> anyhow::Result<()> {
    let columns = sqlx::query("PRAGMA table_info(business_clients)")
        .fetch_all(pool)
        .await
        .context("inspect business_clients schema")?;
    let has = |name: &str| {
        columns
            .iter()
            .any(|row| row.get::<String, _>("name") == name)
    };

    if !has("is_deleted") {
        sqlx::query("ALTER TABLE business_clients ADD COLUMN is_deleted INTEGER NOT NULL DEFAULT 0")
            .execute(pool)
            .await
            .context("add business_clients.is_deleted")?;
        info!("added business_clients.is_deleted column");
    }
    if !has("deleted_at") {
        sqlx::query("ALTER TABLE business_clients ADD COLUMN deleted_at TEXT")
            .execute(pool)
            .await
            .context("add business_clients.deleted_at")?;
        info!("added business_clients.deleted_at column");
    }
    Ok(())
}
