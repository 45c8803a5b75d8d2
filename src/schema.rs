//! Database schema management for `hydrosense-monitor`.
//!
//! Only the app's own settings live in PostgreSQL; sensor data stays in the
//! realtime store. Applied once on startup from `main.rs` when
//! `DATABASE_URL` is configured.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the settings table (idempotent).
///
/// Safe to call on every startup; no-op if the table already exists.
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Key-value settings read by `settings::PgKeyValueStore`
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS app_settings (
            key        TEXT        PRIMARY KEY,
            value      TEXT        NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
