//! # Embedded Schema
//!
//! Schema for the SQLite durable store backend, applied at connect time.
//! The entire store is one table: a record per logical key, written and
//! replaced atomically.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::StoreResult;

/// DDL for the key/value record table.
///
/// `updated_at` exists for operational inspection only; no engine code reads
/// it back.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_records (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// Applies the schema to a freshly opened pool.
pub async fn run(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(SCHEMA).execute(pool).await?;
    debug!("Store schema ready");
    Ok(())
}
