//! bkd-db
//!
//! Durable storage for reservations and their payment ledger, plus the
//! in-memory twin used by tests and dev mode.

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

mod error;
mod mem;
mod pg;
mod store;

pub use error::StoreError;
pub use mem::{ApartmentRecord, ClientRecord, MemStore};
pub use pg::PgStore;
pub use store::{NewReservationDerived, ReservationStore};

pub const ENV_DB_URL: &str = "BKD_DATABASE_URL";

/// Connect to Postgres using BKD_DATABASE_URL.
///
/// `acquire_timeout` is the fail-closed deadline for checking out a
/// connection; store operations time out rather than hang.
pub async fn connect_from_env(max_connections: u32, acquire_timeout: Duration) -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='reservations'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_reservations_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_reservations_table: bool,
}
