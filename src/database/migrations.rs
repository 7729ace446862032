//! # Database Migrations
//!
//! Schema files live in `migrations/` using the `YYYYMMDDHHMMSS_description.sql`
//! naming convention and are embedded into the binary at compile time.
//! The migrator records applied versions in `_sqlx_migrations` and takes a
//! PostgreSQL advisory lock while running, so concurrent server starts and
//! parallel test databases are safe.

use sqlx::migrate::Migrator;
use sqlx::PgPool;

use super::StoreResult;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Apply all outstanding migrations
    pub async fn run_all(pool: &PgPool) -> StoreResult<()> {
        let known = MIGRATOR.iter().count();
        tracing::info!(known_migrations = known, "Running database migrations");
        MIGRATOR.run(pool).await?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }
}
