//! Postgres persistence layer.
//!
//! All queries are runtime-checked `sqlx` queries against the schema in
//! `migrations/`. The handle is cheap to clone; it wraps one shared pool.

mod mutations;
mod scans;
mod servers;
mod tools;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect and verify the database is reachable.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(25)
            .min_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .idle_timeout(std::time::Duration::from_secs(30 * 60))
            .max_lifetime(std::time::Duration::from_secs(60 * 60))
            .connect(database_url)
            .await?;

        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub async fn health(&self) -> Result<(), sqlx::Error> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
    }
}
