
pub mod models;
pub mod queries;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

pub use models::{ListOptions, NewScript, ScriptRecord, ScriptUpdate};
pub use queries::ScriptQueries;

pub type DbPool = Pool<Sqlite>;

const CREATE_SCRIPTS_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS scripts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    path TEXT NOT NULL UNIQUE,
    category TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    usage TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '[]',
    dependencies TEXT NOT NULL DEFAULT '[]',
    embedding_text TEXT NOT NULL DEFAULT '',
    embedding TEXT,
    tokens INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL
)";

const CREATE_CATEGORY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_scripts_category ON scripts (category)";

/// Connection handle over the SQLite script store.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_url: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_url)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.initialize_schema().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Create the scripts table and indexes if they do not exist yet.
    pub async fn initialize_schema(&self) -> Result<()> {
        info!("Initializing database schema");

        sqlx::query(CREATE_SCRIPTS_TABLE)
            .execute(&self.pool)
            .await
            .context("Failed to create scripts table")?;

        sqlx::query(CREATE_CATEGORY_INDEX)
            .execute(&self.pool)
            .await
            .context("Failed to create category index")?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Drop and recreate the schema. Backs the seeding CLI `--force` flag.
    pub async fn reset_schema(&self) -> Result<()> {
        info!("Resetting database schema");

        sqlx::query("DROP TABLE IF EXISTS scripts")
            .execute(&self.pool)
            .await
            .context("Failed to drop scripts table")?;

        self.initialize_schema().await
    }

    /// Reclaim space and refresh query-planner statistics.
    pub async fn optimize(&self) -> Result<()> {
        info!("Optimizing database");

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .context("Failed to vacuum database")?;

        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .context("Failed to analyze database")?;

        debug!("Database optimization completed");
        Ok(())
    }
}
