//! Metadata store trait and implementations.

use crate::error::MetadataResult;
use crate::models::PackageRow;
use crate::repos::PackageRepo;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: PackageRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            // Every committed Put/Delete must survive power loss.
            .synchronous(sqlx::sqlite::SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // Writers are already serialized per repository; one connection
            // keeps SQLite from reporting "database is locked" across repos.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "opened metadata store");

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PackageRepo for SqliteStore {
    async fn put_package(&self, row: &PackageRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO packages (
                repo_name, file_name, name, version, architecture, checksum,
                compressed_size, pgp_signature, details, ingested_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (repo_name, file_name) DO UPDATE SET
                name = excluded.name,
                version = excluded.version,
                architecture = excluded.architecture,
                checksum = excluded.checksum,
                compressed_size = excluded.compressed_size,
                pgp_signature = excluded.pgp_signature,
                details = excluded.details,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(&row.repo_name)
        .bind(&row.file_name)
        .bind(&row.name)
        .bind(&row.version)
        .bind(&row.architecture)
        .bind(&row.checksum)
        .bind(row.compressed_size)
        .bind(&row.pgp_signature)
        .bind(&row.details)
        .bind(row.ingested_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_package(
        &self,
        repo_name: &str,
        file_name: &str,
    ) -> MetadataResult<Option<PackageRow>> {
        let row = sqlx::query_as::<_, PackageRow>(
            "SELECT * FROM packages WHERE repo_name = ? AND file_name = ?",
        )
        .bind(repo_name)
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_package(&self, repo_name: &str, file_name: &str) -> MetadataResult<bool> {
        let result = sqlx::query("DELETE FROM packages WHERE repo_name = ? AND file_name = ?")
            .bind(repo_name)
            .bind(file_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_packages(&self, repo_name: &str) -> MetadataResult<Vec<PackageRow>> {
        let rows = sqlx::query_as::<_, PackageRow>(
            "SELECT * FROM packages WHERE repo_name = ? ORDER BY file_name",
        )
        .bind(repo_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS packages (
    repo_name TEXT NOT NULL,
    file_name TEXT NOT NULL,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    architecture TEXT NOT NULL,
    checksum TEXT NOT NULL,
    compressed_size INTEGER NOT NULL,
    pgp_signature TEXT,
    details TEXT NOT NULL,
    ingested_at TEXT NOT NULL,
    PRIMARY KEY (repo_name, file_name)
);
CREATE INDEX IF NOT EXISTS idx_packages_repo_arch ON packages(repo_name, architecture);
"#;
