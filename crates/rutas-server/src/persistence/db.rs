//! Database connection and schema versioning.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

/// Ordered schema migrations. Each runs once, inside its own transaction.
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_init", include_str!("../../migrations/001_init.sql")),
    ("002_promotions", include_str!("../../migrations/002_promotions.sql")),
];

#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Open the SQLite file at `db_path` (or an in-memory database for
/// `":memory:"`) and bring its schema up to date.
pub async fn init_database(db_path: &str, max_connections: u32) -> Result<Database> {
    let (options, max_connections) = if db_path == ":memory:" {
        // Every connection would get its own empty in-memory database.
        (SqliteConnectOptions::from_str("sqlite::memory:")?, 1)
    } else {
        if let Some(parent) = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        (options, max_connections.max(1))
    };
    let options = options.foreign_keys(true);

    info!(path = db_path, max_connections, "Opening database");
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("opening database {db_path}"))?;

    apply_migrations(&pool).await?;
    Ok(Database { pool })
}

async fn apply_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;

    for &(name, sql) in MIGRATIONS {
        let applied: Option<(String,)> =
            sqlx::query_as("SELECT name FROM schema_migrations WHERE name = ?1")
                .bind(name)
                .fetch_optional(pool)
                .await?;
        if applied.is_some() {
            continue;
        }

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {name} failed"))?;
        sqlx::query("INSERT INTO schema_migrations (name) VALUES (?1)")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(migration = name, "Applied migration");
    }
    Ok(())
}
