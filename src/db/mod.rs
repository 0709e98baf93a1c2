mod models;
mod seeders;

pub use models::*;
pub use seeders::ensure_first_superuser;

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

pub type DbPool = SqlitePool;

const DB_FILE: &str = "stockroom.db";

/// Schema migrations, applied in order on every startup. All statements are
/// written IF NOT EXISTS so re-running them is harmless.
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_initial", include_str!("../../migrations/001_initial.sql")),
    ("002_inventory", include_str!("../../migrations/002_inventory.sql")),
];

pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join(DB_FILE);
    info!("Opening database at {}", db_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite:{}?mode=rwc", db_path.display()))
        .await?;

    configure(&pool).await?;
    migrate(&pool).await?;

    Ok(pool)
}

/// WAL for concurrent readers; foreign keys are off by default in SQLite
/// and the schema depends on them.
async fn configure(pool: &SqlitePool) -> Result<()> {
    for pragma in [
        "PRAGMA journal_mode = WAL",
        "PRAGMA synchronous = NORMAL",
        "PRAGMA foreign_keys = ON",
    ] {
        sqlx::query(pragma).execute(pool).await?;
    }
    Ok(())
}

async fn migrate(pool: &SqlitePool) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        info!("Applying migration {}", name);
        run_script(pool, sql).await?;
    }
    Ok(())
}

/// Run a multi-statement SQL script. sqlx executes one statement at a time,
/// so the script is split on ';' with `--` comment lines dropped first.
async fn run_script(pool: &SqlitePool, script: &str) -> Result<()> {
    for statement in script.split(';') {
        let stripped: String = statement
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        if !stripped.trim().is_empty() {
            sqlx::query(stripped.trim()).execute(pool).await?;
        }
    }
    Ok(())
}

/// In-memory database for tests. A single connection is required so every
/// query sees the same `:memory:` instance.
#[cfg(test)]
pub(crate) async fn init_test() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();

    migrate(&pool).await.unwrap();
    pool
}
