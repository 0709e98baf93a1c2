//! Database seeders for built-in data
//!
//! Currently this only covers the first superuser account, created on
//! startup so a fresh install is immediately usable.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::api::auth::hash_password;

/// Ensure the configured first superuser exists. Runs on every startup but
/// only writes when no user holds the configured email yet.
pub async fn ensure_first_superuser(pool: &SqlitePool, email: &str, password: &str) -> Result<()> {
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let id = uuid::Uuid::new_v4().to_string();
    let hashed_password =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, hashed_password, full_name, is_active, is_superuser, created_at, updated_at)
        VALUES (?, ?, ?, ?, 1, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(email)
    .bind(&hashed_password)
    .bind("Initial Superuser")
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    info!("Created first superuser: {}", email);
    Ok(())
}
