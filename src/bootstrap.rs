//! One-time admin seeding. Without an admin account nothing could ever
//! reach the evaluator's admin branch, so the server refuses to start
//! until exactly one exists.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::utils::{hash_password, utc_now};

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@trellis.local";
const DEFAULT_ADMIN_PASSWORD: &str = "trellis-admin";

/// Ensure the well-known admin account exists, creating it when absent.
/// Idempotent; matched by email.
pub async fn ensure_admin(pool: &SqlitePool) -> AppResult<Uuid> {
    let email =
        std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string());

    let existing: Option<Uuid> = sqlx::query_scalar(
        "SELECT id FROM users WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(&email)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = existing {
        tracing::debug!(%email, "admin account already present");
        return Ok(id);
    }

    let password = match std::env::var("ADMIN_PASSWORD") {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(%email, "ADMIN_PASSWORD not set, using built-in default");
            DEFAULT_ADMIN_PASSWORD.to_string()
        }
    };

    let password_hash = hash_password(&password)?;
    let now = utc_now();
    let admin_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, global_role, created_at, updated_at)
         VALUES (?, ?, ?, ?, 'admin', ?, ?)",
    )
    .bind(admin_id)
    .bind("Administrator")
    .bind(&email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(%email, "created bootstrap admin account");
    Ok(admin_id)
}
