//! Users and role grants repository.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::{Role, User, UserRole};

pub async fn save_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (id, email_address, full_name, created_at_utc) VALUES (?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET email_address = excluded.email_address,
                                       full_name = excluded.full_name",
    )
    .bind(user.id.to_string())
    .bind(&user.email_address)
    .bind(&user.full_name)
    .bind(user.created_at_utc.to_rfc3339())
    .execute(pool)
    .await
    .context("Failed to save user")?;

    Ok(())
}

/// Inserts a role row. The `(user, organisation, grant, role)` unique
/// constraint rejects duplicates at the database level.
pub async fn add_user_role(pool: &SqlitePool, role: &UserRole) -> Result<()> {
    sqlx::query(
        "INSERT INTO user_roles (id, user_id, organisation_id, grant_id, role)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(role.id.to_string())
    .bind(role.user_id.to_string())
    .bind(role.organisation_id.map(|id| id.to_string()))
    .bind(role.grant_id.map(|id| id.to_string()))
    .bind(role.role.as_str())
    .execute(pool)
    .await
    .context("Failed to add user role")?;

    Ok(())
}

pub async fn get_user(pool: &SqlitePool, user_id: Uuid) -> Result<Option<User>> {
    let row: Option<(String, String, String, String)> = sqlx::query_as(
        "SELECT id, email_address, full_name, created_at_utc FROM users WHERE id = ?",
    )
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to get user")?;

    match row {
        Some(row) => Ok(Some(hydrate_user(pool, row).await?)),
        None => Ok(None),
    }
}

pub async fn get_user_by_email(pool: &SqlitePool, email_address: &str) -> Result<Option<User>> {
    let row: Option<(String, String, String, String)> = sqlx::query_as(
        "SELECT id, email_address, full_name, created_at_utc FROM users WHERE email_address = ?",
    )
    .bind(email_address)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by email")?;

    match row {
        Some(row) => Ok(Some(hydrate_user(pool, row).await?)),
        None => Ok(None),
    }
}

async fn hydrate_user(
    pool: &SqlitePool,
    (id, email_address, full_name, created_at_utc): (String, String, String, String),
) -> Result<User> {
    let user_id: Uuid = id.parse().context("Invalid user id in database")?;
    let roles = get_roles_for_user(pool, user_id).await?;
    Ok(User {
        id: user_id,
        email_address,
        full_name,
        created_at_utc: parse_timestamp(&created_at_utc)?,
        roles,
    })
}

async fn get_roles_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<UserRole>> {
    let rows: Vec<(String, String, Option<String>, Option<String>, String)> = sqlx::query_as(
        "SELECT id, user_id, organisation_id, grant_id, role FROM user_roles WHERE user_id = ?",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await
    .context("Failed to get user roles")?;

    rows.into_iter()
        .map(|(id, user_id, organisation_id, grant_id, role)| {
            Ok(UserRole {
                id: id.parse().context("Invalid role id in database")?,
                user_id: user_id.parse().context("Invalid user id in database")?,
                organisation_id: organisation_id
                    .map(|id| id.parse().context("Invalid organisation id in database"))
                    .transpose()?,
                grant_id: grant_id
                    .map(|id| id.parse().context("Invalid grant id in database"))
                    .transpose()?,
                role: parse_role(&role)?,
            })
        })
        .collect()
}

/// Users holding a role scoped to the given grant (directly or platform-wide).
pub async fn count_users_with_role_for_grant(
    pool: &SqlitePool,
    role: Role,
    grant_id: Uuid,
) -> Result<usize> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT user_id) FROM user_roles
         WHERE role = ? AND (grant_id = ? OR grant_id IS NULL)",
    )
    .bind(role.as_str())
    .bind(grant_id.to_string())
    .fetch_one(pool)
    .await
    .context("Failed to count users with role")?;

    Ok(count as usize)
}

/// Users holding a role scoped to the given organisation.
pub async fn count_users_with_role_for_organisation(
    pool: &SqlitePool,
    role: Role,
    organisation_id: Uuid,
) -> Result<usize> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT user_id) FROM user_roles WHERE role = ? AND organisation_id = ?",
    )
    .bind(role.as_str())
    .bind(organisation_id.to_string())
    .fetch_one(pool)
    .await
    .context("Failed to count organisation users with role")?;

    Ok(count as usize)
}

fn parse_role(raw: &str) -> Result<Role> {
    match raw {
        "ADMIN" => Ok(Role::Admin),
        "MEMBER" => Ok(Role::Member),
        "GRANT_RECIPIENT" => Ok(Role::GrantRecipient),
        "CERTIFIER" => Ok(Role::Certifier),
        other => anyhow::bail!("Unknown role in database: {other}"),
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in database: {raw}"))
}
