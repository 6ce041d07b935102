//! Grants repository.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::schema::Grant;

pub async fn save_grant(pool: &SqlitePool, grant: &Grant) -> Result<()> {
    sqlx::query(
        "INSERT INTO grants (id, name, is_live) VALUES (?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, is_live = excluded.is_live",
    )
    .bind(grant.id.to_string())
    .bind(&grant.name)
    .bind(grant.is_live)
    .execute(pool)
    .await
    .context("Failed to save grant")?;

    Ok(())
}

pub async fn get_grant(pool: &SqlitePool, grant_id: Uuid) -> Result<Option<Grant>> {
    let row: Option<(String, String, bool)> =
        sqlx::query_as("SELECT id, name, is_live FROM grants WHERE id = ?")
            .bind(grant_id.to_string())
            .fetch_optional(pool)
            .await
            .context("Failed to get grant")?;

    row.map(|(id, name, is_live)| {
        Ok(Grant {
            id: id.parse().context("Invalid grant id in database")?,
            name,
            is_live,
        })
    })
    .transpose()
}

pub async fn get_grant_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Grant>> {
    let row: Option<(String, String, bool)> =
        sqlx::query_as("SELECT id, name, is_live FROM grants WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await
            .context("Failed to get grant by name")?;

    row.map(|(id, name, is_live)| {
        Ok(Grant {
            id: id.parse().context("Invalid grant id in database")?,
            name,
            is_live,
        })
    })
    .transpose()
}

pub async fn list_grants(pool: &SqlitePool) -> Result<Vec<Grant>> {
    let rows: Vec<(String, String, bool)> =
        sqlx::query_as("SELECT id, name, is_live FROM grants ORDER BY name")
            .fetch_all(pool)
            .await
            .context("Failed to list grants")?;

    rows.into_iter()
        .map(|(id, name, is_live)| {
            Ok(Grant {
                id: id.parse().context("Invalid grant id in database")?,
                name,
                is_live,
            })
        })
        .collect()
}
