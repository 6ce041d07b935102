//! Organisations repository.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::Organisation;

fn from_row((id, name, external_id): (String, String, String)) -> Result<Organisation> {
    Ok(Organisation {
        id: id.parse().context("Invalid organisation id in database")?,
        name,
        external_id,
    })
}

pub async fn save_organisation(pool: &SqlitePool, organisation: &Organisation) -> Result<()> {
    sqlx::query(
        "INSERT INTO organisations (id, name, external_id) VALUES (?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, external_id = excluded.external_id",
    )
    .bind(organisation.id.to_string())
    .bind(&organisation.name)
    .bind(&organisation.external_id)
    .execute(pool)
    .await
    .context("Failed to save organisation")?;

    Ok(())
}

pub async fn get_organisation(pool: &SqlitePool, id: Uuid) -> Result<Option<Organisation>> {
    let row: Option<(String, String, String)> =
        sqlx::query_as("SELECT id, name, external_id FROM organisations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(pool)
            .await
            .context("Failed to get organisation")?;

    row.map(from_row).transpose()
}

pub async fn get_organisation_by_external_id(
    pool: &SqlitePool,
    external_id: &str,
) -> Result<Option<Organisation>> {
    let row: Option<(String, String, String)> =
        sqlx::query_as("SELECT id, name, external_id FROM organisations WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(pool)
            .await
            .context("Failed to get organisation by external id")?;

    row.map(from_row).transpose()
}

pub async fn list_organisations(pool: &SqlitePool) -> Result<Vec<Organisation>> {
    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT id, name, external_id FROM organisations ORDER BY name")
            .fetch_all(pool)
            .await
            .context("Failed to list organisations")?;

    rows.into_iter().map(from_row).collect()
}
