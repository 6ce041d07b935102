//! Collections repository. The schema tree is stored as one JSON document
//! per `(id, version)`; a few columns are denormalised for lookups.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::schema::Collection;

pub async fn save_collection(pool: &SqlitePool, collection: &Collection) -> Result<()> {
    let schema_json =
        serde_json::to_string(collection).context("Failed to serialise collection")?;

    sqlx::query(
        "INSERT INTO collections (id, version, grant_id, name, slug, schema_json)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id, version) DO UPDATE SET
             name = excluded.name, slug = excluded.slug, schema_json = excluded.schema_json",
    )
    .bind(collection.id.to_string())
    .bind(collection.version as i64)
    .bind(collection.grant_id.to_string())
    .bind(&collection.name)
    .bind(&collection.slug)
    .bind(schema_json)
    .execute(pool)
    .await
    .context("Failed to save collection")?;

    Ok(())
}

pub async fn get_collection(
    pool: &SqlitePool,
    collection_id: Uuid,
    version: u32,
) -> Result<Option<Collection>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT schema_json FROM collections WHERE id = ? AND version = ?")
            .bind(collection_id.to_string())
            .bind(version as i64)
            .fetch_optional(pool)
            .await
            .context("Failed to get collection")?;

    row.map(|(schema_json,)| {
        serde_json::from_str(&schema_json).context("Failed to deserialise collection")
    })
    .transpose()
}

pub async fn get_latest_collection(
    pool: &SqlitePool,
    collection_id: Uuid,
) -> Result<Option<Collection>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT schema_json FROM collections WHERE id = ? ORDER BY version DESC LIMIT 1",
    )
    .bind(collection_id.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to get latest collection")?;

    row.map(|(schema_json,)| {
        serde_json::from_str(&schema_json).context("Failed to deserialise collection")
    })
    .transpose()
}

pub async fn list_collections_for_grant(
    pool: &SqlitePool,
    grant_id: Uuid,
) -> Result<Vec<Collection>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT schema_json FROM collections c
         WHERE grant_id = ?
           AND version = (SELECT MAX(version) FROM collections WHERE id = c.id)
         ORDER BY name",
    )
    .bind(grant_id.to_string())
    .fetch_all(pool)
    .await
    .context("Failed to list collections")?;

    rows.into_iter()
        .map(|(schema_json,)| {
            serde_json::from_str(&schema_json).context("Failed to deserialise collection")
        })
        .collect()
}

/// Deletes every version of a collection. Submissions and their events go
/// with it through the foreign-key cascades. Returns the number of versions
/// removed.
pub async fn delete_collection(pool: &SqlitePool, collection_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM collections WHERE id = ?")
        .bind(collection_id.to_string())
        .execute(pool)
        .await
        .context("Failed to delete collection")?;

    Ok(result.rows_affected())
}

/// LIVE submissions pinned to this schema version; the authoring lock only
/// counts these.
pub async fn count_live_submissions(
    pool: &SqlitePool,
    collection_id: Uuid,
    version: u32,
) -> Result<usize> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM submissions
         WHERE collection_id = ? AND collection_version = ? AND mode = 'LIVE'",
    )
    .bind(collection_id.to_string())
    .bind(version as i64)
    .fetch_one(pool)
    .await
    .context("Failed to count live submissions")?;

    Ok(count as usize)
}
