//! Submissions and event log repository.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::submission::events::{SubmissionEvent, SubmissionEventType};
use crate::submission::{Submission, SubmissionMode};

use super::users::parse_timestamp;

pub async fn insert_submission(pool: &SqlitePool, submission: &Submission) -> Result<()> {
    let data_json =
        serde_json::to_string(&submission.data).context("Failed to serialise submission data")?;

    sqlx::query(
        "INSERT INTO submissions
             (id, collection_id, collection_version, mode, name, organisation_id,
              created_by, created_at_utc, data_json)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(submission.id.to_string())
    .bind(submission.collection_id.to_string())
    .bind(submission.collection_version as i64)
    .bind(submission.mode.to_string())
    .bind(&submission.name)
    .bind(submission.organisation_id.map(|id| id.to_string()))
    .bind(submission.created_by.to_string())
    .bind(submission.created_at_utc.to_rfc3339())
    .bind(data_json)
    .execute(pool)
    .await
    .context("Failed to insert submission")?;

    Ok(())
}

/// Persists the answer map after a write through the helper.
pub async fn save_submission_data(pool: &SqlitePool, submission: &Submission) -> Result<()> {
    let data_json =
        serde_json::to_string(&submission.data).context("Failed to serialise submission data")?;

    sqlx::query("UPDATE submissions SET data_json = ? WHERE id = ?")
        .bind(data_json)
        .bind(submission.id.to_string())
        .execute(pool)
        .await
        .context("Failed to save submission data")?;

    Ok(())
}

pub async fn append_event(
    pool: &SqlitePool,
    submission_id: Uuid,
    event: &SubmissionEvent,
) -> Result<()> {
    let data_json =
        serde_json::to_string(&event.data).context("Failed to serialise event data")?;

    sqlx::query(
        "INSERT INTO submission_events
             (id, submission_id, event_type, related_entity_id, created_by,
              created_at_utc, data_json)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(event.id.to_string())
    .bind(submission_id.to_string())
    .bind(event.event_type.as_str())
    .bind(event.related_entity_id.to_string())
    .bind(event.created_by.to_string())
    .bind(event.created_at_utc.to_rfc3339())
    .bind(data_json)
    .execute(pool)
    .await
    .context("Failed to append submission event")?;

    Ok(())
}

pub async fn get_submission(pool: &SqlitePool, submission_id: Uuid) -> Result<Option<Submission>> {
    type Row = (
        String,
        String,
        i64,
        String,
        String,
        Option<String>,
        String,
        String,
        String,
    );
    let row: Option<Row> = sqlx::query_as(
        "SELECT id, collection_id, collection_version, mode, name, organisation_id,
                created_by, created_at_utc, data_json
         FROM submissions WHERE id = ?",
    )
    .bind(submission_id.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to get submission")?;

    let Some((
        id,
        collection_id,
        collection_version,
        mode,
        name,
        organisation_id,
        created_by,
        created_at_utc,
        data_json,
    )) = row
    else {
        return Ok(None);
    };

    let id: Uuid = id.parse().context("Invalid submission id in database")?;
    let events = get_events(pool, id).await?;
    Ok(Some(Submission {
        id,
        collection_id: collection_id
            .parse()
            .context("Invalid collection id in database")?,
        collection_version: collection_version as u32,
        mode: parse_mode(&mode)?,
        name,
        organisation_id: organisation_id
            .map(|id| id.parse().context("Invalid organisation id in database"))
            .transpose()?,
        created_by: created_by.parse().context("Invalid user id in database")?,
        created_at_utc: parse_timestamp(&created_at_utc)?,
        data: serde_json::from_str(&data_json).context("Failed to parse submission data")?,
        events,
    }))
}

async fn get_events(pool: &SqlitePool, submission_id: Uuid) -> Result<Vec<SubmissionEvent>> {
    let rows: Vec<(String, String, String, String, String, String)> = sqlx::query_as(
        "SELECT id, event_type, related_entity_id, created_by, created_at_utc, data_json
         FROM submission_events WHERE submission_id = ? ORDER BY created_at_utc",
    )
    .bind(submission_id.to_string())
    .fetch_all(pool)
    .await
    .context("Failed to get submission events")?;

    rows.into_iter()
        .map(
            |(id, event_type, related_entity_id, created_by, created_at_utc, data_json)| {
                Ok(SubmissionEvent {
                    id: id.parse().context("Invalid event id in database")?,
                    event_type: parse_event_type(&event_type)?,
                    related_entity_id: related_entity_id
                        .parse()
                        .context("Invalid related entity id in database")?,
                    created_by: created_by.parse().context("Invalid user id in database")?,
                    created_at_utc: parse_timestamp(&created_at_utc)?,
                    data: serde_json::from_str(&data_json)
                        .context("Failed to parse event data")?,
                })
            },
        )
        .collect()
}

pub async fn list_submissions_for_collection(
    pool: &SqlitePool,
    collection_id: Uuid,
) -> Result<Vec<Submission>> {
    let ids: Vec<(String,)> = sqlx::query_as(
        "SELECT id FROM submissions WHERE collection_id = ? ORDER BY created_at_utc",
    )
    .bind(collection_id.to_string())
    .fetch_all(pool)
    .await
    .context("Failed to list submissions")?;

    let mut submissions = Vec::with_capacity(ids.len());
    for (id,) in ids {
        let id: Uuid = id.parse().context("Invalid submission id in database")?;
        if let Some(submission) = get_submission(pool, id).await? {
            submissions.push(submission);
        }
    }
    Ok(submissions)
}

/// Name already used for a submission against this collection; the
/// multi-submission CSV import keys dedup on it.
pub async fn submission_name_exists(
    pool: &SqlitePool,
    collection_id: Uuid,
    name: &str,
) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM submissions WHERE collection_id = ? AND name = ?",
    )
    .bind(collection_id.to_string())
    .bind(name)
    .fetch_one(pool)
    .await
    .context("Failed to check submission name")?;

    Ok(count > 0)
}

/// Deletes TEST submissions (and their events, via cascade) for a collection.
pub async fn purge_test_submissions(pool: &SqlitePool, collection_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM submissions WHERE collection_id = ? AND mode = 'TEST'")
        .bind(collection_id.to_string())
        .execute(pool)
        .await
        .context("Failed to purge test submissions")?;

    Ok(result.rows_affected())
}

fn parse_mode(raw: &str) -> Result<SubmissionMode> {
    match raw {
        "TEST" => Ok(SubmissionMode::Test),
        "LIVE" => Ok(SubmissionMode::Live),
        other => anyhow::bail!("Unknown submission mode in database: {other}"),
    }
}

fn parse_event_type(raw: &str) -> Result<SubmissionEventType> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .with_context(|| format!("Unknown event type in database: {raw}"))
}
