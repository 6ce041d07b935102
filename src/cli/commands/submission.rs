use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use log::warn;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::Role;
use crate::error::LifecycleError;
use crate::store::repository::{collections, grants, organisations, submissions, users};
use crate::submission::{Submission, SubmissionMode};

#[derive(Args)]
pub struct SubmissionCommands {
    #[command(subcommand)]
    pub command: SubmissionSubcommands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Test,
    Live,
}

impl From<ModeArg> for SubmissionMode {
    fn from(mode: ModeArg) -> SubmissionMode {
        match mode {
            ModeArg::Test => SubmissionMode::Test,
            ModeArg::Live => SubmissionMode::Live,
        }
    }
}

#[derive(Subcommand)]
pub enum SubmissionSubcommands {
    /// List submissions for a collection
    List {
        /// Collection id
        collection_id: Uuid,
    },
    /// Show one submission's status and event history
    Show {
        /// Submission id
        submission_id: Uuid,
    },
    /// Create submissions in bulk from a CSV of
    /// (organisation_external_id, submission_name) rows
    CreateMulti {
        /// Collection id
        collection_id: Uuid,
        /// Path to the CSV file
        csv: PathBuf,
        /// TEST or LIVE
        #[arg(long, value_enum, default_value = "test")]
        mode: ModeArg,
        /// Email address of the acting user
        #[arg(long)]
        created_by: String,
        /// Report what would be created without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete all TEST submissions for a collection
    PurgeTest {
        /// Collection id
        collection_id: Uuid,
    },
}

pub async fn handle_submission_command(pool: &SqlitePool, cmd: SubmissionCommands) -> Result<()> {
    match cmd.command {
        SubmissionSubcommands::List { collection_id } => {
            let all = submissions::list_submissions_for_collection(pool, collection_id).await?;
            println!("Submissions for collection {collection_id}:");
            if all.is_empty() {
                println!("  (none)");
            }
            for submission in all {
                println!(
                    "  {}  {}  {}  v{}  {}",
                    submission.reference(),
                    submission.mode,
                    submission.status(),
                    submission.collection_version,
                    submission.name
                );
            }
        }

        SubmissionSubcommands::Show { submission_id } => {
            let submission = submissions::get_submission(pool, submission_id)
                .await?
                .with_context(|| format!("Submission {submission_id} not found"))?;
            println!("Submission {} ({})", submission.reference(), submission.id);
            println!("  Name:    {}", submission.name);
            println!("  Mode:    {}", submission.mode);
            println!("  Status:  {}", submission.status());
            println!(
                "  Schema:  {} v{}",
                submission.collection_id, submission.collection_version
            );
            println!("  Events:");
            if submission.events.is_empty() {
                println!("    (none)");
            }
            for event in &submission.events {
                println!(
                    "    {}  {}  by {}",
                    event.created_at_utc.format("%Y-%m-%d %H:%M:%S"),
                    event.event_type,
                    event.created_by
                );
            }
        }

        SubmissionSubcommands::CreateMulti {
            collection_id,
            csv,
            mode,
            created_by,
            dry_run,
        } => {
            create_multi(pool, collection_id, &csv, mode.into(), &created_by, dry_run).await?;
        }

        SubmissionSubcommands::PurgeTest { collection_id } => {
            let purged = submissions::purge_test_submissions(pool, collection_id).await?;
            println!("Purged {purged} test submissions");
        }
    }

    Ok(())
}

async fn create_multi(
    pool: &SqlitePool,
    collection_id: Uuid,
    csv_path: &std::path::Path,
    mode: SubmissionMode,
    created_by_email: &str,
    dry_run: bool,
) -> Result<()> {
    let collection = collections::get_latest_collection(pool, collection_id)
        .await?
        .with_context(|| format!("Collection {collection_id} not found"))?;
    let grant = grants::get_grant(pool, collection.grant_id)
        .await?
        .with_context(|| format!("Grant {} not found", collection.grant_id))?;
    if mode == SubmissionMode::Live && !grant.is_live {
        return Err(LifecycleError::GrantMustBeLive.into());
    }
    let user = users::get_user_by_email(pool, created_by_email)
        .await?
        .with_context(|| format!("No user with email {created_by_email}"))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open {}", csv_path.display()))?;

    let mut created = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for (line, record) in reader.records().enumerate() {
        let row = line + 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!("Row {row}: unreadable: {err}");
                println!("row {row}: ERROR unreadable record: {err}");
                failed += 1;
                continue;
            }
        };
        let (external_id, name) = match (record.get(0), record.get(1)) {
            (Some(external_id), Some(name)) if !external_id.is_empty() && !name.is_empty() => {
                (external_id, name)
            }
            _ => {
                println!("row {row}: ERROR expected organisation_external_id,submission_name");
                failed += 1;
                continue;
            }
        };

        let organisation =
            match organisations::get_organisation_by_external_id(pool, external_id).await? {
                Some(organisation) => organisation,
                None => {
                    println!("row {row}: ERROR unknown organisation '{external_id}'");
                    failed += 1;
                    continue;
                }
            };

        if mode == SubmissionMode::Live {
            let recipients = users::count_users_with_role_for_organisation(
                pool,
                Role::GrantRecipient,
                organisation.id,
            )
            .await?;
            if recipients == 0 {
                let err = LifecycleError::GrantRecipientUsersRequired(organisation.id);
                println!("row {row}: ERROR {err}");
                failed += 1;
                continue;
            }
        }

        if submissions::submission_name_exists(pool, collection.id, name).await? {
            println!("row {row}: skip '{name}' (already exists)");
            skipped += 1;
            continue;
        }

        if dry_run {
            println!("row {row}: would create '{name}' for {}", organisation.name);
            created += 1;
            continue;
        }

        let submission = Submission::new(
            collection.id,
            collection.version,
            mode,
            name,
            Some(organisation.id),
            user.id,
        );
        submissions::insert_submission(pool, &submission).await?;
        println!(
            "row {row}: created {} '{name}' for {}",
            submission.reference(),
            organisation.name
        );
        created += 1;
    }

    println!(
        "{}: {created} created, {skipped} skipped, {failed} failed",
        if dry_run { "Dry run" } else { "Done" }
    );
    if failed > 0 && !dry_run {
        anyhow::bail!("{failed} rows failed");
    }
    Ok(())
}
