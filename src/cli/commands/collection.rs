use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::schema::Collection;
use crate::store::repository::{collections, grants};

#[derive(Args)]
pub struct CollectionCommands {
    #[command(subcommand)]
    pub command: CollectionSubcommands,
}

#[derive(Subcommand)]
pub enum CollectionSubcommands {
    /// List collections for a grant
    List {
        /// Grant id
        grant_id: Uuid,
    },
    /// Export a collection schema as JSON
    Export {
        /// Collection id
        collection_id: Uuid,
        /// Schema version (defaults to the latest)
        #[arg(long)]
        version: Option<u32>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Import a collection schema from a JSON export
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Create a new editable version of a collection's schema
    NewVersion {
        /// Collection id
        collection_id: Uuid,
    },
}

pub async fn handle_collection_command(pool: &SqlitePool, cmd: CollectionCommands) -> Result<()> {
    match cmd.command {
        CollectionSubcommands::List { grant_id } => {
            let grant = grants::get_grant(pool, grant_id)
                .await?
                .with_context(|| format!("Grant {grant_id} not found"))?;
            let collections = collections::list_collections_for_grant(pool, grant_id).await?;
            println!("Collections for grant '{}':", grant.name);
            if collections.is_empty() {
                println!("  (none)");
            }
            for collection in collections {
                println!(
                    "  {}  v{}  {}  ({} sections, {} forms)",
                    collection.id,
                    collection.version,
                    collection.name,
                    collection.sections.len(),
                    collection.forms().count()
                );
            }
        }

        CollectionSubcommands::Export {
            collection_id,
            version,
            out,
        } => {
            let collection = match version {
                Some(version) => collections::get_collection(pool, collection_id, version).await?,
                None => collections::get_latest_collection(pool, collection_id).await?,
            }
            .with_context(|| format!("Collection {collection_id} not found"))?;

            let json = serde_json::to_string_pretty(&collection)
                .context("Failed to serialise collection")?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!(
                        "Exported '{}' v{} to {}",
                        collection.name,
                        collection.version,
                        path.display()
                    );
                }
                None => println!("{json}"),
            }
        }

        CollectionSubcommands::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let collection: Collection =
                serde_json::from_str(&json).context("Failed to parse collection JSON")?;

            grants::get_grant(pool, collection.grant_id)
                .await?
                .with_context(|| {
                    format!(
                        "Collection references grant {} which does not exist here",
                        collection.grant_id
                    )
                })?;

            collections::save_collection(pool, &collection).await?;
            println!(
                "Imported '{}' as {} v{}",
                collection.name, collection.id, collection.version
            );
        }

        CollectionSubcommands::NewVersion { collection_id } => {
            let current = collections::get_latest_collection(pool, collection_id)
                .await?
                .with_context(|| format!("Collection {collection_id} not found"))?;
            let next = current.create_new_version();
            collections::save_collection(pool, &next).await?;
            println!("Created '{}' v{}", next.name, next.version);
        }
    }

    Ok(())
}
