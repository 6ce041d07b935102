use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::collection::CollectionCommands;
use super::commands::grant::GrantCommands;
use super::commands::submission::SubmissionCommands;

#[derive(Parser)]
#[command(name = "reporting-cli")]
#[command(about = "Author grant reporting collections and run their submissions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the SQLite database (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Grant management
    Grant(GrantCommands),
    /// Collection schema management
    Collection(CollectionCommands),
    /// Submission management
    Submission(SubmissionCommands),
    /// Seed the database with the exemplar grant and collection
    Seed,
}
