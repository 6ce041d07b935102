use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use reporting_cli::cli::{Cli, Commands, commands};
use reporting_cli::store::db;

#[tokio::main]
async fn main() -> Result<()> {
    // Log to a file, truncated on each run, so CLI output stays clean.
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("reporting-cli.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let cli = Cli::parse();
    info!("Starting reporting-cli");

    let db_path = match &cli.database {
        Some(path) => path.clone(),
        None => {
            let dir = dirs::data_dir()
                .context("Could not determine the platform data directory")?
                .join("reporting-cli");
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            dir.join("reporting.db")
        }
    };

    let pool = db::connect(&db_path).await?;
    db::run_migrations(&pool).await?;

    match cli.command {
        Commands::Grant(args) => {
            commands::handle_grant_command(&pool, args).await?;
        }
        Commands::Collection(args) => {
            commands::handle_collection_command(&pool, args).await?;
        }
        Commands::Submission(args) => {
            commands::handle_submission_command(&pool, args).await?;
        }
        Commands::Seed => {
            commands::seed_command(&pool).await?;
        }
    }

    Ok(())
}
