use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::Role;
use crate::error::LifecycleError;
use crate::store::repository::{grants, users};

/// Grants must carry a minimum team before going live.
const MIN_GRANT_TEAM_USERS: usize = 2;

#[derive(Args)]
pub struct GrantCommands {
    #[command(subcommand)]
    pub command: GrantSubcommands,
}

#[derive(Subcommand)]
pub enum GrantSubcommands {
    /// List all grants
    List,
    /// Make a grant live, allowing live submissions against it
    MakeLive {
        /// Grant id
        grant_id: Uuid,
    },
}

pub async fn handle_grant_command(pool: &SqlitePool, cmd: GrantCommands) -> Result<()> {
    match cmd.command {
        GrantSubcommands::List => {
            let all = grants::list_grants(pool).await?;
            println!("Grants:");
            if all.is_empty() {
                println!("  (none)");
            }
            for grant in all {
                println!(
                    "  {}  {}  {}",
                    grant.id,
                    if grant.is_live { "LIVE" } else { "draft" },
                    grant.name
                );
            }
        }

        GrantSubcommands::MakeLive { grant_id } => {
            let mut grant = grants::get_grant(pool, grant_id)
                .await?
                .with_context(|| format!("Grant {grant_id} not found"))?;
            if grant.is_live {
                println!("'{}' is already live", grant.name);
                return Ok(());
            }

            let team = users::count_users_with_role_for_grant(pool, Role::Member, grant_id).await?;
            if team < MIN_GRANT_TEAM_USERS {
                return Err(LifecycleError::NotEnoughGrantTeamUsers {
                    required: MIN_GRANT_TEAM_USERS,
                }
                .into());
            }

            grant.is_live = true;
            grants::save_grant(pool, &grant).await?;
            println!("'{}' is now live", grant.name);
        }
    }

    Ok(())
}
