//! Operator commands: schema migrations, catalog seeding, table inspection
//! and user bootstrap. Every command runs against the configured database.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use auth_cell::models::CreateUserRequest;
use auth_cell::services::UserService;
use catalog_cell::services::{CatalogImporter, SeedSources};
use shared_database::{inspect, DbPool, Migrator};
use shared_models::auth::Role;

#[derive(Debug, Parser)]
#[command(name = "clinic-cli")]
#[command(version)]
#[command(about = "Operator tool for the clinic database", long_about = None)]
pub struct Cli {
    /// Overrides DATABASE_URL / DB_PATH
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply, revert or list schema migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },

    /// Import catalog reference data
    Seed {
        /// Procedures CSV
        #[arg(long)]
        procedures: Option<PathBuf>,

        /// Emotional mappings CSV
        #[arg(long)]
        emotional_mappings: Option<PathBuf>,

        /// Alert rules CSV
        #[arg(long)]
        alerts: Option<PathBuf>,

        /// Protocols JSON (array of objects)
        #[arg(long)]
        protocols: Option<PathBuf>,
    },

    /// Row counts of every table, or the schema and first rows of one
    Inspect {
        table: Option<String>,

        #[arg(short, long, default_value = "10")]
        limit: i64,
    },

    /// Create a user, typically the first admin
    CreateUser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        /// admin, doctor, staff or patient
        #[arg(long)]
        role: Role,

        /// Generated and printed when omitted
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum MigrateAction {
    /// Apply every pending migration
    Run,

    /// Undo the most recent migrations
    Revert {
        #[arg(long, default_value = "1")]
        steps: usize,
    },

    /// List migrations and when they were applied
    Status,
}

pub async fn execute(command: Commands, pool: &DbPool, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Commands::Migrate { action } => migrate(action, pool, out).await,
        Commands::Seed {
            procedures,
            emotional_mappings,
            alerts,
            protocols,
        } => {
            let sources = SeedSources {
                procedures,
                emotional_mappings,
                alerts,
                protocols,
            };
            if sources.procedures.is_none()
                && sources.emotional_mappings.is_none()
                && sources.alerts.is_none()
                && sources.protocols.is_none()
            {
                bail!("nothing to seed: pass at least one of --procedures, --emotional-mappings, --alerts, --protocols");
            }

            let reports = CatalogImporter::new(pool)
                .seed(&sources)
                .await
                .context("catalog import failed")?;
            for report in reports {
                writeln!(
                    out,
                    "{:<20} inserted {:>5}  skipped {:>5}",
                    report.table, report.inserted, report.skipped
                )?;
            }
            Ok(())
        }
        Commands::Inspect { table: None, .. } => {
            for summary in inspect::summarize(pool).await? {
                writeln!(out, "{:<24} {:>8} rows", summary.name, summary.row_count)?;
            }
            Ok(())
        }
        Commands::Inspect {
            table: Some(table),
            limit,
        } => {
            let schema = inspect::table_schema(pool, &table).await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&schema)?)?;
            let rows = inspect::sample_rows(pool, &table, limit).await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
            Ok(())
        }
        Commands::CreateUser {
            email,
            name,
            role,
            password,
        } => {
            let generated = password.is_none();
            let password = password.unwrap_or_else(|| Uuid::new_v4().simple().to_string());

            let user = UserService::new(pool)
                .create_user(CreateUserRequest {
                    email,
                    password: password.clone(),
                    name,
                    role,
                })
                .await
                .context("could not create user")?;

            info!("Created {} user {}", user.role, user.id);
            writeln!(out, "Created {} {} ({})", user.role, user.email, user.id)?;
            if generated {
                writeln!(out, "Generated password: {}", password)?;
            }
            Ok(())
        }
    }
}

async fn migrate(action: MigrateAction, pool: &DbPool, out: &mut impl Write) -> anyhow::Result<()> {
    let migrator = Migrator::embedded()?;

    match action {
        MigrateAction::Run => {
            let applied = migrator.run(pool).await?;
            if applied.is_empty() {
                writeln!(out, "Database is up to date")?;
            }
            for version in applied {
                writeln!(out, "Applied {}", version)?;
            }
        }
        MigrateAction::Revert { steps } => {
            let reverted = migrator.revert(pool, steps).await?;
            if reverted.is_empty() {
                writeln!(out, "Nothing to revert")?;
            }
            for version in reverted {
                writeln!(out, "Reverted {}", version)?;
            }
        }
        MigrateAction::Status => {
            for status in migrator.status(pool).await? {
                let applied = status
                    .applied_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "pending".to_string());
                writeln!(out, "{} {:<40} {}", status.version, status.name, applied)?;
            }
        }
    }
    Ok(())
}
