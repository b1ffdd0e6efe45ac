//! `warden` administrative command line

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wd_core::config::AppConfig;
use wd_db::{Database, Stores};
use wd_services::{LogNotifier, Services};

mod commands;

use commands::SuperuserArgs;

#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "Warden administration", long_about = None, version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the first superuser. Missing options fall back to
    /// FIRST_SUPERUSER_* settings.
    CreateSuperuser(SuperuserArgs),
    /// Deactivate expired sessions and purge stale audit entries
    CleanupSessions,
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.logging.level))),
        )
        .with_target(false)
        .init();
    config.validate().context("Invalid configuration")?;

    let db = Database::connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    let result = match cli.command {
        Command::Migrate => db
            .migrate()
            .await
            .map(|_| "Migrations applied".to_string())
            .context("Failed to run migrations"),
        Command::CreateSuperuser(args) => {
            let services = build_services(&config, &db)?;
            commands::create_superuser(&services, args, &config.superuser).await
        }
        Command::CleanupSessions => {
            let services = build_services(&config, &db)?;
            commands::cleanup_sessions(&services).await
        }
    };

    db.close().await;
    println!("{}", result?);
    Ok(())
}

fn build_services(config: &AppConfig, db: &Database) -> Result<Services> {
    let notifier = Arc::new(LogNotifier::new(!config.is_production()));
    Ok(Services::new(config.clone(), Stores::postgres(db), notifier)?)
}
