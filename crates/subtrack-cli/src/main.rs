//! SubTrack CLI - Subscription tracker
//!
//! Usage:
//!   subtrack init                    Initialize database
//!   subtrack serve --port 3000       Start web server
//!   subtrack users                   List accounts
//!   subtrack insights --user 1       Generate insights for a user

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Serve {
            port,
            host,
            uploads_dir,
            allowed_origins,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                uploads_dir,
                allowed_origins,
                static_dir.as_deref(),
            )
            .await
        }
        Commands::Users => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_users(&db)
        }
        Commands::Insights { user, all } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_insights(&db, user, all).await
        }
    }
}
