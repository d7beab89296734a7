//! CLI argument definitions using clap
//!
//! The command implementations live in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// SubTrack - Track subscriptions, payments and shared plans
#[derive(Parser)]
#[command(name = "subtrack")]
#[command(about = "Self-hosted subscription tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "subtrack.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database (or migrate an existing one)
    Init,

    /// Start the web server
    ///
    /// Requires SUBTRACK_JWT_SECRET. AI insights use AI_BACKEND / OLLAMA_HOST
    /// when set and fall back to heuristics otherwise.
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory for uploaded files (avatars go in <dir>/avatars)
        #[arg(long, default_value = "uploads")]
        uploads_dir: PathBuf,

        /// Allowed CORS origin (repeatable)
        #[arg(long = "allowed-origin")]
        allowed_origins: Vec<String>,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// List registered accounts
    Users,

    /// Generate insights for a user and print them
    Insights {
        /// User ID
        #[arg(short, long)]
        user: i64,

        /// Show resolved insights too
        #[arg(long)]
        all: bool,
    },
}
