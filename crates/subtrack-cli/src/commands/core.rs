//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use subtrack_core::db::Database;

/// Open the database file, applying migrations
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    Database::new(path_str).with_context(|| format!("Failed to open database {}", path_str))
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;
    let users = db.list_users().context("Failed to read users")?;

    println!("✅ Database ready ({} account(s))", users.len());
    println!();
    println!("Next steps:");
    println!("  1. export SUBTRACK_JWT_SECRET=<random string>");
    println!("  2. Start the API: subtrack serve");

    Ok(())
}
