//! Server command implementation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    uploads_dir: PathBuf,
    allowed_origins: Vec<String>,
    static_dir: Option<&Path>,
) -> Result<()> {
    let config = subtrack_server::ServerConfig {
        uploads_dir,
        allowed_origins,
        ..subtrack_server::ServerConfig::from_env()?
    };

    println!("🚀 Starting SubTrack server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!("   Uploads: {}", config.uploads_dir.display());
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }
    if config.allowed_origins.is_empty() {
        println!("   CORS: same-origin only");
    } else {
        println!("   CORS: {}", config.allowed_origins.join(", "));
    }
    println!("   Token lifetime: {}h", config.token_ttl_hours);
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path)?;

    let static_dir_str = static_dir
        .map(|p| {
            p.to_str()
                .with_context(|| format!("Static dir is not valid UTF-8: {}", p.display()))
        })
        .transpose()?;
    subtrack_server::serve_with_config(db, host, port, static_dir_str, config).await?;

    Ok(())
}
