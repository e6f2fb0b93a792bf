//! CLI command implementations

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::cli::{error, info, print_user_table, success, warn};
use crate::config::{self, loader::CONFIG_FILENAME, Config};

/// Initialize a new gatehouse.toml configuration file
pub async fn init() -> Result<()> {
    let config_path = Path::new(CONFIG_FILENAME);

    if config_path.exists() {
        warn(&format!("{} already exists", CONFIG_FILENAME));
        return Ok(());
    }

    let content = config::loader::default_config_content();
    fs::write(config_path, content)?;

    success(&format!("Created {}", CONFIG_FILENAME));
    info("Add users with 'gatehouse hash-password <password>' and run 'gatehouse serve'");

    Ok(())
}

/// Start the HTTP server, CLI flags override the config file
pub async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_config()?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    crate::api::run_server(config, &host, port)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))
}

/// Print a bcrypt hash for a password
pub async fn hash_password(password: &str, cost: u32) -> Result<()> {
    let password = password.to_string();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    println!("{}", hash);
    Ok(())
}

/// List configured users
pub async fn users() -> Result<()> {
    let config = load_config()?;
    let invalid = print_user_table(&config.users);
    if invalid > 0 {
        error(&format!(
            "{} user(s) have an invalid bcrypt hash and can never log in",
            invalid
        ));
    }
    Ok(())
}

// Helper functions

fn load_config() -> Result<Config> {
    config::load_config().map_err(|e| anyhow::anyhow!("{}", e))
}
