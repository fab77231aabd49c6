//! Common paths for Margin data storage
//!
//! All Margin data is stored under ~/.config/margin/ on all platforms:
//! - config.toml - User configuration
//! - session.enc - Encrypted session (bearer token and username)

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Get the Margin data directory (~/.config/margin/)
pub fn margin_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let margin_dir = home.join(".config").join("margin");
    fs::create_dir_all(&margin_dir).context("Failed to create margin directory")?;
    Ok(margin_dir)
}

/// Get the config file path (~/.config/margin/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(margin_dir()?.join("config.toml"))
}

/// Get the session file path (~/.config/margin/session.enc)
pub fn session_path() -> Result<PathBuf> {
    Ok(margin_dir()?.join("session.enc"))
}
