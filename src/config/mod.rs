mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./gifify.toml", "~/.config/gifify/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.max_upload_mb == 0 {
        anyhow::bail!("server.max_upload_mb must be greater than 0");
    }

    if let Some(ref dir) = config.server.static_dir {
        if !dir.is_dir() {
            tracing::warn!("Static directory does not exist: {:?}", dir);
        }
    }

    for (name, path) in [
        ("ffmpeg_path", &config.tools.ffmpeg_path),
        ("gifsicle_path", &config.tools.gifsicle_path),
    ] {
        if let Some(p) = path {
            if !p.exists() {
                tracing::warn!("tools.{} does not exist: {:?}", name, p);
            }
        }
    }

    if config.tools.timeout_secs == Some(0) {
        anyhow::bail!("tools.timeout_secs must be greater than 0 when set");
    }

    Ok(())
}
