use gifify_av::ToolsConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve the upload page from this directory instead of the built-in one
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Where uploads and outputs are staged (default: system temp dir)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// Largest accepted upload, in MiB
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8765
}
fn default_max_upload_mb() -> u64 {
    512
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            scratch_dir: None,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}
