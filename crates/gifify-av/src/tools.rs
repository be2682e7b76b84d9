//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the two
//! external engines (ffmpeg and gifsicle) and provides lookup methods for the
//! pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Filter-graph processor. Required for every conversion.
pub const FFMPEG: &str = "ffmpeg";
/// Lossy sequence optimizer. Optional.
pub const GIFSICLE: &str = "gifsicle";

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &[FFMPEG, GIFSICLE];

/// User-supplied tool overrides, usually the `[tools]` table of the config
/// file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub gifsicle_path: Option<PathBuf>,
    /// Kill a tool that runs longer than this. Unset means wait forever.
    pub timeout_secs: Option<u64>,
}

/// Configuration for a single external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
    /// Maximum execution time before the tool is killed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Whether conversions fail without it.
    pub required: bool,
    /// Version string (first line of the version output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// For each known tool, if the [`ToolsConfig`] supplies a custom path
    /// **and** that path exists, it is used directly. Otherwise
    /// [`which::which`] is used to locate the tool in `PATH`. Tools that are
    /// not found are omitted from the registry.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let timeout = tools_config.timeout_secs.map(Duration::from_secs);
        let mut registry = Self::default();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                FFMPEG => tools_config.ffmpeg_path.as_deref(),
                GIFSICLE => tools_config.gifsicle_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(tool = name, path = %p.display(), "configured tool path does not exist; searching PATH");
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            match resolved {
                Some(path) => {
                    tracing::debug!(tool = name, path = %path.display(), "tool discovered");
                    registry.insert(name, path, timeout);
                }
                None => tracing::debug!(tool = name, "tool not found"),
            }
        }

        registry
    }

    /// Register (or replace) a tool at an explicit path.
    pub fn insert(&mut self, name: &str, path: impl Into<PathBuf>, timeout: Option<Duration>) {
        self.tools.insert(
            name.to_string(),
            ToolConfig {
                name: name.to_string(),
                path: path.into(),
                timeout,
            },
        );
    }

    /// Look up a tool without failing.
    pub fn get(&self, name: &str) -> Option<&ToolConfig> {
        self.tools.get(name)
    }

    /// Return the [`ToolConfig`] for the given tool, or
    /// [`gifify_core::Error::ToolNotFound`] if it was not found during
    /// discovery.
    pub fn require(&self, name: &str) -> gifify_core::Result<&ToolConfig> {
        self.tools
            .get(name)
            .ok_or_else(|| gifify_core::Error::tool_not_found(name))
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| {
                let cfg = self.tools.get(name);
                ToolInfo {
                    name: name.to_string(),
                    available: cfg.is_some(),
                    required: name == FFMPEG,
                    version: cfg.and_then(|c| detect_version(name, &c.path)),
                    path: cfg.map(|c| c.path.clone()),
                }
            })
            .collect()
    }
}

/// Run `<tool> --version` (or `-version` for ffmpeg) and return the first
/// line of stdout.
fn detect_version(name: &str, path: &Path) -> Option<String> {
    let version_arg = match name {
        FFMPEG => "-version",
        _ => "--version",
    };

    let output = std::process::Command::new(path)
        .arg(version_arg)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
