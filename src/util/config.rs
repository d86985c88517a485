//! Configuration file support for Flotilla.
//!
//! Two locations are read:
//! - Global: `~/.flotilla/config.toml` - user-wide defaults
//! - Project: `.flotilla/config.toml` - next to the manifest
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Flotilla configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Resolution settings
    pub resolve: ResolveConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// How equidistant override declarations are ordered.
///
/// Declarations at the same distance from the root are ranked by the
/// order in which the root's configuration reaches them (its remote list,
/// then each remote's own list, breadth first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// The declaration reached later wins.
    #[default]
    LaterWins,
    /// The declaration reached first wins.
    EarlierWins,
}

/// Resolution-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResolveConfig {
    /// Tie-break between equidistant declarations
    pub tie_break: Option<TieBreak>,

    /// Share scope for containers that do not name one
    pub default_share_scope: Option<String>,
}

impl ResolveConfig {
    pub fn tie_break(&self) -> TieBreak {
        self.tie_break.unwrap_or_default()
    }

    pub fn default_share_scope(&self) -> &str {
        self.default_share_scope.as_deref().unwrap_or("default")
    }
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: Option<OutputFormat>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.resolve.tie_break.is_some() {
            self.resolve.tie_break = other.resolve.tie_break;
        }
        if other.resolve.default_share_scope.is_some() {
            self.resolve.default_share_scope = other.resolve.default_share_scope;
        }
        if other.output.format.is_some() {
            self.output.format = other.output.format;
        }
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output.format.unwrap_or_default()
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.flotilla/config.toml)
/// 2. Global config (~/.flotilla/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    config.merge(Config::load_or_default(project_path));
    config
}

/// Get the global flotilla config directory (~/.flotilla).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".flotilla"))
}

/// Get the project config path (.flotilla/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".flotilla").join("config.toml")
}
