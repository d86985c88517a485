//! Global context for Flotilla operations.
//!
//! Provides centralized access to the working directory, the global
//! configuration location and output settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::workspace::{find_manifest as ws_find_manifest, WorkspaceError};
use crate::util::config::{global_config_dir, load_config, project_config_path, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global Flotilla data (~/.flotilla/)
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::at(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        Ok(Self::at(cwd))
    }

    fn at(cwd: PathBuf) -> Self {
        let home = global_config_dir().unwrap_or_else(|| PathBuf::from(".flotilla"));
        GlobalContext {
            cwd,
            home,
            verbose: false,
            color: true,
        }
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The Flotilla home directory (~/.flotilla/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// The global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn color(&self) -> bool {
        self.color
    }

    /// Configuration for the project rooted at `project_root`, merged over
    /// the global configuration.
    pub fn config_for(&self, project_root: &Path) -> Config {
        let global = self.config_path();
        load_config(Some(&global), &project_config_path(project_root))
    }

    /// Find Flotilla.toml starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf, WorkspaceError> {
        let mut current = self.cwd.clone();
        loop {
            match ws_find_manifest(&current) {
                Ok(path) => return Ok(path),
                Err(WorkspaceError::NotFound { .. }) => {
                    if !current.pop() {
                        return Err(WorkspaceError::NotFound {
                            dir: self.cwd.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Resolve an explicit `--manifest-path`, or search from cwd.
    pub fn manifest_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) if path.is_absolute() => Ok(path.to_path_buf()),
            Some(path) => Ok(self.cwd.join(path)),
            None => Ok(self.find_manifest()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let ctx = GlobalContext::new().unwrap();
        assert!(ctx.cwd().is_absolute());
        assert!(ctx.config_path().ends_with("config.toml"));
        assert!(ctx.home().to_string_lossy().contains("flotilla"));
    }

    #[test]
    fn test_find_manifest_walks_up() {
        let tmp = TempDir::new().unwrap();
        let manifest = tmp.path().join("Flotilla.toml");
        std::fs::write(&manifest, "[[container]]\nname = \"app\"\n").unwrap();
        let nested = tmp.path().join("containers").join("app");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested).unwrap();
        assert_eq!(ctx.find_manifest().ok(), Some(manifest));
    }

    #[test]
    fn test_find_manifest_missing() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        // A Flotilla.toml above the temp dir would be found instead.
        if let Err(err) = ctx.find_manifest() {
            assert!(err.to_string().contains("could not find `Flotilla.toml`"));
        }
    }

    #[test]
    fn test_explicit_manifest_path_is_relative_to_cwd() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        let path = ctx
            .manifest_path(Some(Path::new("sub/Flotilla.toml")))
            .unwrap();
        assert_eq!(path, tmp.path().join("sub/Flotilla.toml"));
    }
}
