//! Workspace - a loaded manifest together with its configuration.
//!
//! A Workspace is what every command starts from: the parsed Flotilla.toml,
//! the merged config.toml, and the directory they live in.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::Manifest;
use crate::federation::{Federation, FederationError};
use crate::util::config::Config;
use crate::util::GlobalContext;

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "Flotilla.toml";

/// Errors locating a manifest.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("could not find `Flotilla.toml` in `{}` or any parent directory", dir.display())]
    NotFound { dir: PathBuf },
}

/// Find the manifest in `dir` itself.
pub fn find_manifest(dir: &Path) -> Result<PathBuf, WorkspaceError> {
    let path = dir.join(MANIFEST_NAME);
    if path.is_file() {
        Ok(path)
    } else {
        Err(WorkspaceError::NotFound {
            dir: dir.to_path_buf(),
        })
    }
}

/// A loaded manifest and its configuration.
#[derive(Debug)]
pub struct Workspace {
    manifest: Manifest,
    manifest_path: PathBuf,
    config: Config,
}

impl Workspace {
    /// Load the workspace rooted at `manifest_path`.
    pub fn new(manifest_path: &Path, ctx: &GlobalContext) -> Result<Self> {
        let root = manifest_path.parent().unwrap_or(Path::new("."));
        let config = ctx.config_for(root);

        let content = std::fs::read_to_string(manifest_path)
            .with_context(|| format!("failed to read manifest: {}", manifest_path.display()))?;
        let manifest = Manifest::parse_with_scope(
            &content,
            manifest_path,
            config.resolve.default_share_scope(),
        )?;

        tracing::debug!(
            "loaded {} container(s) from {}",
            manifest.containers.len(),
            manifest_path.display()
        );

        Ok(Workspace {
            manifest,
            manifest_path: manifest_path.to_path_buf(),
            config,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// The directory containing the manifest.
    pub fn root(&self) -> &Path {
        &self.manifest.manifest_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind every container of the manifest into a new federation and
    /// close it.
    pub fn federation(&self) -> Result<Federation, FederationError> {
        let mut federation = Federation::with_config(self.config.resolve.clone());
        federation.bind_all(self.manifest.containers.iter().cloned())?;
        federation.close();
        Ok(federation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::config::project_config_path;
    use crate::test_support::{create_test_project, fixtures, manifest_path, minimal_manifest};

    #[test]
    fn test_workspace_loads_manifest() {
        let project = create_test_project(fixtures::TRANSITIVE_OVERRIDING_MANIFEST);
        let ctx = GlobalContext::with_cwd(project.path().to_path_buf()).unwrap();

        let ws = Workspace::new(&manifest_path(&project), &ctx).unwrap();
        assert_eq!(ws.manifest().containers.len(), 3);
        assert_eq!(ws.root(), project.path());

        let federation = ws.federation().unwrap();
        assert!(federation.is_closed());
        assert_eq!(federation.graph().containers().len(), 3);
    }

    #[test]
    fn test_project_config_sets_default_scope() {
        let project = create_test_project(&minimal_manifest("scoped"));
        std::fs::create_dir_all(project.path().join(".flotilla")).unwrap();
        std::fs::write(
            project_config_path(project.path()),
            "[resolve]\ndefault-share-scope = \"team\"\n",
        )
        .unwrap();
        let ctx = GlobalContext::with_cwd(project.path().to_path_buf()).unwrap();

        let ws = Workspace::new(&manifest_path(&project), &ctx).unwrap();
        assert_eq!(ws.manifest().containers[0].share_scope(), "team");
    }

    #[test]
    fn test_find_manifest_in_dir() {
        let project = create_test_project(&minimal_manifest("here"));
        assert_eq!(find_manifest(project.path()).unwrap(), manifest_path(&project));

        let empty = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            find_manifest(empty.path()),
            Err(WorkspaceError::NotFound { .. })
        ));
    }
}
