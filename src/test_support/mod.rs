//! Test utilities for Flotilla unit tests.
//!
//! Provides fixture federations and helpers for writing manifests to a
//! temporary directory.

pub mod fixtures;

use std::path::PathBuf;

use crate::core::workspace::MANIFEST_NAME;

pub use fixtures::*;

/// Create a temporary project whose Flotilla.toml holds `manifest`.
///
/// Returns the TempDir handle - dropping it will clean up the directory.
pub fn create_test_project(manifest: &str) -> tempfile::TempDir {
    let tmp = tempfile::TempDir::new().expect("failed to create temp dir");
    std::fs::write(tmp.path().join(MANIFEST_NAME), manifest).expect("failed to write manifest");
    tmp
}

/// Path of the manifest inside a project created by [`create_test_project`].
pub fn manifest_path(project: &tempfile::TempDir) -> PathBuf {
    project.path().join(MANIFEST_NAME)
}

/// A manifest with a single container and one value module.
pub fn minimal_manifest(name: &str) -> String {
    format!(
        r#"[[container]]
name = "{}"

[container.modules]
"./index.js" = "{}"
"#,
        name, name
    )
}
