//! Flotilla.toml manifest parsing and schema.
//!
//! A manifest declares every container of one federation as an array of
//! tables, so declaration order survives parsing:
//!
//! ```toml
//! [[container]]
//! name = "container-with-shared"
//!
//! [container.modules]
//! "./a.js" = { reexport = "shared" }
//! "./shared.js" = "shared"
//! "./modules.js" = { list-modules = true }
//!
//! [[container.expose]]
//! name = "./a"
//! import = "./a.js"
//!
//! [[container.shared]]
//! key = "shared"
//! import = "./shared"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use miette::{NamedSource, SourceSpan};
use semver::{Version, VersionReq};
use serde::Deserialize;
use thiserror::Error;

use crate::core::container::{
    is_local_request, Container, ExposeDecl, ModuleSource, RemoteDecl, SharedDecl,
};
use crate::util::diagnostic::{DuplicateContainerError, UndefinedModuleError};
use crate::util::InternedString;

/// Errors in an otherwise well-formed manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest declares no containers")]
    Empty,

    #[error("container name must not be empty")]
    EmptyName,

    #[error(
        "container `{container}`: module `{module}` must set exactly one of \
         `value`, `reexport` or `list-modules`"
    )]
    AmbiguousModule { container: String, module: String },

    #[error("container `{container}`: invalid version `{value}` for shared key `{key}`")]
    InvalidVersion {
        container: String,
        key: String,
        value: String,
        #[source]
        source: semver::Error,
    },

    #[error("container `{container}` declares remote alias `{alias}` twice")]
    DuplicateAlias { container: String, alias: String },
}

/// The parsed Flotilla.toml manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Containers in declaration order
    pub containers: Vec<Container>,

    /// The directory containing this manifest
    pub manifest_dir: PathBuf,
}

/// Raw manifest as deserialized from TOML.
#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default, rename = "container")]
    containers: Vec<RawContainer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawContainer {
    name: String,

    #[serde(default)]
    share_scope: Option<String>,

    #[serde(default)]
    modules: BTreeMap<String, RawModule>,

    #[serde(default)]
    expose: Vec<RawExpose>,

    #[serde(default)]
    remote: Vec<RawRemote>,

    #[serde(default)]
    shared: Vec<RawShared>,

    #[serde(default, rename = "override")]
    overrides: Vec<RawShared>,
}

/// A module body: a bare string is a value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawModule {
    Value(String),
    Detailed {
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        reexport: Option<String>,
        #[serde(default, rename = "list-modules")]
        list_modules: bool,
    },
}

#[derive(Debug, Deserialize)]
struct RawExpose {
    name: String,
    import: String,
    #[serde(default)]
    shared: Vec<RawShared>,
}

#[derive(Debug, Deserialize)]
struct RawRemote {
    alias: String,
    /// Defaults to the alias
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    fallback: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawShared {
    key: String,
    /// Absent for consume-only declarations
    #[serde(default)]
    import: Option<String>,
    #[serde(default = "default_true")]
    overridable: bool,
    #[serde(default)]
    eager: bool,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    required_version: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        Self::parse_with_scope(content, path, crate::core::container::DEFAULT_SHARE_SCOPE)
    }

    /// Parse manifest content, giving containers that name no share
    /// scope `default_scope`.
    pub fn parse_with_scope(content: &str, path: &Path, default_scope: &str) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if raw.containers.is_empty() {
            return Err(ManifestError::Empty.into());
        }

        let mut seen = HashSet::new();
        for raw_container in &raw.containers {
            if !seen.insert(raw_container.name.as_str()) {
                return Err(duplicate_container(&raw_container.name, content, path).into());
            }
        }

        let containers = raw
            .containers
            .into_iter()
            .map(|c| Self::convert_container(c, default_scope))
            .collect::<Result<Vec<_>>>()?;

        for container in &containers {
            validate_modules(container)?;
        }

        let manifest_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        tracing::debug!(
            "parsed {} container(s) from {}",
            containers.len(),
            path.display()
        );

        Ok(Manifest {
            containers,
            manifest_dir,
        })
    }

    fn convert_container(raw: RawContainer, default_scope: &str) -> Result<Container> {
        if raw.name.trim().is_empty() {
            return Err(ManifestError::EmptyName.into());
        }
        let name = raw.name.as_str();

        let mut builder = Container::builder(name)
            .share_scope(raw.share_scope.as_deref().unwrap_or(default_scope));

        for (path, module) in raw.modules {
            let source = convert_module(name, &path, module)?;
            builder = builder.module(path.as_str(), source);
        }

        for expose in raw.expose {
            let mut decl = ExposeDecl::new(&expose.name, expose.import.as_str());
            for shared in expose.shared {
                decl = decl.with_shared(convert_shared(name, shared)?);
            }
            builder = builder.expose(decl);
        }

        let mut aliases = HashSet::new();
        for remote in raw.remote {
            if !aliases.insert(remote.alias.clone()) {
                return Err(ManifestError::DuplicateAlias {
                    container: name.to_string(),
                    alias: remote.alias,
                }
                .into());
            }
            let target = remote.target.as_deref().unwrap_or(&remote.alias);
            let mut decl = RemoteDecl::new(remote.alias.as_str(), target);
            if let Some(fallback) = &remote.fallback {
                decl = decl.with_fallback(fallback.as_str());
            }
            builder = builder.remote(decl);
        }

        for shared in raw.shared {
            builder = builder.shared(convert_shared(name, shared)?);
        }
        for shared in raw.overrides {
            builder = builder.override_shared(convert_shared(name, shared)?);
        }

        Ok(builder.build())
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers.iter().find(|c| c.name() == name)
    }

    /// Container names in declaration order.
    pub fn container_names(&self) -> Vec<InternedString> {
        self.containers.iter().map(Container::name).collect()
    }
}

fn convert_module(container: &str, path: &str, raw: RawModule) -> Result<ModuleSource> {
    let ambiguous = || ManifestError::AmbiguousModule {
        container: container.to_string(),
        module: path.to_string(),
    };
    match raw {
        RawModule::Value(value) => Ok(ModuleSource::Value(value)),
        RawModule::Detailed {
            value,
            reexport,
            list_modules,
        } => match (value, reexport, list_modules) {
            (Some(value), None, false) => Ok(ModuleSource::Value(value)),
            (None, Some(request), false) => Ok(ModuleSource::ReExport(request)),
            (None, None, true) => Ok(ModuleSource::ListModules),
            _ => Err(ambiguous().into()),
        },
    }
}

fn convert_shared(container: &str, raw: RawShared) -> Result<SharedDecl> {
    let invalid = |value: &str, source| ManifestError::InvalidVersion {
        container: container.to_string(),
        key: raw.key.clone(),
        value: value.to_string(),
        source,
    };

    let mut decl = match &raw.import {
        Some(import) => SharedDecl::new(raw.key.as_str(), import.as_str()),
        None => SharedDecl::consume(raw.key.as_str()),
    };
    decl.overridable = raw.overridable;
    decl.eager = raw.eager;
    if let Some(version) = &raw.version {
        let parsed = Version::parse(version).map_err(|e| invalid(version, e))?;
        decl = decl.with_version(parsed);
    }
    if let Some(req) = &raw.required_version {
        let parsed = VersionReq::parse(req).map_err(|e| invalid(req, e))?;
        decl = decl.with_required_version(parsed);
    }
    Ok(decl)
}

/// Exposes and shared imports must name modules the container defines.
fn validate_modules(container: &Container) -> Result<()> {
    let imports = container
        .exposes()
        .iter()
        .map(|e| e.import)
        .chain(container.declarations().filter_map(|d| d.import))
        .chain(
            container
                .exposes()
                .iter()
                .flat_map(|e| e.shared.iter().filter_map(|d| d.import)),
        );

    for import in imports {
        if is_local_request(&import) && container.resolve_local(&import).is_none() {
            let defined: Vec<&str> = container.modules().keys().map(|m| m.as_str()).collect();
            return Err(UndefinedModuleError {
                container: container.name().to_string(),
                module: import.to_string(),
                defined: (!defined.is_empty())
                    .then(|| format!("defined modules: {}", defined.join(", "))),
            }
            .into());
        }
    }
    Ok(())
}

/// Point at the second `name = "<container>"` line.
fn duplicate_container(name: &str, content: &str, path: &Path) -> DuplicateContainerError {
    let needle = format!("\"{}\"", name);
    let span = content
        .match_indices(&needle)
        .nth(1)
        .map(|(offset, m)| SourceSpan::from((offset, m.len())));

    DuplicateContainerError {
        name: name.to_string(),
        src: NamedSource::new(path.display().to_string(), content.to_string()),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::container::DeclKind;
    use crate::test_support::fixtures;

    fn parse(content: &str) -> Result<Manifest> {
        Manifest::parse(content, Path::new("Flotilla.toml"))
    }

    #[test]
    fn test_parse_fixture_manifest() {
        let manifest = parse(fixtures::TRANSITIVE_OVERRIDING_MANIFEST).unwrap();
        let names: Vec<&str> = manifest.containers.iter().map(|c| c.name().as_str()).collect();
        assert_eq!(
            names,
            vec!["container-with-shared", "container-no-shared", "main"]
        );

        let with_shared = manifest.container("container-with-shared").unwrap();
        let b = with_shared.expose("b").unwrap();
        assert!(b.is_boundary());
        assert!(!b.shared[0].overridable);
        assert_eq!(
            with_shared.module(InternedString::new("./modules.js")),
            Some(&ModuleSource::ListModules)
        );

        let no_shared = manifest.container("container-no-shared").unwrap();
        assert_eq!(no_shared.remotes()[0].target, "container-with-shared");
        assert_eq!(no_shared.overrides()[0].kind, DeclKind::Override);
        assert_eq!(
            no_shared.overrides()[0].import,
            Some(InternedString::new("./new-shared"))
        );
    }

    #[test]
    fn test_manifest_matches_programmatic_fixture() {
        let manifest = parse(fixtures::TRANSITIVE_OVERRIDING_MANIFEST).unwrap();
        let built = fixtures::transitive_overriding();
        assert_eq!(manifest.containers.len(), built.len());
        for (parsed, built) in manifest.containers.iter().zip(&built) {
            assert_eq!(parsed.name(), built.name());
            assert_eq!(parsed.modules(), built.modules());
            assert_eq!(parsed.exposes(), built.exposes());
            assert_eq!(parsed.remotes(), built.remotes());
            assert_eq!(parsed.shared(), built.shared());
            assert_eq!(parsed.overrides(), built.overrides());
        }
    }

    #[test]
    fn test_duplicate_container_is_rejected() {
        let err = parse(
            r#"
[[container]]
name = "twice"

[[container]]
name = "twice"
"#,
        )
        .unwrap_err();

        let dup = err.downcast_ref::<DuplicateContainerError>().unwrap();
        assert_eq!(dup.name, "twice");
        assert!(dup.span.is_some());
    }

    #[test]
    fn test_undefined_expose_module() {
        let err = parse(
            r#"
[[container]]
name = "broken"

[container.modules]
"./a.js" = "a"

[[container.expose]]
name = "./b"
import = "./b.js"
"#,
        )
        .unwrap_err();

        let undefined = err.downcast_ref::<UndefinedModuleError>().unwrap();
        assert_eq!(undefined.module, "./b.js");
        assert_eq!(undefined.defined.as_deref(), Some("defined modules: ./a.js"));
    }

    #[test]
    fn test_ambiguous_module_body() {
        let err = parse(
            r#"
[[container]]
name = "odd"

[container.modules]
"./a.js" = { value = "a", reexport = "b" }
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ManifestError>(),
            Some(ManifestError::AmbiguousModule { .. })
        ));
    }

    #[test]
    fn test_versions_and_flags() {
        let manifest = parse(
            r#"
[[container]]
name = "versioned"
share-scope = "legacy"

[container.modules]
"./react.js" = "react"

[[container.shared]]
key = "react"
import = "./react"
version = "18.2.0"
required-version = "^18"
eager = true
overridable = false
"#,
        )
        .unwrap();

        let c = &manifest.containers[0];
        assert_eq!(c.share_scope(), "legacy");
        let decl = &c.shared()[0];
        assert_eq!(decl.version, Some(Version::new(18, 2, 0)));
        assert!(decl.required_version.as_ref().unwrap().matches(&Version::new(18, 3, 1)));
        assert!(decl.eager);
        assert!(!decl.overridable);
    }

    #[test]
    fn test_invalid_version() {
        let err = parse(
            r#"
[[container]]
name = "bad-version"

[[container.shared]]
key = "react"
version = "eighteen"
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ManifestError>(),
            Some(ManifestError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_remote_target_defaults_to_alias() {
        let manifest = parse(
            r#"
[[container]]
name = "host"

[[container.remote]]
alias = "ui"
fallback = "ui-legacy"
"#,
        )
        .unwrap();
        let remote = &manifest.containers[0].remotes()[0];
        assert_eq!(remote.target, "ui");
        assert_eq!(remote.fallback, Some(InternedString::new("ui-legacy")));
    }

    #[test]
    fn test_empty_manifest() {
        let err = parse("").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ManifestError>(),
            Some(ManifestError::Empty)
        ));
    }
}
