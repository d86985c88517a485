//! Container - a federated compilation unit.
//!
//! A Container carries everything the federation layer needs to know
//! about one independently built unit: the modules it defines, what it
//! exposes, which remotes it consumes and which shared modules it
//! provides or overrides. Containers are immutable once built and are
//! Arc-wrapped internally for cheap cloning.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use semver::{Version, VersionReq};
use serde::Serialize;

use crate::util::InternedString;

/// Share scope used when a container does not name one.
pub const DEFAULT_SHARE_SCOPE: &str = "default";

/// Extension probed when a local request names no existing module.
const MODULE_EXTENSION: &str = ".js";

/// The body of a local module.
///
/// Module bodies are data, not code: enough to compose and evaluate a
/// federation graph without a JavaScript engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    /// Exports a literal value.
    Value(String),
    /// Re-exports whatever the request resolves to.
    ReExport(String),
    /// Exports the sorted ids of every module registered for the
    /// container's own build.
    ListModules,
}

impl ModuleSource {
    pub fn value(v: impl Into<String>) -> Self {
        ModuleSource::Value(v.into())
    }

    pub fn reexport(request: impl Into<String>) -> Self {
        ModuleSource::ReExport(request.into())
    }

    /// The import request this module makes, if any.
    pub fn request(&self) -> Option<&str> {
        match self {
            ModuleSource::ReExport(request) => Some(request),
            _ => None,
        }
    }
}

/// Whether a declaration came from `shared` or `override`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Shared,
    Override,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclKind::Shared => write!(f, "shared"),
            DeclKind::Override => write!(f, "override"),
        }
    }
}

/// A shared-module declaration or override for one shared key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedDecl {
    pub key: InternedString,
    /// Local request providing the module. `None` means consume only.
    pub import: Option<InternedString>,
    /// Pinned declarations have `overridable == false`.
    pub overridable: bool,
    pub eager: bool,
    pub version: Option<Version>,
    pub required_version: Option<VersionReq>,
    pub kind: DeclKind,
}

impl SharedDecl {
    /// An overridable shared declaration providing `import` under `key`.
    pub fn new(key: impl Into<InternedString>, import: impl Into<InternedString>) -> Self {
        SharedDecl {
            key: key.into(),
            import: Some(import.into()),
            overridable: true,
            eager: false,
            version: None,
            required_version: None,
            kind: DeclKind::Shared,
        }
    }

    /// An override replacing `key` with `import`.
    pub fn override_with(key: impl Into<InternedString>, import: impl Into<InternedString>) -> Self {
        SharedDecl {
            kind: DeclKind::Override,
            ..SharedDecl::new(key, import)
        }
    }

    /// A declaration that only consumes `key` and provides nothing.
    pub fn consume(key: impl Into<InternedString>) -> Self {
        SharedDecl {
            import: None,
            ..SharedDecl::new(key, "")
        }
    }

    pub fn pinned(mut self) -> Self {
        self.overridable = false;
        self
    }

    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_required_version(mut self, req: VersionReq) -> Self {
        self.required_version = Some(req);
        self
    }

    /// Whether this declaration offers a module for its key.
    pub fn is_provider(&self) -> bool {
        self.import.is_some()
    }
}

/// A module made importable by other containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposeDecl {
    /// Public name, without the leading `./`
    pub name: InternedString,
    /// Local module request
    pub import: InternedString,
    /// Declarations scoped to this exposed module only. A non-empty list
    /// makes the exposed module its own sharing boundary.
    pub shared: Vec<SharedDecl>,
}

impl ExposeDecl {
    pub fn new(name: &str, import: impl Into<InternedString>) -> Self {
        ExposeDecl {
            name: normalize_exposed_name(name),
            import: import.into(),
            shared: Vec::new(),
        }
    }

    pub fn with_shared(mut self, decl: SharedDecl) -> Self {
        self.shared.push(decl);
        self
    }

    pub fn is_boundary(&self) -> bool {
        !self.shared.is_empty()
    }
}

/// A remote container consumed under a local alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDecl {
    pub alias: InternedString,
    pub target: InternedString,
    /// Container used when `target` is never bound.
    pub fallback: Option<InternedString>,
}

impl RemoteDecl {
    pub fn new(alias: impl Into<InternedString>, target: impl Into<InternedString>) -> Self {
        RemoteDecl {
            alias: alias.into(),
            target: target.into(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<InternedString>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

/// Strip the `./` prefix webpack-style exposes carry.
pub fn normalize_exposed_name(name: &str) -> InternedString {
    InternedString::new(name.strip_prefix("./").unwrap_or(name))
}

/// Whether a request names a local module.
pub fn is_local_request(request: &str) -> bool {
    request.starts_with("./") || request.starts_with("../")
}

/// A federated container (immutable, cheap to clone).
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

#[derive(Clone)]
struct ContainerInner {
    name: InternedString,
    share_scope: InternedString,
    modules: BTreeMap<InternedString, ModuleSource>,
    exposes: Vec<ExposeDecl>,
    remotes: Vec<RemoteDecl>,
    shared: Vec<SharedDecl>,
    overrides: Vec<SharedDecl>,
}

impl Container {
    pub fn builder(name: impl Into<InternedString>) -> ContainerBuilder {
        ContainerBuilder::new(name)
    }

    pub fn name(&self) -> InternedString {
        self.inner.name
    }

    pub fn share_scope(&self) -> InternedString {
        self.inner.share_scope
    }

    pub fn modules(&self) -> &BTreeMap<InternedString, ModuleSource> {
        &self.inner.modules
    }

    pub fn module(&self, path: InternedString) -> Option<&ModuleSource> {
        self.inner.modules.get(&path)
    }

    pub fn exposes(&self) -> &[ExposeDecl] {
        &self.inner.exposes
    }

    /// Find an exposed module by public name (with or without `./`).
    pub fn expose(&self, name: &str) -> Option<&ExposeDecl> {
        let name = name.strip_prefix("./").unwrap_or(name);
        self.inner.exposes.iter().find(|e| e.name == name)
    }

    pub fn remotes(&self) -> &[RemoteDecl] {
        &self.inner.remotes
    }

    pub fn shared(&self) -> &[SharedDecl] {
        &self.inner.shared
    }

    pub fn overrides(&self) -> &[SharedDecl] {
        &self.inner.overrides
    }

    /// Container-level declarations in precedence order: shared first,
    /// then overrides, each in declaration order.
    ///
    /// Overrides always count as declared after every shared entry of
    /// the same container, whatever order the builder saw them in. At
    /// equal distance a container's own override beats its own shared
    /// entry.
    pub fn declarations(&self) -> impl Iterator<Item = &SharedDecl> {
        self.inner.shared.iter().chain(self.inner.overrides.iter())
    }

    /// The container's own shared declaration for `key`, if any.
    pub fn shared_decl(&self, key: InternedString) -> Option<&SharedDecl> {
        self.inner.shared.iter().rev().find(|d| d.key == key)
    }

    /// Split `request` into a remote declaration and the exposed path.
    ///
    /// The longest matching alias wins, so `@org/ui/button` prefers an
    /// `@org/ui` alias over `@org`.
    pub fn remote_for<'r>(&self, request: &'r str) -> Option<(&RemoteDecl, &'r str)> {
        self.inner
            .remotes
            .iter()
            .filter_map(|remote| {
                request
                    .strip_prefix(remote.alias.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (remote, rest))
            })
            .max_by_key(|(remote, _)| remote.alias.len())
    }

    /// Resolve a local request to a defined module path.
    ///
    /// Tries the request as written, then with `.js` appended.
    pub fn resolve_local(&self, request: &str) -> Option<InternedString> {
        if let Some(path) = InternedString::lookup(request) {
            if self.inner.modules.contains_key(&path) {
                return Some(path);
            }
        }
        let probed = format!("{}{}", request, MODULE_EXTENSION);
        InternedString::lookup(&probed).filter(|p| self.inner.modules.contains_key(p))
    }

    /// Bare requests made by local modules that are neither local nor
    /// remote: these are consumed through the shared scope.
    pub fn consumed_keys(&self) -> Vec<InternedString> {
        let mut keys: Vec<InternedString> = self
            .inner
            .modules
            .values()
            .filter_map(ModuleSource::request)
            .filter(|r| !is_local_request(r) && self.remote_for(r).is_none())
            .map(InternedString::new)
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.inner.name.as_str())
            .field("share_scope", &self.inner.share_scope.as_str())
            .field("modules", &self.inner.modules.len())
            .field("exposes", &self.inner.exposes)
            .field("remotes", &self.inner.remotes)
            .field("shared", &self.inner.shared)
            .field("overrides", &self.inner.overrides)
            .finish()
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.name)
    }
}

/// Builder for [`Container`].
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    inner: ContainerInner,
}

impl fmt::Debug for ContainerInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerInner")
            .field("name", &self.name.as_str())
            .finish_non_exhaustive()
    }
}

impl ContainerBuilder {
    pub fn new(name: impl Into<InternedString>) -> Self {
        ContainerBuilder {
            inner: ContainerInner {
                name: name.into(),
                share_scope: InternedString::new(DEFAULT_SHARE_SCOPE),
                modules: BTreeMap::new(),
                exposes: Vec::new(),
                remotes: Vec::new(),
                shared: Vec::new(),
                overrides: Vec::new(),
            },
        }
    }

    pub fn share_scope(mut self, scope: impl Into<InternedString>) -> Self {
        self.inner.share_scope = scope.into();
        self
    }

    pub fn module(mut self, path: impl Into<InternedString>, source: ModuleSource) -> Self {
        self.inner.modules.insert(path.into(), source);
        self
    }

    pub fn expose(mut self, decl: ExposeDecl) -> Self {
        self.inner.exposes.push(decl);
        self
    }

    pub fn remote(mut self, decl: RemoteDecl) -> Self {
        self.inner.remotes.push(decl);
        self
    }

    pub fn shared(mut self, decl: SharedDecl) -> Self {
        self.inner.shared.push(decl);
        self
    }

    pub fn override_shared(mut self, decl: SharedDecl) -> Self {
        self.inner.overrides.push(SharedDecl {
            kind: DeclKind::Override,
            ..decl
        });
        self
    }

    pub fn build(self) -> Container {
        Container {
            inner: Arc::new(self.inner),
        }
    }
}
