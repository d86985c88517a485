//! Shared-scope table.
//!
//! The table collects every shared declaration and override the binder
//! forwards, keyed by the sharing boundary that made it. The override
//! engine works on a frozen [`ScopeSnapshot`] of those declarations and
//! hands back a [`ResolvedScope`] per build root, which the table then
//! publishes for lookups.
//!
//! Declarations are stored per boundary in a sorted map, so the order in
//! which independent containers forward them never shows up in a
//! snapshot. Only each boundary's own declaration order is kept.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use semver::{Version, VersionReq};
use serde::{Serialize, Serializer};

use crate::core::container::{DeclKind, SharedDecl};
use crate::federation::errors::FederationError;
use crate::util::hash::Fingerprint;
use crate::util::InternedString;

/// A sharing boundary: a container, or an exposed module of a container
/// that carries its own shared declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Boundary {
    Container(InternedString),
    Exposed {
        container: InternedString,
        exposed: InternedString,
    },
}

impl Boundary {
    pub fn container(&self) -> InternedString {
        match self {
            Boundary::Container(c) => *c,
            Boundary::Exposed { container, .. } => *container,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Boundary::Exposed { .. })
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Container(c) => write!(f, "{}", c),
            Boundary::Exposed { container, exposed } => write!(f, "{}/{}", container, exposed),
        }
    }
}

impl Serialize for Boundary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Handle naming one shared scope: a build root and a boundary under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId {
    pub root: InternedString,
    pub boundary: Boundary,
}

impl ScopeId {
    /// The root's own top-level scope.
    pub fn root(root: InternedString) -> Self {
        ScopeId {
            root,
            boundary: Boundary::Container(root),
        }
    }

    pub fn within(root: InternedString, boundary: Boundary) -> Self {
        ScopeId { root, boundary }
    }
}

/// The module a shared key finally binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntry {
    pub key: InternedString,
    /// Container whose local module provides the key
    pub owner: InternedString,
    /// Boundary whose declaration won
    pub declared_by: Boundary,
    /// Request resolved inside `owner`
    pub module: InternedString,
    /// Inherited from the winning declaration
    pub overridable: bool,
    pub eager: bool,
    pub version: Option<Version>,
    pub kind: DeclKind,
    /// Distance of the winning declaration from the root
    pub distance: usize,
}

impl ResolvedEntry {
    pub fn is_pinned(&self) -> bool {
        !self.overridable
    }
}

/// A non-fatal finding recorded while resolving a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ScopeWarning {
    /// The resolved module's version does not satisfy a consumer's requirement.
    VersionMismatch {
        boundary: Boundary,
        key: InternedString,
        required: VersionReq,
        found: Option<Version>,
        owner: InternedString,
    },
}

impl fmt::Display for ScopeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeWarning::VersionMismatch {
                boundary,
                key,
                required,
                found,
                owner,
            } => {
                let found = found
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "an unversioned module".to_string());
                write!(
                    f,
                    "`{}` requires {} {} but resolves to {} from `{}`",
                    boundary, key, required, found, owner
                )
            }
        }
    }
}

/// Frozen copy of every declaration, taken once the graph is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSnapshot {
    declarations: BTreeMap<Boundary, Vec<SharedDecl>>,
}

impl ScopeSnapshot {
    /// Declarations made by `boundary`, in its own declaration order.
    pub fn declarations(&self, boundary: Boundary) -> &[SharedDecl] {
        self.declarations
            .get(&boundary)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Providing declarations for `key` made by `boundary`, with their
    /// position in the boundary's declaration order.
    pub fn providers(
        &self,
        boundary: Boundary,
        key: InternedString,
    ) -> impl Iterator<Item = (usize, &SharedDecl)> {
        self.declarations(boundary)
            .iter()
            .enumerate()
            .filter(move |(_, d)| d.key == key && d.is_provider())
    }

    /// Every key any boundary declares.
    pub fn keys(&self) -> BTreeSet<InternedString> {
        self.declarations
            .values()
            .flat_map(|decls| decls.iter().map(|d| d.key))
            .collect()
    }

    /// Nested boundaries belonging to `container`.
    pub fn nested_boundaries(&self, container: InternedString) -> Vec<Boundary> {
        self.declarations
            .keys()
            .filter(|b| b.is_nested() && b.container() == container)
            .copied()
            .collect()
    }
}

/// The final, read-only shared scope of one build root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedScope {
    pub root: InternedString,
    entries: BTreeMap<Boundary, BTreeMap<InternedString, ResolvedEntry>>,
    pub warnings: Vec<ScopeWarning>,
    /// Remote targets reachable from the root that were never bound
    pub unresolved_remotes: Vec<InternedString>,
}

impl ResolvedScope {
    pub(crate) fn new(root: InternedString) -> Self {
        ResolvedScope {
            root,
            entries: BTreeMap::new(),
            warnings: Vec::new(),
            unresolved_remotes: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, boundary: Boundary, entry: ResolvedEntry) {
        self.entries
            .entry(boundary)
            .or_default()
            .insert(entry.key, entry);
    }

    /// The entry `key` resolves to inside `boundary`.
    pub fn get(&self, boundary: Boundary, key: InternedString) -> Option<&ResolvedEntry> {
        self.entries.get(&boundary)?.get(&key)
    }

    /// The entry `key` resolves to for the root itself.
    pub fn get_root(&self, key: InternedString) -> Option<&ResolvedEntry> {
        self.get(Boundary::Container(self.root), key)
    }

    /// Like [`ResolvedScope::get`] but reports a missing key as
    /// `UnresolvedShared`.
    pub fn resolve(
        &self,
        boundary: Boundary,
        key: InternedString,
    ) -> Result<&ResolvedEntry, FederationError> {
        self.get(boundary, key)
            .ok_or(FederationError::UnresolvedShared {
                root: self.root,
                key,
            })
    }

    /// Boundaries with at least one resolved key, sorted.
    pub fn boundaries(&self) -> impl Iterator<Item = Boundary> + '_ {
        self.entries.keys().copied()
    }

    /// All `(boundary, entry)` pairs in sorted order.
    pub fn entries(&self) -> impl Iterator<Item = (Boundary, &ResolvedEntry)> {
        self.entries
            .iter()
            .flat_map(|(b, keys)| keys.values().map(move |e| (*b, e)))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SHA-256 fingerprint of every resolved entry.
    pub fn digest(&self) -> String {
        let mut fp = Fingerprint::new();
        fp.update_str(&self.root);
        for (boundary, entry) in self.entries() {
            fp.update_str(&boundary.to_string())
                .update_str(&entry.key)
                .update_str(&entry.owner)
                .update_str(&entry.declared_by.to_string())
                .update_str(&entry.module)
                .update_bool(entry.overridable)
                .update_bool(entry.eager)
                .update_opt(entry.version.as_ref().map(|v| v.to_string()).as_deref());
        }
        fp.finish()
    }
}

/// Per-boundary declarations plus the published scope of each root.
#[derive(Debug, Default)]
pub struct SharedScopeTable {
    declarations: BTreeMap<Boundary, Vec<SharedDecl>>,
    published: HashMap<InternedString, ResolvedScope>,
}

impl SharedScopeTable {
    pub fn new() -> Self {
        SharedScopeTable::default()
    }

    /// Record a declaration made by `boundary`.
    pub fn declare_shared(&mut self, boundary: Boundary, decl: SharedDecl) {
        tracing::trace!(
            "{} declares {} `{}` ({})",
            boundary,
            decl.kind,
            decl.key,
            if decl.overridable { "overridable" } else { "pinned" }
        );
        self.declarations.entry(boundary).or_default().push(decl);
    }

    /// The boundary's own provisional entry for `key`: its last providing
    /// declaration, before any override is applied.
    pub fn provisional(&self, boundary: Boundary, key: InternedString) -> Option<&SharedDecl> {
        self.declarations
            .get(&boundary)?
            .iter()
            .rev()
            .find(|d| d.key == key && d.is_provider())
    }

    /// Freeze the declarations for an engine run.
    pub fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            declarations: self.declarations.clone(),
        }
    }

    /// Make `scope` the answer for its root, replacing any earlier one.
    pub fn publish(&mut self, scope: ResolvedScope) {
        tracing::debug!(
            "published scope for {} ({} entries)",
            scope.root,
            scope.len()
        );
        self.published.insert(scope.root, scope);
    }

    pub fn scope(&self, root: InternedString) -> Option<&ResolvedScope> {
        self.published.get(&root)
    }

    /// Look up `key` in a published scope.
    pub fn get_resolved(
        &self,
        scope: &ScopeId,
        key: InternedString,
    ) -> Result<&ResolvedEntry, FederationError> {
        let resolved = self
            .published
            .get(&scope.root)
            .ok_or(FederationError::UnknownContainer {
                container: scope.root,
            })?;
        resolved.resolve(scope.boundary, key)
    }

    /// Drop the published scope of `root`. Other roots are unaffected.
    pub fn discard(&mut self, root: InternedString) -> bool {
        self.published.remove(&root).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> InternedString {
        InternedString::new(s)
    }

    fn entry(key: &str, owner: &str, module: &str) -> ResolvedEntry {
        ResolvedEntry {
            key: name(key),
            owner: name(owner),
            declared_by: Boundary::Container(name(owner)),
            module: name(module),
            overridable: true,
            eager: false,
            version: None,
            kind: DeclKind::Shared,
            distance: 0,
        }
    }

    #[test]
    fn test_provisional_is_last_provider() {
        let mut table = SharedScopeTable::new();
        let b = Boundary::Container(name("prov"));
        table.declare_shared(b, SharedDecl::new("k", "./one"));
        table.declare_shared(b, SharedDecl::new("k", "./two"));
        table.declare_shared(b, SharedDecl::consume("k"));

        assert_eq!(table.provisional(b, name("k")).unwrap().import, Some(name("./two")));
        assert!(table.provisional(b, name("other")).is_none());
    }

    #[test]
    fn test_snapshot_ignores_forwarding_order() {
        let a = Boundary::Container(name("snap-a"));
        let b = Boundary::Container(name("snap-b"));

        let mut first = SharedScopeTable::new();
        first.declare_shared(a, SharedDecl::new("k", "./a"));
        first.declare_shared(b, SharedDecl::new("k", "./b"));

        let mut second = SharedScopeTable::new();
        second.declare_shared(b, SharedDecl::new("k", "./b"));
        second.declare_shared(a, SharedDecl::new("k", "./a"));

        assert_eq!(first.snapshot(), second.snapshot());
    }

    #[test]
    fn test_snapshot_providers_and_keys() {
        let mut table = SharedScopeTable::new();
        let b = Boundary::Container(name("keys"));
        table.declare_shared(b, SharedDecl::consume("react"));
        table.declare_shared(b, SharedDecl::new("lodash", "./lodash"));
        table.declare_shared(b, SharedDecl::override_with("lodash", "./lodash-es"));

        let snapshot = table.snapshot();
        let positions: Vec<usize> = snapshot.providers(b, name("lodash")).map(|(i, _)| i).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(snapshot.providers(b, name("react")).count(), 0);
        assert_eq!(
            snapshot.keys().into_iter().collect::<Vec<_>>(),
            vec![name("lodash"), name("react")]
        );
    }

    #[test]
    fn test_get_resolved_and_discard() {
        let mut table = SharedScopeTable::new();
        let root = name("pub-root");
        let mut scope = ResolvedScope::new(root);
        scope.insert(Boundary::Container(root), entry("shared", "pub-root", "./shared"));
        table.publish(scope);

        let id = ScopeId::root(root);
        assert_eq!(table.get_resolved(&id, name("shared")).unwrap().module, "./shared");
        assert_eq!(
            table.get_resolved(&id, name("missing")).unwrap_err(),
            FederationError::UnresolvedShared {
                root,
                key: name("missing")
            }
        );

        assert!(table.discard(root));
        assert!(matches!(
            table.get_resolved(&id, name("shared")),
            Err(FederationError::UnknownContainer { .. })
        ));
    }

    #[test]
    fn test_digest_tracks_entries() {
        let root = name("digest-root");
        let mut a = ResolvedScope::new(root);
        a.insert(Boundary::Container(root), entry("k", "x", "./x"));
        let mut b = a.clone();
        assert_eq!(a.digest(), b.digest());

        b.insert(Boundary::Container(root), entry("k", "y", "./y"));
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_boundary_display() {
        let nested = Boundary::Exposed {
            container: name("container-with-shared"),
            exposed: name("b"),
        };
        assert_eq!(nested.to_string(), "container-with-shared/b");
        assert!(nested.is_nested());
        assert_eq!(nested.container(), "container-with-shared");
    }
}
