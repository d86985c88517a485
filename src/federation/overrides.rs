//! Override propagation engine.
//!
//! One [`ScopeRun`] computes the shared scope of one build root. It walks
//! the remote graph breadth first from the root, following each
//! container's remotes in declaration order, which gives every reachable
//! container a distance from the root and a discovery position.
//!
//! The candidates for a key inside container `C` are:
//!
//! - every `shared` declaration that provides the key anywhere in the
//!   root's reach. This set is the same for all containers, so consumers
//!   of one scope agree on the key unless an override says otherwise;
//! - the `override` declarations of containers on some path from the
//!   root to `C` (C included). Overrides flow toward remotes and never
//!   back to a container's consumers.
//!
//! The winner is the candidate that is:
//!
//! 1. pinned, if any candidate is pinned;
//! 2. otherwise the closest to the root;
//! 3. at equal distance, the one reached later (see [`TieBreak`]).
//!
//! Cyclic graphs terminate because both walks use visited sets. Results
//! are memoized per (boundary, key), so revisiting a container through a
//! cycle reuses the cached answer.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::core::container::{DeclKind, SharedDecl};
use crate::federation::errors::FederationError;
use crate::federation::graph::RemoteGraph;
use crate::federation::shared_scope::{
    Boundary, ResolvedEntry, ResolvedScope, ScopeSnapshot, ScopeWarning,
};
use crate::util::config::TieBreak;
use crate::util::InternedString;

/// Computes resolved scopes over a closed graph and a frozen snapshot.
pub struct OverrideEngine<'e> {
    graph: &'e RemoteGraph,
    snapshot: &'e ScopeSnapshot,
    tie_break: TieBreak,
}

impl<'e> OverrideEngine<'e> {
    pub fn new(graph: &'e RemoteGraph, snapshot: &'e ScopeSnapshot) -> Self {
        OverrideEngine {
            graph,
            snapshot,
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Start resolving the scope of `root`.
    ///
    /// Every run owns its memo tables. Dropping a run before
    /// [`ScopeRun::finish`] discards them and leaves nothing behind.
    pub fn begin(&self, root: InternedString) -> Result<ScopeRun<'e>, FederationError> {
        if !self.graph.contains(root) {
            return Err(FederationError::UnknownContainer { container: root });
        }

        let mut run = ScopeRun {
            root,
            graph: self.graph,
            snapshot: self.snapshot,
            tie_break: self.tie_break,
            order: Vec::new(),
            distance: HashMap::new(),
            parents: HashMap::new(),
            unresolved: BTreeSet::new(),
            ancestors: HashMap::new(),
            memo: HashMap::new(),
            providers: HashMap::new(),
        };
        run.walk();
        Ok(run)
    }
}

/// One providing declaration competing for a key.
#[derive(Debug, Clone, Copy)]
struct Candidate<'e> {
    boundary: Boundary,
    decl: &'e SharedDecl,
    distance: usize,
    /// (discovery position, nested, declaration position)
    seq: (usize, bool, usize),
}

impl Candidate<'_> {
    fn into_entry(self) -> Option<ResolvedEntry> {
        Some(ResolvedEntry {
            key: self.decl.key,
            owner: self.boundary.container(),
            declared_by: self.boundary,
            module: self.decl.import?,
            overridable: self.decl.overridable,
            eager: self.decl.eager,
            version: self.decl.version.clone(),
            kind: self.decl.kind,
            distance: self.distance,
        })
    }
}

/// The in-progress scope of one build root.
pub struct ScopeRun<'e> {
    root: InternedString,
    graph: &'e RemoteGraph,
    snapshot: &'e ScopeSnapshot,
    tie_break: TieBreak,
    /// Reachable containers in discovery order
    order: Vec<InternedString>,
    distance: HashMap<InternedString, usize>,
    /// Reverse remote edges between reachable containers
    parents: HashMap<InternedString, Vec<InternedString>>,
    unresolved: BTreeSet<InternedString>,
    ancestors: HashMap<InternedString, Vec<InternedString>>,
    memo: HashMap<(Boundary, InternedString), Option<ResolvedEntry>>,
    /// Root-wide `shared` providers per key
    providers: HashMap<InternedString, Vec<Candidate<'e>>>,
}

impl<'e> ScopeRun<'e> {
    pub fn root(&self) -> InternedString {
        self.root
    }

    /// Breadth-first walk from the root.
    fn walk(&mut self) {
        let mut queue = VecDeque::from([self.root]);
        self.distance.insert(self.root, 0);
        self.order.push(self.root);

        while let Some(current) = queue.pop_front() {
            let next_distance = self.distance[&current] + 1;
            for link in self.graph.remotes(current) {
                let Some(target) = self.graph.effective_target(&link) else {
                    self.unresolved.insert(link.target);
                    continue;
                };
                self.parents.entry(target).or_default().push(current);
                if !self.distance.contains_key(&target) {
                    self.distance.insert(target, next_distance);
                    self.order.push(target);
                    queue.push_back(target);
                }
            }
        }

        tracing::debug!(
            "{} reaches {} container(s): {}",
            self.root,
            self.order.len(),
            self.order
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    /// Reachable containers in discovery order.
    pub fn reachable(&self) -> &[InternedString] {
        &self.order
    }

    /// Distance of `container` from the root, if reachable.
    pub fn distance(&self, container: InternedString) -> Option<usize> {
        self.distance.get(&container).copied()
    }

    /// Containers on some path from the root to `container`, itself
    /// included.
    fn ancestors(&mut self, container: InternedString) -> Vec<InternedString> {
        if let Some(cached) = self.ancestors.get(&container) {
            return cached.clone();
        }

        let mut seen = HashSet::from([container]);
        let mut queue = VecDeque::from([container]);
        while let Some(current) = queue.pop_front() {
            for &parent in self.parents.get(&current).into_iter().flatten() {
                if seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }

        let ancestors: Vec<InternedString> = self
            .order
            .iter()
            .filter(|c| seen.contains(*c))
            .copied()
            .collect();
        self.ancestors.insert(container, ancestors.clone());
        ancestors
    }

    /// Providers of `key` declared in `boundary`, restricted to `kind`
    /// when given.
    fn collect(
        &self,
        boundary: Boundary,
        key: InternedString,
        distance: usize,
        kind: Option<DeclKind>,
        out: &mut Vec<Candidate<'e>>,
    ) {
        let snapshot = self.snapshot;
        let Some(discovery) = self.order.iter().position(|c| *c == boundary.container()) else {
            return;
        };
        out.extend(
            snapshot
                .providers(boundary, key)
                .filter(|(_, decl)| kind.map_or(true, |k| decl.kind == k))
                .map(|(position, decl)| Candidate {
                    boundary,
                    decl,
                    distance,
                    seq: (discovery, boundary.is_nested(), position),
                }),
        );
    }

    fn compare(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
        let pinned = |c: &Candidate<'_>| !c.decl.overridable;
        pinned(a)
            .cmp(&pinned(b))
            .then_with(|| b.distance.cmp(&a.distance))
            .then_with(|| match self.tie_break {
                TieBreak::LaterWins => a.seq.cmp(&b.seq),
                TieBreak::EarlierWins => b.seq.cmp(&a.seq),
            })
    }

    fn winner(&self, candidates: Vec<Candidate<'e>>) -> Option<ResolvedEntry> {
        candidates
            .into_iter()
            .max_by(|a, b| self.compare(a, b))
            .and_then(Candidate::into_entry)
    }

    /// The entry `key` resolves to inside `boundary`.
    ///
    /// Returns `None` when nothing eligible provides the key, or when the
    /// boundary's container is not reachable from the root.
    pub fn resolve(&mut self, boundary: Boundary, key: InternedString) -> Option<ResolvedEntry> {
        if let Some(cached) = self.memo.get(&(boundary, key)) {
            return cached.clone();
        }

        let container = boundary.container();
        let distance = self.distance(container)?;

        let mut candidates = self.shared_providers(key);
        for ancestor in self.ancestors(container) {
            let d = self.distance[&ancestor];
            self.collect(
                Boundary::Container(ancestor),
                key,
                d,
                Some(DeclKind::Override),
                &mut candidates,
            );
        }
        if boundary.is_nested() {
            self.collect(boundary, key, distance + 1, None, &mut candidates);
        }

        let resolved = self.winner(candidates);

        if let Some(entry) = &resolved {
            tracing::debug!(
                "{}: `{}` in {} -> {} from {} ({})",
                self.root,
                key,
                boundary,
                entry.module,
                entry.owner,
                if entry.overridable { "overridable" } else { "pinned" }
            );
        }
        self.memo.insert((boundary, key), resolved.clone());
        resolved
    }

    /// Every container-level `shared` provider of `key` in the root's reach.
    fn shared_providers(&mut self, key: InternedString) -> Vec<Candidate<'e>> {
        if let Some(cached) = self.providers.get(&key) {
            return cached.clone();
        }

        let mut candidates = Vec::new();
        for &container in &self.order {
            let d = self.distance[&container];
            self.collect(
                Boundary::Container(container),
                key,
                d,
                Some(DeclKind::Shared),
                &mut candidates,
            );
        }
        self.providers.insert(key, candidates.clone());
        candidates
    }

    /// Boundaries inside the root's scope: every reachable container and
    /// each of its nested boundaries.
    pub fn boundaries(&self) -> Vec<Boundary> {
        self.order
            .iter()
            .flat_map(|&c| {
                std::iter::once(Boundary::Container(c))
                    .chain(self.snapshot.nested_boundaries(c))
            })
            .collect()
    }

    /// Resolve every key in every boundary and freeze the result.
    pub fn finish(mut self) -> ResolvedScope {
        let mut scope = ResolvedScope::new(self.root);
        let keys = self.snapshot.keys();

        for boundary in self.boundaries() {
            for &key in &keys {
                if let Some(entry) = self.resolve(boundary, key) {
                    scope.insert(boundary, entry);
                }
            }
        }

        scope.warnings = self.version_warnings(&scope);
        for warning in &scope.warnings {
            tracing::warn!("{}", warning);
        }
        scope.unresolved_remotes = self.unresolved.iter().copied().collect();

        tracing::info!(
            "resolved {} shared entr{} for {}",
            scope.len(),
            if scope.len() == 1 { "y" } else { "ies" },
            self.root
        );
        scope
    }

    /// Requirements the resolved entries fail to satisfy.
    fn version_warnings(&self, scope: &ResolvedScope) -> Vec<ScopeWarning> {
        let mut warnings = Vec::new();
        for boundary in self.boundaries() {
            for decl in self.snapshot.declarations(boundary) {
                let Some(required) = &decl.required_version else {
                    continue;
                };
                let Some(entry) = scope.get(boundary, decl.key) else {
                    continue;
                };
                let satisfied = entry
                    .version
                    .as_ref()
                    .is_some_and(|version| required.matches(version));
                if !satisfied {
                    warnings.push(ScopeWarning::VersionMismatch {
                        boundary,
                        key: decl.key,
                        required: required.clone(),
                        found: entry.version.clone(),
                        owner: entry.owner,
                    });
                }
            }
        }
        warnings
    }
}
