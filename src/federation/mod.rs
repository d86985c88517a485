//! Module federation: binding containers, resolving shared scopes and
//! composing per-container module graphs.
//!
//! [`Federation`] owns the pieces and sequences them:
//!
//! 1. [`Federation::bind`] every container (any order).
//! 2. [`Federation::close`] the graph; remotes still unbound are reported.
//! 3. [`Federation::resolve_scope`] for each build root, then
//!    [`Federation::build`] or [`Federation::import`] against it.

pub mod binder;
pub mod errors;
pub mod graph;
pub mod overrides;
pub mod runtime;
pub mod shared_scope;

pub use binder::{Binding, ContainerBinder};
pub use errors::FederationError;
pub use graph::{PendingModule, RemoteGraph, RemoteLink};
pub use overrides::{OverrideEngine, ScopeRun};
pub use runtime::{ModuleValue, Runtime};
pub use shared_scope::{
    Boundary, ResolvedEntry, ResolvedScope, ScopeId, ScopeSnapshot, ScopeWarning,
    SharedScopeTable,
};

use crate::core::container::is_local_request;
use crate::core::registry::ModuleRegistry;
use crate::core::{Container, ModuleId, Origin};
use crate::util::config::ResolveConfig;
use crate::util::InternedString;

/// The modules registered for one container's own build.
#[derive(Debug)]
pub struct Build {
    pub container: InternedString,
    registry: ModuleRegistry,
}

impl Build {
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Every registered id, sorted.
    pub fn module_ids(&self) -> Vec<String> {
        self.registry.id_strings()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.registry.contains(id)
    }
}

/// A federation of containers.
#[derive(Debug, Default)]
pub struct Federation {
    graph: RemoteGraph,
    table: SharedScopeTable,
    registry: ModuleRegistry,
    config: ResolveConfig,
    unresolved: Vec<FederationError>,
}

impl Federation {
    pub fn new() -> Self {
        Federation::default()
    }

    pub fn with_config(config: ResolveConfig) -> Self {
        Federation {
            config,
            ..Federation::default()
        }
    }

    /// Bind one container. See [`ContainerBinder::bind`].
    pub fn bind(&mut self, container: Container) -> Result<Binding, FederationError> {
        ContainerBinder::new(&self.registry, &mut self.graph, &mut self.table).bind(container)
    }

    /// Bind every container, stopping at the first failure.
    pub fn bind_all(
        &mut self,
        containers: impl IntoIterator<Item = Container>,
    ) -> Result<Vec<Binding>, FederationError> {
        containers.into_iter().map(|c| self.bind(c)).collect()
    }

    /// Close the graph and return the unresolved-remote sweep.
    ///
    /// Closing twice returns the same sweep.
    pub fn close(&mut self) -> &[FederationError] {
        if !self.graph.is_closed() {
            self.unresolved = self.graph.close();
            tracing::info!(
                "closed graph with {} container(s), {} unresolved remote(s)",
                self.graph.containers().len(),
                self.unresolved.len()
            );
        }
        &self.unresolved
    }

    pub fn is_closed(&self) -> bool {
        self.graph.is_closed()
    }

    pub fn graph(&self) -> &RemoteGraph {
        &self.graph
    }

    pub fn table(&self) -> &SharedScopeTable {
        &self.table
    }

    /// Registry of the ids every bound container publishes.
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn container(&self, name: &str) -> Result<&Container, FederationError> {
        InternedString::lookup(name)
            .and_then(|n| self.graph.container(n))
            .ok_or_else(|| FederationError::UnknownContainer {
                container: InternedString::new(name),
            })
    }

    /// Resolve and publish the shared scope of `root`.
    ///
    /// Closes the graph first if needed: a scope is only computed once
    /// every container had its chance to bind.
    pub fn resolve_scope(&mut self, root: &str) -> Result<&ResolvedScope, FederationError> {
        self.close();
        let root = self.container(root)?.name();

        if self.table.scope(root).is_none() {
            let snapshot = self.table.snapshot();
            let scope = OverrideEngine::new(&self.graph, &snapshot)
                .with_tie_break(self.config.tie_break())
                .begin(root)?
                .finish();
            self.table.publish(scope);
        }

        self.table
            .scope(root)
            .ok_or(FederationError::UnknownContainer { container: root })
    }

    /// Drop the published scope of `root`.
    pub fn discard_scope(&mut self, root: &str) -> bool {
        InternedString::lookup(root).is_some_and(|root| self.table.discard(root))
    }

    /// Register every module `container`'s own build contains.
    ///
    /// A build holds the container's local modules, its entry when it
    /// exposes anything, a reference to each remote it consumes with a
    /// proxy for each of that remote's exposed modules, and a consume
    /// module for each bare request its modules make.
    pub fn build(&self, container: &str) -> Result<Build, FederationError> {
        let container = self.container(container)?;
        let name = container.name();
        let registry = ModuleRegistry::new();

        if !container.exposes().is_empty() {
            registry.register(Origin::entry(name), "")?;
        }
        for path in container.modules().keys() {
            registry.register(Origin::local(name), path)?;
        }

        for remote in container.remotes() {
            let Some(target) = self.graph.effective_target(&RemoteLink::from(remote)) else {
                tracing::warn!("{}: remote `{}` is not bound", name, remote.target);
                continue;
            };
            registry.register(Origin::reference(target), "")?;
            if let Some(remote_container) = self.graph.container(target) {
                for expose in remote_container.exposes() {
                    registry.register(Origin::remote(target), &expose.name)?;
                }
            }
        }

        for key in container.consumed_keys() {
            let request = container
                .shared_decl(key)
                .and_then(|d| d.import)
                .unwrap_or(key);
            let origin = Origin::consume_shared(name, container.share_scope(), key);
            registry.register(origin, &request)?;
        }

        tracing::debug!("{} builds {} module(s)", name, registry.len());
        Ok(Build {
            container: name,
            registry,
        })
    }

    /// The id a request from `container` resolves to, without evaluating.
    pub fn module_id_for(
        &self,
        container: &str,
        request: &str,
    ) -> Result<ModuleId, FederationError> {
        let container = self.container(container)?;
        let name = container.name();
        let unresolved = || FederationError::UnresolvedModule {
            container: name,
            request: request.to_string(),
        };

        if is_local_request(request) {
            let path = container.resolve_local(request).ok_or_else(unresolved)?;
            return Ok(ModuleId::for_origin(&Origin::local(name), &path));
        }
        if let Some((remote, exposed)) = container.remote_for(request) {
            let target = self
                .graph
                .effective_target(&RemoteLink::from(remote))
                .unwrap_or(remote.target);
            return self
                .graph
                .exposed_id(target, exposed)
                .ok_or_else(unresolved);
        }

        let key = InternedString::new(request);
        let request = container
            .shared_decl(key)
            .and_then(|d| d.import)
            .unwrap_or(key);
        Ok(ModuleId::for_origin(
            &Origin::consume_shared(name, container.share_scope(), key),
            &request,
        ))
    }

    /// Import `specifier` from `root` and evaluate it to a value.
    pub fn import(&mut self, root: &str, specifier: &str) -> Result<ModuleValue, FederationError> {
        self.resolve_scope(root)?;
        let runtime = Runtime::new(self, root)?;
        futures::executor::block_on(runtime.import(specifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures;

    #[test]
    fn test_fixture_builds_contain_expected_ids() {
        let mut federation = Federation::new();
        federation.bind_all(fixtures::transitive_overriding()).unwrap();
        assert!(federation.close().is_empty());

        let with_shared = federation.build(fixtures::WITH_SHARED).unwrap();
        for id in [
            "./b.js",
            "./modules.js",
            "webpack/container/entry/container-with-shared",
            "webpack/sharing/consume/default/shared/./shared",
        ] {
            assert!(with_shared.contains(id), "missing {id}");
        }

        let no_shared = federation.build(fixtures::NO_SHARED).unwrap();
        for id in [
            "./a.js",
            "./b.js",
            "./modules-from-remote.js",
            "./modules.js",
            "webpack/container/entry/container-no-shared",
            "webpack/container/reference/container-with-shared",
            "webpack/container/remote/container-with-shared/b",
            "webpack/container/remote/container-with-shared/modules",
        ] {
            assert!(no_shared.contains(id), "missing {id}");
        }
        assert!(!no_shared.contains("webpack/container/entry/container-with-shared"));
        assert!(!no_shared
            .module_ids()
            .iter()
            .any(|id| id.starts_with("webpack/sharing/consume")));
    }

    #[test]
    fn test_build_ids_are_sorted() {
        let mut federation = Federation::new();
        federation.bind_all(fixtures::transitive_overriding()).unwrap();
        let ids = federation.build(fixtures::APP).unwrap().module_ids();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_resolve_scope_closes_graph() {
        let mut federation = Federation::new();
        federation.bind_all(fixtures::transitive_overriding()).unwrap();
        let scope = federation.resolve_scope(fixtures::APP).unwrap();
        // The override in container-no-shared does not reach its consumer.
        let shared = InternedString::new("shared");
        assert_eq!(scope.get_root(shared).unwrap().owner, fixtures::WITH_SHARED);
        let within = Boundary::Container(InternedString::new(fixtures::WITH_SHARED));
        assert_eq!(scope.get(within, shared).unwrap().owner, fixtures::NO_SHARED);
        assert!(federation.is_closed());

        let late = Container::builder("late-arrival").build();
        assert!(matches!(
            federation.bind(late),
            Err(FederationError::GraphClosed { .. })
        ));
    }

    #[test]
    fn test_module_id_for_requests() {
        let mut federation = Federation::new();
        federation.bind_all(fixtures::transitive_overriding()).unwrap();
        federation.close();

        assert_eq!(
            federation
                .module_id_for(fixtures::NO_SHARED, "container-with-shared/b")
                .unwrap()
                .as_str(),
            "webpack/container/remote/container-with-shared/b"
        );
        assert_eq!(
            federation
                .module_id_for(fixtures::WITH_SHARED, "shared")
                .unwrap()
                .as_str(),
            "webpack/sharing/consume/default/shared/./shared"
        );
        assert_eq!(
            federation
                .module_id_for(fixtures::NO_SHARED, "./modules")
                .unwrap()
                .as_str(),
            "./modules.js"
        );
        assert!(federation.module_id_for(fixtures::NO_SHARED, "./nope").is_err());
    }

    #[test]
    fn test_unknown_container() {
        let federation = Federation::new();
        assert!(matches!(
            federation.build("never-declared-anywhere"),
            Err(FederationError::UnknownContainer { .. })
        ));
    }
}
