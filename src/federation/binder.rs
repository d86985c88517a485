//! Container entry and exposed-module binder.
//!
//! Binding is the moment a container's configuration enters the
//! federation. The binder registers the ids other containers use to
//! address it, forwards its shared declarations and overrides to the
//! shared-scope table, and adds it and its remote edges to the graph.
//! Adding the container to the graph is the last step, so any import
//! waiting on it sees a fully registered container.

use crate::core::registry::ModuleRegistry;
use crate::core::{Container, ModuleId, Origin};
use crate::federation::errors::FederationError;
use crate::federation::graph::RemoteGraph;
use crate::federation::shared_scope::{Boundary, SharedScopeTable};
use crate::util::InternedString;

/// Ids registered for a bound container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub container: InternedString,
    /// `webpack/container/entry/<name>`, present when anything is exposed
    pub entry: Option<ModuleId>,
    /// `webpack/container/reference/<name>`
    pub reference: ModuleId,
    /// `(exposed name, webpack/container/remote/<name>/<exposed>)`
    pub exposed: Vec<(InternedString, ModuleId)>,
}

/// Wires containers into the registry, the graph and the table.
pub struct ContainerBinder<'f> {
    registry: &'f ModuleRegistry,
    graph: &'f mut RemoteGraph,
    table: &'f mut SharedScopeTable,
}

impl<'f> ContainerBinder<'f> {
    pub fn new(
        registry: &'f ModuleRegistry,
        graph: &'f mut RemoteGraph,
        table: &'f mut SharedScopeTable,
    ) -> Self {
        ContainerBinder {
            registry,
            graph,
            table,
        }
    }

    /// Bind `container`.
    ///
    /// Fails with `DuplicateBinding` if a container with the same name is
    /// already bound, and with `GraphClosed` once the graph is closed.
    /// Neither failure leaves anything behind.
    pub fn bind(&mut self, container: Container) -> Result<Binding, FederationError> {
        let name = container.name();
        if self.graph.is_closed() {
            return Err(FederationError::GraphClosed { container: name });
        }
        if self.graph.contains(name) {
            return Err(FederationError::DuplicateBinding { container: name });
        }

        tracing::debug!("binding container {}", name);

        let exposed = container
            .exposes()
            .iter()
            .map(|expose| -> Result<_, FederationError> {
                let id = self.registry.register(Origin::remote(name), &expose.name)?;
                Ok((expose.name, id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let reference = self.registry.register(Origin::reference(name), "")?;
        let entry = if exposed.is_empty() {
            None
        } else {
            Some(self.registry.register(Origin::entry(name), "")?)
        };

        for decl in container.declarations() {
            self.table
                .declare_shared(Boundary::Container(name), decl.clone());
        }
        for expose in container.exposes().iter().filter(|e| e.is_boundary()) {
            let boundary = Boundary::Exposed {
                container: name,
                exposed: expose.name,
            };
            for decl in &expose.shared {
                self.table.declare_shared(boundary, decl.clone());
            }
        }

        for remote in container.remotes() {
            self.graph.add_remote(name, remote.alias, remote.target)?;
            if let Some(fallback) = remote.fallback {
                self.graph.add_fallback(name, remote.alias, fallback)?;
            }
        }
        self.graph.add_container(container, exposed.clone())?;

        Ok(Binding {
            container: name,
            entry,
            reference,
            exposed,
        })
    }
}
