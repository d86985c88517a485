//! Remote container graph.
//!
//! Containers are nodes; "consumes remote" declarations are edges. A
//! remote may name a container that has not been bound yet: the graph
//! keeps a placeholder node for it and hands out [`PendingModule`]
//! futures that complete once the container arrives. Closing the graph
//! fails whatever is still waiting.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::core::container::{normalize_exposed_name, RemoteDecl};
use crate::core::{Container, ModuleId};
use crate::federation::errors::FederationError;
use crate::util::InternedString;

type Completion = Result<ModuleId, FederationError>;

/// A node in the graph: a bound container, or a name some remote
/// declaration points at that has not been bound (yet).
#[derive(Debug, Clone)]
pub enum ContainerNode {
    Bound(Container),
    Placeholder(InternedString),
}

impl ContainerNode {
    pub fn name(&self) -> InternedString {
        match self {
            ContainerNode::Bound(c) => c.name(),
            ContainerNode::Placeholder(name) => *name,
        }
    }

    pub fn container(&self) -> Option<&Container> {
        match self {
            ContainerNode::Bound(c) => Some(c),
            ContainerNode::Placeholder(_) => None,
        }
    }
}

/// A "consumes remote" edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteEdge {
    pub alias: InternedString,
    /// Position among the consumer's remote declarations.
    pub order: usize,
    /// Set on the edge to a remote's fallback container.
    pub fallback: bool,
}

/// One remote as seen from its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteLink {
    pub alias: InternedString,
    pub target: InternedString,
    pub fallback: Option<InternedString>,
}

impl From<&RemoteDecl> for RemoteLink {
    fn from(decl: &RemoteDecl) -> Self {
        RemoteLink {
            alias: decl.alias,
            target: decl.target,
            fallback: decl.fallback,
        }
    }
}

/// The federation's container graph.
pub struct RemoteGraph {
    graph: DiGraph<ContainerNode, RemoteEdge>,
    nodes: HashMap<InternedString, NodeIndex>,
    exposed: HashMap<InternedString, BTreeMap<InternedString, ModuleId>>,
    pending: Mutex<PendingTable>,
    closed: bool,
}

type PendingTable = HashMap<(InternedString, InternedString), Vec<oneshot::Sender<Completion>>>;

impl RemoteGraph {
    pub fn new() -> Self {
        RemoteGraph {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            exposed: HashMap::new(),
            pending: Mutex::new(HashMap::new()),
            closed: false,
        }
    }

    fn node(&mut self, name: InternedString) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(&name) {
            return idx;
        }
        let idx = self.graph.add_node(ContainerNode::Placeholder(name));
        self.nodes.insert(name, idx);
        idx
    }

    /// Add a bound container with the ids of its exposed modules and
    /// complete every handle waiting on it.
    pub fn add_container(
        &mut self,
        container: Container,
        exposed: Vec<(InternedString, ModuleId)>,
    ) -> Result<(), FederationError> {
        let name = container.name();
        if self.closed {
            return Err(FederationError::GraphClosed { container: name });
        }
        if self.contains(name) {
            return Err(FederationError::DuplicateBinding { container: name });
        }

        let idx = self.node(name);
        self.graph[idx] = ContainerNode::Bound(container);
        self.exposed.insert(name, exposed.into_iter().collect());

        let waiting: Vec<_> = {
            let pending = self.pending.get_mut().unwrap_or_else(|e| e.into_inner());
            let keys: Vec<_> = pending.keys().filter(|(c, _)| *c == name).copied().collect();
            keys.into_iter()
                .filter_map(|key| pending.remove(&key).map(|senders| (key.1, senders)))
                .collect()
        };
        for (exposed, senders) in waiting {
            let result = self.lookup_exposed(name, exposed);
            tracing::debug!(
                "completing {} pending import(s) of {}/{}",
                senders.len(),
                name,
                exposed
            );
            for sender in senders {
                let _ = sender.send(result.clone());
            }
        }

        Ok(())
    }

    /// Record that `from` consumes `to` under `alias`.
    ///
    /// `to` does not need to exist yet.
    pub fn add_remote(
        &mut self,
        from: InternedString,
        alias: InternedString,
        to: InternedString,
    ) -> Result<(), FederationError> {
        self.add_edge(from, alias, to, false)
    }

    /// Record the fallback container for `from`'s remote `alias`.
    pub fn add_fallback(
        &mut self,
        from: InternedString,
        alias: InternedString,
        fallback: InternedString,
    ) -> Result<(), FederationError> {
        self.add_edge(from, alias, fallback, true)
    }

    fn add_edge(
        &mut self,
        from: InternedString,
        alias: InternedString,
        to: InternedString,
        fallback: bool,
    ) -> Result<(), FederationError> {
        if self.closed {
            return Err(FederationError::GraphClosed { container: from });
        }
        let from_idx = self.node(from);
        let to_idx = self.node(to);
        let primaries = || {
            self.graph
                .edges_directed(from_idx, Direction::Outgoing)
                .filter(|e| !e.weight().fallback)
        };
        // A fallback shares the order of the primary remote it backs.
        let order = if fallback {
            primaries()
                .find(|e| e.weight().alias == alias)
                .map(|e| e.weight().order)
                .unwrap_or_else(|| primaries().count())
        } else {
            primaries().count()
        };

        tracing::debug!(
            "{} consumes {} as `{}`{}",
            from,
            to,
            alias,
            if fallback { " (fallback)" } else { "" }
        );
        self.graph.add_edge(
            from_idx,
            to_idx,
            RemoteEdge {
                alias,
                order,
                fallback,
            },
        );
        Ok(())
    }

    /// Resolve `exposed` in `container` to the id of its remote proxy.
    ///
    /// The returned future completes as soon as `container` is bound; it
    /// is safe to call before the container exists.
    pub fn resolve_exposed(&self, container: InternedString, exposed: &str) -> PendingModule {
        let exposed = normalize_exposed_name(exposed);

        if self.contains(container) {
            return PendingModule::ready(self.lookup_exposed(container, exposed));
        }
        if self.closed {
            return PendingModule::ready(Err(self.unresolved_remote(container)));
        }

        let (sender, receiver) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry((container, exposed))
            .or_default()
            .push(sender);
        tracing::debug!("deferring {}/{} until the container is bound", container, exposed);

        PendingModule {
            state: PendingState::Waiting {
                container,
                receiver,
            },
        }
    }

    fn lookup_exposed(&self, container: InternedString, exposed: InternedString) -> Completion {
        let table = self.exposed.get(&container);
        table
            .and_then(|t| t.get(&exposed).copied())
            .ok_or_else(|| FederationError::UnresolvedExposed {
                container,
                exposed: exposed.to_string(),
                available: table.map(|t| t.keys().copied().collect()).unwrap_or_default(),
            })
    }

    fn unresolved_remote(&self, container: InternedString) -> FederationError {
        FederationError::UnresolvedRemote {
            container,
            required_by: self.consumers(container),
        }
    }

    /// Close the graph: no more containers may be bound.
    ///
    /// Every handle still waiting fails with `UnresolvedRemote`. Returns
    /// one error per placeholder that was never bound, sorted by name.
    pub fn close(&mut self) -> Vec<FederationError> {
        self.closed = true;

        let mut failed: Vec<InternedString> = self.placeholders();
        failed.sort();

        let pending = std::mem::take(self.pending.get_mut().unwrap_or_else(|e| e.into_inner()));
        for (key, senders) in pending {
            let err = self.unresolved_remote(key.0);
            for sender in senders {
                let _ = sender.send(Err(err.clone()));
            }
        }

        let errors: Vec<FederationError> = failed
            .into_iter()
            .map(|name| self.unresolved_remote(name))
            .collect();
        for err in &errors {
            tracing::warn!("{}", err);
        }
        errors
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether `name` is a bound container.
    pub fn contains(&self, name: InternedString) -> bool {
        self.container(name).is_some()
    }

    pub fn container(&self, name: InternedString) -> Option<&Container> {
        self.nodes
            .get(&name)
            .and_then(|&idx| self.graph[idx].container())
    }

    /// Bound containers, sorted by name.
    pub fn containers(&self) -> Vec<&Container> {
        let mut containers: Vec<&Container> = self
            .graph
            .node_weights()
            .filter_map(ContainerNode::container)
            .collect();
        containers.sort_by_key(|c| c.name());
        containers
    }

    /// Names referenced as remotes but never bound, in insertion order.
    pub fn placeholders(&self) -> Vec<InternedString> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].container().is_none())
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_some()
            })
            .map(|idx| self.graph[idx].name())
            .collect()
    }

    /// `name`'s remotes in declaration order.
    pub fn remotes(&self, name: InternedString) -> Vec<RemoteLink> {
        let Some(&idx) = self.nodes.get(&name) else {
            return Vec::new();
        };

        let mut primary: Vec<(usize, RemoteLink)> = Vec::new();
        let mut fallbacks: HashMap<usize, InternedString> = HashMap::new();
        for edge in self.graph.edges_directed(idx, Direction::Outgoing) {
            let weight = edge.weight();
            let target = self.graph[edge.target()].name();
            if weight.fallback {
                fallbacks.insert(weight.order, target);
            } else {
                primary.push((
                    weight.order,
                    RemoteLink {
                        alias: weight.alias,
                        target,
                        fallback: None,
                    },
                ));
            }
        }

        primary.sort_by_key(|(order, _)| *order);
        primary
            .into_iter()
            .map(|(order, mut link)| {
                link.fallback = fallbacks.get(&order).copied();
                link
            })
            .collect()
    }

    /// The container a remote link actually reaches: its target when
    /// bound, else its fallback when that is bound.
    pub fn effective_target(&self, link: &RemoteLink) -> Option<InternedString> {
        if self.contains(link.target) {
            Some(link.target)
        } else {
            link.fallback.filter(|f| self.contains(*f))
        }
    }

    /// Containers that declare `name` as a remote (or fallback), sorted.
    pub fn consumers(&self, name: InternedString) -> Vec<InternedString> {
        let Some(&idx) = self.nodes.get(&name) else {
            return Vec::new();
        };
        let consumers: BTreeSet<InternedString> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].name())
            .collect();
        consumers.into_iter().collect()
    }

    /// Groups of containers that consume each other, directly or
    /// transitively. Each group and the list are sorted.
    pub fn cycles(&self) -> Vec<Vec<InternedString>> {
        let mut cycles: Vec<Vec<InternedString>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0])
            })
            .map(|scc| {
                let mut names: Vec<InternedString> =
                    scc.into_iter().map(|idx| self.graph[idx].name()).collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// The registered id of `container`'s exposed module, if bound.
    pub fn exposed_id(&self, container: InternedString, exposed: &str) -> Option<ModuleId> {
        let exposed = normalize_exposed_name(exposed);
        self.exposed.get(&container)?.get(&exposed).copied()
    }

    /// All edges as `(from, alias, to, fallback)`, sorted.
    pub fn edges(&self) -> Vec<(InternedString, InternedString, InternedString, bool)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].name(),
                    e.weight().alias,
                    self.graph[e.target()].name(),
                    e.weight().fallback,
                )
            })
            .collect();
        edges.sort();
        edges
    }
}

impl Default for RemoteGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RemoteGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteGraph")
            .field("containers", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field(
                "pending",
                &self.pending.lock().map(|p| p.len()).unwrap_or_default(),
            )
            .field("closed", &self.closed)
            .finish()
    }
}

/// A deferred exposed-module lookup.
///
/// Resolves to the exposed module's id once its container is bound, or
/// to an error if the container lacks the module or is never bound.
#[must_use = "a pending module does nothing unless awaited"]
pub struct PendingModule {
    state: PendingState,
}

enum PendingState {
    Ready(Completion),
    Waiting {
        container: InternedString,
        receiver: oneshot::Receiver<Completion>,
    },
}

impl PendingModule {
    fn ready(result: Completion) -> Self {
        PendingModule {
            state: PendingState::Ready(result),
        }
    }

    /// Whether the result is already known without polling.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, PendingState::Ready(_))
    }
}

impl Future for PendingModule {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Completion> {
        let next = match &mut self.state {
            PendingState::Ready(result) => return Poll::Ready(result.clone()),
            PendingState::Waiting {
                container,
                receiver,
            } => match Pin::new(receiver).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(result)) => result,
                // The graph went away without ever binding the container.
                Poll::Ready(Err(oneshot::Canceled)) => Err(FederationError::UnresolvedRemote {
                    container: *container,
                    required_by: Vec::new(),
                }),
            },
        };

        self.state = PendingState::Ready(next.clone());
        Poll::Ready(next)
    }
}

impl fmt::Debug for PendingModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            PendingState::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            PendingState::Waiting { container, .. } => {
                f.debug_struct("Waiting").field("container", container).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::container::{ExposeDecl, ModuleSource};
    use crate::core::Origin;
    use futures::FutureExt;

    fn name(s: &str) -> InternedString {
        InternedString::new(s)
    }

    fn bind(graph: &mut RemoteGraph, container: Container) {
        let exposed = container
            .exposes()
            .iter()
            .map(|e| {
                (
                    e.name,
                    ModuleId::for_origin(&Origin::remote(container.name()), &e.name),
                )
            })
            .collect();
        graph.add_container(container, exposed).unwrap();
    }

    fn exposing(container: &str, exposed: &[&str]) -> Container {
        let mut builder = Container::builder(container);
        for e in exposed {
            let path = format!("./{}.js", e);
            builder = builder
                .module(path.as_str(), ModuleSource::value(*e))
                .expose(ExposeDecl::new(e, path.as_str()));
        }
        builder.build()
    }

    #[test]
    fn test_forward_reference_completes_on_bind() {
        let mut graph = RemoteGraph::new();
        graph
            .add_remote(name("host"), name("remote"), name("remote-app"))
            .unwrap();

        let mut pending = graph.resolve_exposed(name("remote-app"), "./button");
        assert!(!pending.is_ready());
        assert!((&mut pending).now_or_never().is_none());

        bind(&mut graph, exposing("remote-app", &["button"]));

        let id = futures::executor::block_on(pending).unwrap();
        assert_eq!(id.as_str(), "webpack/container/remote/remote-app/button");
    }

    #[test]
    fn test_missing_exposed_fails_on_bind() {
        let mut graph = RemoteGraph::new();
        let pending = graph.resolve_exposed(name("lib-x"), "missing");
        bind(&mut graph, exposing("lib-x", &["present"]));

        match futures::executor::block_on(pending) {
            Err(FederationError::UnresolvedExposed { available, .. }) => {
                assert_eq!(available, vec![name("present")]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_close_fails_pending_handles() {
        let mut graph = RemoteGraph::new();
        graph
            .add_remote(name("host-y"), name("ghost"), name("ghost-app"))
            .unwrap();
        let pending = graph.resolve_exposed(name("ghost-app"), "a");

        let errors = graph.close();
        assert_eq!(errors.len(), 1);

        match futures::executor::block_on(pending) {
            Err(FederationError::UnresolvedRemote {
                container,
                required_by,
            }) => {
                assert_eq!(container, "ghost-app");
                assert_eq!(required_by, vec![name("host-y")]);
            }
            other => panic!("unexpected: {:?}", other),
        }

        let late = graph.resolve_exposed(name("ghost-app"), "a");
        assert!(late.is_ready());
    }

    #[test]
    fn test_bind_after_close_is_rejected() {
        let mut graph = RemoteGraph::new();
        graph.close();
        let err = graph
            .add_container(exposing("late", &[]), Vec::new())
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_duplicate_binding() {
        let mut graph = RemoteGraph::new();
        bind(&mut graph, exposing("twice", &[]));
        let err = graph.add_container(exposing("twice", &[]), Vec::new()).unwrap_err();
        assert_eq!(
            err,
            FederationError::DuplicateBinding {
                container: name("twice")
            }
        );
    }

    #[test]
    fn test_remotes_keep_declaration_order() {
        let mut graph = RemoteGraph::new();
        let host = name("order-host");
        graph.add_remote(host, name("z"), name("zeta")).unwrap();
        graph.add_remote(host, name("a"), name("alpha")).unwrap();
        graph.add_fallback(host, name("a"), name("alpha-fallback")).unwrap();
        graph.add_remote(host, name("m"), name("mid")).unwrap();

        let links = graph.remotes(host);
        let targets: Vec<&str> = links.iter().map(|l| l.target.as_str()).collect();
        assert_eq!(targets, vec!["zeta", "alpha", "mid"]);
        assert_eq!(links[1].fallback, Some(name("alpha-fallback")));
        assert_eq!(links[0].fallback, None);
    }

    #[test]
    fn test_effective_target_uses_fallback() {
        let mut graph = RemoteGraph::new();
        let host = name("fb-host");
        graph.add_remote(host, name("lib"), name("fb-primary")).unwrap();
        graph.add_fallback(host, name("lib"), name("fb-secondary")).unwrap();
        bind(&mut graph, exposing("fb-secondary", &["x"]));

        let link = graph.remotes(host)[0];
        assert_eq!(graph.effective_target(&link), Some(name("fb-secondary")));
    }

    #[test]
    fn test_cycles_are_reported() {
        let mut graph = RemoteGraph::new();
        graph.add_remote(name("cy-a"), name("b"), name("cy-b")).unwrap();
        graph.add_remote(name("cy-b"), name("a"), name("cy-a")).unwrap();
        graph.add_remote(name("cy-b"), name("c"), name("cy-c")).unwrap();

        assert_eq!(graph.cycles(), vec![vec![name("cy-a"), name("cy-b")]]);
        assert_eq!(graph.consumers(name("cy-a")), vec![name("cy-b")]);
    }
}
