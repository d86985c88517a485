//! Evaluation of imports against a resolved federation.
//!
//! Each module is evaluated in a context: the build root whose shared
//! scope applies, the container whose modules and remotes resolve local
//! and remote requests, and the sharing boundary used for bare shared
//! keys. Crossing into a remote switches container (and boundary, when
//! the exposed module declares its own shared modules) but never the
//! root.

use std::fmt;

use futures::future::{FutureExt, LocalBoxFuture};
use serde::Serialize;

use crate::core::container::{is_local_request, ModuleSource};
use crate::core::Container;
use crate::federation::errors::FederationError;
use crate::federation::graph::RemoteLink;
use crate::federation::shared_scope::{Boundary, ResolvedScope};
use crate::federation::Federation;
use crate::util::InternedString;

/// What evaluating a module produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ModuleValue {
    Text(String),
    /// Sorted module ids of a build
    Modules(Vec<String>),
}

impl ModuleValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ModuleValue::Text(text) => Some(text),
            ModuleValue::Modules(_) => None,
        }
    }

    pub fn as_modules(&self) -> Option<&[String]> {
        match self {
            ModuleValue::Modules(ids) => Some(ids),
            ModuleValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ModuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleValue::Text(text) => write!(f, "{}", text),
            ModuleValue::Modules(ids) => {
                for id in ids {
                    writeln!(f, "{}", id)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    container: InternedString,
    boundary: Boundary,
}

/// Evaluates imports for one build root.
pub struct Runtime<'f> {
    federation: &'f Federation,
    root: InternedString,
    scope: &'f ResolvedScope,
}

impl<'f> Runtime<'f> {
    /// Needs the root's scope to be resolved already.
    pub fn new(federation: &'f Federation, root: &str) -> Result<Self, FederationError> {
        let root = federation.container(root)?.name();
        let scope = federation
            .table()
            .scope(root)
            .ok_or(FederationError::UnknownContainer { container: root })?;
        Ok(Runtime {
            federation,
            root,
            scope,
        })
    }

    pub fn root(&self) -> InternedString {
        self.root
    }

    /// Import `specifier` as the root's own code would.
    pub fn import<'s>(
        &'s self,
        specifier: &str,
    ) -> LocalBoxFuture<'s, Result<ModuleValue, FederationError>> {
        let frame = Frame {
            container: self.root,
            boundary: Boundary::Container(self.root),
        };
        self.request(frame, specifier.to_string(), Vec::new())
    }

    fn container(&self, name: InternedString) -> Result<&'f Container, FederationError> {
        self.federation
            .graph()
            .container(name)
            .ok_or(FederationError::UnknownContainer { container: name })
    }

    fn request<'s>(
        &'s self,
        frame: Frame,
        request: String,
        stack: Vec<String>,
    ) -> LocalBoxFuture<'s, Result<ModuleValue, FederationError>> {
        async move {
            let container = self.container(frame.container)?;
            let unresolved = || FederationError::UnresolvedModule {
                container: frame.container,
                request: request.clone(),
            };

            if is_local_request(&request) {
                let path = container.resolve_local(&request).ok_or_else(unresolved)?;
                return self.evaluate(frame, path, stack).await;
            }

            if let Some((remote, exposed)) = container.remote_for(&request) {
                let graph = self.federation.graph();
                let target = graph
                    .effective_target(&RemoteLink::from(remote))
                    .unwrap_or(remote.target);
                graph.resolve_exposed(target, exposed).await?;

                let target_container = self.container(target)?;
                let expose = target_container.expose(exposed).ok_or_else(unresolved)?;
                let boundary = if expose.is_boundary() {
                    Boundary::Exposed {
                        container: target,
                        exposed: expose.name,
                    }
                } else {
                    Boundary::Container(target)
                };
                let path = target_container
                    .resolve_local(&expose.import)
                    .ok_or_else(|| FederationError::UnresolvedModule {
                        container: target,
                        request: expose.import.to_string(),
                    })?;
                tracing::trace!("{} -> {}/{}", request, target, expose.name);
                let frame = Frame {
                    container: target,
                    boundary,
                };
                return self.evaluate(frame, path, stack).await;
            }

            let entry = self
                .scope
                .resolve(frame.boundary, InternedString::new(&request))?;
            let owner = self.container(entry.owner)?;
            let path = owner.resolve_local(&entry.module).ok_or_else(|| {
                FederationError::UnresolvedModule {
                    container: entry.owner,
                    request: entry.module.to_string(),
                }
            })?;
            tracing::trace!("`{}` in {} -> {}:{}", request, frame.boundary, entry.owner, path);
            let frame = Frame {
                container: entry.owner,
                boundary: Boundary::Container(entry.owner),
            };
            self.evaluate(frame, path, stack).await
        }
        .boxed_local()
    }

    fn evaluate<'s>(
        &'s self,
        frame: Frame,
        path: InternedString,
        mut stack: Vec<String>,
    ) -> LocalBoxFuture<'s, Result<ModuleValue, FederationError>> {
        async move {
            let label = format!("{}:{}", frame.container, path);
            if stack.contains(&label) {
                stack.push(label);
                return Err(FederationError::ImportCycle { chain: stack });
            }

            let container = self.container(frame.container)?;
            let source = container
                .module(path)
                .ok_or_else(|| FederationError::UnresolvedModule {
                    container: frame.container,
                    request: path.to_string(),
                })?;

            match source {
                ModuleSource::Value(value) => Ok(ModuleValue::Text(value.clone())),
                ModuleSource::ListModules => {
                    let build = self.federation.build(&frame.container)?;
                    Ok(ModuleValue::Modules(build.module_ids()))
                }
                ModuleSource::ReExport(request) => {
                    stack.push(label);
                    self.request(frame, request.clone(), stack).await
                }
            }
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::container::{ExposeDecl, RemoteDecl};
    use crate::test_support::fixtures;

    fn federation() -> Federation {
        let mut federation = Federation::new();
        federation.bind_all(fixtures::transitive_overriding()).unwrap();
        federation
    }

    #[test]
    fn test_transitive_override_applies() {
        let mut federation = federation();
        let value = federation.import(fixtures::APP, "container-no-shared/a").unwrap();
        assert_eq!(value, ModuleValue::Text("new shared".into()));
    }

    #[test]
    fn test_pinned_exposed_module_keeps_its_own() {
        let mut federation = federation();
        let value = federation.import(fixtures::APP, "container-no-shared/b").unwrap();
        assert_eq!(value.as_text(), Some("shared"));
    }

    #[test]
    fn test_list_modules_reports_the_owning_build() {
        let mut federation = federation();
        let value = federation
            .import(fixtures::APP, "container-no-shared/modules-from-remote")
            .unwrap();
        let ids = value.as_modules().unwrap();
        assert!(ids.contains(&"webpack/container/entry/container-with-shared".to_string()));
        assert!(!ids.contains(&"webpack/container/entry/container-no-shared".to_string()));
    }

    #[test]
    fn test_missing_exposed_module() {
        let mut federation = federation();
        let err = federation
            .import(fixtures::APP, "container-no-shared/missing")
            .unwrap_err();
        assert!(matches!(err, FederationError::UnresolvedExposed { .. }));
    }

    #[test]
    fn test_unbound_remote_fails_the_import_only() {
        let mut federation = Federation::new();
        federation
            .bind(
                Container::builder("rt-host")
                    .module("./ok.js", ModuleSource::value("ok"))
                    .remote(RemoteDecl::new("ghost", "rt-ghost"))
                    .build(),
            )
            .unwrap();

        assert!(matches!(
            federation.import("rt-host", "ghost/x"),
            Err(FederationError::UnresolvedRemote { .. })
        ));
        assert_eq!(
            federation.import("rt-host", "./ok").unwrap().as_text(),
            Some("ok")
        );
    }

    #[test]
    fn test_unresolved_shared_key() {
        let mut federation = Federation::new();
        federation
            .bind(
                Container::builder("rt-lonely")
                    .module("./a.js", ModuleSource::reexport("react"))
                    .build(),
            )
            .unwrap();

        let err = federation.import("rt-lonely", "./a").unwrap_err();
        assert_eq!(
            err,
            FederationError::UnresolvedShared {
                root: InternedString::new("rt-lonely"),
                key: InternedString::new("react"),
            }
        );
    }

    #[test]
    fn test_import_cycle_is_reported() {
        let mut federation = Federation::new();
        federation
            .bind(
                Container::builder("rt-cycle")
                    .module("./a.js", ModuleSource::reexport("./b"))
                    .module("./b.js", ModuleSource::reexport("./a"))
                    .build(),
            )
            .unwrap();

        match federation.import("rt-cycle", "./a") {
            Err(FederationError::ImportCycle { chain }) => {
                assert_eq!(
                    chain,
                    vec!["rt-cycle:./a.js", "rt-cycle:./b.js", "rt-cycle:./a.js"]
                );
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_fallback_remote_is_used() {
        let mut federation = Federation::new();
        federation
            .bind(
                Container::builder("rt-fb-host")
                    .remote(RemoteDecl::new("ui", "rt-fb-primary").with_fallback("rt-fb-backup"))
                    .build(),
            )
            .unwrap();
        federation
            .bind(
                Container::builder("rt-fb-backup")
                    .module("./button.js", ModuleSource::value("backup button"))
                    .expose(ExposeDecl::new("./button", "./button.js"))
                    .build(),
            )
            .unwrap();

        let value = federation.import("rt-fb-host", "ui/button").unwrap();
        assert_eq!(value.as_text(), Some("backup button"));
    }
}
