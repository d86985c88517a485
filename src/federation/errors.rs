//! Federation error types and diagnostics.

use thiserror::Error;

use crate::core::registry::RegistryError;
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::InternedString;

/// Error raised while binding containers or resolving imports.
///
/// Resolution-time errors attach to the import that hit them and leave
/// every other import alone. Construction-time errors (see
/// [`FederationError::is_fatal`]) mean the configuration is inconsistent
/// and abort the whole build.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FederationError {
    #[error("shared module `{key}` is not provided by any container reachable from `{root}`")]
    UnresolvedShared {
        root: InternedString,
        key: InternedString,
    },

    #[error("remote container `{container}` was never bound")]
    UnresolvedRemote {
        container: InternedString,
        /// Containers that declared it as a remote
        required_by: Vec<InternedString>,
    },

    #[error("container `{container}` does not expose `{exposed}`")]
    UnresolvedExposed {
        container: InternedString,
        exposed: String,
        available: Vec<InternedString>,
    },

    #[error("cannot resolve `{request}` in container `{container}`")]
    UnresolvedModule {
        container: InternedString,
        request: String,
    },

    #[error("container `{container}` is already bound")]
    DuplicateBinding { container: InternedString },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("import cycle: {}", chain.join(" -> "))]
    ImportCycle { chain: Vec<String> },

    #[error("unknown container `{container}`")]
    UnknownContainer { container: InternedString },

    #[error("the container graph is closed; `{container}` arrived too late")]
    GraphClosed { container: InternedString },
}

impl FederationError {
    /// Whether this error indicates a broken build graph rather than a
    /// single failed import.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FederationError::DuplicateBinding { .. }
                | FederationError::Registry(_)
                | FederationError::GraphClosed { .. }
        )
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            FederationError::UnresolvedShared { root, key } => {
                Diagnostic::error(format!("unresolved shared module `{}`", key))
                    .with_context(format!("no container reachable from `{}` provides it", root))
                    .with_suggestion(suggestions::UNRESOLVED_SHARED)
            }

            FederationError::UnresolvedRemote {
                container,
                required_by,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "remote container `{}` was never bound",
                    container
                ));
                for requirer in required_by {
                    diag = diag.with_context(format!("required by `{}`", requirer));
                }
                diag.with_suggestion(suggestions::UNRESOLVED_REMOTE)
            }

            FederationError::UnresolvedExposed {
                container,
                exposed,
                available,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "`{}` is not exposed by container `{}`",
                    exposed, container
                ));
                if !available.is_empty() {
                    let names: Vec<&str> = available.iter().map(|n| n.as_str()).collect();
                    diag = diag.with_context(format!("exposed modules: {}", names.join(", ")));
                }
                diag.with_suggestion(format!(
                    "Add `{}` to the [[container.expose]] list of `{}`",
                    exposed, container
                ))
            }

            FederationError::UnresolvedModule { container, request } => Diagnostic::error(
                format!("cannot resolve `{}` in container `{}`", request, container),
            )
            .with_suggestion("Define the module under [container.modules] or declare a remote for its prefix"),

            FederationError::DuplicateBinding { container } => {
                Diagnostic::error(format!("container `{}` is bound twice", container))
                    .with_context("each container may be configured exactly once per build graph")
                    .with_suggestion("Remove the duplicate [[container]] entry")
            }

            FederationError::Registry(RegistryError::IdCollision {
                id,
                existing_container,
                requested_container,
                ..
            }) => Diagnostic::error(format!("module id `{}` is ambiguous", id))
                .with_context(format!("claimed by `{}`", existing_container))
                .with_context(format!("and again by `{}`", requested_container)),

            FederationError::ImportCycle { chain } => {
                Diagnostic::error("import cycle detected")
                    .with_context(format!("cycle: {}", chain.join(" -> ")))
                    .with_suggestion("Break the cycle by re-exporting a value instead of a module")
            }

            FederationError::UnknownContainer { container } => {
                Diagnostic::error(format!("unknown container `{}`", container))
                    .with_suggestion(suggestions::UNKNOWN_CONTAINER)
            }

            FederationError::GraphClosed { container } => Diagnostic::error(format!(
                "container `{}` was bound after the graph was closed",
                container
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        let dup = FederationError::DuplicateBinding {
            container: InternedString::new("a"),
        };
        let shared = FederationError::UnresolvedShared {
            root: InternedString::new("a"),
            key: InternedString::new("react"),
        };

        assert!(dup.is_fatal());
        assert!(!shared.is_fatal());
    }

    #[test]
    fn test_unresolved_remote_diagnostic_lists_requirers() {
        let err = FederationError::UnresolvedRemote {
            container: InternedString::new("container-with-shared"),
            required_by: vec![InternedString::new("container-no-shared")],
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("remote container `container-with-shared` was never bound"));
        assert!(output.contains("required by `container-no-shared`"));
    }

    #[test]
    fn test_import_cycle_message() {
        let err = FederationError::ImportCycle {
            chain: vec!["host:./a.js".into(), "host:./b.js".into(), "host:./a.js".into()],
        };
        assert_eq!(
            err.to_string(),
            "import cycle: host:./a.js -> host:./b.js -> host:./a.js"
        );
    }
}
