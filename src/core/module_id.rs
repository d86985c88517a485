//! Module identification - WHERE a module instance comes from.
//!
//! A ModuleId is a deterministic string built from the module's origin
//! (container + role) and its local path. The string formats are part of
//! the observable interface and match the bundler's own naming:
//!
//! - `./a.js` for a container's local modules
//! - `webpack/container/entry/<container>`
//! - `webpack/container/reference/<container>`
//! - `webpack/container/remote/<container>/<exposed>`
//! - `webpack/sharing/consume/<share-scope>/<key>/<request>`

use std::fmt;

use serde::{Serialize, Serializer};

use crate::util::InternedString;

/// Namespace prefix for synthesized federation modules.
pub const ID_NAMESPACE: &str = "webpack";

/// Separator between id segments.
pub const ID_SEPARATOR: char = '/';

/// What part a module plays in the federation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// A module defined by the container itself.
    Local,
    /// The container's entry: the table of everything it exposes.
    Entry,
    /// A reference to another container, loaded lazily.
    Reference,
    /// A proxy for one module another container exposes.
    Remote,
    /// A shared-scope lookup for `key` in `share_scope`.
    ConsumeShared {
        share_scope: InternedString,
        key: InternedString,
    },
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Local => write!(f, "local"),
            Role::Entry => write!(f, "container/entry"),
            Role::Reference => write!(f, "container/reference"),
            Role::Remote => write!(f, "container/remote"),
            Role::ConsumeShared { share_scope, key } => {
                write!(f, "sharing/consume/{}/{}", share_scope, key)
            }
        }
    }
}

/// The container and role a module instance belongs to.
///
/// For `Remote`, `Reference` and `Entry` the container is the one being
/// addressed (the resolved target), never the alias used to reach it.
/// For `Local` and `ConsumeShared` it is the container doing the import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin {
    pub container: InternedString,
    pub role: Role,
}

impl Origin {
    pub fn local(container: InternedString) -> Self {
        Origin {
            container,
            role: Role::Local,
        }
    }

    pub fn entry(container: InternedString) -> Self {
        Origin {
            container,
            role: Role::Entry,
        }
    }

    pub fn reference(container: InternedString) -> Self {
        Origin {
            container,
            role: Role::Reference,
        }
    }

    pub fn remote(container: InternedString) -> Self {
        Origin {
            container,
            role: Role::Remote,
        }
    }

    pub fn consume_shared(
        container: InternedString,
        share_scope: InternedString,
        key: InternedString,
    ) -> Self {
        Origin {
            container,
            role: Role::ConsumeShared { share_scope, key },
        }
    }

    /// Whether the local path takes part in the id for this role.
    pub fn uses_local_path(&self) -> bool {
        !matches!(self.role, Role::Entry | Role::Reference)
    }

    /// Render the id string for `local_path` under this origin.
    pub fn render(&self, local_path: &str) -> String {
        let sep = ID_SEPARATOR;
        match self.role {
            Role::Local => local_path.to_string(),
            Role::Entry => format!("{ID_NAMESPACE}{sep}container{sep}entry{sep}{}", self.container),
            Role::Reference => format!(
                "{ID_NAMESPACE}{sep}container{sep}reference{sep}{}",
                self.container
            ),
            Role::Remote => format!(
                "{ID_NAMESPACE}{sep}container{sep}remote{sep}{}{sep}{}",
                self.container, local_path
            ),
            Role::ConsumeShared { share_scope, key } => format!(
                "{ID_NAMESPACE}{sep}sharing{sep}consume{sep}{}{sep}{}{sep}{}",
                share_scope, key, local_path
            ),
        }
    }
}

/// A deterministic module identifier (interned, cheap to copy).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(InternedString);

impl ModuleId {
    /// The id `origin` gives to `local_path`. Pure: no registration happens.
    pub fn for_origin(origin: &Origin, local_path: &str) -> Self {
        ModuleId(InternedString::new(origin.render(local_path)))
    }

    /// The id with this string form, if one was ever rendered.
    pub fn existing(id: &str) -> Option<Self> {
        InternedString::lookup(id).map(ModuleId)
    }

    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for ModuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}

/// Everything the registry knows about one registered module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub id: ModuleId,
    pub origin: Origin,
    /// Local path, exposed name or consume request, depending on role.
    pub local_path: InternedString,
}

impl ModuleDescriptor {
    pub fn container(&self) -> InternedString {
        self.origin.container
    }

    pub fn role(&self) -> Role {
        self.origin.role
    }
}
