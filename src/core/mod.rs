//! Core data structures for Flotilla.
//!
//! This module contains the foundational types used throughout Flotilla:
//! - Containers and their declarations
//! - Module identities and the registry that keeps them unique
//! - Manifests and workspace loading

pub mod container;
pub mod manifest;
pub mod module_id;
pub mod registry;
pub mod workspace;

pub use container::{
    Container, ContainerBuilder, DeclKind, ExposeDecl, ModuleSource, RemoteDecl, SharedDecl,
};
pub use manifest::{Manifest, ManifestError};
pub use module_id::{ModuleDescriptor, ModuleId, Origin, Role};
pub use registry::{ModuleRegistry, RegistryError};
pub use workspace::{find_manifest, Workspace, WorkspaceError, MANIFEST_NAME};
