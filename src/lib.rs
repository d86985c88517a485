//! Flotilla - module federation for independently built containers
//!
//! This crate provides the core library functionality for Flotilla:
//! module identities, shared-scope resolution with transitive overrides,
//! the remote container graph, and a small runtime that evaluates
//! imports across containers.

pub mod core;
pub mod federation;
pub mod ops;
pub mod util;

/// Test utilities for Flotilla unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides fixture federations and temporary project helpers.
#[cfg(test)]
pub mod test_support;

pub use core::{
    container::Container, manifest::Manifest, module_id::ModuleId, registry::ModuleRegistry,
    workspace::Workspace,
};

pub use federation::{Federation, FederationError, ModuleValue, ResolvedScope};
pub use util::context::GlobalContext;
