//! Module identity registry.
//!
//! The registry assigns ids to module instances and remembers where each
//! one came from. It is append-only for its whole lifetime: ids are never
//! removed or reassigned. Writers are serialized by a lock, so independent
//! containers can register concurrently; their id namespaces are disjoint
//! by construction.

use std::collections::BTreeMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::core::module_id::{ModuleDescriptor, ModuleId, Origin};
use crate::util::InternedString;

/// Error raised when registering a module.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two different logical modules render to the same id.
    #[error("module id `{id}` already belongs to {existing_container} ({existing_role})")]
    IdCollision {
        id: ModuleId,
        existing_container: InternedString,
        existing_role: String,
        requested_container: InternedString,
    },
}

/// Append-only map from module id to descriptor.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: RwLock<BTreeMap<ModuleId, ModuleDescriptor>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        ModuleRegistry::default()
    }

    /// Register `local_path` under `origin` and return its id.
    ///
    /// Registering the same `(origin, local_path)` again returns the same id.
    pub fn register(
        &self,
        origin: Origin,
        local_path: &str,
    ) -> Result<ModuleId, RegistryError> {
        let local_path = if origin.uses_local_path() {
            InternedString::new(local_path)
        } else {
            InternedString::default()
        };
        let id = ModuleId::for_origin(&origin, &local_path);
        let descriptor = ModuleDescriptor {
            id,
            origin,
            local_path,
        };

        {
            let modules = self.read();
            if let Some(existing) = modules.get(&id) {
                return Self::check_same(existing, &descriptor);
            }
        }

        let mut modules = self.modules.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = modules.get(&id) {
            return Self::check_same(existing, &descriptor);
        }

        tracing::trace!("registered module {}", id);
        modules.insert(id, descriptor);
        Ok(id)
    }

    fn check_same(
        existing: &ModuleDescriptor,
        requested: &ModuleDescriptor,
    ) -> Result<ModuleId, RegistryError> {
        if existing == requested {
            Ok(existing.id)
        } else {
            Err(RegistryError::IdCollision {
                id: existing.id,
                existing_container: existing.origin.container,
                existing_role: existing.origin.role.to_string(),
                requested_container: requested.origin.container,
            })
        }
    }

    pub fn lookup(&self, id: ModuleId) -> Option<ModuleDescriptor> {
        self.read().get(&id).copied()
    }

    /// Look up an id by its string form.
    pub fn lookup_str(&self, id: &str) -> Option<ModuleDescriptor> {
        ModuleId::existing(id).and_then(|id| self.lookup(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup_str(id).is_some()
    }

    /// All registered ids in sorted order.
    pub fn ids(&self) -> Vec<ModuleId> {
        self.read().keys().copied().collect()
    }

    /// All registered ids as strings, sorted.
    pub fn id_strings(&self) -> Vec<String> {
        self.read().keys().map(|id| id.to_string()).collect()
    }

    /// All descriptors in id order.
    pub fn descriptors(&self) -> Vec<ModuleDescriptor> {
        self.read().values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<ModuleId, ModuleDescriptor>> {
        self.modules.read().unwrap_or_else(|e| e.into_inner())
    }
}
