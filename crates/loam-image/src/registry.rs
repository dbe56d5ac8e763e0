//! The type registry: lazy mapping from concrete types to descriptors.
//!
//! Resolution is keyed by [`std::any::TypeId`], which identifies the
//! concrete `'static` type independent of reference or mutability
//! qualifiers (values enter by move, so those never appear). Descriptor
//! ids are sequential, never reused, and never mutated after creation.

use indexmap::IndexMap;
use loam_core::{TypeId, Value};

use crate::descriptor::TypeInfo;

/// Maps concrete types to their runtime descriptors.
///
/// Uses `IndexMap` (not `HashMap`) for the identity index so descriptor
/// iteration follows registration order deterministically, matching the
/// sequential ids.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<TypeInfo>,
    index: IndexMap<std::any::TypeId, TypeId>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `T` to its descriptor id, creating the descriptor on
    /// first use.
    ///
    /// Idempotent: resolving the same concrete type again returns the
    /// same id without growing the registry.
    pub fn resolve<T: Value>(&mut self) -> TypeId {
        let key = std::any::TypeId::of::<T>();
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeInfo::of::<T>(id));
        self.index.insert(key, id);
        id
    }

    /// Probe for `T`'s descriptor id without creating one.
    pub fn lookup<T: 'static>(&self) -> Option<TypeId> {
        self.index.get(&std::any::TypeId::of::<T>()).copied()
    }

    /// Fetch a descriptor by id.
    ///
    /// Panics if `id` was not produced by this registry — descriptor ids
    /// never cross runtime instances.
    pub fn get(&self, id: TypeId) -> &TypeInfo {
        match self.types.get(id.0 as usize) {
            Some(info) => info,
            None => panic!("type id {id} is not registered in this runtime"),
        }
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types have been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate over descriptors in registration (id) order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.iter()
    }
}
