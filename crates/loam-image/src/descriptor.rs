//! Runtime type descriptors.
//!
//! A [`TypeInfo`] is the registered record of one concrete type: its
//! stable id, display name, size, alignment, and the erased behavior
//! table (copy-construct, copy-assign, drop, conversion hooks) captured
//! when the descriptor was created. Descriptors are immutable after
//! creation and live for the lifetime of their registry.

use std::fmt;
use std::mem;

use loam_core::{TypeId, Value};

use crate::raw::{slot_ops_of, SlotOps};

/// Registered metadata and behavior for one concrete stored type.
///
/// Built once by the registry on first resolution of the type; consulted
/// on every image copy, assignment, teardown, and typed access. The
/// behavior table replaces what a virtual-dispatch hierarchy would do in
/// an object-oriented design: a strategy table indexed by [`TypeId`],
/// with function pointers monomorphised at registration time.
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    size: usize,
    align: usize,
    ops: SlotOps,
}

impl TypeInfo {
    /// Build the descriptor for `T` under the given id.
    pub(crate) fn of<T: Value>(id: TypeId) -> Self {
        Self {
            id,
            name: std::any::type_name::<T>(),
            size: mem::size_of::<T>(),
            align: mem::align_of::<T>(),
            ops: slot_ops_of::<T>(),
        }
    }

    /// The stable id assigned by the registry.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Display name of the concrete type (for diagnostics).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Bytes one value of this type occupies in an image.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment requirement of the type; its image offsets are rounded
    /// up to a multiple of this.
    pub fn align(&self) -> usize {
        self.align
    }

    /// The erased behavior table.
    pub(crate) fn ops(&self) -> &SlotOps {
        &self.ops
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish_non_exhaustive()
    }
}
