//! Strongly-typed identifiers for registered types and declared variables.

use std::fmt;

/// Identifies a registered type descriptor within a runtime instance.
///
/// Descriptors are created lazily on first resolution and assigned
/// sequential IDs. `TypeId(n)` corresponds to the n-th distinct concrete
/// type resolved by the registry. IDs are never reused and descriptors
/// are never mutated after creation.
///
/// Not to be confused with [`std::any::TypeId`], which the registry uses
/// internally as the identity key that maps a concrete Rust type to its
/// `TypeId` here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TypeId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a declared variable within a runtime instance.
///
/// Variables are declared in order and assigned sequential IDs; `VarId(n)`
/// is the n-th entry of the catalog. The catalog is append-only, so a
/// `VarId` stays valid for the whole lifetime of its runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VarId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
