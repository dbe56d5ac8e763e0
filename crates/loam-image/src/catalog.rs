//! The variable catalog: ordered, append-only layout bookkeeping.
//!
//! Each declared variable gets a [`VarEntry`] recording its name, owning
//! type, byte offset, and size. Offsets are an aligned prefix sum over
//! declaration order: each new variable starts at the previous total
//! rounded up to its type's alignment. Entries are never removed or
//! recomputed, so the catalog at any instant fully determines the layout
//! of every image built against it.

use indexmap::IndexMap;
use smallvec::SmallVec;

use loam_core::{CatalogError, TypeId, VarId};

use crate::descriptor::TypeInfo;

/// One declared variable's layout record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarEntry {
    id: VarId,
    name: String,
    ty: TypeId,
    offset: usize,
    size: usize,
}

impl VarEntry {
    /// The variable's sequential id.
    pub fn id(&self) -> VarId {
        self.id
    }

    /// The unique name it was declared under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning type descriptor's id.
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Byte offset within any image covering this variable.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte size of the variable's slot.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Ordered, append-only list of declared variables.
///
/// The entry list is a `SmallVec` — most runtimes declare a handful of
/// variables, which then live inline without a heap hop. The name index
/// is an `IndexMap` for deterministic iteration.
#[derive(Debug)]
pub struct VarCatalog {
    entries: SmallVec<[VarEntry; 8]>,
    names: IndexMap<String, VarId>,
    total_size: usize,
    max_align: usize,
}

impl VarCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            entries: SmallVec::new(),
            names: IndexMap::new(),
            total_size: 0,
            max_align: 1,
        }
    }

    /// Whether `name` is already declared.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Append a variable of the given type under `name`.
    ///
    /// Returns the new id and its byte offset, or
    /// [`CatalogError::DuplicateName`] with the catalog untouched.
    pub fn declare(&mut self, name: &str, info: &TypeInfo) -> Result<(VarId, usize), CatalogError> {
        if self.contains(name) {
            return Err(CatalogError::DuplicateName {
                name: name.to_string(),
            });
        }
        let offset = self.total_size.next_multiple_of(info.align());
        let id = VarId(self.entries.len() as u32);
        self.entries.push(VarEntry {
            id,
            name: name.to_string(),
            ty: info.id(),
            offset,
            size: info.size(),
        });
        self.names.insert(name.to_string(), id);
        self.total_size = offset + info.size();
        self.max_align = self.max_align.max(info.align());
        Ok((id, offset))
    }

    /// Resolve a name to its variable id.
    pub fn lookup(&self, name: &str) -> Result<VarId, CatalogError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::UnknownVariable {
                name: name.to_string(),
            })
    }

    /// Fetch an entry by id, if declared.
    pub fn entry(&self, id: VarId) -> Option<&VarEntry> {
        self.entries.get(id.0 as usize)
    }

    /// Iterate over entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &VarEntry> {
        self.entries.iter()
    }

    /// Number of declared variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been declared yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total byte length an image covering the whole catalog requires.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Maximum alignment over all declared types (minimum 1).
    pub fn max_align(&self) -> usize {
        self.max_align
    }

    /// Byte length an image covering the first `count` entries requires.
    ///
    /// Panics if `count` exceeds the catalog length.
    pub fn prefix_size(&self, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        let last = &self.entries[count - 1];
        last.offset + last.size
    }
}

impl Default for VarCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeRegistry;

    fn catalog_with<T: loam_core::Value>(
        reg: &mut TypeRegistry,
        names: &[&str],
    ) -> (VarCatalog, TypeId) {
        let ty = reg.resolve::<T>();
        let mut catalog = VarCatalog::new();
        for name in names {
            catalog.declare(name, reg.get(ty)).unwrap();
        }
        (catalog, ty)
    }

    #[test]
    fn offsets_are_a_prefix_sum_for_uniform_types() {
        let mut reg = TypeRegistry::new();
        let (catalog, _) = catalog_with::<u32>(&mut reg, &["a", "b", "c"]);

        let offsets: Vec<_> = catalog.iter().map(VarEntry::offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(catalog.total_size(), 12);
    }

    #[test]
    fn offsets_round_up_to_the_type_alignment() {
        let mut reg = TypeRegistry::new();
        let byte = reg.resolve::<u8>();
        let word = reg.resolve::<u64>();

        let mut catalog = VarCatalog::new();
        let (_, off_a) = catalog.declare("a", reg.get(byte)).unwrap();
        let (_, off_b) = catalog.declare("b", reg.get(word)).unwrap();

        assert_eq!(off_a, 0);
        assert_eq!(off_b, 8);
        assert_eq!(catalog.total_size(), 16);
        assert_eq!(catalog.max_align(), 8);
    }

    #[test]
    fn duplicate_name_is_rejected_and_catalog_untouched() {
        let mut reg = TypeRegistry::new();
        let ty = reg.resolve::<i32>();
        let mut catalog = VarCatalog::new();
        catalog.declare("x", reg.get(ty)).unwrap();

        let err = catalog.declare("x", reg.get(ty)).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateName {
                name: "x".to_string()
            }
        );
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.total_size(), 4);
    }

    #[test]
    fn lookup_finds_declared_names_only() {
        let mut reg = TypeRegistry::new();
        let (catalog, _) = catalog_with::<i32>(&mut reg, &["x"]);

        assert_eq!(catalog.lookup("x"), Ok(VarId(0)));
        assert_eq!(
            catalog.lookup("y"),
            Err(CatalogError::UnknownVariable {
                name: "y".to_string()
            })
        );
    }

    #[test]
    fn prefix_size_tracks_partial_layouts() {
        let mut reg = TypeRegistry::new();
        let (catalog, _) = catalog_with::<u32>(&mut reg, &["a", "b", "c"]);

        assert_eq!(catalog.prefix_size(0), 0);
        assert_eq!(catalog.prefix_size(1), 4);
        assert_eq!(catalog.prefix_size(3), 12);
        assert_eq!(catalog.prefix_size(3), catalog.total_size());
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        // The four footprint shapes exercised: (size, align) of
        // u8 (1,1), u16 (2,2), u32 (4,4), u64 (8,8).
        fn declare_nth(reg: &mut TypeRegistry, catalog: &mut VarCatalog, name: &str, kind: u8) {
            let ty = match kind % 4 {
                0 => reg.resolve::<u8>(),
                1 => reg.resolve::<u16>(),
                2 => reg.resolve::<u32>(),
                _ => reg.resolve::<u64>(),
            };
            catalog.declare(name, reg.get(ty)).unwrap();
        }

        proptest! {
            #[test]
            fn layout_invariants_hold_for_any_declaration_sequence(
                kinds in prop::collection::vec(0u8..4, 1..32),
            ) {
                let mut reg = TypeRegistry::new();
                let mut catalog = VarCatalog::new();
                for (i, kind) in kinds.iter().enumerate() {
                    declare_nth(&mut reg, &mut catalog, &format!("v{i}"), *kind);
                }

                let mut prev_end = 0usize;
                for entry in catalog.iter() {
                    let info = reg.get(entry.ty());
                    // Aligned, non-overlapping, in declaration order.
                    prop_assert_eq!(entry.offset() % info.align(), 0);
                    prop_assert!(entry.offset() >= prev_end);
                    prev_end = entry.offset() + entry.size();
                }
                prop_assert_eq!(catalog.total_size(), prev_end);
                prop_assert_eq!(catalog.len(), kinds.len());
            }

            #[test]
            fn redeclaring_any_existing_name_fails(
                kinds in prop::collection::vec(0u8..4, 1..16),
                pick in 0usize..16,
            ) {
                let mut reg = TypeRegistry::new();
                let mut catalog = VarCatalog::new();
                for (i, kind) in kinds.iter().enumerate() {
                    declare_nth(&mut reg, &mut catalog, &format!("v{i}"), *kind);
                }

                let len_before = catalog.len();
                let name = format!("v{}", pick % kinds.len());
                let ty = reg.resolve::<u8>();
                let result = catalog.declare(&name, reg.get(ty));
                prop_assert!(
                    matches!(result, Err(CatalogError::DuplicateName { .. })),
                    "expected Err(CatalogError::DuplicateName), got {:?}",
                    result
                );
                prop_assert_eq!(catalog.len(), len_before);
            }
        }
    }
}
