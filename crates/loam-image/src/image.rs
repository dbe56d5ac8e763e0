//! Memory images: contiguous, type-erased value stores.
//!
//! A [`MemoryImage`] owns one aligned byte buffer laid out by its
//! runtime's catalog, together with the number of catalog entries it
//! covers (its *prefix*). Images derived before later declarations cover
//! a shorter prefix and remain internally consistent: every lifecycle
//! loop (copy-construct, copy-assign, teardown) runs over the covered
//! prefix only.
//!
//! The image is an explicit two-state value — `Active` or `Moved` — so
//! "nothing left to destroy" after a move-out is a checkable state, not
//! a nulled-pointer convention. Teardown runs every covered descriptor's
//! drop callback exactly once and is skipped entirely for a moved image;
//! because it lives in `Drop`, the guarantee holds on every exit path,
//! including unwinding.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use loam_core::{CatalogError, TypeId, Value, VarId};

use crate::catalog::VarCatalog;
use crate::handle::VarHandle;
use crate::raw::RawBuf;
use crate::registry::TypeRegistry;

/// The registry/catalog pair shared by a runtime and every image derived
/// from it.
///
/// Both halves are append-only; `RefCell` gives the single-threaded
/// interior mutability the declare path needs while images hold long-
/// lived `Rc` references for their lifecycle loops.
pub(crate) struct Schema {
    pub(crate) registry: RefCell<TypeRegistry>,
    pub(crate) catalog: RefCell<VarCatalog>,
}

impl Schema {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            registry: RefCell::new(TypeRegistry::new()),
            catalog: RefCell::new(VarCatalog::new()),
        })
    }
}

enum State {
    /// A live buffer covering the first `vars` catalog entries.
    Active { buf: RawBuf, vars: usize },
    /// Moved out; holds no live values and tears nothing down.
    Moved,
}

/// One self-consistent store of live variable values.
///
/// Created empty by the runtime (the default image, grown on declare) or
/// whole via [`Clone`] (copy-construction of every covered slot). Typed
/// access is fatally checked: asking for the wrong type, an uncovered
/// variable, or anything from a moved image is a panic, never a silent
/// reinterpretation.
pub struct MemoryImage {
    schema: Rc<Schema>,
    state: State,
}

impl MemoryImage {
    /// A fresh, empty image covering no variables yet.
    pub(crate) fn empty(schema: Rc<Schema>) -> Self {
        Self {
            schema,
            state: State::Active {
                buf: RawBuf::new(),
                vars: 0,
            },
        }
    }

    /// Grow by one freshly declared variable and construct `value` in
    /// the appended slot. Called by the runtime immediately after the
    /// catalog append; existing slots are untouched.
    pub(crate) fn append<T: Value>(&mut self, ty: TypeId, offset: usize, value: T) {
        let (size, align) = {
            let registry = self.schema.registry.borrow();
            let info = registry.get(ty);
            (info.size(), info.align())
        };
        let State::Active { buf, vars } = &mut self.state else {
            panic!("declare on a moved-out memory image");
        };
        debug_assert_eq!(
            *vars + 1,
            self.schema.catalog.borrow().len(),
            "default image out of step with its catalog",
        );
        buf.grow_to(offset + size, align);
        buf.emplace(offset, value);
        *vars += 1;
    }

    /// Whether this image still owns live values.
    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    /// Byte length of the value store. A moved image reports 0.
    pub fn len(&self) -> usize {
        match &self.state {
            State::Active { buf, .. } => buf.len(),
            State::Moved => 0,
        }
    }

    /// Whether the image holds no variables.
    pub fn is_empty(&self) -> bool {
        self.var_count() == 0
    }

    /// Number of catalog entries this image covers. A moved image
    /// reports 0.
    pub fn var_count(&self) -> usize {
        match &self.state {
            State::Active { vars, .. } => *vars,
            State::Moved => 0,
        }
    }

    /// Transfer ownership of the buffer into a new image, leaving this
    /// one in the inert `Moved` state.
    ///
    /// The source's eventual drop performs no destructor calls; the
    /// returned image now carries the exactly-once teardown obligation.
    /// (Native Rust moves achieve the same statically — `take` exists
    /// for hosts that hold the image behind a long-lived binding.)
    pub fn take(&mut self) -> MemoryImage {
        MemoryImage {
            schema: Rc::clone(&self.schema),
            state: mem::replace(&mut self.state, State::Moved),
        }
    }

    /// Copy-assign every covered slot from `source` onto this image's
    /// existing live values, reusing the storage.
    ///
    /// Panics unless both images are active and cover the same catalog
    /// prefix at the same length — assigning across mismatched layouts
    /// is a host defect, not a data condition.
    pub fn copy_from(&mut self, source: &MemoryImage) {
        let State::Active {
            buf: src,
            vars: src_vars,
        } = &source.state
        else {
            panic!("copy-assign from a moved-out memory image");
        };
        let State::Active {
            buf: dst,
            vars: dst_vars,
        } = &mut self.state
        else {
            panic!("copy-assign onto a moved-out memory image");
        };
        assert_eq!(
            *dst_vars, *src_vars,
            "copy-assign between images covering different catalog prefixes",
        );
        assert_eq!(
            dst.len(),
            src.len(),
            "copy-assign between images of different lengths",
        );

        let catalog = self.schema.catalog.borrow();
        let registry = self.schema.registry.borrow();
        for entry in catalog.iter().take(*dst_vars) {
            dst.assign_slot_from(src, registry.get(entry.ty()), entry.offset());
        }
    }

    /// Borrow the value of a covered variable as `T`.
    ///
    /// Panics on a type mismatch, an id this image does not cover, or a
    /// moved image. Never reinterprets memory as the wrong type.
    pub fn get<T: Value>(&self, var: VarId) -> &T {
        let State::Active { buf, vars } = &self.state else {
            panic!("access through a moved-out memory image");
        };
        let (offset, ty) = self.slot_of(var, *vars);
        self.check_type::<T>(var, ty);
        buf.get_ref(offset)
    }

    /// Mutably borrow the value of a covered variable as `T`.
    ///
    /// Same fatal checks as [`MemoryImage::get`].
    pub fn get_mut<T: Value>(&mut self, var: VarId) -> &mut T {
        let State::Active { vars, .. } = &self.state else {
            panic!("access through a moved-out memory image");
        };
        let (offset, ty) = self.slot_of(var, *vars);
        self.check_type::<T>(var, ty);
        let State::Active { buf, .. } = &mut self.state else {
            unreachable!("state checked active above");
        };
        buf.get_mut(offset)
    }

    /// The numeric view of a covered variable, if its type has one.
    pub fn number(&self, var: VarId) -> Option<f64> {
        let State::Active { buf, vars } = &self.state else {
            panic!("access through a moved-out memory image");
        };
        let (offset, ty) = self.slot_of(var, *vars);
        let registry = self.schema.registry.borrow();
        buf.number_slot(registry.get(ty), offset)
    }

    /// The textual view of a covered variable, if its type has one.
    pub fn text(&self, var: VarId) -> Option<String> {
        let State::Active { buf, vars } = &self.state else {
            panic!("access through a moved-out memory image");
        };
        let (offset, ty) = self.slot_of(var, *vars);
        let registry = self.schema.registry.borrow();
        buf.text_slot(registry.get(ty), offset)
    }

    /// A typed accessor bound to this image.
    ///
    /// Panics if `var` is unknown or not covered by this image.
    pub fn handle(&self, var: VarId) -> VarHandle<'_> {
        let State::Active { vars, .. } = &self.state else {
            panic!("access through a moved-out memory image");
        };
        let (offset, _) = self.slot_of(var, *vars);
        VarHandle::new(self, var, offset)
    }

    /// Look up a variable by name and bind a handle to this image.
    pub fn handle_of(&self, name: &str) -> Result<VarHandle<'_>, CatalogError> {
        let var = self.schema.catalog.borrow().lookup(name)?;
        Ok(self.handle(var))
    }

    /// Resolve a covered variable to `(offset, type id)`, with fatal
    /// checks for unknown or uncovered ids.
    fn slot_of(&self, var: VarId, covered: usize) -> (usize, TypeId) {
        let catalog = self.schema.catalog.borrow();
        let Some(entry) = catalog.entry(var) else {
            panic!("variable id {var} was never declared in this runtime");
        };
        assert!(
            (var.0 as usize) < covered,
            "variable '{}' ({var}) was declared after this image was created",
            entry.name(),
        );
        (entry.offset(), entry.ty())
    }

    fn check_type<T: Value>(&self, var: VarId, stored: TypeId) {
        let registry = self.schema.registry.borrow();
        match registry.lookup::<T>() {
            Some(id) if id == stored => {}
            _ => {
                let catalog = self.schema.catalog.borrow();
                let name = catalog
                    .entry(var)
                    .map(|e| e.name().to_string())
                    .unwrap_or_default();
                panic!(
                    "type mismatch for variable '{name}' ({var}): stored {}, requested {}",
                    registry.get(stored).name(),
                    std::any::type_name::<T>(),
                );
            }
        }
    }
}

impl Clone for MemoryImage {
    /// Copy-construct an independent image.
    ///
    /// Allocates a buffer of the source's length and runs every covered
    /// descriptor's copy-construct callback; each callback touches only
    /// its own slot. Cloning a moved image yields a moved image.
    fn clone(&self) -> Self {
        let State::Active { buf, vars } = &self.state else {
            return Self {
                schema: Rc::clone(&self.schema),
                state: State::Moved,
            };
        };
        let catalog = self.schema.catalog.borrow();
        let registry = self.schema.registry.borrow();
        let mut copy = RawBuf::with_len(buf.len(), buf.align());
        for entry in catalog.iter().take(*vars) {
            copy.clone_slot_from(buf, registry.get(entry.ty()), entry.offset());
        }
        Self {
            schema: Rc::clone(&self.schema),
            state: State::Active {
                buf: copy,
                vars: *vars,
            },
        }
    }
}

impl Drop for MemoryImage {
    /// Tear down every covered slot exactly once; skipped entirely for a
    /// moved image.
    fn drop(&mut self) {
        let State::Active { buf, vars } = &mut self.state else {
            return;
        };
        let catalog = self.schema.catalog.borrow();
        let registry = self.schema.registry.borrow();
        for entry in catalog.iter().take(*vars) {
            buf.drop_slot(registry.get(entry.ty()), entry.offset());
        }
    }
}

impl fmt::Debug for MemoryImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Active { buf, vars } => f
                .debug_struct("MemoryImage")
                .field("vars", vars)
                .field("len", &buf.len())
                .finish(),
            State::Moved => write!(f, "MemoryImage(moved)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Declare directly against a bare schema, the way the runtime does.
    fn declare<T: Value>(schema: &Rc<Schema>, image: &mut MemoryImage, name: &str, value: T) {
        let ty = schema.registry.borrow_mut().resolve::<T>();
        let (_, offset) = {
            let registry = schema.registry.borrow();
            schema
                .catalog
                .borrow_mut()
                .declare(name, registry.get(ty))
                .unwrap()
        };
        image.append(ty, offset, value);
    }

    #[test]
    fn grow_on_declare_extends_by_exactly_one_slot() {
        let schema = Schema::new();
        let mut image = MemoryImage::empty(Rc::clone(&schema));
        assert_eq!(image.len(), 0);

        declare(&schema, &mut image, "x", 5_i32);
        assert_eq!(image.len(), 4);
        assert_eq!(image.var_count(), 1);

        declare(&schema, &mut image, "y", 6_i32);
        assert_eq!(image.len(), 8);
        assert_eq!(*image.get::<i32>(VarId(0)), 5);
        assert_eq!(*image.get::<i32>(VarId(1)), 6);
    }

    #[test]
    fn clone_of_a_moved_image_is_moved() {
        let schema = Schema::new();
        let mut image = MemoryImage::empty(Rc::clone(&schema));
        declare(&schema, &mut image, "x", 1_u8);

        let taken = image.take();
        let copy = image.clone();
        assert!(!copy.is_active());
        assert!(taken.is_active());
    }

    #[test]
    fn stale_clone_covers_its_prefix_only() {
        let schema = Schema::new();
        let mut image = MemoryImage::empty(Rc::clone(&schema));
        declare(&schema, &mut image, "x", 5_i32);

        let stale = image.clone();
        declare(&schema, &mut image, "y", 7_i32);

        assert_eq!(stale.var_count(), 1);
        assert_eq!(stale.len(), 4);
        assert_eq!(image.var_count(), 2);
        assert_eq!(*stale.get::<i32>(VarId(0)), 5);
    }

    #[test]
    #[should_panic(expected = "declared after this image was created")]
    fn stale_clone_rejects_later_variables() {
        let schema = Schema::new();
        let mut image = MemoryImage::empty(Rc::clone(&schema));
        declare(&schema, &mut image, "x", 5_i32);

        let stale = image.clone();
        declare(&schema, &mut image, "y", 7_i32);
        let _ = stale.get::<i32>(VarId(1));
    }

    #[test]
    #[should_panic(expected = "moved-out memory image")]
    fn access_after_take_is_fatal() {
        let schema = Schema::new();
        let mut image = MemoryImage::empty(Rc::clone(&schema));
        declare(&schema, &mut image, "x", 5_i32);

        let _kept = image.take();
        let _ = image.get::<i32>(VarId(0));
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn wrong_type_access_is_fatal() {
        let schema = Schema::new();
        let mut image = MemoryImage::empty(Rc::clone(&schema));
        declare(&schema, &mut image, "x", 5_i32);
        let _ = image.get::<f64>(VarId(0));
    }

    #[test]
    #[should_panic(expected = "different catalog prefixes")]
    fn copy_assign_across_prefixes_is_fatal() {
        let schema = Schema::new();
        let mut image = MemoryImage::empty(Rc::clone(&schema));
        declare(&schema, &mut image, "x", 5_i32);

        let mut stale = image.clone();
        declare(&schema, &mut image, "y", 7_i32);
        stale.copy_from(&image);
    }

    #[test]
    fn debug_formats_both_states() {
        let schema = Schema::new();
        let mut image = MemoryImage::empty(Rc::clone(&schema));
        declare(&schema, &mut image, "x", 5_i32);
        assert_eq!(format!("{image:?}"), "MemoryImage { vars: 1, len: 4 }");

        let _kept = image.take();
        assert_eq!(format!("{image:?}"), "MemoryImage(moved)");
    }
}
