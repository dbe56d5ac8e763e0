//! The runtime facade: declare-and-initialize in one step.
//!
//! A [`Runtime`] owns the registry/catalog pair and the default memory
//! image. Declaring a variable resolves its type descriptor (creating it
//! on first use), appends a catalog entry, grows the default image by
//! exactly that slot, constructs the value in place, and returns a
//! handle bound to the default image.
//!
//! A declare is atomic: the duplicate-name check runs before anything is
//! touched, so a failed declare leaves registry, catalog, and image
//! exactly as they were. There is no undeclare — the catalog is
//! append-only for the runtime's whole lifetime.

use std::fmt;
use std::rc::Rc;

use loam_core::{CatalogError, TypeId, Value, VarId};

use crate::handle::VarHandle;
use crate::image::{MemoryImage, Schema};

/// A dynamically-typed variable runtime.
///
/// Single-threaded by design (`!Send`/`!Sync`): one registry/catalog
/// pair is privately owned per instance, and any number of images may be
/// derived from it via [`Runtime::snapshot`]. Hosts that want
/// parallelism run one runtime per thread.
///
/// ```rust
/// use loam_image::Runtime;
///
/// let mut rt = Runtime::new();
/// rt.declare("energy", 40.25_f64)?;
/// rt.declare("name", String::from("unit-7"))?;
///
/// assert_eq!(*rt.get::<f64>("energy")?, 40.25);
/// *rt.get_mut::<f64>("energy")? += 0.75;
///
/// let snapshot = rt.snapshot();
/// *rt.get_mut::<f64>("energy")? = 0.0;
/// assert_eq!(snapshot.handle_of("energy")?.as_number(), Some(41.0));
/// # Ok::<(), loam_core::CatalogError>(())
/// ```
pub struct Runtime {
    schema: Rc<Schema>,
    image: MemoryImage,
}

impl Runtime {
    /// Create an empty runtime: no types, no variables, an empty default
    /// image.
    pub fn new() -> Self {
        let schema = Schema::new();
        let image = MemoryImage::empty(Rc::clone(&schema));
        Self { schema, image }
    }

    /// Declare a new variable and construct `value` in the default
    /// image.
    ///
    /// Fails with [`CatalogError::DuplicateName`] if `name` is taken, in
    /// which case nothing — registry, catalog, or image — changes.
    pub fn declare<T: Value>(
        &mut self,
        name: &str,
        value: T,
    ) -> Result<VarHandle<'_>, CatalogError> {
        // Checked before the type resolve so a failed declare has no
        // observable effect at all, including on the descriptor count.
        if self.schema.catalog.borrow().contains(name) {
            return Err(CatalogError::DuplicateName {
                name: name.to_string(),
            });
        }
        let ty = self.schema.registry.borrow_mut().resolve::<T>();
        let (id, offset) = {
            let registry = self.schema.registry.borrow();
            self.schema
                .catalog
                .borrow_mut()
                .declare(name, registry.get(ty))?
        };
        self.image.append(ty, offset, value);
        Ok(self.image.handle(id))
    }

    /// Resolve a name to its variable id.
    pub fn lookup(&self, name: &str) -> Result<VarId, CatalogError> {
        self.schema.catalog.borrow().lookup(name)
    }

    /// Bind a handle to the named variable in the default image.
    pub fn handle(&self, name: &str) -> Result<VarHandle<'_>, CatalogError> {
        self.image.handle_of(name)
    }

    /// Borrow the named variable's value as `T` from the default image.
    ///
    /// Returns [`CatalogError::UnknownVariable`] for an undeclared name;
    /// panics on a type mismatch.
    pub fn get<T: Value>(&self, name: &str) -> Result<&T, CatalogError> {
        let var = self.lookup(name)?;
        Ok(self.image.get(var))
    }

    /// Mutably borrow the named variable's value as `T` from the
    /// default image.
    pub fn get_mut<T: Value>(&mut self, name: &str) -> Result<&mut T, CatalogError> {
        let var = self.lookup(name)?;
        Ok(self.image.get_mut(var))
    }

    /// The default image.
    pub fn image(&self) -> &MemoryImage {
        &self.image
    }

    /// Copy-construct an independent snapshot of the default image.
    pub fn snapshot(&self) -> MemoryImage {
        self.image.clone()
    }

    /// Copy-assign a snapshot's values back onto the default image,
    /// reusing its storage.
    ///
    /// Panics if the snapshot was taken before later declarations (the
    /// layouts no longer match) or was moved out.
    pub fn restore(&mut self, snapshot: &MemoryImage) {
        self.image.copy_from(snapshot);
    }

    /// Resolve `T`'s descriptor id, creating the descriptor on first
    /// use.
    pub fn resolve_type<T: Value>(&mut self) -> TypeId {
        self.schema.registry.borrow_mut().resolve::<T>()
    }

    /// Number of distinct types resolved so far.
    pub fn type_count(&self) -> usize {
        self.schema.registry.borrow().len()
    }

    /// Number of variables declared so far.
    pub fn var_count(&self) -> usize {
        self.schema.catalog.borrow().len()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("types", &self.type_count())
            .field("vars", &self.var_count())
            .field("image", &self.image)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_returns_a_bound_handle() {
        let mut rt = Runtime::new();
        let h = rt.declare("x", 5_i32).unwrap();
        assert_eq!(h.id(), VarId(0));
        assert_eq!(h.offset(), 0);
        assert_eq!(*h.get::<i32>(), 5);
    }

    #[test]
    fn duplicate_declare_has_no_observable_effect() {
        let mut rt = Runtime::new();
        rt.declare("x", 1_i32).unwrap();
        let types_before = rt.type_count();
        let len_before = rt.image().len();

        let err = rt.declare("x", 2.5_f64).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateName {
                name: "x".to_string()
            }
        );
        // Not even the descriptor for f64 was created.
        assert_eq!(rt.type_count(), types_before);
        assert_eq!(rt.var_count(), 1);
        assert_eq!(rt.image().len(), len_before);
        assert_eq!(*rt.get::<i32>("x").unwrap(), 1);
    }

    #[test]
    fn lookup_reports_unknown_names() {
        let rt = Runtime::new();
        assert_eq!(
            rt.lookup("ghost"),
            Err(CatalogError::UnknownVariable {
                name: "ghost".to_string()
            })
        );
    }

    #[test]
    fn get_mut_writes_through_to_the_default_image() {
        let mut rt = Runtime::new();
        rt.declare("count", 10_u32).unwrap();
        *rt.get_mut::<u32>("count").unwrap() += 5;
        assert_eq!(*rt.get::<u32>("count").unwrap(), 15);
    }

    #[test]
    fn restore_rewinds_the_default_image() {
        let mut rt = Runtime::new();
        rt.declare("energy", 100.0_f64).unwrap();
        rt.declare("tag", String::from("alpha")).unwrap();

        let checkpoint = rt.snapshot();
        *rt.get_mut::<f64>("energy").unwrap() = 0.0;
        rt.get_mut::<String>("tag").unwrap().push_str("-dead");

        rt.restore(&checkpoint);
        assert_eq!(*rt.get::<f64>("energy").unwrap(), 100.0);
        assert_eq!(rt.get::<String>("tag").unwrap(), "alpha");
    }

    #[test]
    fn resolve_type_is_idempotent_through_the_facade() {
        let mut rt = Runtime::new();
        let a = rt.resolve_type::<i64>();
        let b = rt.resolve_type::<i64>();
        assert_eq!(a, b);
        assert_eq!(rt.type_count(), 1);
    }

    #[test]
    fn reuses_descriptors_across_variables() {
        let mut rt = Runtime::new();
        rt.declare("a", 1_i32).unwrap();
        rt.declare("b", 2_i32).unwrap();
        rt.declare("c", String::from("x")).unwrap();
        assert_eq!(rt.type_count(), 2);
        assert_eq!(rt.var_count(), 3);
    }
}
