//! Type-erased variable storage and memory images for the Loam runtime.
//!
//! Callers declare named variables whose concrete types are resolved at
//! run time; values live compactly in a single contiguous buffer (the
//! "memory image") and can be snapshotted and torn down safely even
//! though the runtime never sees the stored types as compile-time
//! entities. This crate is the only one in the workspace that may
//! contain `unsafe` code, all of it confined to the private `raw` module.
//!
//! # Architecture
//!
//! ```text
//! Runtime (facade)
//! ├── Rc<Schema> (shared by every image derived from this runtime)
//! │   ├── TypeRegistry  — concrete type → TypeInfo (lazy, append-only)
//! │   └── VarCatalog    — name → (VarId, TypeId, offset) (append-only)
//! └── MemoryImage (default image, grown on declare)
//!     └── RawBuf — max-aligned byte buffer; all unsafe lives below it
//! ```
//!
//! Declaring a variable resolves its type descriptor, appends a catalog
//! entry at the next aligned offset, grows the default image by exactly
//! that slot, and constructs the value in place. Cloning an image runs
//! every covered descriptor's copy-construct callback; dropping one runs
//! every drop callback exactly once, unless the image was moved out of
//! (the explicit `Moved` state holds no live values).
//!
//! # Concurrency
//!
//! Single-threaded by design. `Runtime`, `MemoryImage`, and `VarHandle`
//! are intentionally `!Send` and `!Sync`; hosts that want parallelism use
//! one runtime per thread.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod descriptor;
pub mod handle;
pub mod image;
mod raw;
pub mod registry;
pub mod runtime;

// Public re-exports for the primary API surface.
pub use catalog::{VarCatalog, VarEntry};
pub use descriptor::TypeInfo;
pub use handle::VarHandle;
pub use image::MemoryImage;
pub use registry::TypeRegistry;
pub use runtime::Runtime;
