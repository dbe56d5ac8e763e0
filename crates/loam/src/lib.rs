//! Loam: a dynamically-typed variable runtime embedded in statically-typed Rust.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Loam sub-crates. For most users, adding `loam` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use loam::prelude::*;
//!
//! // A host type becomes storable with a one-line Value impl.
//! #[derive(Clone, PartialEq, Debug)]
//! struct Genome(Vec<u8>);
//! impl Value for Genome {}
//!
//! let mut rt = Runtime::new();
//! rt.declare("fitness", 0.25_f64).unwrap();
//! rt.declare("genome", Genome(vec![1, 2, 3])).unwrap();
//!
//! // Typed access through the default image.
//! *rt.get_mut::<f64>("fitness").unwrap() += 0.5;
//!
//! // Independent snapshot: later mutation does not reach it.
//! let snapshot = rt.snapshot();
//! *rt.get_mut::<f64>("fitness").unwrap() = 0.0;
//!
//! let fitness = snapshot.handle_of("fitness").unwrap();
//! assert_eq!(fitness.as_number(), Some(0.75));
//! assert_eq!(
//!     snapshot.handle_of("genome").unwrap().get::<Genome>(),
//!     &Genome(vec![1, 2, 3]),
//! );
//!
//! // Declaring a taken name is a recoverable error, not a panic.
//! assert!(rt.declare("fitness", 1_i32).is_err());
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `loam-core` | IDs, the error taxonomy, the [`prelude::Value`] trait |
//! | [`image`] | `loam-image` | Registry, catalog, memory images, handles, `Runtime` |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and the `Value` trait (`loam-core`).
///
/// Contains [`types::TypeId`], [`types::VarId`], [`types::CatalogError`],
/// and the [`types::Value`] trait host types implement to become
/// storable.
pub use loam_core as types;

/// Storage and the runtime facade (`loam-image`).
///
/// Contains [`image::Runtime`], [`image::MemoryImage`],
/// [`image::VarHandle`], and the standalone [`image::TypeRegistry`] and
/// [`image::VarCatalog`] building blocks.
pub use loam_image as image;

/// Common imports for typical Loam usage.
///
/// ```rust
/// use loam::prelude::*;
/// ```
pub mod prelude {
    // Core types and the storable-value seam
    pub use loam_core::{CatalogError, TypeId, Value, VarId};

    // Runtime, images, and handles
    pub use loam_image::{MemoryImage, Runtime, VarHandle};
}
