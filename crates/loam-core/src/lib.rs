//! Core types and traits for the Loam variable runtime.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Loam workspace:
//! type and variable IDs, the catalog error taxonomy, and the [`Value`]
//! trait that host types implement to become storable in a memory image.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod value;

pub use error::CatalogError;
pub use id::{TypeId, VarId};
pub use value::Value;
