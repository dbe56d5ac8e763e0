//! Error types for the Loam variable runtime.
//!
//! Only the two recoverable conditions live here: declaring a name twice
//! and looking up a name that was never declared. Accessing a variable
//! through the wrong static type is a host programming defect, not a data
//! condition, and panics instead of returning an error.

use std::error::Error;
use std::fmt;

/// Errors from catalog operations (declaration and name lookup).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogError {
    /// A variable with this name is already declared in the catalog.
    DuplicateName {
        /// The name that was declared twice.
        name: String,
    },
    /// No variable with this name exists in the catalog.
    UnknownVariable {
        /// The name that was looked up.
        name: String,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { name } => {
                write!(f, "variable '{name}' is already declared")
            }
            Self::UnknownVariable { name } => {
                write!(f, "unknown variable '{name}'")
            }
        }
    }
}

impl Error for CatalogError {}
