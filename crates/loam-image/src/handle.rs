//! Typed variable accessors bound to a specific memory image.

use std::fmt;

use loam_core::{Value, VarId};

use crate::image::MemoryImage;

/// A typed accessor binding one variable to one memory image.
///
/// Handles borrow their image rather than owning it, so handle validity
/// is bounded by the image's lifetime — the borrow checker rules out
/// use-after-move and use-after-free statically. A handle is `Copy`:
/// it is just a variable id, a cached byte offset, and the borrow.
#[derive(Clone, Copy, Debug)]
pub struct VarHandle<'img> {
    image: &'img MemoryImage,
    var: VarId,
    offset: usize,
}

impl<'img> VarHandle<'img> {
    /// Bind a handle. The caller (the image) has already validated that
    /// `var` is covered and that `offset` is its catalog offset.
    pub(crate) fn new(image: &'img MemoryImage, var: VarId, offset: usize) -> Self {
        Self { image, var, offset }
    }

    /// The variable's id.
    pub fn id(&self) -> VarId {
        self.var
    }

    /// The variable's byte offset within the bound image.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The image this handle is bound to.
    pub fn image(&self) -> &'img MemoryImage {
        self.image
    }

    /// Borrow the variable's value as `T`.
    ///
    /// Panics on a type mismatch — the stored type is checked against
    /// what the registry would resolve `T` to, and memory is never
    /// silently reinterpreted.
    pub fn get<T: Value>(&self) -> &'img T {
        self.image.get(self.var)
    }

    /// The numeric view of the value, if its type has one.
    pub fn as_number(&self) -> Option<f64> {
        self.image.number(self.var)
    }

    /// The textual view of the value, if its type has one.
    pub fn as_text(&self) -> Option<String> {
        self.image.text(self.var)
    }
}

impl fmt::Display for VarHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarHandle(var={}, off={})", self.var, self.offset)
    }
}
