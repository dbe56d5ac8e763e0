//! Low-level primitives for memory-image storage.
//!
//! The only module in the workspace allowed to contain `unsafe` code.
//! Every unsafe block carries a `SAFETY:` comment. The rest of the crate
//! drives this module exclusively through safe, bounds-checked wrappers:
//!
//! - [`RawBuf`] — a manually allocated, max-aligned, growable byte buffer.
//!   All allocations are zero-initialised, so relocation on growth never
//!   copies uninitialised bytes.
//! - [`SlotOps`] — the erased per-type function-pointer table (clone,
//!   assign, drop, convert), monomorphised once per stored type by
//!   [`slot_ops_of`].
//!
//! Type correctness is a crate invariant, not something this module can
//! check: callers only pass a [`TypeInfo`] together with an offset at
//! which the catalog placed a value of exactly that type. Bounds and
//! alignment *are* checked here, with fatal assertions.

#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::mem;
use std::ptr::{self, NonNull};

use loam_core::Value;

use crate::descriptor::TypeInfo;

/// Erased behavior table for one stored type.
///
/// Captured into a [`TypeInfo`] at descriptor creation and never mutated.
/// Each function trusts that its pointers address a properly aligned slot
/// of the type it was monomorphised for; the safe wrappers on [`RawBuf`]
/// uphold that contract.
#[derive(Clone, Copy)]
pub(crate) struct SlotOps {
    /// Copy-construct: read a live value at `src`, write a fresh clone to
    /// the reserved (uninitialised) slot at `dst`.
    pub(crate) clone_fn: unsafe fn(src: *const u8, dst: *mut u8),
    /// Copy-assign between two already-live slots.
    pub(crate) assign_fn: unsafe fn(src: *const u8, dst: *mut u8),
    /// Drop the live value at `slot` in place.
    pub(crate) drop_fn: unsafe fn(slot: *mut u8),
    /// Numeric conversion hook ([`Value::as_number`]).
    pub(crate) number_fn: unsafe fn(slot: *const u8) -> Option<f64>,
    /// Textual conversion hook ([`Value::as_text`]).
    pub(crate) text_fn: unsafe fn(slot: *const u8) -> Option<String>,
}

/// Build the erased behavior table for `T`.
pub(crate) fn slot_ops_of<T: Value>() -> SlotOps {
    SlotOps {
        clone_fn: clone_raw::<T>,
        assign_fn: assign_raw::<T>,
        drop_fn: drop_raw::<T>,
        number_fn: number_raw::<T>,
        text_fn: text_raw::<T>,
    }
}

/// View an erased slot pointer as `*const T`.
///
/// Zero-sized types are redirected to a well-aligned dangling pointer:
/// their slots occupy no bytes, so the buffer address (which may not
/// satisfy the ZST's alignment) must never be dereferenced for them.
fn typed<T>(p: *const u8) -> *const T {
    if mem::size_of::<T>() == 0 {
        NonNull::dangling().as_ptr()
    } else {
        p.cast()
    }
}

/// Mutable counterpart of [`typed`].
fn typed_mut<T>(p: *mut u8) -> *mut T {
    if mem::size_of::<T>() == 0 {
        NonNull::dangling().as_ptr()
    } else {
        p.cast()
    }
}

/// # Safety
/// `src` must address a live, aligned `T`; `dst` must address a reserved,
/// writable slot of `size_of::<T>()` bytes holding no live value.
unsafe fn clone_raw<T: Value>(src: *const u8, dst: *mut u8) {
    // SAFETY: per this function's contract.
    let cloned = unsafe { (*typed::<T>(src)).clone() };
    // SAFETY: dst is reserved and writable; writing does not drop any
    // previous value, and the slot held none.
    unsafe { ptr::write(typed_mut::<T>(dst), cloned) };
}

/// # Safety
/// Both pointers must address live, aligned, distinct `T` slots.
unsafe fn assign_raw<T: Value>(src: *const u8, dst: *mut u8) {
    // SAFETY: per this function's contract.
    unsafe { (*typed_mut::<T>(dst)).clone_from(&*typed::<T>(src)) };
}

/// # Safety
/// `slot` must address a live, aligned `T` that is not used again.
unsafe fn drop_raw<T: Value>(slot: *mut u8) {
    // SAFETY: per this function's contract; drops exactly once.
    unsafe { ptr::drop_in_place(typed_mut::<T>(slot)) };
}

/// # Safety
/// `slot` must address a live, aligned `T`.
unsafe fn number_raw<T: Value>(slot: *const u8) -> Option<f64> {
    // SAFETY: per this function's contract.
    unsafe { (*typed::<T>(slot)).as_number() }
}

/// # Safety
/// `slot` must address a live, aligned `T`.
unsafe fn text_raw<T: Value>(slot: *const u8) -> Option<String> {
    // SAFETY: per this function's contract.
    unsafe { (*typed::<T>(slot)).as_text() }
}

/// A manually allocated, growable byte buffer with a tracked alignment.
///
/// The buffer's base address is always aligned to `align`, which only
/// ever grows (it tracks the maximum alignment of every type placed in
/// the buffer so far). Growth relocates with a plain byte copy — every
/// Rust value is trivially relocatable, and nothing here is pinned.
///
/// `RawBuf` deallocates its block on drop but never runs value
/// destructors; [`MemoryImage`](crate::image::MemoryImage) drops every
/// live slot before the buffer goes away.
pub(crate) struct RawBuf {
    ptr: NonNull<u8>,
    len: usize,
    cap: usize,
    align: usize,
}

impl RawBuf {
    /// An empty buffer with no allocation.
    pub(crate) fn new() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            cap: 0,
            align: 1,
        }
    }

    /// Allocate a zero-initialised buffer of exactly `len` bytes.
    ///
    /// Used as the target of a copy-construction; the caller fills every
    /// slot through [`RawBuf::clone_slot_from`] immediately afterwards.
    pub(crate) fn with_len(len: usize, align: usize) -> Self {
        let mut buf = Self::new();
        buf.grow_to(len, align);
        buf
    }

    /// Length in bytes of the initialised region.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Current base alignment.
    pub(crate) fn align(&self) -> usize {
        self.align
    }

    /// Extend the buffer to `new_len` bytes, raising its alignment to at
    /// least `min_align`. Existing bytes are preserved; new bytes are
    /// zero. Never shrinks.
    pub(crate) fn grow_to(&mut self, new_len: usize, min_align: usize) {
        debug_assert!(new_len >= self.len, "RawBuf never shrinks");
        let new_align = self.align.max(min_align.max(1));
        if new_len <= self.cap && new_align == self.align {
            self.len = new_len;
            return;
        }
        let new_cap = new_len.max(self.cap * 2);
        if new_cap == 0 {
            // Alignment raised by a zero-sized type; nothing to allocate.
            self.align = new_align;
            self.len = new_len;
            return;
        }
        let new_ptr = Self::alloc_block(new_cap, new_align);
        if self.len > 0 {
            // SAFETY: both blocks are live and distinct; `self.len` is
            // within both; every byte up to `self.len` is initialised
            // (allocations are zeroed).
            unsafe { ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.len) };
        }
        self.release();
        self.ptr = new_ptr;
        self.cap = new_cap;
        self.align = new_align;
        self.len = new_len;
    }

    /// Construct `value` in place at `offset`.
    ///
    /// The slot must lie inside the initialised region and hold no live
    /// value (freshly grown, or previously dropped).
    pub(crate) fn emplace<T>(&mut self, offset: usize, value: T) {
        let p = self.slot_ptr_mut(offset, mem::size_of::<T>());
        self.check_slot_align::<T>(p.cast_const());
        // SAFETY: bounds and alignment asserted; the slot holds no live
        // value, so nothing is leaked or double-dropped by the write.
        unsafe { ptr::write(typed_mut::<T>(p), value) };
    }

    /// Borrow the live `T` at `offset`.
    pub(crate) fn get_ref<T>(&self, offset: usize) -> &T {
        let p = self.slot_ptr(offset, mem::size_of::<T>());
        self.check_slot_align::<T>(p);
        // SAFETY: bounds and alignment asserted; the crate invariant
        // guarantees a live T at this offset for the buffer's lifetime.
        unsafe { &*typed::<T>(p) }
    }

    /// Mutably borrow the live `T` at `offset`.
    pub(crate) fn get_mut<T>(&mut self, offset: usize) -> &mut T {
        let p = self.slot_ptr_mut(offset, mem::size_of::<T>());
        self.check_slot_align::<T>(p.cast_const());
        // SAFETY: as in `get_ref`, plus exclusive access via `&mut self`.
        unsafe { &mut *typed_mut::<T>(p) }
    }

    /// Copy-construct one slot from `src` into this buffer.
    ///
    /// The slot in `src` must hold a live value of `info`'s type; the
    /// matching slot here must be reserved and not yet constructed.
    pub(crate) fn clone_slot_from(&mut self, src: &RawBuf, info: &TypeInfo, offset: usize) {
        let s = src.slot_ptr(offset, info.size());
        let d = self.slot_ptr_mut(offset, info.size());
        // SAFETY: bounds asserted on both buffers; liveness per this
        // method's contract, upheld by the image's copy loop.
        unsafe { (info.ops().clone_fn)(s, d) };
    }

    /// Copy-assign one slot from `src` onto the live slot here.
    pub(crate) fn assign_slot_from(&mut self, src: &RawBuf, info: &TypeInfo, offset: usize) {
        let s = src.slot_ptr(offset, info.size());
        let d = self.slot_ptr_mut(offset, info.size());
        // SAFETY: bounds asserted; both slots hold live values of
        // `info`'s type per the image's assign loop.
        unsafe { (info.ops().assign_fn)(s, d) };
    }

    /// Drop the live value in one slot.
    pub(crate) fn drop_slot(&mut self, info: &TypeInfo, offset: usize) {
        let p = self.slot_ptr_mut(offset, info.size());
        // SAFETY: bounds asserted; the image's teardown loop visits each
        // covered slot exactly once, so the value is live and never
        // touched again.
        unsafe { (info.ops().drop_fn)(p) };
    }

    /// Run the numeric conversion hook on one live slot.
    pub(crate) fn number_slot(&self, info: &TypeInfo, offset: usize) -> Option<f64> {
        let p = self.slot_ptr(offset, info.size());
        // SAFETY: bounds asserted; slot is live per the crate invariant.
        unsafe { (info.ops().number_fn)(p) }
    }

    /// Run the textual conversion hook on one live slot.
    pub(crate) fn text_slot(&self, info: &TypeInfo, offset: usize) -> Option<String> {
        let p = self.slot_ptr(offset, info.size());
        // SAFETY: bounds asserted; slot is live per the crate invariant.
        unsafe { (info.ops().text_fn)(p) }
    }

    fn slot_ptr(&self, offset: usize, size: usize) -> *const u8 {
        assert!(
            offset + size <= self.len,
            "slot [{offset}, {}) out of bounds of a {}-byte image",
            offset + size,
            self.len,
        );
        // SAFETY: offset <= len <= cap, so the result stays inside the
        // allocation (or equals the dangling base when nothing is
        // allocated, in which case offset is 0).
        unsafe { self.ptr.as_ptr().add(offset) }
    }

    fn slot_ptr_mut(&mut self, offset: usize, size: usize) -> *mut u8 {
        self.slot_ptr(offset, size).cast_mut()
    }

    fn check_slot_align<T>(&self, p: *const u8) {
        if mem::size_of::<T>() > 0 {
            assert_eq!(
                p as usize % mem::align_of::<T>(),
                0,
                "misaligned slot for {}",
                std::any::type_name::<T>(),
            );
        }
    }

    fn alloc_block(cap: usize, align: usize) -> NonNull<u8> {
        let layout = Layout::from_size_align(cap, align).expect("slot layout overflows");
        // SAFETY: cap > 0 is guaranteed by the single caller.
        let raw = unsafe { alloc_zeroed(layout) };
        match NonNull::new(raw) {
            Some(p) => p,
            None => handle_alloc_error(layout),
        }
    }

    fn release(&mut self) {
        if self.cap > 0 {
            // SAFETY: ptr was allocated with exactly this layout and is
            // not used again; `release` resets or is followed by drop.
            unsafe {
                dealloc(
                    self.ptr.as_ptr(),
                    Layout::from_size_align_unchecked(self.cap, self.align),
                )
            };
        }
    }
}

impl Drop for RawBuf {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_core::TypeId;

    fn info_of<T: Value>() -> TypeInfo {
        TypeInfo::of::<T>(TypeId(0))
    }

    #[test]
    fn empty_buffer_has_no_allocation() {
        let buf = RawBuf::new();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.align(), 1);
    }

    #[test]
    fn grow_preserves_existing_values() {
        let mut buf = RawBuf::new();
        buf.grow_to(4, 4);
        buf.emplace(0usize, 0x5eed_u32);
        buf.grow_to(4096, 8);
        assert_eq!(*buf.get_ref::<u32>(0), 0x5eed);
    }

    #[test]
    fn base_is_aligned() {
        let buf = RawBuf::with_len(16, 16);
        assert_eq!(buf.ptr.as_ptr() as usize % 16, 0);
    }

    #[test]
    fn emplace_and_read_back_heap_value() {
        let info = info_of::<String>();
        let mut buf = RawBuf::with_len(info.size(), info.align());
        buf.emplace(0, String::from("memory"));
        assert_eq!(buf.get_ref::<String>(0), "memory");
        // Drop the value by hand; RawBuf itself never runs destructors.
        buf.drop_slot(&info, 0);
    }

    #[test]
    fn clone_slot_produces_independent_value() {
        let info = info_of::<String>();
        let mut src = RawBuf::with_len(info.size(), info.align());
        src.emplace(0, String::from("original"));

        let mut dst = RawBuf::with_len(src.len(), src.align());
        dst.clone_slot_from(&src, &info, 0);
        dst.get_mut::<String>(0).push_str("-copy");

        assert_eq!(src.get_ref::<String>(0), "original");
        assert_eq!(dst.get_ref::<String>(0), "original-copy");

        src.drop_slot(&info, 0);
        dst.drop_slot(&info, 0);
    }

    #[test]
    fn assign_slot_overwrites_live_value() {
        let info = info_of::<String>();
        let mut a = RawBuf::with_len(info.size(), info.align());
        let mut b = RawBuf::with_len(info.size(), info.align());
        a.emplace(0, String::from("left"));
        b.emplace(0, String::from("right"));

        b.assign_slot_from(&a, &info, 0);
        assert_eq!(b.get_ref::<String>(0), "left");

        a.drop_slot(&info, 0);
        b.drop_slot(&info, 0);
    }

    #[test]
    fn conversion_hooks_reach_the_slot() {
        let info = info_of::<i32>();
        let mut buf = RawBuf::with_len(info.size(), info.align());
        buf.emplace(0, 41_i32);
        assert_eq!(buf.number_slot(&info, 0), Some(41.0));
        assert_eq!(buf.text_slot(&info, 0).as_deref(), Some("41"));
    }

    #[test]
    fn zero_sized_values_need_no_storage() {
        #[derive(Clone, PartialEq, Debug)]
        struct Marker;
        impl Value for Marker {}

        let info = info_of::<Marker>();
        let mut buf = RawBuf::new();
        buf.grow_to(0, info.align());
        buf.emplace(0, Marker);
        assert_eq!(buf.len(), 0);
        assert_eq!(*buf.get_ref::<Marker>(0), Marker);
        buf.drop_slot(&info, 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn out_of_bounds_slot_is_fatal() {
        let buf = RawBuf::with_len(4, 4);
        let _ = buf.get_ref::<u64>(0);
    }
}
