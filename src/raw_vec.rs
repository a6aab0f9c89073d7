//! A raw buffer that does not own its allocator.
//!
//! Both the bucket array and the node slab of a table share the allocator stored in the table,
//! so the buffer takes the allocator by reference on every call that touches memory and has no
//! `Drop` implementation: the owner must call [`RawVec::dealloc_buffer`] explicitly.

use crate::alloc::Alloc;
use core::mem;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::ptr::NonNull;

/// A low-level utility for allocating, reallocating, and deallocating a buffer of memory without
/// having to worry about the corner cases involved.
///
/// * Produces a dangling pointer on zero-length allocations and zero-sized types.
/// * Catches all overflows in capacity computations.
/// * Guards against 32-bit systems allocating more than isize::MAX bytes.
/// * Avoids freeing the dangling pointer.
///
/// This type does not in anyway inspect the memory that it manages, and it never drops its
/// contents. It is up to the user of `RawVec` to handle the things *stored* inside of it.
pub struct RawVec<T> {
    ptr: NonNull<T>,
    cap: usize,
}

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Capacity overflow"))]
    CapacityOverflow,

    #[snafu(display("Allocation failed for: {}", source))]
    Allocation { source: crate::alloc::Error },
}

impl<T> RawVec<T> {
    /// Creates an empty `RawVec` without allocating.
    pub const fn new() -> Self {
        RawVec {
            ptr: NonNull::dangling(),
            cap: 0,
        }
    }

    /// Creates a `RawVec` with exactly the capacity and alignment requirements for a
    /// `[T; capacity]`.
    pub fn with_capacity_in<A: Alloc>(capacity: usize, a: &mut A) -> Result<Self, Error> {
        let mut buf = Self::new();
        buf.grow_exact(capacity, a)?;
        Ok(buf)
    }

    /// Gets a raw pointer to the start of the allocation. Note that this is a dangling pointer
    /// if `capacity == 0` or `T` is zero-sized.
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Gets the capacity of the allocation.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// The amount of allocated memory.
    pub fn allocated_size(&self) -> usize {
        self.cap * mem::size_of::<T>()
    }

    /// Grows the buffer to hold exactly `new_cap` items. Does nothing if the buffer is already
    /// large enough.
    ///
    /// The first `capacity()` items are moved bitwise into the new allocation. The contents are
    /// untouched if an error is returned.
    pub fn grow_exact<A: Alloc>(&mut self, new_cap: usize, a: &mut A) -> Result<(), Error> {
        if new_cap <= self.cap {
            return Ok(());
        }

        let elem_size = mem::size_of::<T>();
        let new_size = new_cap.checked_mul(elem_size).context(CapacityOverflow)?;
        alloc_guard(new_size)?;

        if new_size == 0 {
            self.cap = new_cap;
            return Ok(());
        }

        let ptr = if self.allocated_size() == 0 {
            a.alloc_array::<T>(new_cap)
        } else {
            unsafe { a.realloc_array(self.ptr, self.cap, new_cap) }
        }
        .context(Allocation)?;

        self.ptr = ptr;
        self.cap = new_cap;
        Ok(())
    }

    /// Frees the memory owned by the `RawVec` *without* trying to drop its contents, and resets
    /// it to the empty state.
    ///
    /// # Safety
    ///
    /// The buffer must have been allocated by `a`.
    pub unsafe fn dealloc_buffer<A: Alloc>(&mut self, a: &mut A) {
        if self.allocated_size() != 0 {
            a.dealloc_array(self.ptr, self.cap);
        }
        *self = Self::new();
    }
}

impl<T> Default for RawVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

// We need to guarantee the following:
// * We don't ever allocate `> isize::MAX` byte-size objects.
// * We don't overflow `usize::MAX` and actually allocate too little.
//
// On 64-bit we just need to check for overflow since trying to allocate
// `> isize::MAX` bytes will surely fail. On 32-bit and 16-bit we need to add
// an extra guard for this in case we're running on a platform which can use
// all 4GB in user-space, e.g., PAE or x32.
#[inline]
fn alloc_guard(alloc_size: usize) -> Result<(), Error> {
    ensure!(
        !(mem::size_of::<usize>() < 8 && alloc_size > core::isize::MAX as usize),
        CapacityOverflow
    );
    Ok(())
}
