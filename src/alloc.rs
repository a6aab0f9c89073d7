//! Allocators.
//!
//! Tables never call the global allocator directly. Every byte goes through an [`Alloc`], and
//! nothing it hands out is assumed to be zeroed.

use snafu::{ensure, OptionExt, Snafu};
use std::{
    alloc::Layout,
    cmp,
    ptr::{self, NonNull},
};

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub")]
pub enum Error {
    #[snafu(display("Allocation of {:?} failed", layout))]
    AllocationError { layout: Layout },

    #[snafu(display("Allocation of {} items of {:?} has failed", items, layout))]
    ArrayAllocationError { layout: Layout, items: usize },

    #[snafu(display("Reallocation of {:?} to size {} failed", layout, new_size))]
    ReallocationError { layout: Layout, new_size: usize },

    #[snafu(display(
        "Reallocation of {} items of {:?} to {} items has failed",
        items,
        layout,
        new_items
    ))]
    ArrayReallocationError {
        layout: Layout,
        items: usize,
        new_items: usize,
    },

    #[snafu(display(
        "Allocation of {} bytes exceeds the remaining budget of {} bytes",
        requested,
        remaining
    ))]
    BudgetExceeded { requested: usize, remaining: usize },
}

/// Source of raw memory for the containers of this crate.
///
/// # Safety
///
/// A block handed out by `alloc` or `realloc` must stay valid and unaliased until it is given back
/// through `dealloc` or `realloc` with the same layout.
pub unsafe trait Alloc {
    /// Hands out a block that fits `layout`. The contents are unspecified.
    ///
    /// # Safety
    ///
    /// `layout` must have a non-zero size.
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error>;

    /// Gives a block back.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator, and `layout` must be the one it was requested with.
    unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout);

    /// Resizes a block to `new_size` bytes, keeping `layout`'s alignment. The common prefix of
    /// the old and new blocks is preserved.
    ///
    /// On error the old block is still owned by the caller and left intact. The default
    /// allocates a new block, copies and releases the old one.
    ///
    /// # Safety
    ///
    /// Same as [`Alloc::dealloc`], and `new_size` must be greater than zero.
    unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Result<NonNull<u8>, Error> {
        let new_layout = Layout::from_size_align_unchecked(new_size, layout.align());
        let new_ptr = self.alloc(new_layout)?;
        let common = cmp::min(layout.size(), new_size);
        ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), common);
        self.dealloc(ptr, layout);
        Ok(new_ptr)
    }

    /// A block for `n` values of `T`. Fails on overflow and on empty arrays.
    fn alloc_array<T>(&mut self, n: usize) -> Result<NonNull<T>, Error>
    where
        Self: Sized,
    {
        match Layout::array::<T>(n) {
            Ok(layout) if layout.size() > 0 => unsafe { self.alloc(layout).map(NonNull::cast) },
            _ => ArrayAllocationError {
                layout: Layout::new::<T>(),
                items: n,
            }
            .fail(),
        }
    }

    /// Resizes an array block from `n_old` to `n_new` values of `T`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator as an array of exactly `n_old` values.
    unsafe fn realloc_array<T>(
        &mut self,
        ptr: NonNull<T>,
        n_old: usize,
        n_new: usize,
    ) -> Result<NonNull<T>, Error>
    where
        Self: Sized,
    {
        match (Layout::array::<T>(n_old), Layout::array::<T>(n_new)) {
            (Ok(old), Ok(new)) if old.size() > 0 && new.size() > 0 => self
                .realloc(ptr.cast(), old, new.size())
                .map(NonNull::cast),
            _ => ArrayReallocationError {
                layout: Layout::new::<T>(),
                items: n_old,
                new_items: n_new,
            }
            .fail(),
        }
    }

    /// Gives back an array block. Empty arrays are ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator as an array of exactly `n` values.
    unsafe fn dealloc_array<T>(&mut self, ptr: NonNull<T>, n: usize)
    where
        Self: Sized,
    {
        if let Ok(layout) = Layout::array::<T>(n) {
            if layout.size() > 0 {
                self.dealloc(ptr.cast(), layout)
            }
        }
    }
}

unsafe impl<A: Alloc> Alloc for &mut A {
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        A::alloc(self, layout)
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout) {
        A::dealloc(self, ptr, layout)
    }

    unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Result<NonNull<u8>, Error> {
        A::realloc(self, ptr, layout, new_size)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalAlloc<A>(A);

use ::std::alloc::GlobalAlloc as StdGlobalAlloc;

unsafe impl<A: StdGlobalAlloc> Alloc for GlobalAlloc<A> {
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        let ptr = StdGlobalAlloc::alloc(&self.0, layout);
        NonNull::new(ptr).context(AllocationError { layout })
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout) {
        StdGlobalAlloc::dealloc(&self.0, ptr.as_ptr(), layout)
    }

    unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Result<NonNull<u8>, Error> {
        let ptr = StdGlobalAlloc::realloc(&self.0, ptr.as_ptr(), layout, new_size);
        NonNull::new(ptr).context(ReallocationError { layout, new_size })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Global;

unsafe impl Alloc for Global {
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        let ptr = std::alloc::alloc(layout);
        NonNull::new(ptr).context(AllocationError { layout })
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout) {
        std::alloc::dealloc(ptr.as_ptr(), layout)
    }

    unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Result<NonNull<u8>, Error> {
        let ptr = std::alloc::realloc(ptr.as_ptr(), layout, new_size);
        NonNull::new(ptr).context(ReallocationError { layout, new_size })
    }
}

pub type System = GlobalAlloc<::std::alloc::System>;

/// An allocator that refuses every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOp;

unsafe impl Alloc for NoOp {
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        Err(Error::AllocationError { layout })
    }

    unsafe fn dealloc(&mut self, _ptr: NonNull<u8>, _layout: Layout) {
        /* No op */
    }
}

/// Allocation statistics gathered by [`Counting`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub allocations: usize,
    pub deallocations: usize,
    pub reallocations: usize,
    pub live_bytes: usize,
    pub peak_bytes: usize,
}

impl Stats {
    /// Number of blocks currently handed out.
    pub fn live_blocks(&self) -> usize {
        self.allocations - self.deallocations
    }

    /// Whether nothing was ever requested.
    pub fn is_untouched(&self) -> bool {
        self.allocations == 0 && self.reallocations == 0
    }
}

/// Wraps an allocator and records what passes through it.
#[derive(Debug, Default, Clone)]
pub struct Counting<A = Global> {
    inner: A,
    stats: Stats,
}

impl<A> Counting<A> {
    pub fn new(inner: A) -> Self {
        Counting {
            inner,
            stats: Stats::default(),
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    fn grew(&mut self, bytes: usize) {
        self.stats.live_bytes += bytes;
        self.stats.peak_bytes = cmp::max(self.stats.peak_bytes, self.stats.live_bytes);
    }
}

unsafe impl<A: Alloc> Alloc for Counting<A> {
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        let ptr = self.inner.alloc(layout)?;
        self.stats.allocations += 1;
        self.grew(layout.size());
        Ok(ptr)
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout) {
        self.inner.dealloc(ptr, layout);
        self.stats.deallocations += 1;
        self.stats.live_bytes -= layout.size();
    }

    unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Result<NonNull<u8>, Error> {
        let ptr = self.inner.realloc(ptr, layout, new_size)?;
        self.stats.reallocations += 1;
        self.stats.live_bytes -= layout.size();
        self.grew(new_size);
        Ok(ptr)
    }
}

/// Wraps an allocator and refuses to keep more than a fixed number of bytes alive.
#[derive(Debug, Clone)]
pub struct Budget<A = Global> {
    inner: A,
    remaining: usize,
}

impl<A> Budget<A> {
    pub fn new(inner: A, bytes: usize) -> Self {
        Budget {
            inner,
            remaining: bytes,
        }
    }

    /// Bytes that may still be allocated.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn set_remaining(&mut self, bytes: usize) {
        self.remaining = bytes;
    }
}

unsafe impl<A: Alloc> Alloc for Budget<A> {
    unsafe fn alloc(&mut self, layout: Layout) -> Result<NonNull<u8>, Error> {
        ensure!(
            layout.size() <= self.remaining,
            BudgetExceeded {
                requested: layout.size(),
                remaining: self.remaining,
            }
        );
        let ptr = self.inner.alloc(layout)?;
        self.remaining -= layout.size();
        Ok(ptr)
    }

    unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout) {
        self.inner.dealloc(ptr, layout);
        self.remaining += layout.size();
    }

    unsafe fn realloc(
        &mut self,
        ptr: NonNull<u8>,
        layout: Layout,
        new_size: usize,
    ) -> Result<NonNull<u8>, Error> {
        let extra = new_size.saturating_sub(layout.size());
        ensure!(
            extra <= self.remaining,
            BudgetExceeded {
                requested: extra,
                remaining: self.remaining,
            }
        );
        let ptr = self.inner.realloc(ptr, layout, new_size)?;
        self.remaining = self.remaining + layout.size() - new_size;
        Ok(ptr)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counting_tracks_blocks() {
        let mut a = Counting::new(Global);
        assert!(a.stats().is_untouched());

        let ptr = a.alloc_array::<u64>(4).unwrap();
        assert_eq!(a.stats().live_blocks(), 1);
        assert_eq!(a.stats().live_bytes, 32);

        let ptr = unsafe { a.realloc_array(ptr, 4, 8) }.unwrap();
        assert_eq!(a.stats().live_bytes, 64);
        assert_eq!(a.stats().reallocations, 1);

        unsafe { a.dealloc_array(ptr, 8) };
        let stats = a.stats();
        assert_eq!(stats.live_blocks(), 0);
        assert_eq!(stats.live_bytes, 0);
        assert_eq!(stats.peak_bytes, 64);
    }

    #[test]
    fn realloc_keeps_contents() {
        let mut a = System::default();
        let ptr = a.alloc_array::<u32>(3).unwrap();
        unsafe {
            for i in 0..3 {
                ptr.as_ptr().add(i).write(i as u32 + 10);
            }
            let ptr = a.realloc_array(ptr, 3, 100).unwrap();
            let contents: std::vec::Vec<u32> = (0..3).map(|i| ptr.as_ptr().add(i).read()).collect();
            assert_eq!(contents, [10, 11, 12]);
            a.dealloc_array(ptr, 100);
        }
    }

    #[test]
    fn budget_refuses_overdraft() {
        let mut a = Budget::new(Global, 16);
        let ptr = a.alloc_array::<u32>(4).unwrap();
        assert_eq!(a.remaining(), 0);

        match a.alloc_array::<u8>(1) {
            Err(Error::BudgetExceeded {
                requested: 1,
                remaining: 0,
            }) => {}
            other => panic!("Unexpected result: {:?}", other),
        }
        assert!(unsafe { a.realloc_array(ptr, 4, 5) }.is_err());

        unsafe { a.dealloc_array(ptr, 4) };
        assert_eq!(a.remaining(), 16);
    }

    #[test]
    fn noop_refuses_everything() {
        assert!(NoOp.alloc_array::<u8>(1).is_err());
    }

    #[test]
    fn empty_arrays_are_refused() {
        assert!(Global.alloc_array::<u8>(0).is_err());
    }
}
