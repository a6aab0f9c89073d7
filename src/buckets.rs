use crate::{
    alloc::Alloc,
    node::Link,
    prime::PrimeInfo,
    raw_vec::{self, RawVec},
};
use core::slice;

/// Chain heads, one per bucket.
pub(crate) struct BucketArray {
    heads: RawVec<Link>,
    info: Option<PrimeInfo>,
}

impl BucketArray {
    pub const fn unallocated() -> Self {
        BucketArray {
            heads: RawVec::new(),
            info: None,
        }
    }

    /// Allocates `info.prime()` empty buckets.
    pub fn allocate_in<A: Alloc>(info: PrimeInfo, a: &mut A) -> Result<Self, raw_vec::Error> {
        let heads = RawVec::<Link>::with_capacity_in(info.prime() as usize, a)?;
        // The allocator owes us nothing but raw storage.
        for i in 0..heads.capacity() {
            unsafe { heads.as_ptr().add(i).write(Link::NIL) };
        }
        Ok(BucketArray {
            heads,
            info: Some(info),
        })
    }

    pub fn len(&self) -> usize {
        self.heads.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_none()
    }

    #[cfg(test)]
    pub fn info(&self) -> Option<PrimeInfo> {
        self.info
    }

    /// The bucket `hash` belongs to. Must not be called while unallocated.
    #[inline]
    pub fn index_for(&self, hash: u32) -> usize {
        match self.info {
            Some(info) => info.magic_rem(hash) as usize,
            None => unreachable!("Bucket lookup in an unallocated table"),
        }
    }

    pub fn heads(&self) -> &[Link] {
        unsafe { slice::from_raw_parts(self.heads.as_ptr(), self.len()) }
    }

    pub fn heads_mut(&mut self) -> &mut [Link] {
        unsafe { slice::from_raw_parts_mut(self.heads.as_ptr(), self.len()) }
    }

    /// # Safety
    ///
    /// The array must have been allocated by `a`.
    pub unsafe fn destroy<A: Alloc>(&mut self, a: &mut A) {
        self.heads.dealloc_buffer(a);
        self.info = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        alloc::{Counting, Global},
        prime::PRIMES,
    };

    #[test]
    fn unallocated() {
        let buckets = BucketArray::unallocated();
        assert!(buckets.is_empty());
        assert_eq!(buckets.len(), 0);
        assert!(buckets.heads().is_empty());
    }

    #[test]
    fn starts_empty() {
        let mut a = Counting::new(Global);
        let mut buckets = BucketArray::allocate_in(PRIMES[1], &mut a).unwrap();
        assert_eq!(buckets.len(), 17);
        assert!(buckets.heads().iter().all(|head| head.is_nil()));
        assert_eq!(buckets.index_for(35), 1);
        assert_eq!(buckets.info(), Some(PRIMES[1]));

        buckets.heads_mut()[1] = Link::from_index(0);
        assert_eq!(buckets.heads()[1], Link::from_index(0));

        unsafe { buckets.destroy(&mut a) };
        assert!(buckets.is_empty());
        assert_eq!(a.stats().live_bytes, 0);
    }
}
