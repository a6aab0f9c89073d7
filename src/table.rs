//! Chained hash table.

use crate::{
    alloc::{Alloc, Global},
    buckets::BucketArray,
    key::{HashEq, KeyAdapter},
    node::{Link, Node, NodeSlab, Slot},
    policy::{self, DefaultPolicy, GrowthPolicy},
    prime::{self, PrimeInfo},
    raw_vec,
};
use core::{
    cmp, fmt,
    hash::Hash,
    marker::PhantomData,
    mem,
    ops::{Index, IndexMut},
};

#[macro_use]
mod macros;
pub mod iter;

pub use iter::{Cursor, Iter, IterMut, Keys, Values, ValuesMut};

/// Whether [`HashTable::set`] may replace the value of a present key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    /// The key is known to be absent. Setting a present key is a bug, caught by debug builds.
    /// Release builds overwrite.
    NoOverwrite,
    Overwrite,
}

/// A hash table with separate chaining.
///
/// The number of buckets is always one of the tabulated primes, and the table grows before an
/// insertion would push the number of entries past the density allowed by the policy `P`.
/// Hashing and equality come from the key adapter `H`; all memory comes from the allocator `A`.
///
/// A fresh table allocates nothing.
pub struct HashTable<K, V, H = HashEq, A: Alloc = Global, P = DefaultPolicy> {
    buckets: BucketArray,
    nodes: NodeSlab<K, V>,
    len: u32,

    // Entries allowed before the next growth.
    table_max: u32,

    alloc: A,
    _policy: PhantomData<(fn() -> H, fn() -> P)>,
}

unsafe impl<K: Send, V: Send, H, A: Alloc + Send, P> Send for HashTable<K, V, H, A, P> {}
unsafe impl<K: Sync, V: Sync, H, A: Alloc + Sync, P> Sync for HashTable<K, V, H, A, P> {}

impl<K: Hash + Eq, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V> HashTable<K, V> {
    /// Creates an empty table on the global allocator.
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates a table that holds `capacity` entries without growing.
    pub fn with_capacity(capacity: usize) -> Result<Self, raw_vec::Error> {
        Self::with_capacity_in(capacity, Global)
    }

    /// Tries to construct a table from a given iterator.
    pub fn try_from_iter<I>(i: I) -> Result<Self, raw_vec::Error>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        Self::try_from_iter_in(i, Global)
    }
}

impl<K, V, H, A: Alloc, P> HashTable<K, V, H, A, P> {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets, zero while nothing is allocated.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of entries the table holds before it grows.
    pub fn table_max(&self) -> usize {
        self.table_max as usize
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.alloc
    }

    /// Drops all the entries and releases the memory. The table is as good as new afterwards.
    pub fn clear(&mut self) {
        if self.buckets.is_empty() && self.nodes.capacity() == 0 {
            return;
        }
        log::trace!(
            "Clearing {} entries from {} buckets",
            self.len,
            self.buckets.len()
        );
        self.len = 0;
        self.table_max = 0;
        unsafe {
            self.nodes.destroy(&mut self.alloc);
            self.buckets.destroy(&mut self.alloc);
        }
    }

    /// Returns iterator over the entries.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self)
    }

    /// Returns iterator over the entries with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(self)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { iter: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { iter: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            iter: self.iter_mut(),
        }
    }

    /// A cursor at the first entry, or the end cursor if the table is empty.
    pub fn cursor(&self) -> Cursor<'_, K, V> {
        Cursor::new(self)
    }
}

impl<K, V, H, A, P> HashTable<K, V, H, A, P>
where
    H: KeyAdapter<K>,
    A: Alloc,
    P: GrowthPolicy,
{
    /// Creates an empty table on a given allocator.
    ///
    /// # Panics
    ///
    /// Panics if the constants of `P` are inconsistent.
    pub fn new_in(alloc: A) -> Self {
        match Self::try_new_in(alloc) {
            Ok(table) => table,
            Err(e) => panic!("Invalid growth policy: {}", e),
        }
    }

    /// Creates an empty table on a given allocator, checking the policy first.
    pub fn try_new_in(alloc: A) -> Result<Self, policy::Error> {
        policy::validate::<P>()?;
        Ok(HashTable {
            buckets: BucketArray::unallocated(),
            nodes: NodeSlab::new(),
            len: 0,
            table_max: 0,
            alloc,
            _policy: PhantomData,
        })
    }

    /// Creates a table that holds `capacity` entries without growing.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Result<Self, raw_vec::Error> {
        let mut table = Self::new_in(alloc);
        table.reserve(capacity)?;
        Ok(table)
    }

    /// Tries to construct a table from a given iterator.
    pub fn try_from_iter_in<I>(i: I, alloc: A) -> Result<Self, raw_vec::Error>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut table = Self::new_in(alloc);
        table.try_extend(i)?;
        Ok(table)
    }

    /// Tries to extend the table with a given iterator. Later pairs overwrite earlier ones.
    pub fn try_extend<I>(&mut self, i: I) -> Result<(), raw_vec::Error>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let iter = i.into_iter();
        self.reserve(iter.size_hint().0)?;
        for (key, value) in iter {
            self.insert(key, value)?;
        }
        Ok(())
    }

    fn find(&self, key: &K, hash: u32) -> Option<Link> {
        if self.buckets.is_empty() {
            return None;
        }
        let mut link = self.buckets.heads()[self.buckets.index_for(hash)];
        while !link.is_nil() {
            let node = self.nodes.node(link);
            if H::equals(&node.key, key) {
                return Some(link);
            }
            link = node.next;
        }
        None
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let link = self.find(key, H::hash_code(key))?;
        Some(&self.nodes.node(link).value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let link = self.find(key, H::hash_code(key))?;
        Some(&mut self.nodes.node_mut(link).value)
    }

    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let link = self.find(key, H::hash_code(key))?;
        let node = self.nodes.node(link);
        Some((&node.key, &node.value))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key, H::hash_code(key)).is_some()
    }

    /// Puts a new node at the head of `bucket`. The caller has made room for it.
    fn link_new(&mut self, bucket: usize, key: K, value: V) -> Link {
        let next = self.buckets.heads()[bucket];
        let link = self.nodes.insert(Node { next, key, value });
        self.buckets.heads_mut()[bucket] = link;
        self.len += 1;
        link
    }

    /// Returns the value of `key`, inserting `default` first if the key is absent.
    pub fn get_or_insert(&mut self, key: K, default: V) -> Result<&mut V, raw_vec::Error> {
        self.check_growth()?;
        let hash = H::hash_code(&key);
        let link = match self.find(&key, hash) {
            Some(link) => link,
            None => {
                let bucket = self.buckets.index_for(hash);
                self.link_new(bucket, key, default)
            }
        };
        Ok(&mut self.nodes.node_mut(link).value)
    }

    /// Stores `value` under `key`. Returns whether a present value was overwritten.
    ///
    /// With [`SetKind::NoOverwrite`] the key must be absent, which is only checked in debug
    /// builds. Release builds overwrite.
    pub fn set(&mut self, key: K, value: V, kind: SetKind) -> Result<bool, raw_vec::Error> {
        self.check_growth()?;
        let hash = H::hash_code(&key);
        match self.find(&key, hash) {
            Some(link) => {
                debug_assert!(
                    kind == SetKind::Overwrite,
                    "Key is already present in the table"
                );
                self.nodes.node_mut(link).value = value;
                Ok(true)
            }
            None => {
                let bucket = self.buckets.index_for(hash);
                self.link_new(bucket, key, value);
                Ok(false)
            }
        }
    }

    /// Stores `value` under `key`, returning the value it replaces.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, raw_vec::Error> {
        self.check_growth()?;
        let hash = H::hash_code(&key);
        match self.find(&key, hash) {
            Some(link) => Ok(Some(mem::replace(
                &mut self.nodes.node_mut(link).value,
                value,
            ))),
            None => {
                let bucket = self.buckets.index_for(hash);
                self.link_new(bucket, key, value);
                Ok(None)
            }
        }
    }

    /// Returns the value of `key`. If the key is absent, the value is built by `factory`, which
    /// gets the table's allocator.
    pub fn emplace<F>(&mut self, key: K, factory: F) -> Result<&mut V, raw_vec::Error>
    where
        F: FnOnce(&mut A) -> V,
    {
        self.check_growth()?;
        let hash = H::hash_code(&key);
        let link = match self.find(&key, hash) {
            Some(link) => link,
            None => {
                let value = factory(&mut self.alloc);
                let bucket = self.buckets.index_for(hash);
                self.link_new(bucket, key, value)
            }
        };
        Ok(&mut self.nodes.node_mut(link).value)
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Removes `key`, handing back the stored pair.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        if self.buckets.is_empty() {
            return None;
        }
        let bucket = self.buckets.index_for(H::hash_code(key));
        let mut prev = Link::NIL;
        let mut link = self.buckets.heads()[bucket];
        while !link.is_nil() {
            let node = self.nodes.node(link);
            let next = node.next;
            if H::equals(&node.key, key) {
                if prev.is_nil() {
                    self.buckets.heads_mut()[bucket] = next;
                } else {
                    self.nodes.node_mut(prev).next = next;
                }
                let Node { key, value, .. } = self.nodes.remove(link);
                self.len -= 1;
                return Some((key, value));
            }
            prev = link;
            link = next;
        }
        None
    }

    /// Makes sure `additional` more entries fit without growing.
    ///
    /// Asking for more than the largest tabulated prime can hold invokes the overflow hook of `P`.
    pub fn reserve(&mut self, additional: usize) -> Result<(), raw_vec::Error> {
        let required = u64::from(self.len).saturating_add(additional as u64);
        if required <= u64::from(self.table_max) {
            return Ok(());
        }
        let target = required.saturating_mul(u64::from(P::DENSITY_DENOMINATOR))
            / u64::from(P::DENSITY_NUMERATOR);
        self.resize(target, required)
    }

    /// Moves the entries to the first tabulated number of buckets not below `target_buckets`
    /// that holds them within the density bound. The table never shrinks.
    pub fn reallocate(&mut self, target_buckets: usize) -> Result<(), raw_vec::Error> {
        self.resize(target_buckets as u64, u64::from(self.len))
    }

    fn check_growth(&mut self) -> Result<(), raw_vec::Error> {
        if self.len < self.table_max {
            return Ok(());
        }
        let target = P::grow(self.len);
        log::trace!(
            "{} entries reached the limit of {} buckets, growing to at least {}",
            self.len,
            self.buckets.len(),
            target
        );
        self.resize(u64::from(target), u64::from(self.len) + 1)
    }

    /// The first prime not below `target` whose buckets hold `required` entries.
    fn select_prime(target: u64, required: u64) -> PrimeInfo {
        let mut candidate = target;
        loop {
            let info = prime::next_prime_at_least::<P>(candidate);
            if u64::from(P::table_max(info.prime())) >= required {
                return info;
            }
            candidate = u64::from(info.prime()) + 1;
        }
    }

    fn resize(&mut self, target: u64, required: u64) -> Result<(), raw_vec::Error> {
        let current = self.buckets.len();
        let info = Self::select_prime(cmp::max(target, current as u64), required);
        if info.prime() as usize == current {
            return Ok(());
        }

        let mut buckets = BucketArray::allocate_in(info, &mut self.alloc)?;
        let table_max = P::table_max(info.prime());
        if let Err(e) = self.nodes.reserve(table_max as usize, &mut self.alloc) {
            unsafe { buckets.destroy(&mut self.alloc) };
            return Err(e);
        }

        let heads = buckets.heads_mut();
        for (index, slot) in self.nodes.slots_mut().iter_mut().enumerate() {
            if let Slot::Occupied(node) = slot {
                let bucket = info.magic_rem(H::hash_code(&node.key)) as usize;
                node.next = heads[bucket];
                heads[bucket] = Link::from_index(index);
            }
        }

        let mut old = mem::replace(&mut self.buckets, buckets);
        unsafe { old.destroy(&mut self.alloc) };
        self.table_max = table_max;
        log::debug!(
            "Reallocated hash table from {} to {} buckets, relinked {} nodes",
            current,
            info.prime(),
            self.len
        );
        Ok(())
    }

    /// Clones the table into a given allocator.
    pub fn try_clone_in<B: Alloc>(
        &self,
        alloc: B,
    ) -> Result<HashTable<K, V, H, B, P>, raw_vec::Error>
    where
        K: Clone,
        V: Clone,
    {
        let mut table = HashTable::new_in(alloc);
        table.reserve(self.len())?;
        for (key, value) in self.iter() {
            let hash = H::hash_code(key);
            let bucket = table.buckets.index_for(hash);
            table.link_new(bucket, key.clone(), value.clone());
        }
        Ok(table)
    }

    pub fn try_clone(&self) -> Result<Self, raw_vec::Error>
    where
        K: Clone,
        V: Clone,
        A: Clone,
    {
        self.try_clone_in(self.alloc.clone())
    }
}

impl<K, V, H, A: Alloc, P> Drop for HashTable<K, V, H, A, P> {
    fn drop(&mut self) {
        self.clear()
    }
}

impl<K, V, H, A, P> Index<&K> for HashTable<K, V, H, A, P>
where
    H: KeyAdapter<K>,
    A: Alloc,
    P: GrowthPolicy,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &K) -> &V {
        self.get(key).expect("Key is not present in the table")
    }
}

impl<K, V, H, A, P> IndexMut<&K> for HashTable<K, V, H, A, P>
where
    H: KeyAdapter<K>,
    A: Alloc,
    P: GrowthPolicy,
{
    fn index_mut(&mut self, key: &K) -> &mut V {
        self.get_mut(key).expect("Key is not present in the table")
    }
}

impl<K: fmt::Debug, V: fmt::Debug, H, A: Alloc, P> fmt::Debug for HashTable<K, V, H, A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
