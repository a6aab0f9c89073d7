//! Traversal of a table.
//!
//! Entries are visited bucket by bucket, and within a bucket from the chain head to its tail.
//! The order has no meaning and changes whenever the table grows.

use super::HashTable;
use crate::{
    alloc::Alloc,
    node::{Link, Node, Slot},
};
use core::{fmt, iter::FusedIterator, marker::PhantomData};

/// Position in a table: a bucket and a node of its chain.
struct RawCursor<K, V> {
    heads: *const Link,
    buckets: usize,
    slots: *mut Slot<K, V>,
    bucket: usize,
    link: Link,
}

impl<K, V> Clone for RawCursor<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for RawCursor<K, V> {}

impl<K, V> RawCursor<K, V> {
    fn end() -> Self {
        RawCursor {
            heads: core::ptr::null(),
            buckets: 0,
            slots: core::ptr::null_mut(),
            bucket: 0,
            link: Link::NIL,
        }
    }

    fn begin(heads: &[Link], slots: *mut Slot<K, V>) -> Self {
        let mut cursor = RawCursor {
            heads: heads.as_ptr(),
            buckets: heads.len(),
            slots,
            bucket: 0,
            link: Link::NIL,
        };
        cursor.seek(0);
        cursor
    }

    fn is_end(&self) -> bool {
        self.link.is_nil()
    }

    fn current(&self) -> Option<Link> {
        if self.is_end() {
            None
        } else {
            Some(self.link)
        }
    }

    /// Points at the first node of the first non-empty bucket at or after `bucket`.
    ///
    /// An exhausted cursor keeps its storage pointers: `IterMut` still reads the node it just
    /// stepped past.
    fn seek(&mut self, bucket: usize) {
        for b in bucket..self.buckets {
            let head = unsafe { *self.heads.add(b) };
            if !head.is_nil() {
                self.bucket = b;
                self.link = head;
                return;
            }
        }
        self.bucket = self.buckets;
        self.link = Link::NIL;
    }

    unsafe fn node_at<'n>(&self, link: Link) -> &'n Node<K, V> {
        match &*self.slots.add(link.index()) {
            Slot::Occupied(node) => node,
            Slot::Vacant(_) => unreachable!("Cursor at a vacant slot {:?}", link),
        }
    }

    unsafe fn node_at_mut<'n>(&self, link: Link) -> &'n mut Node<K, V> {
        match &mut *self.slots.add(link.index()) {
            Slot::Occupied(node) => node,
            Slot::Vacant(_) => unreachable!("Cursor at a vacant slot {:?}", link),
        }
    }

    fn advance(&mut self) {
        if let Some(link) = self.current() {
            let next = unsafe { self.node_at(link).next };
            if next.is_nil() {
                self.seek(self.bucket + 1);
            } else {
                self.link = next;
            }
        }
    }
}

/// A position in a table that can be moved forward.
///
/// ```
/// use alloc_hashtable::{table::Cursor, HashTable};
///
/// let mut table = HashTable::new();
/// table.insert(1, "one").unwrap();
///
/// let mut cursor = table.cursor();
/// assert_eq!(cursor.key(), Some(&1));
/// cursor.advance();
/// assert!(cursor.is_end());
/// assert_eq!(cursor, Cursor::end());
/// ```
pub struct Cursor<'a, K, V> {
    raw: RawCursor<K, V>,
    marker: PhantomData<&'a Node<K, V>>,
}

impl<'a, K, V> Cursor<'a, K, V> {
    pub(super) fn new<H, A: Alloc, P>(table: &'a HashTable<K, V, H, A, P>) -> Self {
        let slots = table.nodes.slots().as_ptr() as *mut Slot<K, V>;
        Cursor {
            raw: RawCursor::begin(table.buckets.heads(), slots),
            marker: PhantomData,
        }
    }

    /// The position past the last entry of any table.
    pub fn end() -> Self {
        Cursor {
            raw: RawCursor::end(),
            marker: PhantomData,
        }
    }

    pub fn is_end(&self) -> bool {
        self.raw.is_end()
    }

    pub fn key(&self) -> Option<&'a K> {
        self.entry().map(|(key, _)| key)
    }

    pub fn value(&self) -> Option<&'a V> {
        self.entry().map(|(_, value)| value)
    }

    /// Moves to the next entry. Does nothing at the end.
    pub fn advance(&mut self) {
        self.raw.advance()
    }

    fn entry(&self) -> Option<(&'a K, &'a V)> {
        let node: &'a Node<K, V> = unsafe { self.raw.node_at(self.raw.current()?) };
        Some((&node.key, &node.value))
    }
}

impl<K, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Cursor<'_, K, V> {}

impl<K, V> PartialEq for Cursor<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_end(), other.is_end()) {
            (true, true) => true,
            (false, false) => {
                self.raw.heads == other.raw.heads
                    && self.raw.bucket == other.raw.bucket
                    && self.raw.link == other.raw.link
            }
            _ => false,
        }
    }
}

impl<K, V> Eq for Cursor<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entry() {
            Some((key, value)) => f
                .debug_struct("Cursor")
                .field("bucket", &self.raw.bucket)
                .field("key", key)
                .field("value", value)
                .finish(),
            None => f.write_str("Cursor(end)"),
        }
    }
}

/// An iterator over the entries of a table.
pub struct Iter<'a, K, V> {
    cursor: Cursor<'a, K, V>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(super) fn new<H, A: Alloc, P>(table: &'a HashTable<K, V, H, A, P>) -> Self {
        Iter {
            cursor: Cursor::new(table),
            remaining: table.len(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.cursor.entry()?;
        self.cursor.advance();
        self.remaining -= 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            cursor: self.cursor,
            remaining: self.remaining,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

/// An iterator over the entries of a table, with mutable values.
pub struct IterMut<'a, K, V> {
    raw: RawCursor<K, V>,
    remaining: usize,
    marker: PhantomData<&'a mut Node<K, V>>,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(super) fn new<H, A: Alloc, P>(table: &'a mut HashTable<K, V, H, A, P>) -> Self {
        let slots = table.nodes.as_mut_ptr();
        let raw = RawCursor::begin(table.buckets.heads(), slots);
        IterMut {
            raw,
            remaining: table.len(),
            marker: PhantomData,
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let link = self.raw.current()?;
        // Step past the node before lending it out.
        self.raw.advance();
        self.remaining -= 1;
        let node: &'a mut Node<K, V> = unsafe { self.raw.node_at_mut(link) };
        Some((&node.key, &mut node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a table.
pub struct Keys<'a, K, V> {
    pub(super) iter: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    iterator_methods!(|(key, _)| key);
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// An iterator over the values of a table.
pub struct Values<'a, K, V> {
    pub(super) iter: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    iterator_methods!(|(_, value)| value);
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

impl<K, V> FusedIterator for Values<'_, K, V> {}

/// A mutable iterator over the values of a table.
pub struct ValuesMut<'a, K, V> {
    pub(super) iter: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    iterator_methods!(|(_, value)| value);
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

impl<'a, K, V, H, A: Alloc, P> IntoIterator for &'a HashTable<K, V, H, A, P> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, H, A: Alloc, P> IntoIterator for &'a mut HashTable<K, V, H, A, P> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::key::SmallPrimitiveKey;
    use std::collections::HashSet;

    type Table = HashTable<u32, u32, SmallPrimitiveKey>;

    fn filled(n: u32) -> Table {
        let mut table = Table::new_in(Default::default());
        for i in 0..n {
            table.insert(i * 7, i).unwrap();
        }
        table
    }

    #[test]
    fn empty() {
        let table = Table::new_in(Default::default());
        assert!(table.cursor().is_end());
        assert_eq!(table.cursor(), Cursor::end());
        assert_eq!(table.iter().next(), None);
        assert_eq!(table.keys().count(), 0);
    }

    #[test]
    fn visits_everything_once() {
        let table = filled(100);
        let keys: HashSet<u32> = table.keys().copied().collect();
        assert_eq!(keys, (0..100).map(|i| i * 7).collect());
        assert_eq!(table.keys().len(), 100);
        assert_eq!(table.values().copied().sum::<u32>(), (0..100).sum());
        for (key, value) in &table {
            assert_eq!(*key, value * 7);
        }
    }

    #[test]
    fn bucket_order() {
        let table = filled(40);
        let info = table.buckets.info().unwrap();
        let buckets: Vec<u32> = table
            .keys()
            .map(|key| info.magic_rem(*key))
            .collect();
        assert!(buckets.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn cursor_walk() {
        let table = filled(12);
        let mut cursor = table.cursor();
        let mut seen = 0;
        while !cursor.is_end() {
            let key = cursor.key().unwrap();
            assert_eq!(table.get(key), cursor.value());
            cursor.advance();
            seen += 1;
        }
        assert_eq!(seen, 12);
        assert_eq!(cursor, Cursor::end());
        cursor.advance();
        assert!(cursor.is_end());
        assert_eq!(cursor.key(), None);
    }

    #[test]
    fn cursors_compare_by_position() {
        let table = filled(3);
        let first = table.cursor();
        let mut second = table.cursor();
        assert_eq!(first, second);
        second.advance();
        assert_ne!(first, second);
        assert_eq!(format!("{:?}", Cursor::<u32, u32>::end()), "Cursor(end)");
    }

    #[test]
    fn mutate_values() {
        let mut table = filled(50);
        for value in table.values_mut() {
            *value += 1000;
        }
        for (key, value) in &mut table {
            assert_eq!(*value - 1000, key / 7);
            *value -= 1000;
        }
        assert_eq!(table.get(&49), Some(&7));
    }

    #[test]
    fn mutate_single_entry() {
        let mut table = Table::new_in(Default::default());
        table.insert(3, 1).unwrap();
        for value in table.values_mut() {
            *value += 1;
        }
        assert_eq!(table[&3], 2);

        let mut iter = table.iter_mut();
        let (key, value) = iter.next().unwrap();
        *value *= 10;
        assert_eq!(*key, 3);
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
        assert_eq!(table[&3], 20);
    }

    #[test]
    fn mutate_last_of_many_buckets() {
        let mut table = filled(40);
        let mut visited = 0;
        for (key, value) in table.iter_mut() {
            *value = *key + 1;
            visited += 1;
        }
        assert_eq!(visited, 40);
        assert!(table.iter().all(|(key, value)| *value == *key + 1));
    }

    #[test]
    fn fused() {
        let table = filled(2);
        let mut iter = table.iter();
        assert_eq!(iter.len(), 2);
        iter.next();
        iter.next();
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
        assert_eq!(iter.len(), 0);
    }

    #[test]
    fn after_removal() {
        let mut table = filled(30);
        for i in (0..30).step_by(2) {
            assert!(table.remove(&(i * 7)));
        }
        let mut values: Vec<u32> = table.values().copied().collect();
        values.sort();
        assert_eq!(values, (0..30).filter(|i| i % 2 == 1).collect::<Vec<_>>());
    }
}
