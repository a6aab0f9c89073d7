//! Node storage.
//!
//! Nodes live in a slab of slots addressed by 32-bit links. Vacant slots form an intrusive free
//! list, so a removal followed by an insertion reuses the slot without touching the allocator.

use crate::{
    alloc::Alloc,
    raw_vec::{self, RawVec},
};
use core::{fmt, mem, ptr, slice};
use snafu::ensure;

/// Index of a node in the slab.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link(u32);

impl Link {
    /// Terminates chains and the free list.
    pub const NIL: Link = Link(u32::MAX);

    pub fn from_index(index: usize) -> Link {
        debug_assert!(index < u32::MAX as usize);
        Link(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_nil(self) -> bool {
        self == Link::NIL
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            f.write_str("NIL")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

pub(crate) struct Node<K, V> {
    /// Next node of the same bucket.
    pub next: Link,
    pub key: K,
    pub value: V,
}

pub(crate) enum Slot<K, V> {
    Occupied(Node<K, V>),
    /// Holds the next free slot.
    Vacant(Link),
}

pub(crate) struct NodeSlab<K, V> {
    buf: RawVec<Slot<K, V>>,

    // Slots below this mark are initialized.
    initialized: u32,

    // Head of the free list.
    free: Link,
}

impl<K, V> NodeSlab<K, V> {
    pub const fn new() -> Self {
        NodeSlab {
            buf: RawVec::new(),
            initialized: 0,
            free: Link::NIL,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Initialized slots, occupied or not.
    pub fn slots(&self) -> &[Slot<K, V>] {
        unsafe { slice::from_raw_parts(self.buf.as_ptr(), self.initialized as usize) }
    }

    pub fn slots_mut(&mut self) -> &mut [Slot<K, V>] {
        unsafe { slice::from_raw_parts_mut(self.buf.as_ptr(), self.initialized as usize) }
    }

    pub fn as_mut_ptr(&mut self) -> *mut Slot<K, V> {
        self.buf.as_ptr()
    }

    pub fn node(&self, link: Link) -> &Node<K, V> {
        match &self.slots()[link.index()] {
            Slot::Occupied(node) => node,
            Slot::Vacant(_) => unreachable!("Link {:?} points to a vacant slot", link),
        }
    }

    pub fn node_mut(&mut self, link: Link) -> &mut Node<K, V> {
        match &mut self.slots_mut()[link.index()] {
            Slot::Occupied(node) => node,
            Slot::Vacant(_) => unreachable!("Link {:?} points to a vacant slot", link),
        }
    }

    /// Stores a node.
    ///
    /// Panics if there is neither a free slot nor spare capacity: callers reserve first.
    pub fn insert(&mut self, node: Node<K, V>) -> Link {
        if !self.free.is_nil() {
            let link = self.free;
            let slot = &mut self.slots_mut()[link.index()];
            let next = match slot {
                Slot::Vacant(next) => *next,
                Slot::Occupied(_) => unreachable!("Free list reached an occupied slot {:?}", link),
            };
            *slot = Slot::Occupied(node);
            self.free = next;
            return link;
        }

        let index = self.initialized as usize;
        assert!(index < self.capacity(), "Node slab is full");
        unsafe { ptr::write(self.buf.as_ptr().add(index), Slot::Occupied(node)) };
        self.initialized += 1;
        Link::from_index(index)
    }

    /// Takes a node out, leaving its slot on the free list.
    pub fn remove(&mut self, link: Link) -> Node<K, V> {
        let free = self.free;
        match mem::replace(&mut self.slots_mut()[link.index()], Slot::Vacant(free)) {
            Slot::Occupied(node) => {
                self.free = link;
                node
            }
            Slot::Vacant(_) => unreachable!("Link {:?} points to a vacant slot", link),
        }
    }

    /// Grows the slab to exactly `capacity` slots, moving the nodes bitwise.
    pub fn reserve<A: Alloc>(&mut self, capacity: usize, a: &mut A) -> Result<(), raw_vec::Error> {
        ensure!(capacity <= u32::MAX as usize, raw_vec::CapacityOverflow);
        self.buf.grow_exact(capacity, a)
    }

    /// Drops every node and releases the storage.
    ///
    /// # Safety
    ///
    /// The storage must have been allocated by `a`.
    pub unsafe fn destroy<A: Alloc>(&mut self, a: &mut A) {
        let initialized: *mut [Slot<K, V>] = self.slots_mut();
        self.initialized = 0;
        self.free = Link::NIL;
        ptr::drop_in_place(initialized);
        self.buf.dealloc_buffer(a);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alloc::{Counting, Global, NoOp};
    use std::rc::Rc;

    fn node<V>(value: V) -> Node<u32, V> {
        Node {
            next: Link::NIL,
            key: 0,
            value,
        }
    }

    #[test]
    fn links() {
        assert!(Link::NIL.is_nil());
        assert!(!Link::from_index(0).is_nil());
        assert_eq!(Link::from_index(12).index(), 12);
        assert_eq!(format!("{:?} {:?}", Link::NIL, Link::from_index(3)), "NIL #3");
    }

    #[test]
    fn free_list_reuses_slots() {
        let mut a = Global;
        let mut slab = NodeSlab::new();
        slab.reserve(4, &mut a).unwrap();

        let first = slab.insert(node('a'));
        let second = slab.insert(node('b'));
        let third = slab.insert(node('c'));
        assert_eq!(slab.slots().len(), 3);

        assert_eq!(slab.remove(second).value, 'b');
        assert_eq!(slab.remove(first).value, 'a');

        // Most recently freed first.
        assert_eq!(slab.insert(node('d')), first);
        assert_eq!(slab.insert(node('e')), second);
        assert_eq!(slab.slots().len(), 3);

        assert_eq!(slab.node(third).value, 'c');
        slab.node_mut(second).value = 'f';
        assert_eq!(slab.node(second).value, 'f');

        unsafe { slab.destroy(&mut a) };
        assert_eq!(slab.capacity(), 0);
    }

    #[test]
    fn grows_in_place() {
        let mut a = Counting::new(Global);
        let mut slab = NodeSlab::new();
        slab.reserve(2, &mut a).unwrap();
        let link = slab.insert(node(String::from("moved")));
        slab.reserve(20, &mut a).unwrap();
        assert_eq!(slab.capacity(), 20);
        assert_eq!(slab.node(link).value, "moved");

        unsafe { slab.destroy(&mut a) };
        assert_eq!(a.stats().live_bytes, 0);
        assert_eq!(a.stats().live_blocks(), 0);
    }

    #[test]
    fn drops_each_node_once() {
        let value = Rc::new(());
        let mut a = Global;
        let mut slab = NodeSlab::new();
        slab.reserve(8, &mut a).unwrap();
        let links: Vec<_> = (0..8).map(|_| slab.insert(node(value.clone()))).collect();
        assert_eq!(Rc::strong_count(&value), 9);

        drop(slab.remove(links[3]));
        drop(slab.remove(links[5]));
        assert_eq!(Rc::strong_count(&value), 7);

        unsafe { slab.destroy(&mut a) };
        assert_eq!(Rc::strong_count(&value), 1);
    }

    #[test]
    #[should_panic(expected = "Node slab is full")]
    fn full_slab() {
        let mut slab = NodeSlab::<u32, u32>::new();
        slab.insert(node(1));
    }

    #[test]
    fn failed_reserve() {
        let mut slab = NodeSlab::<u32, u32>::new();
        assert!(slab.reserve(4, &mut NoOp).is_err());
        assert_eq!(slab.capacity(), 0);
    }
}
