//! A chained hash table that takes its memory from a custom allocator.
//!
//! ```
//! use alloc_hashtable::{alloc::Counting, HashTable, SmallPrimitiveKey};
//!
//! let alloc = Counting::default();
//! let mut table = HashTable::<u32, &str, SmallPrimitiveKey, Counting>::new_in(alloc);
//! assert!(table.allocator().stats().is_untouched());
//!
//! table.insert(1, "one").unwrap();
//! assert_eq!(table.get(&1), Some(&"one"));
//!
//! table.clear();
//! assert_eq!(table.allocator().stats().live_bytes, 0);
//! ```

pub mod alloc;
mod buckets;
pub mod key;
mod node;
pub mod policy;
pub mod prime;
pub mod raw_vec;
pub mod table;

pub use alloc::Alloc;
pub use key::{HashEq, KeyAdapter, LargePrimitiveKey, PtrKey, SmallPrimitiveKey};
pub use policy::{DefaultPolicy, GrowthPolicy};
pub use prime::PrimeInfo;
pub use table::{HashTable, SetKind};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_works() {
        let alloc = crate::alloc::System::default();
        let mut table = HashTable::<&str, u32, HashEq, _>::new_in(alloc);
        table.set("Wow!", 1, SetKind::NoOverwrite).unwrap();
        assert_eq!(table[&"Wow!"], 1);
        assert!(table.remove(&"Wow!"));
        assert!(table.is_empty());
    }
}
