#[macro_export(local_inner_macros)]
/// Create a `HashTable` from a list of key-value pairs
///
/// ## Example
///
/// ```
/// use alloc_hashtable::hash_table;
/// # fn main() {
///
/// let table = hash_table!{
///     "a" => 1,
///     "b" => 2,
/// }.unwrap();
/// assert_eq!(table[&"a"], 1);
/// assert_eq!(table[&"b"], 2);
/// assert_eq!(table.get(&"c"), None);
/// assert_eq!(table.len(), 2);
/// # }
/// ```
macro_rules! hash_table {
    (@single $($x:tt)*) => (());
    (@count $($rest:expr),*) => (<[()]>::len(&[$(hash_table!(@single $rest)),*]));

    ($($key:expr => $value:expr,)+) => { hash_table!($($key => $value),+) };
    ($($key:expr => $value:expr),*) => {
        {
            let init = || -> Result<_, $crate::raw_vec::Error> {
                let cap = hash_table!(@count $($key),*);
                let mut table = $crate::HashTable::with_capacity(cap)?;
                $(
                    table.insert($key, $value)?;
                )*
                Ok(table)
            };
            (init)()
        }
    };
}

// Forwards the Iterator methods to `self.iter`, mapping its elements.
macro_rules! iterator_methods {
    ($map_elt:expr) => {
        fn next(&mut self) -> Option<Self::Item> {
            self.iter.next().map($map_elt)
        }

        fn size_hint(&self) -> (usize, Option<usize>) {
            self.iter.size_hint()
        }

        fn count(self) -> usize {
            self.iter.len()
        }
    };
}
