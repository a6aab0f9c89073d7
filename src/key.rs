//! Key adapters.
//!
//! An adapter is a zero-sized type that tells a table how to hash and compare its keys. The
//! table only ever sees 32-bit hash codes.

use core::{
    hash::{Hash, Hasher},
    mem,
    ptr::NonNull,
};
use rustc_hash::FxHasher;

/// Hashing and equality for keys of type `K`.
///
/// Two keys that are `equals` must have the same `hash_code`. Neither function may panic.
pub trait KeyAdapter<K: ?Sized> {
    fn hash_code(key: &K) -> u32;
    fn equals(a: &K, b: &K) -> bool;
}

#[inline]
fn fold(v: u64) -> u32 {
    (v >> 32) as u32 ^ v as u32
}

/// Uses the key's own `Hash` and `Eq` implementations.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashEq;

impl<K: Hash + Eq + ?Sized> KeyAdapter<K> for HashEq {
    #[inline]
    fn hash_code(key: &K) -> u32 {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        fold(hasher.finish())
    }

    #[inline]
    fn equals(a: &K, b: &K) -> bool {
        a == b
    }
}

/// Pointer identity: keys are equal when they point to the same address.
#[derive(Debug, Default, Clone, Copy)]
pub struct PtrKey;

#[inline]
fn address<T: ?Sized>(ptr: *const T) -> *const u8 {
    ptr.cast()
}

#[inline]
fn address_hash<T: ?Sized>(ptr: *const T) -> u32 {
    address(ptr) as usize as u32
}

impl<T: ?Sized> KeyAdapter<*const T> for PtrKey {
    fn hash_code(key: &*const T) -> u32 {
        address_hash(*key)
    }

    fn equals(a: &*const T, b: &*const T) -> bool {
        address(*a) == address(*b)
    }
}

impl<T: ?Sized> KeyAdapter<*mut T> for PtrKey {
    fn hash_code(key: &*mut T) -> u32 {
        address_hash(*key)
    }

    fn equals(a: &*mut T, b: &*mut T) -> bool {
        address(*a) == address(*b)
    }
}

impl<'a, T: ?Sized> KeyAdapter<&'a T> for PtrKey {
    fn hash_code(key: &&'a T) -> u32 {
        address_hash(*key as *const T)
    }

    fn equals(a: &&'a T, b: &&'a T) -> bool {
        address(*a as *const T) == address(*b as *const T)
    }
}

impl<T: ?Sized> KeyAdapter<NonNull<T>> for PtrKey {
    fn hash_code(key: &NonNull<T>) -> u32 {
        address_hash(key.as_ptr())
    }

    fn equals(a: &NonNull<T>, b: &NonNull<T>) -> bool {
        address(a.as_ptr()) == address(b.as_ptr())
    }
}

/// Values that widen to `u32` without losing information.
pub trait SmallPrimitive: Copy + Eq {
    fn widen(self) -> u32;
}

macro_rules! small_primitive {
    ($($t:ty),*) => {
        $(
            impl SmallPrimitive for $t {
                #[inline]
                fn widen(self) -> u32 {
                    self as u32
                }
            }
        )*
    };
}

small_primitive!(u8, u16, u32, i8, i16, i32, bool, char);

/// The value itself is the hash code.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmallPrimitiveKey;

impl<K: SmallPrimitive> KeyAdapter<K> for SmallPrimitiveKey {
    #[inline]
    fn hash_code(key: &K) -> u32 {
        key.widen()
    }

    #[inline]
    fn equals(a: &K, b: &K) -> bool {
        a == b
    }
}

/// Plain values of up to eight bytes, compared by their bit pattern.
pub trait LargePrimitive: Copy {
    fn bit_pattern(self) -> u64;
}

macro_rules! large_primitive {
    ($($t:ty),*) => {
        $(
            impl LargePrimitive for $t {
                #[inline]
                fn bit_pattern(self) -> u64 {
                    self as u64
                }
            }
        )*
    };
}

large_primitive!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl LargePrimitive for f32 {
    #[inline]
    fn bit_pattern(self) -> u64 {
        u64::from(self.to_bits())
    }
}

impl LargePrimitive for f64 {
    #[inline]
    fn bit_pattern(self) -> u64 {
        self.to_bits()
    }
}

/// Hashes eight-byte values by folding their halves together.
///
/// Floats are compared bitwise, so `0.0` and `-0.0` are different keys while a NaN key can be
/// found again.
#[derive(Debug, Default, Clone, Copy)]
pub struct LargePrimitiveKey;

impl<K: LargePrimitive> KeyAdapter<K> for LargePrimitiveKey {
    #[inline]
    fn hash_code(key: &K) -> u32 {
        let bits = key.bit_pattern();
        if mem::size_of::<K>() == 8 {
            fold(bits)
        } else {
            bits as u32
        }
    }

    #[inline]
    fn equals(a: &K, b: &K) -> bool {
        a.bit_pattern() == b.bit_pattern()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn small_primitives() {
        assert_eq!(SmallPrimitiveKey::hash_code(&42u8), 42);
        assert_eq!(SmallPrimitiveKey::hash_code(&'a'), 97);
        assert_eq!(SmallPrimitiveKey::hash_code(&true), 1);
        assert_eq!(SmallPrimitiveKey::hash_code(&-1i16), u32::MAX);
        assert!(SmallPrimitiveKey::equals(&7u32, &7u32));
        assert!(!SmallPrimitiveKey::equals(&7i32, &-7i32));
    }

    #[test]
    fn large_primitives() {
        assert_eq!(LargePrimitiveKey::hash_code(&0x1234_5678_0000_0001u64), 0x1234_5679);
        assert_eq!(LargePrimitiveKey::hash_code(&5u16), 5);
        assert_eq!(LargePrimitiveKey::hash_code(&1.0f32), 1.0f32.to_bits());

        let bits = 1.5f64.to_bits();
        assert_eq!(
            LargePrimitiveKey::hash_code(&1.5f64),
            (bits >> 32) as u32 ^ bits as u32
        );
    }

    #[test]
    fn float_bit_patterns() {
        assert!(!LargePrimitiveKey::equals(&0.0f64, &-0.0f64));
        assert!(LargePrimitiveKey::equals(&f64::NAN, &f64::NAN));
        assert!(LargePrimitiveKey::equals(&f32::NAN, &f32::NAN));
        assert!(LargePrimitiveKey::equals(&2.5f32, &2.5f32));
    }

    #[test]
    fn pointers() {
        let values = [1u32, 1u32];
        let a: &u32 = &values[0];
        let b: &u32 = &values[1];
        assert!(PtrKey::equals(&a, &a));
        assert!(!PtrKey::equals(&a, &b));
        assert_eq!(PtrKey::hash_code(&a), a as *const u32 as usize as u32);

        let raw = a as *const u32;
        assert!(PtrKey::equals(&raw, &(a as *const u32)));
        assert_eq!(PtrKey::hash_code(&raw), PtrKey::hash_code(&a));

        let slice: &[u32] = &values[..];
        let nn = NonNull::from(slice);
        assert_eq!(
            PtrKey::hash_code(&nn),
            PtrKey::hash_code(&(values.as_ptr() as *mut u32))
        );
    }

    #[quickcheck]
    fn equal_strings_hash_equally(s: String) -> bool {
        let copy = s.clone();
        HashEq::equals(&s, &copy) && HashEq::hash_code(&s) == HashEq::hash_code(&copy)
    }

    #[quickcheck]
    fn large_matches_small_for_narrow_ints(v: u16) -> bool {
        LargePrimitiveKey::hash_code(&v) == SmallPrimitiveKey::hash_code(&v)
    }
}
