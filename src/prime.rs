//! Bucket counts.
//!
//! Every bucket array is sized to one of the primes below. Each prime carries a magic multiplier
//! and a shift so that reducing a hash to a bucket index costs two multiplications instead of a
//! division.

use crate::policy::{GrowthPolicy, Overflow};

/// A tabulated prime together with its division constants.
///
/// For every `n: u32`, `(n * magic) >> (32 + shift) == n / prime`. The multiplier may take 33
/// bits, so the product is split into its low and high words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimeInfo {
    prime: u32,
    magic: u64,
    shift: u32,
}

impl PrimeInfo {
    const fn new(prime: u32, magic: u64, shift: u32) -> Self {
        PrimeInfo {
            prime,
            magic,
            shift,
        }
    }

    /// The bucket count.
    pub fn prime(&self) -> u32 {
        self.prime
    }

    pub fn magic(&self) -> u64 {
        self.magic
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Computes `n / prime`.
    #[inline]
    pub fn magic_divide(&self, n: u32) -> u32 {
        let n = u64::from(n);
        let low = (n * (self.magic & 0xffff_ffff)) >> 32;
        let high = n * (self.magic >> 32);
        ((low + high) >> self.shift) as u32
    }

    /// Computes `n % prime`.
    #[inline]
    pub fn magic_rem(&self, n: u32) -> u32 {
        let rem = n - self.prime * self.magic_divide(n);
        debug_assert_eq!(rem, n % self.prime);
        rem
    }
}

/// Each prime is roughly twice the previous one.
pub const PRIMES: [PrimeInfo; 27] = [
    PrimeInfo::new(7, 0x1_2492_4925, 3),
    PrimeInfo::new(17, 0x0_f0f0_f0f1, 4),
    PrimeInfo::new(37, 0x1_bacf_914d, 6),
    PrimeInfo::new(79, 0x0_cf64_74a9, 6),
    PrimeInfo::new(163, 0x0_c907_da4f, 7),
    PrimeInfo::new(331, 0x1_8bfc_e807, 9),
    PrimeInfo::new(673, 0x0_6160_ff9f, 8),
    PrimeInfo::new(1361, 0x0_1813_8fe5, 7),
    PrimeInfo::new(2729, 0x0_c01e_04b1, 11),
    PrimeInfo::new(5471, 0x1_7f52_4eb5, 13),
    PrimeInfo::new(10949, 0x0_5fc4_e47b, 12),
    PrimeInfo::new(21911, 0x0_2fdb_2c57, 12),
    PrimeInfo::new(43853, 0x0_bf4a_0d11, 15),
    PrimeInfo::new(87719, 0x0_bf42_cb2d, 16),
    PrimeInfo::new(175447, 0x0_0bf4_0483, 13),
    PrimeInfo::new(350899, 0x1_7e7f_2b2f, 19),
    PrimeInfo::new(701819, 0x1_7e7c_3d1d, 20),
    PrimeInfo::new(1403641, 0x0_bf3e_03c5, 20),
    PrimeInfo::new(2807303, 0x0_2fcf_6981, 19),
    PrimeInfo::new(5614657, 0x0_2fcf_4d0b, 20),
    PrimeInfo::new(11229331, 0x1_7e7a_4265, 24),
    PrimeInfo::new(22458671, 0x0_bf3d_1c2d, 24),
    PrimeInfo::new(44917381, 0x0_bf3d_114b, 25),
    PrimeInfo::new(89834777, 0x0_bf3d_0f33, 26),
    PrimeInfo::new(179669557, 0x0_5f9e_877f, 26),
    PrimeInfo::new(359339171, 0x0_bf3d_0d01, 28),
    PrimeInfo::new(718678369, 0x0_17e7_a191, 26),
];

/// Returns the first tabulated prime that is not less than `n`.
pub fn find_prime_at_least(n: u64) -> Option<PrimeInfo> {
    PRIMES
        .iter()
        .find(|info| u64::from(info.prime) >= n)
        .copied()
}

/// Like [`find_prime_at_least`], but hands the failure to the policy's overflow hook.
pub fn next_prime_at_least<P: GrowthPolicy>(n: u64) -> PrimeInfo {
    match find_prime_at_least(n) {
        Some(info) => info,
        None => P::overflow(Overflow::PrimeTableExhausted { requested: n }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::policy::DefaultPolicy;
    use quickcheck_macros::quickcheck;
    use rand::Rng;
    use test_log::test;

    fn check(info: &PrimeInfo, n: u32) {
        assert_eq!(
            info.magic_divide(n),
            n / info.prime(),
            "{} / {}",
            n,
            info.prime()
        );
        assert_eq!(info.magic_rem(n), n % info.prime(), "{} % {}", n, info.prime());
    }

    #[test]
    fn ascending() {
        for pair in PRIMES.windows(2) {
            assert!(pair[0].prime() < pair[1].prime());
            assert!(pair[0].magic() < 1 << 33);
        }
        assert_eq!(PRIMES[0].prime(), 7);
        assert_eq!(PRIMES[26].prime(), 718_678_369);
    }

    #[test]
    fn boundaries() {
        for info in PRIMES.iter() {
            let p = info.prime();
            for &n in &[0, 1, p - 1, p, p + 1, 2 * p - 1, 2 * p, u32::MAX - 1, u32::MAX] {
                check(info, n);
            }
        }
    }

    #[test]
    fn random_samples() {
        let mut rng = rand::thread_rng();
        for info in PRIMES.iter() {
            for _ in 0..10_000 {
                check(info, rng.gen());
            }
        }
    }

    #[quickcheck]
    fn magic_divide_is_division(n: u32) -> bool {
        PRIMES
            .iter()
            .all(|info| info.magic_divide(n) == n / info.prime())
    }

    #[test]
    fn lookup() {
        assert_eq!(find_prime_at_least(0).map(|p| p.prime()), Some(7));
        assert_eq!(find_prime_at_least(7).map(|p| p.prime()), Some(7));
        assert_eq!(find_prime_at_least(8).map(|p| p.prime()), Some(17));
        assert_eq!(find_prime_at_least(12).map(|p| p.prime()), Some(17));
        assert_eq!(
            find_prime_at_least(718_678_369).map(|p| p.prime()),
            Some(718_678_369)
        );
        assert_eq!(find_prime_at_least(718_678_370), None);
        assert_eq!(next_prime_at_least::<DefaultPolicy>(100).prime(), 163);
    }

    #[test]
    #[should_panic(expected = "prime table")]
    fn exhausted() {
        next_prime_at_least::<DefaultPolicy>(u64::from(u32::MAX));
    }
}
