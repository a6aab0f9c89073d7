//! Growth policies.
//!
//! A policy is a type whose associated constants decide when a table grows and by how much.
//! Override any subset of them:
//!
//! ```
//! use alloc_hashtable::{GrowthPolicy, HashTable, HashEq, alloc::Global};
//!
//! struct Sparse;
//!
//! impl GrowthPolicy for Sparse {
//!     const DENSITY_NUMERATOR: u32 = 1;
//!     const DENSITY_DENOMINATOR: u32 = 2;
//! }
//!
//! let mut table = HashTable::<u32, u32, HashEq, Global, Sparse>::new_in(Global);
//! table.insert(1, 2).unwrap();
//! assert_eq!(table.bucket_count(), 7);
//! assert_eq!(table.table_max(), 3);
//! ```

use core::cmp;
use snafu::{ensure, Snafu};

/// Conditions a table cannot recover from.
#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
#[snafu(visibility = "pub")]
pub enum Overflow {
    #[snafu(display(
        "{} buckets requested, which is beyond the prime table",
        requested
    ))]
    PrimeTableExhausted { requested: u64 },

    #[snafu(display("Growth size computation overflowed at {} entries", occupancy))]
    GrowthArithmetic { occupancy: u32 },
}

/// Rejected policy constants.
#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Growth and density denominators must not be zero"))]
    ZeroDenominator,

    #[snafu(display(
        "Growth factor {}/{} does not expand the table",
        numerator,
        denominator
    ))]
    NoGrowth { numerator: u32, denominator: u32 },

    #[snafu(display(
        "Density factor {}/{} must lie strictly between 0 and 1",
        numerator,
        denominator
    ))]
    NoHeadroom { numerator: u32, denominator: u32 },
}

pub trait GrowthPolicy {
    const GROWTH_NUMERATOR: u32 = 3;
    const GROWTH_DENOMINATOR: u32 = 2;

    /// Maximum ratio of entries to buckets before the table grows.
    const DENSITY_NUMERATOR: u32 = 3;
    const DENSITY_DENOMINATOR: u32 = 4;

    /// Bucket count requested by the first growth.
    const MINIMUM_ALLOCATION: u32 = 7;

    /// Called when the table cannot be made any larger. Must not return.
    fn overflow(reason: Overflow) -> ! {
        fatal(reason)
    }

    /// The bucket count to request once `occupancy` entries fill the table.
    fn grow(occupancy: u32) -> u32 {
        let target = occupancy
            .checked_mul(Self::GROWTH_NUMERATOR)
            .map(|n| n / Self::GROWTH_DENOMINATOR)
            .and_then(|n| n.checked_mul(Self::DENSITY_DENOMINATOR))
            .map(|n| n / Self::DENSITY_NUMERATOR);
        match target {
            Some(target) => cmp::max(target, Self::MINIMUM_ALLOCATION),
            None => Self::overflow(Overflow::GrowthArithmetic { occupancy }),
        }
    }

    /// How many entries `buckets` buckets may hold.
    fn table_max(buckets: u32) -> u32 {
        let max = u64::from(buckets) * u64::from(Self::DENSITY_NUMERATOR)
            / u64::from(Self::DENSITY_DENOMINATOR);
        max as u32
    }
}

/// Growth by 3/2, density of 3/4, at least 7 buckets.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPolicy;

impl GrowthPolicy for DefaultPolicy {}

/// Checks the constants of `P`.
pub fn validate<P: GrowthPolicy>() -> Result<(), Error> {
    ensure!(
        P::GROWTH_DENOMINATOR != 0 && P::DENSITY_DENOMINATOR != 0,
        ZeroDenominator
    );
    ensure!(
        P::GROWTH_NUMERATOR > P::GROWTH_DENOMINATOR,
        NoGrowth {
            numerator: P::GROWTH_NUMERATOR,
            denominator: P::GROWTH_DENOMINATOR,
        }
    );
    ensure!(
        P::DENSITY_NUMERATOR > 0 && P::DENSITY_NUMERATOR < P::DENSITY_DENOMINATOR,
        NoHeadroom {
            numerator: P::DENSITY_NUMERATOR,
            denominator: P::DENSITY_DENOMINATOR,
        }
    );
    Ok(())
}

/// The default overflow hook: logs and panics.
///
/// The panic aborts the operation that triggered it. The table itself has not been modified
/// at that point, but the operation cannot be retried with any hope of success.
#[cold]
#[inline(never)]
pub fn fatal(reason: Overflow) -> ! {
    log::error!("Hash table cannot grow: {}", reason);
    panic!("Hash table overflow: {}", reason)
}
