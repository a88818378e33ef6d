// whitelist.rs: Fixed-size bitmap of always-safe syscall numbers.
//
// Built once per session from the architecture profile (plus any extra
// numbers the session config lists) and never mutated afterwards. Lookups
// are a shift and a mask, with no allocation on the hot path.

use crate::error::PolicyError;

/// Number of syscall slots covered by the table.
pub const TABLE_SIZE: usize = 1024;

const WORDS: usize = TABLE_SIZE / 64;

/// Immutable set of syscall numbers that are allowed unconditionally.
#[derive(Clone, PartialEq, Eq)]
pub struct SyscallWhitelist {
    bits: [u64; WORDS],
}

impl SyscallWhitelist {
    /// Build the table from a list of numbers.
    ///
    /// Fails if any number does not fit in the table.
    pub fn build(numbers: impl IntoIterator<Item = u32>) -> Result<Self, PolicyError> {
        let mut bits = [0u64; WORDS];
        for number in numbers {
            let index = number as usize;
            if index >= TABLE_SIZE {
                return Err(PolicyError::NumberOutOfRange {
                    number: u64::from(number),
                });
            }
            bits[index / 64] |= 1u64 << (index % 64);
        }
        Ok(Self { bits })
    }

    /// Look up a syscall number.
    ///
    /// Numbers beyond the table are an error rather than a plain `false`,
    /// so the caller can report them as an internal fault.
    pub fn check(&self, number: u64) -> Result<bool, PolicyError> {
        if number >= TABLE_SIZE as u64 {
            return Err(PolicyError::NumberOutOfRange { number });
        }
        let index = number as usize;
        Ok(self.bits[index / 64] & (1u64 << (index % 64)) != 0)
    }

    /// True if `number` is in the table. Out-of-range numbers are not.
    pub fn contains(&self, number: u64) -> bool {
        self.check(number).unwrap_or(false)
    }

    /// Whitelisted numbers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..TABLE_SIZE as u32).filter(move |n| self.contains(u64::from(*n)))
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }
}

impl std::fmt::Debug for SyscallWhitelist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
