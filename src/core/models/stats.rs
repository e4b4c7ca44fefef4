use std::collections::HashMap;
use std::ops::{Add, AddAssign};

/// Token counts accumulated from provider session logs.
///
/// Addition is component-wise, so partial results from different files and
/// providers can be merged in any order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl TokenStats {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }

    /// Everything that counts toward the input side: fresh input plus both
    /// cache directions. This is the "in" figure shown next to "out".
    pub fn total_input(&self) -> u64 {
        self.input_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

impl Add for TokenStats {
    type Output = TokenStats;

    fn add(self, rhs: TokenStats) -> TokenStats {
        TokenStats {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
            cache_creation_tokens: self.cache_creation_tokens + rhs.cache_creation_tokens,
            cache_read_tokens: self.cache_read_tokens + rhs.cache_read_tokens,
        }
    }
}

impl AddAssign for TokenStats {
    fn add_assign(&mut self, rhs: TokenStats) {
        *self = *self + rhs;
    }
}

/// Per-day token totals for one calendar month, keyed by day of month (1-31).
/// A missing key means no usage was observed that day.
pub type DailyTokenStats = HashMap<u32, TokenStats>;

/// Merge `other` into `into`, adding per-day. Days present in only one map
/// are carried through unchanged.
pub fn merge_daily(into: &mut DailyTokenStats, other: DailyTokenStats) {
    for (day, stats) in other {
        *into.entry(day).or_default() += stats;
    }
}
