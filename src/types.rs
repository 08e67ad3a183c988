//! Shared scalar types and constants

/// Token amount in base units
pub type Amount = u64;

/// Unix timestamp in seconds
pub type Timestamp = i64;

pub const SECONDS_PER_HOUR: i64 = 3_600;
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Multipliers are expressed in basis points of 100 (100 = 1.0x)
pub const MULTIPLIER_BASE: u64 = 100;
