//! Account addresses
//!
//! Every user and every component is identified by a 20-byte hex address.
//! The all-zero address is the null identifier and is never a valid
//! recipient, referrer or linked component.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RewardError;

/// Number of hex digits after the `0x` prefix
const ADDRESS_HEX_LEN: usize = 40;

/// A normalized (lower-case) account address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and normalize an address string
    pub fn parse(s: &str) -> Result<Self, RewardError> {
        let trimmed = s.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| RewardError::InvalidAddress(s.to_string()))?;

        if hex.len() != ADDRESS_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RewardError::InvalidAddress(s.to_string()));
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// The null address
    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(ADDRESS_HEX_LEN)))
    }

    /// Build an address whose low bytes hold `n` (used for well-known component slots)
    pub fn from_low_u64(n: u64) -> Self {
        Self(format!("0x{:0>40x}", n))
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    /// Fail with `ZeroAddress` for the null identifier
    pub fn ensure_non_zero(&self) -> Result<(), RewardError> {
        if self.is_zero() {
            Err(RewardError::ZeroAddress)
        } else {
            Ok(())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = RewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = RewardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let addr = Address::parse("0xABCDEF0000000000000000000000000000000001").unwrap();
        assert_eq!(addr.as_str(), "0xabcdef0000000000000000000000000000000001");
        assert!(!addr.is_zero());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Address::parse("abcdef").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xzz00000000000000000000000000000000000000").is_err());
    }

    #[test]
    fn test_zero_address() {
        let zero = Address::zero();
        assert!(zero.is_zero());
        assert_eq!(zero.ensure_non_zero(), Err(RewardError::ZeroAddress));
        assert_eq!(Address::parse(zero.as_str()).unwrap(), zero);
    }

    #[test]
    fn test_from_low_u64() {
        let addr = Address::from_low_u64(0x2a);
        assert_eq!(addr.as_str(), "0x000000000000000000000000000000000000002a");
        assert_eq!(Address::parse(addr.as_str()).unwrap(), addr);
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let addr = Address::from_low_u64(7);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x0000000000000000000000000000000000000007\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<Address>("\"nope\"").is_err());
    }
}
