//! Account addresses.
//!
//! Ledger addresses are 20-byte values written as `0x` followed by 40 hex digits.
//! Wallets and event logs deliver them in mixed (checksummed) case, so the
//! canonical form stored here is lowercase and equality is therefore
//! case-insensitive with respect to the input.

use core::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DomainError;

const HEX_DIGITS: usize = 40;
const BURN: &str = "0x0000000000000000000000000000000000000000";

/// A normalized (lowercase) account address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(String);

impl Address {
    /// Parse and normalize an address.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| DomainError::invalid_id(format!("address must start with 0x: {trimmed:?}")))?;

        if digits.len() != HEX_DIGITS {
            return Err(DomainError::invalid_id(format!(
                "address must have {HEX_DIGITS} hex digits, found {}",
                digits.len()
            )));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::invalid_id(format!("address is not hex: {trimmed:?}")));
        }

        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// The zero address. Dispatching to it means "sold to the end consumer".
    pub fn burn() -> Self {
        Self(BURN.to_string())
    }

    pub fn is_burn(&self) -> bool {
        self.0 == BURN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for tables: `0xabc...1234567`.
    pub fn abbreviated(&self) -> String {
        format!("{}...{}", &self.0[..5], &self.0[self.0.len() - 7..])
    }
}

impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01";

    #[test]
    fn mixed_case_inputs_compare_equal() {
        let a = Address::parse(MIXED).unwrap();
        let b = Address::parse(&MIXED.to_lowercase()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn rejects_wrong_length_and_non_hex() {
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("abcdef0123456789abcdef0123456789abcdef01").is_err());
        assert!(Address::parse("0xzzcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn burn_address_round_trips_through_parse() {
        let parsed = Address::parse("0x0000000000000000000000000000000000000000").unwrap();
        assert!(parsed.is_burn());
        assert_eq!(parsed, Address::burn());
    }

    #[test]
    fn serde_uses_normalized_string() {
        let a: Address = serde_json::from_str(&format!("\"{MIXED}\"")).unwrap();
        let out = serde_json::to_string(&a).unwrap();
        assert_eq!(out, "\"0xabcdef0123456789abcdef0123456789abcdef01\"");
        assert!(serde_json::from_str::<Address>("\"0x12\"").is_err());
    }

    #[test]
    fn abbreviated_keeps_prefix_and_tail() {
        let a = Address::parse(MIXED).unwrap();
        assert_eq!(a.abbreviated(), "0xabc...bcdef01");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig { cases: 1000, .. ProptestConfig::default() })]

            /// Case never changes identity, and the stored form is lowercase.
            #[test]
            fn parse_is_case_insensitive(digits in "[0-9a-fA-F]{40}") {
                let upper = Address::parse(&format!("0x{}", digits.to_ascii_uppercase())).unwrap();
                let lower = Address::parse(&format!("0x{}", digits.to_ascii_lowercase())).unwrap();
                prop_assert_eq!(&upper, &lower);
                prop_assert_eq!(upper.as_str(), format!("0x{}", digits.to_ascii_lowercase()));
                prop_assert_eq!(Address::parse(upper.as_str()).unwrap(), upper);
            }

            #[test]
            fn wrong_length_is_rejected(digits in "[0-9a-f]{0,39}|[0-9a-f]{41,60}") {
                let parsed = Address::parse(&format!("0x{}", digits));
                prop_assert!(parsed.is_err());
            }
        }
    }
}
