//! Electronic Product Codes
//!
//! Readers report EPCs with inconsistent casing and padding. An [`Epc`] is
//! always trimmed and upper-cased so that set membership and equality are
//! case-insensitive everywhere downstream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized EPC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Epc(String);

impl Epc {
    /// Normalize a raw EPC. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Epc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Epc {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Epc::parse(&value).ok_or_else(|| "EPC must not be blank".to_string())
    }
}

impl From<Epc> for String {
    fn from(epc: Epc) -> Self {
        epc.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_uppercases() {
        let epc = Epc::parse("  e200341201b802  ").unwrap();
        assert_eq!(epc.as_str(), "E200341201B802");
        assert_eq!(epc, Epc::parse("E200341201B802").unwrap());
    }

    #[test]
    fn test_blank_is_rejected() {
        assert!(Epc::parse("").is_none());
        assert!(Epc::parse("   ").is_none());
        assert!(serde_json::from_str::<Epc>("\" \"").is_err());
    }
}
