// Symbol Key - normalized cache identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized domain key (trimmed, uppercase).
///
/// Every lookup, fetch and store goes through this type, so cache identity
/// is case- and whitespace-insensitive: `"msft"`, `"MSFT"` and `" MSFT "`
/// all resolve to the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SymbolKey(String);

impl SymbolKey {
    pub fn parse(raw: &str) -> super::error::Result<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(super::DomainError::EmptySymbol);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SymbolKey {
    type Error = super::DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SymbolKey> for String {
    fn from(key: SymbolKey) -> Self {
        key.0
    }
}

impl AsRef<str> for SymbolKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_is_case_and_whitespace_insensitive() {
        let a = SymbolKey::parse("msft").unwrap();
        let b = SymbolKey::parse("MSFT").unwrap();
        let c = SymbolKey::parse(" MSFT ").unwrap();
        let d = SymbolKey::parse("\tmsft\n").unwrap();

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, d);
        assert_eq!(a.as_str(), "MSFT");
    }

    #[test]
    fn test_index_symbols_keep_punctuation() {
        let key = SymbolKey::parse(" ^gspc ").unwrap();
        assert_eq!(key.as_str(), "^GSPC");
    }

    #[test]
    fn test_blank_symbol_rejected() {
        assert!(SymbolKey::parse("").is_err());
        assert!(SymbolKey::parse("   ").is_err());
    }

    #[test]
    fn test_deserialize_normalizes() {
        let key: SymbolKey = serde_json::from_str("\" aapl\"").unwrap();
        assert_eq!(key.as_str(), "AAPL");
    }
}
