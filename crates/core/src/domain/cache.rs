// Cache Domain Model

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Category of cached external data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Quote,
    History,
    Movers,
    News,
    /// Index constituent lists (populate-once reference data)
    Constituents,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Quote,
        Domain::History,
        Domain::Movers,
        Domain::News,
        Domain::Constituents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Quote => "quote",
            Domain::History => "history",
            Domain::Movers => "movers",
            Domain::News => "news",
            Domain::Constituents => "constituents",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = super::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| super::DomainError::UnknownDomain(s.to_string()))
    }
}

/// Opaque serialized domain data (quote snapshot, history points, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePayload(serde_json::Value);

impl CachePayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Serialize a typed domain value into a payload
    pub fn encode<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        serde_json::to_value(value).map(Self)
    }

    /// Decode the payload back into a typed domain value
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.0)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

/// Cached record, one live record per (domain, key)
///
/// `created_at` and `updated_at` are epoch millis owned by the freshness
/// cache; callers never set them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub id: i64,
    pub domain: Domain,
    pub key: String,
    pub payload: CachePayload,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CacheRecord {
    /// Age of the record at `now_millis`
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis - self.updated_at
    }
}

/// How a cache lookup was satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// No usable record existed (or it was stale) and a fetch succeeded
    Fetched,
    /// Record was within its TTL; no fetch, no write
    Cached,
    /// Refresh failed; last-known-good record returned unchanged
    Stale { error: String },
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_roundtrip_names() {
        for domain in Domain::ALL {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
        assert!("weather".parse::<Domain>().is_err());
    }

    #[test]
    fn test_age_uses_updated_at() {
        let record = CacheRecord {
            id: 1,
            domain: Domain::Quote,
            key: "AAPL".to_string(),
            payload: CachePayload::new(serde_json::json!({})),
            created_at: 0,
            updated_at: 10_000,
        };
        assert_eq!(record.age_millis(70_000), 60_000);
    }
}
