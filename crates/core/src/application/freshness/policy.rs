// Freshness Policy - per-domain TTL and replace strategy

use crate::application::constants::{HISTORY_TTL, MOVERS_TTL, NEWS_TTL, QUOTE_TTL};
use crate::domain::Domain;
use std::time::Duration;

/// Maximum age before a record must be refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Finite(Duration),
    /// Populate-once: created if absent, never refreshed
    Infinite,
}

impl Ttl {
    /// `age <= ttl` is fresh
    pub fn is_fresh(&self, age_millis: i64) -> bool {
        match self {
            Ttl::Infinite => true,
            Ttl::Finite(ttl) => age_millis <= ttl.as_millis() as i64,
        }
    }
}

/// How a stale record is replaced after a successful refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceStrategy {
    /// Keep the record (id, created_at), overwrite payload and updated_at
    UpdateInPlace,
    /// Delete every record for the key, insert a new one
    DeleteThenInsert,
}

/// What a failed refresh of a stale record returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshFailurePolicy {
    /// Return the stale record unchanged and write an error diagnostic
    #[default]
    ServeStale,
    /// Return the fetch error to the caller
    Propagate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainPolicy {
    pub ttl: Ttl,
    pub replace: ReplaceStrategy,
}

/// Policy table for every cache domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicies {
    pub quote: DomainPolicy,
    pub history: DomainPolicy,
    pub movers: DomainPolicy,
    pub news: DomainPolicy,
    pub constituents: DomainPolicy,
    pub on_refresh_failure: RefreshFailurePolicy,
}

impl Default for CachePolicies {
    fn default() -> Self {
        Self {
            quote: DomainPolicy {
                ttl: Ttl::Finite(QUOTE_TTL),
                replace: ReplaceStrategy::UpdateInPlace,
            },
            history: DomainPolicy {
                ttl: Ttl::Finite(HISTORY_TTL),
                replace: ReplaceStrategy::DeleteThenInsert,
            },
            movers: DomainPolicy {
                ttl: Ttl::Finite(MOVERS_TTL),
                replace: ReplaceStrategy::UpdateInPlace,
            },
            news: DomainPolicy {
                ttl: Ttl::Finite(NEWS_TTL),
                replace: ReplaceStrategy::DeleteThenInsert,
            },
            constituents: DomainPolicy {
                ttl: Ttl::Infinite,
                replace: ReplaceStrategy::UpdateInPlace,
            },
            on_refresh_failure: RefreshFailurePolicy::ServeStale,
        }
    }
}

impl CachePolicies {
    pub fn for_domain(&self, domain: Domain) -> &DomainPolicy {
        match domain {
            Domain::Quote => &self.quote,
            Domain::History => &self.history,
            Domain::Movers => &self.movers,
            Domain::News => &self.news,
            Domain::Constituents => &self.constituents,
        }
    }

    fn for_domain_mut(&mut self, domain: Domain) -> &mut DomainPolicy {
        match domain {
            Domain::Quote => &mut self.quote,
            Domain::History => &mut self.history,
            Domain::Movers => &mut self.movers,
            Domain::News => &mut self.news,
            Domain::Constituents => &mut self.constituents,
        }
    }

    /// Override one domain's TTL
    pub fn with_ttl(mut self, domain: Domain, ttl: Ttl) -> Self {
        self.for_domain_mut(domain).ttl = ttl;
        self
    }

    /// Override one domain's replace strategy
    pub fn with_replace(mut self, domain: Domain, replace: ReplaceStrategy) -> Self {
        self.for_domain_mut(domain).replace = replace;
        self
    }

    pub fn with_refresh_failure(mut self, policy: RefreshFailurePolicy) -> Self {
        self.on_refresh_failure = policy;
        self
    }
}
