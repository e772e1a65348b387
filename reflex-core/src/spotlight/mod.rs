//! Epistemic spotlight: six ordered, TTL-scoped fact lists kept per query
//! (spec.md §4.10, grounded on `original_source/src/redis_spotlight.py`).

pub mod coupling;

pub use coupling::CouplingValidator;

use crate::constants::DEFAULT_SPOTLIGHT_TTL_SECS;
use crate::types::EpistemicLevel;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One fact placed into a spotlight level. `conflicts_with_lower` is set by
/// the caller doing the placement (informed by the fact's own derivations)
/// when this fact contradicts or is unsupported by something in the level
/// directly below it — the signal [`coupling::CouplingValidator`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotlightFact {
    pub fact_id: u64,
    pub conflicts_with_lower: bool,
}

/// One query's spotlight: six level-keyed fact lists plus a TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotlightQuery {
    pub query_id: String,
    pub levels: HashMap<&'static str, Vec<SpotlightFact>>,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: i64,
}

impl SpotlightQuery {
    #[must_use]
    pub fn new(query_id: impl Into<String>, ttl_secs: i64) -> Self {
        let mut levels = HashMap::new();
        for level in EpistemicLevel::ALL {
            levels.insert(level.key(), Vec::new());
        }
        Self {
            query_id: query_id.into(),
            levels,
            created_at: Utc::now(),
            ttl_secs,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at).num_seconds() > self.ttl_secs
    }

    pub fn push(&mut self, level: EpistemicLevel, fact_id: u64, conflicts_with_lower: bool) {
        self.levels
            .entry(level.key())
            .or_default()
            .push(SpotlightFact {
                fact_id,
                conflicts_with_lower,
            });
    }
}

/// Substrate trait the spotlight is stored through: in production this
/// would be a Redis-backed implementation (spec.md §4.10's namesake), but
/// the core ships an in-memory TTL-checked one (spec.md §9: ambient
/// persistence concerns are out of scope, the data model is not).
pub trait SpotlightSubstrate: Send + Sync {
    fn create_query(&self, query_id: &str, ttl_secs: i64) -> SpotlightQuery;
    fn query_exists(&self, query_id: &str) -> bool;
    fn get(&self, query_id: &str) -> Option<SpotlightQuery>;
    fn put(&self, query: SpotlightQuery);
}

/// Default in-memory spotlight substrate. Expired queries are treated as
/// absent on read, and swept on `put`.
#[derive(Default)]
pub struct InMemorySpotlight {
    queries: RwLock<HashMap<String, SpotlightQuery>>,
}

impl InMemorySpotlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep_expired(&self) {
        let now = Utc::now();
        self.queries.write().retain(|_, q| !q.is_expired(now));
    }
}

impl SpotlightSubstrate for InMemorySpotlight {
    fn create_query(&self, query_id: &str, ttl_secs: i64) -> SpotlightQuery {
        let ttl = if ttl_secs > 0 {
            ttl_secs
        } else {
            DEFAULT_SPOTLIGHT_TTL_SECS
        };
        let query = SpotlightQuery::new(query_id, ttl);
        self.queries.write().insert(query_id.to_string(), query.clone());
        query
    }

    fn query_exists(&self, query_id: &str) -> bool {
        self.sweep_expired();
        self.queries.read().contains_key(query_id)
    }

    fn get(&self, query_id: &str) -> Option<SpotlightQuery> {
        self.sweep_expired();
        self.queries.read().get(query_id).cloned()
    }

    fn put(&self, query: SpotlightQuery) {
        self.sweep_expired();
        self.queries.write().insert(query.query_id.clone(), query);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_query_seeds_all_six_levels() {
        let substrate = InMemorySpotlight::new();
        let query = substrate.create_query("q1", 3600);
        assert_eq!(query.levels.len(), 6);
        assert!(query.levels.contains_key("L0_empirical"));
        assert!(query.levels.contains_key("L5_mask"));
    }

    #[test]
    fn query_exists_reflects_creation() {
        let substrate = InMemorySpotlight::new();
        assert!(!substrate.query_exists("q1"));
        substrate.create_query("q1", 3600);
        assert!(substrate.query_exists("q1"));
    }

    #[test]
    fn expired_query_is_treated_as_absent() {
        let substrate = InMemorySpotlight::new();
        let mut query = substrate.create_query("q1", 1);
        query.created_at = Utc::now() - chrono::Duration::seconds(10);
        substrate.put(query);
        assert!(!substrate.query_exists("q1"));
    }

    #[test]
    fn zero_ttl_falls_back_to_default() {
        let substrate = InMemorySpotlight::new();
        let query = substrate.create_query("q1", 0);
        assert_eq!(query.ttl_secs, DEFAULT_SPOTLIGHT_TTL_SECS);
    }

    #[test]
    fn push_appends_to_the_right_level_list() {
        let mut query = SpotlightQuery::new("q1", 3600);
        query.push(EpistemicLevel::L0Empirical, 10, false);
        query.push(EpistemicLevel::L0Empirical, 11, true);
        assert_eq!(
            query.levels["L0_empirical"],
            vec![
                SpotlightFact { fact_id: 10, conflicts_with_lower: false },
                SpotlightFact { fact_id: 11, conflicts_with_lower: true },
            ]
        );
        assert!(query.levels["L5_mask"].is_empty());
    }
}
