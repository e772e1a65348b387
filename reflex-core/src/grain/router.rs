//! Grain router: confidence-banded routing decisions and keyword search over
//! an already-loaded [`super::store::GrainStore`] (spec.md §4.5, grounded on
//! `original_source/src/grain_router.py`'s `get_routing_decision`/`search_grains`).

use crate::constants::{
    ROUTE_DERIVATION_BONUS, ROUTE_LAYER0_MIN_CONFIDENCE, ROUTE_LAYER1_MIN_CONFIDENCE,
    ROUTE_LAYER2_MIN_CONFIDENCE,
};
use crate::grain::store::GrainStore;
use crate::grain::types::Grain;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Routing decision for a grain's confidence (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteLayer {
    /// Confidence >= 0.95: use the grain directly.
    UseDirectly,
    /// Confidence >= 0.85: hint plus verify.
    HintAndVerify,
    /// Confidence >= 0.75: hint plus cartridge lookup.
    HintAndCartridgeLookup,
    /// Below 0.75: skip the grain.
    Skip,
}

#[must_use]
pub fn route_for_confidence(confidence: f64) -> RouteLayer {
    if confidence >= ROUTE_LAYER0_MIN_CONFIDENCE {
        RouteLayer::UseDirectly
    } else if confidence >= ROUTE_LAYER1_MIN_CONFIDENCE {
        RouteLayer::HintAndVerify
    } else if confidence >= ROUTE_LAYER2_MIN_CONFIDENCE {
        RouteLayer::HintAndCartridgeLookup
    } else {
        RouteLayer::Skip
    }
}

/// A grain ranked by search score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredGrain {
    pub grain: Grain,
    pub score: f64,
}

fn search_score(grain: &Grain) -> f64 {
    let has_derivations =
        !grain.delta.positive.is_empty() || !grain.delta.negative.is_empty() || !grain.delta.void.is_empty();
    grain.confidence + if has_derivations { ROUTE_DERIVATION_BONUS } else { 0.0 }
}

/// Routes queries to grains by confidence band, backed by a shared
/// [`GrainStore`].
pub struct GrainRouter {
    store: Arc<GrainStore>,
}

impl GrainRouter {
    #[must_use]
    pub fn new(store: Arc<GrainStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn lookup(&self, cartridge: &str, fact_id: u64) -> Option<Grain> {
        self.store.lookup(cartridge, fact_id)
    }

    #[must_use]
    pub fn lookup_by_grain_id(&self, grain_id: &str) -> Option<Grain> {
        self.store.lookup_by_grain_id(grain_id)
    }

    /// Search grains whose pointer map mentions any of `terms`, ranked by
    /// score (confidence + derivation bonus) descending.
    #[must_use]
    pub fn search_grains(&self, terms: &[String], cartridge: Option<&str>) -> Vec<ScoredGrain> {
        let lowered: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();
        let candidates = match cartridge {
            Some(c) => self.store.all_in_cartridge(c),
            None => self.store.all(),
        };

        let mut scored: Vec<ScoredGrain> = candidates
            .into_iter()
            .filter(|g| {
                lowered.iter().any(|t| {
                    g.delta.positive.iter().any(|x| x.contains(t.as_str()))
                        || g.delta.negative.iter().any(|x| x.contains(t.as_str()))
                        || g.delta.void.iter().any(|x| x.contains(t.as_str()))
                })
            })
            .map(|g| ScoredGrain {
                score: search_score(&g),
                grain: g,
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.grain.grain_id.cmp(&b.grain.grain_id))
        });
        scored
    }

    /// Combined lookup + routing decision for a specific grain id.
    #[must_use]
    pub fn routing_decision(&self, grain_id: &str) -> Option<(Grain, RouteLayer)> {
        let grain = self.store.lookup_by_grain_id(grain_id)?;
        let layer = route_for_confidence(grain.confidence);
        Some((grain, layer))
    }
}
