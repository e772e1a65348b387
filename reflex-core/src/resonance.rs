//! Resonance weight store: per-pattern exponential decay, reinforcement,
//! pruning (spec.md §3, §4.2).

use crate::constants::{
    CLEANUP_THRESHOLD, DEFAULT_INITIAL_STABILITY, PROMOTION_HIT_COUNT, SPACING_SENSITIVITY_K,
    STABILITY_GROWTH,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// A single pattern's decaying popularity score (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResonanceWeight {
    pub stability: f64,
    pub last_reinforced_turn: u64,
    pub created_turn: u64,
    pub hit_count: u32,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Configuration for a [`ResonanceWeightStore`].
#[derive(Debug, Clone)]
pub struct ResonanceConfig {
    pub initial_stability: f64,
    pub stability_growth: f64,
    pub cleanup_threshold: f64,
    pub promotion_hit_count: u32,
    /// Named mode from spec.md §9: "spacing-sensitive reinforcement".
    pub spacing_sensitive: bool,
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            initial_stability: DEFAULT_INITIAL_STABILITY,
            stability_growth: STABILITY_GROWTH,
            cleanup_threshold: CLEANUP_THRESHOLD,
            promotion_hit_count: PROMOTION_HIT_COUNT,
            spacing_sensitive: false,
        }
    }
}

/// Per-pattern exponential decay, reinforcement, and pruning (spec.md §4.2).
///
/// Decay law (authoritative): `w = exp(-(T - last_reinforced) / S)`. Age is
/// measured from `last_reinforced`, never from `created_turn`. `compute_weight`
/// never mutates state; pruning only happens inside [`advance_turn`].
pub struct ResonanceWeightStore {
    config: ResonanceConfig,
    weights: RwLock<HashMap<String, ResonanceWeight>>,
    current_turn: RwLock<u64>,
}

impl ResonanceWeightStore {
    #[must_use]
    pub fn new(config: ResonanceConfig) -> Self {
        Self {
            config,
            weights: RwLock::new(HashMap::new()),
            current_turn: RwLock::new(0),
        }
    }

    #[must_use]
    pub fn current_turn(&self) -> u64 {
        *self.current_turn.read()
    }

    /// Record a new pattern. Idempotent: if `hash` already exists, the
    /// existing entry (metadata, timestamps) is left untouched and its hash
    /// is simply returned.
    pub fn record_pattern(
        &self,
        hash: impl Into<String>,
        metadata: HashMap<String, Value>,
        initial_stability: Option<f64>,
    ) {
        let hash = hash.into();
        let mut weights = self.weights.write();
        if weights.contains_key(&hash) {
            return;
        }
        let turn = *self.current_turn.read();
        weights.insert(
            hash,
            ResonanceWeight {
                stability: initial_stability.unwrap_or(self.config.initial_stability),
                last_reinforced_turn: turn,
                created_turn: turn,
                hit_count: 0,
                metadata,
            },
        );
    }

    /// Reinforce a pattern: resets its age anchor to the current turn,
    /// increments `hit_count`, and grows stability multiplicatively. Silent
    /// (no-op) if the hash is unknown.
    pub fn reinforce_pattern(&self, hash: &str) {
        let turn = *self.current_turn.read();
        let mut weights = self.weights.write();
        let Some(entry) = weights.get_mut(hash) else {
            return;
        };

        let growth = if self.config.spacing_sensitive {
            let current_weight = weight_at(entry, turn);
            self.config.stability_growth * (1.0 + SPACING_SENSITIVITY_K * (1.0 - current_weight))
        } else {
            self.config.stability_growth
        };

        entry.stability *= growth;
        entry.last_reinforced_turn = turn;
        entry.hit_count += 1;
    }

    /// Compute the current weight for `hash`, or `0.0` if unknown. Never
    /// mutates the store.
    #[must_use]
    pub fn compute_weight(&self, hash: &str) -> f64 {
        let turn = *self.current_turn.read();
        self.weights
            .read()
            .get(hash)
            .map_or(0.0, |entry| weight_at(entry, turn))
    }

    /// Advance the global turn counter, then prune any entry whose weight
    /// has fallen below `cleanup_threshold`.
    pub fn advance_turn(&self) -> u64 {
        let turn = {
            let mut t = self.current_turn.write();
            *t += 1;
            *t
        };
        let threshold = self.config.cleanup_threshold;
        let mut weights = self.weights.write();
        let before = weights.len();
        weights.retain(|_, entry| weight_at(entry, turn) >= threshold);
        let pruned = before - weights.len();
        if pruned > 0 {
            debug!(pruned, turn, "resonance store pruned expired patterns");
        }
        turn
    }

    /// All patterns whose current weight is at or above `threshold`.
    #[must_use]
    pub fn get_active_patterns(&self, threshold: f64) -> HashMap<String, f64> {
        let turn = *self.current_turn.read();
        self.weights
            .read()
            .iter()
            .map(|(h, e)| (h.clone(), weight_at(e, turn)))
            .filter(|(_, w)| *w >= threshold)
            .collect()
    }

    /// Hashes with `hit_count >= promotion_hit_count` (spec.md §4.2, Open
    /// Question 1 in spec.md §9 for the default value).
    #[must_use]
    pub fn get_promotion_candidates(&self) -> Vec<String> {
        self.weights
            .read()
            .iter()
            .filter(|(_, e)| e.hit_count >= self.config.promotion_hit_count)
            .map(|(h, _)| h.clone())
            .collect()
    }

    #[must_use]
    pub fn contains(&self, hash: &str) -> bool {
        self.weights.read().contains_key(hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.read().is_empty()
    }
}

fn weight_at(entry: &ResonanceWeight, turn: u64) -> f64 {
    let age = turn.saturating_sub(entry.last_reinforced_turn) as f64;
    (-age / entry.stability).exp()
}
