//! Ternary crush: compress a fact's derivations and text into a bounded
//! tri-valued pointer map (spec.md §4.4, grounded on
//! `original_source/src/ternary_crush.py`).

use crate::constants::{
    TERNARY_BIT_WEIGHT, TERNARY_NEGATIVE_CAP, TERNARY_POSITIVE_CAP, TERNARY_TOKEN_MAX_LEN,
    TERNARY_VOID_CAP,
};
use crate::types::Derivation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEP_KEYWORDS: &[&str] = &[
    "requires", "enables", "causes", "leads to", "triggers", "depends on", "needs",
];
const NEG_KEYWORDS: &[&str] = &[
    "not", "cannot", "never", "excludes", "prevents", "contradicts", "opposite",
];
const INDEP_KEYWORDS: &[&str] = &["independent", "orthogonal", "unrelated", "void"];

/// Bucketed concept deltas derived from a fact (spec.md §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TernaryDelta {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub void: Vec<String>,
}

impl TernaryDelta {
    fn total_tokens(&self) -> usize {
        self.positive.len() + self.negative.len() + self.void.len()
    }
}

/// Sequential bit assignment over a [`TernaryDelta`]'s tokens, with a
/// tri-value of `+1`, `-1`, or `0` per position.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PointerMap {
    /// token → (bit_position, tri-value)
    pub pointers: BTreeMap<String, (u32, i8)>,
}

/// Output of [`ternary_crush`]: the delta, its pointer map, and weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrushResult {
    pub delta: TernaryDelta,
    pub pointer_map: PointerMap,
    pub weight: f64,
}

fn rank_and_limit(mut tokens: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    tokens.retain(|t| t.len() <= TERNARY_TOKEN_MAX_LEN && seen.insert(t.clone()));
    tokens.sort_by(|a, b| b.len().cmp(&a.len()));
    tokens.truncate(cap);
    tokens
}

fn extract_keyword_concepts(text: &str) -> TernaryDelta {
    let lower = text.to_lowercase();
    let mut delta = TernaryDelta::default();
    for kw in DEP_KEYWORDS {
        if lower.contains(kw) {
            delta.positive.push(kw.replace(' ', "_"));
        }
    }
    for kw in NEG_KEYWORDS {
        if lower.contains(kw) {
            delta.negative.push(kw.replace(' ', "_"));
        }
    }
    for kw in INDEP_KEYWORDS {
        if lower.contains(kw) {
            delta.void.push(kw.replace(' ', "_"));
        }
    }
    delta
}

fn derivations_to_delta(derivations: &[Derivation]) -> TernaryDelta {
    let mut delta = TernaryDelta::default();
    for d in derivations {
        match d.kind.as_str() {
            "dependency" | "requires" | "enables" | "causes" | "leads_to" | "triggers" => {
                delta.positive.push(d.target.clone());
            }
            "negation" | "inverse" | "opposite" | "contradicts" => {
                delta.negative.push(d.target.clone());
            }
            "boundary" => {
                delta.negative.push(format!("constrained_by:{}", d.target));
            }
            "independent" | "orthogonal" | "void" => {
                delta.void.push(d.target.clone());
            }
            _ => {}
        }
    }
    delta
}

fn build_pointer_map(delta: &TernaryDelta) -> PointerMap {
    let mut pointers = BTreeMap::new();
    let mut pos = 0u32;
    for t in &delta.positive {
        pointers.insert(t.clone(), (pos, 1));
        pos += 1;
    }
    for t in &delta.negative {
        pointers.insert(t.clone(), (pos, -1));
        pos += 1;
    }
    for t in &delta.void {
        pointers.insert(t.clone(), (pos, 0));
        pos += 1;
    }
    PointerMap { pointers }
}

/// Crush a fact's text + structured derivations into a bounded
/// [`TernaryDelta`] and its [`PointerMap`], weighted by
/// `total_token_count * log2(3)`.
#[must_use]
pub fn ternary_crush(text: &str, derivations: &[Derivation]) -> CrushResult {
    let from_derivations = derivations_to_delta(derivations);
    let from_keywords = extract_keyword_concepts(text);

    let mut positive = from_derivations.positive;
    positive.extend(from_keywords.positive);
    let mut negative = from_derivations.negative;
    negative.extend(from_keywords.negative);
    let mut void = from_derivations.void;
    void.extend(from_keywords.void);

    let delta = TernaryDelta {
        positive: rank_and_limit(positive, TERNARY_POSITIVE_CAP),
        negative: rank_and_limit(negative, TERNARY_NEGATIVE_CAP),
        void: rank_and_limit(void, TERNARY_VOID_CAP),
    };
    let pointer_map = build_pointer_map(&delta);
    let weight = delta.total_tokens() as f64 * TERNARY_BIT_WEIGHT;

    CrushResult {
        delta,
        pointer_map,
        weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_kinds_map_to_correct_buckets() {
        let derivations = vec![
            Derivation {
                kind: "requires".to_string(),
                target: "oxygen".to_string(),
                strength: None,
            },
            Derivation {
                kind: "contradicts".to_string(),
                target: "vacuum".to_string(),
                strength: None,
            },
            Derivation {
                kind: "boundary".to_string(),
                target: "altitude".to_string(),
                strength: None,
            },
            Derivation {
                kind: "orthogonal".to_string(),
                target: "color".to_string(),
                strength: None,
            },
        ];
        let result = ternary_crush("combustion", &derivations);
        assert!(result.delta.positive.contains(&"oxygen".to_string()));
        assert!(result.delta.negative.contains(&"vacuum".to_string()));
        assert!(result
            .delta
            .negative
            .contains(&"constrained_by:altitude".to_string()));
        assert!(result.delta.void.contains(&"color".to_string()));
    }

    #[test]
    fn caps_are_enforced() {
        let derivations: Vec<Derivation> = (0..10)
            .map(|i| Derivation {
                kind: "requires".to_string(),
                target: format!("concept_{i}"),
                strength: None,
            })
            .collect();
        let result = ternary_crush("", &derivations);
        assert!(result.delta.positive.len() <= TERNARY_POSITIVE_CAP);
    }

    #[test]
    fn tokens_over_max_length_are_dropped() {
        let derivations = vec![Derivation {
            kind: "requires".to_string(),
            target: "x".repeat(TERNARY_TOKEN_MAX_LEN + 5),
            strength: None,
        }];
        let result = ternary_crush("", &derivations);
        assert!(result.delta.positive.is_empty());
    }

    #[test]
    fn weight_matches_total_token_count_times_bit_weight() {
        let derivations = vec![Derivation {
            kind: "requires".to_string(),
            target: "oxygen".to_string(),
            strength: None,
        }];
        let result = ternary_crush("plain text with no keywords", &derivations);
        let expected = result.delta.total_tokens() as f64 * TERNARY_BIT_WEIGHT;
        assert!((result.weight - expected).abs() < 1e-9);
    }

    #[test]
    fn pointer_map_assigns_sequential_positions_and_tri_values() {
        let derivations = vec![
            Derivation {
                kind: "requires".to_string(),
                target: "a".to_string(),
                strength: None,
            },
            Derivation {
                kind: "contradicts".to_string(),
                target: "b".to_string(),
                strength: None,
            },
        ];
        let result = ternary_crush("", &derivations);
        assert_eq!(result.pointer_map.pointers.get("a"), Some(&(0, 1)));
        assert_eq!(result.pointer_map.pointers.get("b"), Some(&(1, -1)));
    }

    #[test]
    fn deduplicates_preserving_longest_first() {
        let derivations = vec![
            Derivation {
                kind: "requires".to_string(),
                target: "ab".to_string(),
                strength: None,
            },
            Derivation {
                kind: "requires".to_string(),
                target: "abcdef".to_string(),
                strength: None,
            },
            Derivation {
                kind: "requires".to_string(),
                target: "ab".to_string(),
                strength: None,
            },
        ];
        let result = ternary_crush("", &derivations);
        assert_eq!(result.delta.positive, vec!["abcdef", "ab"]);
    }
}
