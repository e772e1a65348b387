//! Coupling validator: checks relationships between a query's epistemic
//! levels and assigns a severity on the total order
//! PASS < LOW < MEDIUM < HIGH < CRITICAL (spec.md §4.10).

use super::{SpotlightFact, SpotlightQuery};
use crate::types::{EpistemicLevel, Severity};
use serde::{Deserialize, Serialize};

/// One named coupling rule's outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CouplingFinding {
    pub rule: &'static str,
    pub severity: Severity,
    pub detail: String,
}

fn facts_at(query: &SpotlightQuery, level: EpistemicLevel) -> &[SpotlightFact] {
    query
        .levels
        .get(level.key())
        .map_or(&[][..], Vec::as_slice)
}

fn any_conflicting(facts: &[SpotlightFact]) -> bool {
    facts.iter().any(|f| f.conflicts_with_lower)
}

/// Runs the pinned layer-pair coupling rules over a spotlight query and
/// reports the worst severity seen (spec.md §4.10's layer-pair -> severity
/// mapping; the magnitude thresholds within LOW/MEDIUM are the only part
/// left to this implementation, per spec.md's Open Questions).
pub struct CouplingValidator;

impl CouplingValidator {
    /// L0 vs L1: an axiom (L1) that contradicts a verified empirical (L0)
    /// fact is the most severe coupling failure — the cascade is about to
    /// answer from a rule that denies ground truth.
    fn axiom_contradicts_empirical(query: &SpotlightQuery) -> CouplingFinding {
        let empirical = facts_at(query, EpistemicLevel::L0Empirical);
        let axiomatic = facts_at(query, EpistemicLevel::L1Axiomatic);
        let severity = if !empirical.is_empty() && any_conflicting(axiomatic) {
            Severity::Critical
        } else {
            Severity::Pass
        };
        CouplingFinding {
            rule: "axiom_contradicts_empirical",
            severity,
            detail: format!("empirical={} axiomatic={}", empirical.len(), axiomatic.len()),
        }
    }

    /// L1 vs L2: a narrative (L2) fact that violates an axiom (L1) is
    /// serious but not as dangerous as contradicting ground truth directly.
    fn narrative_violates_axiom(query: &SpotlightQuery) -> CouplingFinding {
        let axiomatic = facts_at(query, EpistemicLevel::L1Axiomatic);
        let narrative = facts_at(query, EpistemicLevel::L2Narrative);
        let severity = if !axiomatic.is_empty() && any_conflicting(narrative) {
            Severity::High
        } else {
            Severity::Pass
        };
        CouplingFinding {
            rule: "narrative_violates_axiom",
            severity,
            detail: format!("axiomatic={} narrative={}", axiomatic.len(), narrative.len()),
        }
    }

    /// L2 vs L4: an intent (L4) fact only weakly supported by the narrative
    /// (L2) behind it is a moderate inconsistency worth flagging.
    fn intent_weakly_supported_by_narrative(query: &SpotlightQuery) -> CouplingFinding {
        let narrative = facts_at(query, EpistemicLevel::L2Narrative);
        let intent = facts_at(query, EpistemicLevel::L4Intent);
        let severity = if !narrative.is_empty() && any_conflicting(intent) {
            Severity::Medium
        } else {
            Severity::Pass
        };
        CouplingFinding {
            rule: "intent_weakly_supported_by_narrative",
            severity,
            detail: format!("narrative={} intent={}", narrative.len(), intent.len()),
        }
    }

    /// L4 vs L3/L5: a heuristic (L3) or mask (L5) fact unsupported by any
    /// intent (L4) is a low-severity, purely structural inconsistency —
    /// nothing conflicts, something is just missing underneath it.
    fn heuristic_or_mask_unsupported_by_intent(query: &SpotlightQuery) -> CouplingFinding {
        let intent = facts_at(query, EpistemicLevel::L4Intent);
        let heuristic = facts_at(query, EpistemicLevel::L3Heuristic);
        let mask = facts_at(query, EpistemicLevel::L5Mask);
        let severity = if intent.is_empty() && (!heuristic.is_empty() || !mask.is_empty()) {
            Severity::Low
        } else {
            Severity::Pass
        };
        CouplingFinding {
            rule: "heuristic_or_mask_unsupported_by_intent",
            severity,
            detail: format!(
                "intent={} heuristic={} mask={}",
                intent.len(),
                heuristic.len(),
                mask.len()
            ),
        }
    }

    /// Run every rule and report the worst severity plus the full list of
    /// findings (spec.md §4.10: "atomic multi-field validation per query").
    #[must_use]
    pub fn validate(query: &SpotlightQuery) -> (Severity, Vec<CouplingFinding>) {
        let findings = vec![
            Self::axiom_contradicts_empirical(query),
            Self::narrative_violates_axiom(query),
            Self::intent_weakly_supported_by_narrative(query),
            Self::heuristic_or_mask_unsupported_by_intent(query),
        ];
        let worst = findings.iter().map(|f| f.severity).max().unwrap_or(Severity::Pass);
        (worst, findings)
    }
}
