//! Crystallisation pipeline: validate a phantom candidate, crush it into a
//! grain, and persist it (spec.md §4.4).

use crate::cartridge::Annotation;
use crate::error::{Error, Result};
use crate::grain::store::GrainStore;
use crate::grain::ternary::ternary_crush;
use crate::grain::types::{generate_grain_id, Grain};
use crate::grain::validator::{validate, ValidationReport};
use std::sync::Arc;
use tracing::info;

/// Everything the pipeline needs to attempt crystallisation of one fact.
pub struct CrystallisationCandidate<'a> {
    pub cartridge: &'a str,
    pub fact_id: u64,
    pub fact_text: &'a str,
    pub annotation: &'a Annotation,
    pub confidence_history: &'a [f64],
}

/// Validates then crushes a candidate into a grain, persisting accepted
/// grains through a shared [`GrainStore`].
pub struct CrystallisationPipeline {
    store: Arc<GrainStore>,
}

impl CrystallisationPipeline {
    #[must_use]
    pub fn new(store: Arc<GrainStore>) -> Self {
        Self { store }
    }

    /// Run the full gate + crush + persist pipeline. Returns the validation
    /// report either way; the grain is only produced and saved when every
    /// gate passes.
    pub fn crystallise(
        &self,
        candidate: CrystallisationCandidate<'_>,
    ) -> Result<(ValidationReport, Option<Grain>)> {
        let report = validate(candidate.confidence_history);
        if !report.passed() {
            return Ok((report, None));
        }

        let crushed = ternary_crush(candidate.fact_text, &candidate.annotation.derivations);
        let grain = Grain {
            grain_id: generate_grain_id(candidate.cartridge, candidate.fact_id),
            cartridge: candidate.cartridge.to_string(),
            fact_id: candidate.fact_id,
            confidence: candidate.annotation.confidence,
            delta: crushed.delta,
            pointer_map: crushed.pointer_map,
            weight: crushed.weight,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        self.store
            .put(grain.clone())
            .map_err(|e| Error::Storage(e.to_string()))?;
        info!(grain_id = %grain.grain_id, cartridge = candidate.cartridge, "crystallised grain");

        Ok((report, Some(grain)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EpistemicLevel;

    #[test]
    fn passing_candidate_produces_and_persists_a_grain() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(GrainStore::load(dir.path()).unwrap());
        let pipeline = CrystallisationPipeline::new(store.clone());

        let annotation = Annotation::new(1, 0.96, EpistemicLevel::L0Empirical);
        let history = [0.95, 0.96, 0.94, 0.95, 0.96];
        let (report, grain) = pipeline
            .crystallise(CrystallisationCandidate {
                cartridge: "geo",
                fact_id: 1,
                fact_text: "mountains require tectonic uplift",
                annotation: &annotation,
                confidence_history: &history,
            })
            .unwrap();

        assert!(report.passed());
        let grain = grain.unwrap();
        assert!(store.lookup_by_grain_id(&grain.grain_id).is_some());
    }

    #[test]
    fn failing_candidate_produces_no_grain() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(GrainStore::load(dir.path()).unwrap());
        let pipeline = CrystallisationPipeline::new(store.clone());

        let annotation = Annotation::new(1, 0.4, EpistemicLevel::L3Heuristic);
        let history = [0.4, 0.5, 0.3];
        let (report, grain) = pipeline
            .crystallise(CrystallisationCandidate {
                cartridge: "geo",
                fact_id: 1,
                fact_text: "maybe something",
                annotation: &annotation,
                confidence_history: &history,
            })
            .unwrap();

        assert!(!report.passed());
        assert!(grain.is_none());
        assert!(store.is_empty());
    }
}
