//! End-to-end phantom crystallisation: feed a phantom candidate until it
//! locks, run it through the Sicherman gates, crush it into a grain, and
//! confirm the grain router can find it by (cartridge, fact_id).

use reflex_core::cartridge::Annotation;
use reflex_core::constants::{LOCK_CYCLES, TERNARY_BIT_WEIGHT};
use reflex_core::grain::{CrystallisationCandidate, CrystallisationPipeline, GrainRouter, GrainStore};
use reflex_core::phantom::{PhantomRegistry, PhantomStatus};
use reflex_core::types::{Derivation, EpistemicLevel};
use std::sync::Arc;

#[test]
fn fact_observed_for_fifty_five_cycles_locks_and_crystallises() {
    let registry = PhantomRegistry::new();
    let key = "bio:7";

    let terms = vec!["atp".to_string(), "oxygen".to_string()];
    for _ in 0..55 {
        registry.record_hit(key, &terms, 0.95);
        registry.advance_cycle();
    }

    let candidate = registry.get(key).unwrap();
    assert_eq!(candidate.status, PhantomStatus::Locked);
    assert!(candidate.consecutive_persistent_cycles >= LOCK_CYCLES);

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(GrainStore::load(dir.path()).unwrap());
    let pipeline = CrystallisationPipeline::new(store.clone());

    let derivations = vec![Derivation {
        kind: "requires".to_string(),
        target: "oxygen".to_string(),
        strength: None,
    }];
    let mut annotation = Annotation::new(7, 0.95, EpistemicLevel::L0Empirical);
    annotation.derivations = derivations;

    let (report, grain) = pipeline
        .crystallise(CrystallisationCandidate {
            cartridge: "bio",
            fact_id: 7,
            fact_text: "ATP synthesis requires oxygen",
            annotation: &annotation,
            confidence_history: &candidate.confidence_history,
        })
        .unwrap();

    assert!(report.passed(), "gates failed: {:?}", report.failure_reasons());
    let grain = grain.expect("passing candidate must produce a grain");
    assert!(!grain.pointer_map.pointers.is_empty());
    let positive_count = grain.delta.positive.len() as f64;
    assert!((grain.weight - positive_count * TERNARY_BIT_WEIGHT).abs() < 1e-9);

    let router = GrainRouter::new(store);
    let found = router.lookup("bio", 7).expect("router must find the crystallised grain");
    assert_eq!(found.grain_id, grain.grain_id);
}
