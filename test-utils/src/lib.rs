//! Shared test fixtures for reflex-core and reflex-cli integration tests.

use reflex_core::cartridge::{Annotation, CartridgeStore};
use reflex_core::types::EpistemicLevel;
use tempfile::TempDir;

/// A populated cartridge store backed by a temp dir that lives as long as
/// the returned handle does.
pub struct PopulatedCartridge {
    pub dir: TempDir,
    pub store: CartridgeStore,
}

/// Build a small "geography" cartridge with a handful of facts at varying
/// confidence, useful for exercising query/index/grain-routing paths
/// end-to-end without hand-writing fixtures in every test.
#[must_use]
pub fn populated_geography_cartridge() -> PopulatedCartridge {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = CartridgeStore::create(dir.path(), "geography");

    let facts: &[(&str, f64, EpistemicLevel)] = &[
        (
            "Mount Everest is the tallest mountain above sea level",
            0.98,
            EpistemicLevel::L0Empirical,
        ),
        (
            "Mountains form when tectonic plates collide and uplift crust",
            0.93,
            EpistemicLevel::L0Empirical,
        ),
        (
            "The Amazon rainforest produces a significant share of global oxygen",
            0.7,
            EpistemicLevel::L2Narrative,
        ),
        (
            "Deserts are generally drier than rainforests",
            0.6,
            EpistemicLevel::L3Heuristic,
        ),
    ];

    for (text, confidence, level) in facts {
        store
            .add_fact(text, Annotation::new(0, *confidence, *level))
            .expect("add fixture fact");
    }

    PopulatedCartridge { dir, store }
}

/// A high-confidence, low-variance confidence history that should clear
/// every Sicherman gate, for crystallisation-pipeline tests.
#[must_use]
pub fn crystallisable_confidence_history() -> Vec<f64> {
    vec![0.95, 0.96, 0.94, 0.95, 0.96]
}

/// A confidence history that should fail the least-resistance gate.
#[must_use]
pub fn low_confidence_history() -> Vec<f64> {
    vec![0.4, 0.5, 0.45]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_cartridge_is_queryable() {
        let fixture = populated_geography_cartridge();
        let hits = fixture.store.query(&["everest".to_string()], false);
        assert_eq!(hits.len(), 1);
    }
}
