//! Grain store: loads every `<cartridge>.kbc/grains/*.json` at startup,
//! indexes by grain_id/fact_id/cartridge, persists new grains (spec.md §4.4,
//! §4.5, grounded on `original_source/src/grain_router.py`'s load path).

use crate::cartridge::store::write_atomic;
use crate::error::Result;
use crate::grain::types::Grain;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// In-memory + on-disk registry of crystallised grains across all cartridges.
pub struct GrainStore {
    root: PathBuf,
    by_id: RwLock<BTreeMap<String, Grain>>,
    by_fact: RwLock<BTreeMap<(String, u64), String>>,
}

impl GrainStore {
    /// Load every grain found under `root/<cartridge>/grains/*.json`.
    /// Duplicate grain ids are rejected: the first one seen wins, and a
    /// warning is logged for every later duplicate (spec.md §4.5: "grain
    /// router loads all grains at startup").
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut by_id = BTreeMap::new();
        let mut by_fact = BTreeMap::new();

        if root.is_dir() {
            for cartridge_entry in fs::read_dir(&root)? {
                let cartridge_entry = cartridge_entry?;
                let grains_dir = cartridge_entry.path().join("grains");
                if !grains_dir.is_dir() {
                    continue;
                }
                for grain_file in fs::read_dir(&grains_dir)? {
                    let grain_file = grain_file?;
                    let path = grain_file.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("json") {
                        continue;
                    }
                    let bytes = fs::read(&path)?;
                    let grain: Grain = serde_json::from_slice(&bytes)?;
                    if by_id.contains_key(&grain.grain_id) {
                        warn!(grain_id = %grain.grain_id, path = %path.display(), "duplicate grain id, keeping first loaded");
                        continue;
                    }
                    by_fact.insert((grain.cartridge.clone(), grain.fact_id), grain.grain_id.clone());
                    by_id.insert(grain.grain_id.clone(), grain);
                }
            }
        }

        Ok(Self {
            root,
            by_id: RwLock::new(by_id),
            by_fact: RwLock::new(by_fact),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Insert or replace a grain, and persist it atomically to
    /// `root/<cartridge>/grains/<grain_id>.json`.
    pub fn put(&self, grain: Grain) -> Result<()> {
        let dir = self.root.join(&grain.cartridge).join("grains");
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", grain.grain_id));
        let bytes = serde_json::to_vec_pretty(&grain)?;
        write_atomic(&path, &bytes)?;

        self.by_fact
            .write()
            .insert((grain.cartridge.clone(), grain.fact_id), grain.grain_id.clone());
        self.by_id.write().insert(grain.grain_id.clone(), grain);
        Ok(())
    }

    #[must_use]
    pub fn lookup_by_grain_id(&self, grain_id: &str) -> Option<Grain> {
        self.by_id.read().get(grain_id).cloned()
    }

    #[must_use]
    pub fn lookup(&self, cartridge: &str, fact_id: u64) -> Option<Grain> {
        let id = self
            .by_fact
            .read()
            .get(&(cartridge.to_string(), fact_id))?
            .clone();
        self.by_id.read().get(&id).cloned()
    }

    #[must_use]
    pub fn all_in_cartridge(&self, cartridge: &str) -> Vec<Grain> {
        self.by_id
            .read()
            .values()
            .filter(|g| g.cartridge == cartridge)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn all(&self) -> Vec<Grain> {
        self.by_id.read().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.read().is_empty()
    }
}

impl std::fmt::Debug for GrainStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrainStore")
            .field("root", &self.root)
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grain::ternary::{PointerMap, TernaryDelta};

    fn sample_grain(cartridge: &str, fact_id: u64, grain_id: &str) -> Grain {
        Grain {
            grain_id: grain_id.to_string(),
            cartridge: cartridge.to_string(),
            fact_id,
            confidence: 0.9,
            delta: TernaryDelta::default(),
            pointer_map: PointerMap::default(),
            weight: 1.0,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn put_then_lookup_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = GrainStore::load(dir.path()).unwrap();
        store.put(sample_grain("geo", 1, "sg_aaaaaaaa")).unwrap();
        assert!(store.lookup("geo", 1).is_some());
        assert!(store.lookup_by_grain_id("sg_aaaaaaaa").is_some());
    }

    #[test]
    fn load_reads_back_persisted_grains() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = GrainStore::load(dir.path()).unwrap();
            store.put(sample_grain("geo", 1, "sg_aaaaaaaa")).unwrap();
        }
        let reloaded = GrainStore::load(dir.path()).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.lookup_by_grain_id("sg_aaaaaaaa").is_some());
    }

    #[test]
    fn duplicate_grain_id_keeps_first_loaded() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("geo/grains")).unwrap();
        fs::create_dir_all(dir.path().join("chem/grains")).unwrap();
        let g1 = sample_grain("geo", 1, "sg_dup00000");
        let mut g2 = sample_grain("chem", 2, "sg_dup00000");
        g2.confidence = 0.5;
        fs::write(
            dir.path().join("geo/grains/sg_dup00000.json"),
            serde_json::to_vec(&g1).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.path().join("chem/grains/sg_dup00000.json"),
            serde_json::to_vec(&g2).unwrap(),
        )
        .unwrap();

        let store = GrainStore::load(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        let kept = store.lookup_by_grain_id("sg_dup00000").unwrap();
        assert_eq!(kept.confidence, 0.9);
    }
}
