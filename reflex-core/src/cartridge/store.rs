//! Persistent cartridge store (spec.md §4.1, on-disk layout in §6).
//!
//! Layout per cartridge, rooted at `<name>.kbc/`:
//! - `facts.db` — newline-delimited JSON records (id, content, content_hash,
//!   created_at, access_count, status); a tabular realisation of spec.md's
//!   "tabular fact file" without pulling in a SQL engine.
//! - `annotations.jsonl` — one JSON object per fact, ordered by fact_id.
//! - `indices/{keyword.idx, content_hash.idx, access_log.idx}` — JSON.
//! - `manifest.json`, `metadata.json`.
//! - `grains/<grain_id>.json` — written by the crystallisation pipeline.

use crate::cartridge::fact::{Annotation, Fact};
use crate::cartridge::index::{AccessLogIndex, ContentHashIndex, KeywordIndex};
use crate::cartridge::manifest::Manifest;
use crate::error::{Error, Result};
use crate::types::FactStatus;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Write `bytes` to `path` atomically: write to a sibling temp file, fsync,
/// then rename over the destination (spec.md §4.1: "`save()` is
/// atomic-per-file").
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("tmp")
    ));
    {
        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// A named, on-disk bundle of facts + annotations + indices that behaves
/// like a small read-mostly database (spec.md §3 glossary).
pub struct CartridgeStore {
    root: PathBuf,
    name: String,
    facts: RwLock<BTreeMap<u64, Fact>>,
    annotations: RwLock<BTreeMap<u64, Annotation>>,
    keyword_index: RwLock<KeywordIndex>,
    content_hash_index: RwLock<ContentHashIndex>,
    access_log_index: RwLock<AccessLogIndex>,
    manifest: RwLock<Manifest>,
    next_id: AtomicU64,
}

impl CartridgeStore {
    /// Create a brand-new, empty cartridge rooted at `root/<name>.kbc`.
    #[must_use]
    pub fn create(root: impl AsRef<Path>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            root: root.as_ref().to_path_buf(),
            manifest: RwLock::new(Manifest::new(name.clone())),
            name,
            facts: RwLock::new(BTreeMap::new()),
            annotations: RwLock::new(BTreeMap::new()),
            keyword_index: RwLock::new(KeywordIndex::new()),
            content_hash_index: RwLock::new(ContentHashIndex::new()),
            access_log_index: RwLock::new(AccessLogIndex::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn cartridge_dir(root: &Path, name: &str) -> PathBuf {
        root.join(format!("{name}.kbc"))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dir(&self) -> PathBuf {
        Self::cartridge_dir(&self.root, &self.name)
    }

    /// Load a cartridge from disk, regenerating any corrupt or missing
    /// component (spec.md §4.1 failure semantics).
    pub fn load(root: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let name = name.into();
        let dir = Self::cartridge_dir(&root, &name);

        let facts = Self::load_facts(&dir)?;
        let annotations = Self::load_annotations(&dir)?;

        let keyword_index = Self::load_or_rebuild_keyword_index(&dir, &facts);
        let content_hash_index = Self::load_or_rebuild_hash_index(&dir, &facts);
        let access_log_index = Self::load_access_log(&dir);
        let manifest = Self::load_or_regenerate_manifest(&dir, &name, &facts, &annotations);

        let next_id = facts.keys().next_back().copied().unwrap_or(0) + 1;

        Ok(Self {
            root,
            name,
            facts: RwLock::new(facts),
            annotations: RwLock::new(annotations),
            keyword_index: RwLock::new(keyword_index),
            content_hash_index: RwLock::new(content_hash_index),
            access_log_index: RwLock::new(access_log_index),
            manifest: RwLock::new(manifest),
            next_id: AtomicU64::new(next_id),
        })
    }

    fn load_facts(dir: &Path) -> Result<BTreeMap<u64, Fact>> {
        let path = dir.join("facts.db");
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(path)?;
        let mut out = BTreeMap::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let fact: Fact = serde_json::from_str(line)?;
            out.insert(fact.id, fact);
        }
        Ok(out)
    }

    fn load_annotations(dir: &Path) -> Result<BTreeMap<u64, Annotation>> {
        let path = dir.join("annotations.jsonl");
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(path)?;
        let mut out = BTreeMap::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let ann: Annotation = serde_json::from_str(line)?;
            out.insert(ann.fact_id, ann);
        }
        Ok(out)
    }

    fn load_or_rebuild_keyword_index(dir: &Path, facts: &BTreeMap<u64, Fact>) -> KeywordIndex {
        let path = dir.join("indices").join("keyword.idx");
        fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| {
                KeywordIndex::rebuild_from(facts.iter().map(|(id, f)| (*id, f.content.as_str())))
            })
    }

    fn load_or_rebuild_hash_index(dir: &Path, facts: &BTreeMap<u64, Fact>) -> ContentHashIndex {
        let path = dir.join("indices").join("content_hash.idx");
        fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| {
                ContentHashIndex::rebuild_from(
                    facts.values().map(|f| (f.content_hash.as_str(), f.id)),
                )
            })
    }

    fn load_access_log(dir: &Path) -> AccessLogIndex {
        let path = dir.join("indices").join("access_log.idx");
        fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    fn load_or_regenerate_manifest(
        dir: &Path,
        name: &str,
        facts: &BTreeMap<u64, Fact>,
        annotations: &BTreeMap<u64, Annotation>,
    ) -> Manifest {
        let path = dir.join("manifest.json");
        if let Some(m) = fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<Manifest>(&s).ok())
        {
            return m;
        }
        let mut m = Manifest::new(name);
        let confidences: Vec<f64> = facts
            .keys()
            .filter_map(|id| annotations.get(id).map(|a| a.confidence))
            .collect();
        m.refresh(&confidences);
        m
    }

    /// Add a fact, deduplicating by content hash (spec.md §4.1:
    /// "duplicate content returns existing id (never raises)").
    pub fn add_fact(&self, text: &str, annotation: Annotation) -> Result<u64> {
        let hash = Fact::hash_content(text);
        if let Some(existing) = self.content_hash_index.read().get(&hash) {
            return Ok(existing);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let fact = Fact {
            id,
            content: text.to_string(),
            content_hash: hash.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            access_count: 0,
            status: FactStatus::Active,
        };

        self.keyword_index.write().index_fact(id, text);
        self.content_hash_index.write().insert(hash, id);
        self.facts.write().insert(id, fact);

        let mut ann = annotation;
        ann.fact_id = id;
        self.annotations.write().insert(id, ann);

        let confidences: Vec<f64> = self.annotations.read().values().map(|a| a.confidence).collect();
        self.manifest.write().refresh(&confidences);

        Ok(id)
    }

    #[must_use]
    pub fn get_fact(&self, id: u64) -> Option<Fact> {
        self.facts.read().get(&id).cloned()
    }

    #[must_use]
    pub fn get_annotation(&self, id: u64) -> Option<Annotation> {
        self.annotations.read().get(&id).cloned()
    }

    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.read().len()
    }

    #[must_use]
    pub fn manifest(&self) -> Manifest {
        self.manifest.read().clone()
    }

    pub fn update_manifest(&self, f: impl FnOnce(&mut Manifest)) {
        f(&mut self.manifest.write());
    }

    /// Query terms through the keyword index, returning fact ids ranked by
    /// annotation confidence (spec.md §4.1).
    ///
    /// Semantics: intersect posting lists for all query keywords; if the
    /// intersection is empty, fall back to the union. Ties are broken by
    /// fact id for a stable order. Access logging is optional per call.
    #[must_use]
    pub fn query(&self, terms: &[String], log_access: bool) -> Vec<u64> {
        let keywords = crate::cartridge::index::filter_stop_words(
            terms.iter().map(|t| t.to_lowercase()).collect(),
        );
        if keywords.is_empty() {
            return Vec::new();
        }

        let index = self.keyword_index.read();
        let posting_lists: Vec<_> = keywords
            .iter()
            .filter_map(|kw| index.lookup(kw))
            .collect();

        let result_ids: Vec<u64> = if posting_lists.is_empty() {
            Vec::new()
        } else {
            let mut intersection = posting_lists[0].clone();
            for list in &posting_lists[1..] {
                intersection = intersection.intersection(list).copied().collect();
            }
            if intersection.is_empty() {
                let mut union = std::collections::BTreeSet::new();
                for list in &posting_lists {
                    union.extend(list.iter().copied());
                }
                union.into_iter().collect()
            } else {
                intersection.into_iter().collect()
            }
        };
        drop(index);

        let annotations = self.annotations.read();
        let mut ranked: Vec<u64> = result_ids;
        ranked.sort_by(|a, b| {
            let ca = annotations.get(a).map_or(0.0, |x| x.confidence);
            let cb = annotations.get(b).map_or(0.0, |x| x.confidence);
            cb.partial_cmp(&ca).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(b))
        });
        drop(annotations);

        if log_access {
            let mut facts = self.facts.write();
            let mut access_log = self.access_log_index.write();
            for id in &ranked {
                access_log.record(*id);
                if let Some(f) = facts.get_mut(id) {
                    f.access_count += 1;
                }
            }
        }

        ranked
    }

    /// Persist every component atomically, file-by-file, fsyncing the
    /// manifest last (spec.md §4.1, §4.4: "fsync manifest last").
    pub fn save(&self) -> Result<()> {
        let dir = self.dir();
        fs::create_dir_all(&dir)?;
        fs::create_dir_all(dir.join("indices"))?;
        fs::create_dir_all(dir.join("grains"))?;

        let facts_body: String = self
            .facts
            .read()
            .values()
            .map(|f| serde_json::to_string(f).map(|s| s + "\n"))
            .collect::<std::result::Result<String, _>>()
            .map_err(Error::Serialization)?;
        write_atomic(&dir.join("facts.db"), facts_body.as_bytes())?;

        let ann_body: String = self
            .annotations
            .read()
            .values()
            .map(|a| serde_json::to_string(a).map(|s| s + "\n"))
            .collect::<std::result::Result<String, _>>()
            .map_err(Error::Serialization)?;
        write_atomic(&dir.join("annotations.jsonl"), ann_body.as_bytes())?;

        write_atomic(
            &dir.join("indices").join("keyword.idx"),
            serde_json::to_string(&*self.keyword_index.read())?.as_bytes(),
        )?;
        write_atomic(
            &dir.join("indices").join("content_hash.idx"),
            serde_json::to_string(&*self.content_hash_index.read())?.as_bytes(),
        )?;
        write_atomic(
            &dir.join("indices").join("access_log.idx"),
            serde_json::to_string(&*self.access_log_index.read())?.as_bytes(),
        )?;

        write_atomic(
            &dir.join("metadata.json"),
            serde_json::json!({ "name": self.name }).to_string().as_bytes(),
        )?;

        // Manifest last: if a crash happens between files, the manifest's
        // absence on reload triggers regeneration from `facts.db`.
        write_atomic(
            &dir.join("manifest.json"),
            serde_json::to_string(&*self.manifest.read())?.as_bytes(),
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EpistemicLevel;

    fn ann(confidence: f64) -> Annotation {
        Annotation::new(0, confidence, EpistemicLevel::L0Empirical)
    }

    #[test]
    fn add_fact_dedups_by_content_hash() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CartridgeStore::create(tmp.path(), "bio");
        let id1 = store.add_fact("ATP is adenosine triphosphate", ann(0.96)).unwrap();
        let id2 = store.add_fact("ATP is adenosine triphosphate", ann(0.5)).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.fact_count(), 1);
    }

    #[test]
    fn query_intersects_then_falls_back_to_union() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CartridgeStore::create(tmp.path(), "bio");
        store.add_fact("ATP is adenosine triphosphate", ann(0.9)).unwrap();
        store.add_fact("DNA stores genetic information", ann(0.8)).unwrap();

        let hits = store.query(&["atp".into(), "triphosphate".into()], false);
        assert_eq!(hits.len(), 1);

        // No shared keyword -> empty intersection -> union fallback.
        let hits = store.query(&["atp".into(), "genetic".into()], false);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CartridgeStore::create(tmp.path(), "bio");
        let id = store.add_fact("ATP is adenosine triphosphate", ann(0.96)).unwrap();
        store.save().unwrap();

        let loaded = CartridgeStore::load(tmp.path(), "bio").unwrap();
        assert_eq!(loaded.fact_count(), 1);
        assert_eq!(loaded.get_fact(id).unwrap().content_hash, Fact::hash_content("ATP is adenosine triphosphate"));
    }

    #[test]
    fn load_regenerates_missing_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CartridgeStore::create(tmp.path(), "bio");
        store.add_fact("ATP is adenosine triphosphate", ann(0.96)).unwrap();
        store.save().unwrap();

        std::fs::remove_file(store.dir().join("manifest.json")).unwrap();
        let loaded = CartridgeStore::load(tmp.path(), "bio").unwrap();
        assert_eq!(loaded.manifest().fact_count, 1);
    }

    #[test]
    fn load_rebuilds_corrupt_keyword_index() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CartridgeStore::create(tmp.path(), "bio");
        store.add_fact("ATP is adenosine triphosphate", ann(0.96)).unwrap();
        store.save().unwrap();

        std::fs::write(store.dir().join("indices").join("keyword.idx"), b"not json").unwrap();
        let loaded = CartridgeStore::load(tmp.path(), "bio").unwrap();
        let hits = loaded.query(&["atp".into()], false);
        assert_eq!(hits.len(), 1);
    }
}
