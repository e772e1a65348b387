//! Tokenisation, stop-word filtering, and the keyword / content-hash /
//! access-log indices that back [`super::store::CartridgeStore::query`].

use std::collections::{BTreeMap, BTreeSet};

/// Closed stop-word list (spec.md §4.1: "closed list").
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "is", "are", "was", "were", "be", "been",
    "being", "of", "in", "on", "at", "to", "for", "with", "by", "from", "as", "that", "this",
    "these", "those", "it", "its", "do", "does", "did", "will", "would", "can", "could",
    "should", "may", "might", "must", "shall", "not", "no", "so", "than", "then", "there",
    "what", "which", "who", "whom", "how", "when", "where", "why",
];

/// Characters kept verbatim instead of being stripped as punctuation
/// (spec.md §4.1: "strip punctuation except ° ± -").
const KEPT_SYMBOLS: &[char] = &['°', '±', '-'];

/// Tokenise: lowercase, strip punctuation (except kept symbols), split on
/// whitespace, drop empties. Does not filter stop-words (see
/// [`filter_stop_words`]).
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in lowered.chars() {
        if ch.is_alphanumeric() || KEPT_SYMBOLS.contains(&ch) {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Remove stop-words from a token sequence, preserving order.
#[must_use]
pub fn filter_stop_words(tokens: Vec<String>) -> Vec<String> {
    tokens
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Tokenise and filter stop-words in one pass — the keyword-extraction path
/// used for both indexing and querying.
#[must_use]
pub fn keywords_of(text: &str) -> Vec<String> {
    filter_stop_words(tokenize(text))
}

/// keyword → set of fact ids (spec.md §4.1 index set item (b)).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct KeywordIndex {
    postings: BTreeMap<String, BTreeSet<u64>>,
}

impl KeywordIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_fact(&mut self, fact_id: u64, text: &str) {
        for kw in keywords_of(text) {
            self.postings.entry(kw).or_default().insert(fact_id);
        }
    }

    pub fn remove_fact(&mut self, fact_id: u64, text: &str) {
        for kw in keywords_of(text) {
            if let Some(set) = self.postings.get_mut(&kw) {
                set.remove(&fact_id);
                if set.is_empty() {
                    self.postings.remove(&kw);
                }
            }
        }
    }

    #[must_use]
    pub fn lookup(&self, keyword: &str) -> Option<&BTreeSet<u64>> {
        self.postings.get(keyword)
    }

    #[must_use]
    pub fn rebuild_from<'a>(facts: impl Iterator<Item = (u64, &'a str)>) -> Self {
        let mut idx = Self::new();
        for (id, text) in facts {
            idx.index_fact(id, text);
        }
        idx
    }
}

/// content_hash → fact_id exact-dedup index (spec.md §4.1 index set item (a)).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ContentHashIndex {
    by_hash: BTreeMap<String, u64>,
}

impl ContentHashIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hash: String, fact_id: u64) {
        self.by_hash.entry(hash).or_insert(fact_id);
    }

    #[must_use]
    pub fn get(&self, hash: &str) -> Option<u64> {
        self.by_hash.get(hash).copied()
    }

    #[must_use]
    pub fn rebuild_from<'a>(facts: impl Iterator<Item = (&'a str, u64)>) -> Self {
        let mut idx = Self::new();
        for (hash, id) in facts {
            idx.insert(hash.to_string(), id);
        }
        idx
    }
}

/// Optional per-fact access log (spec.md §4.1 index set item (c)).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AccessLogIndex {
    counts: BTreeMap<u64, u64>,
}

impl AccessLogIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, fact_id: u64) {
        *self.counts.entry(fact_id).or_insert(0) += 1;
    }

    #[must_use]
    pub fn count_for(&self, fact_id: u64) -> u64 {
        self.counts.get(&fact_id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_strips_punctuation_but_keeps_symbols() {
        let toks = tokenize("Water boils at 100°C, approx. ±2 degrees!");
        assert!(toks.contains(&"100°c".to_string()));
        assert!(toks.contains(&"±2".to_string()));
        assert!(!toks.iter().any(|t| t.contains('!')));
    }

    #[test]
    fn stop_words_filtered() {
        let kws = keywords_of("What is the capital of France?");
        assert!(!kws.contains(&"what".to_string()));
        assert!(!kws.contains(&"is".to_string()));
        assert!(!kws.contains(&"the".to_string()));
        assert!(kws.contains(&"capital".to_string()));
        assert!(kws.contains(&"france".to_string()));
    }

    #[test]
    fn keyword_index_round_trips() {
        let mut idx = KeywordIndex::new();
        idx.index_fact(1, "ATP is adenosine triphosphate");
        idx.index_fact(2, "DNA stores genetic information");
        assert!(idx.lookup("atp").unwrap().contains(&1));
        assert!(idx.lookup("genetic").unwrap().contains(&2));
        idx.remove_fact(1, "ATP is adenosine triphosphate");
        assert!(idx.lookup("atp").is_none());
    }
}
