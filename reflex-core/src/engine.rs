//! Inference engine contract and the two concrete adapters that sit in front
//! of a cartridge/grain pair (spec.md §4.6, grounded on
//! `original_source/src/orchestration/query_orchestrator.py`'s engine
//! protocol expectations).

use crate::cartridge::CartridgeStore;
use crate::grain::{route_for_confidence, GrainRouter, RouteLayer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// A request handed to an [`InferenceEngine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub query: String,
    pub cartridge: Option<String>,
}

/// An engine's response. Low confidence with `answer: None` is a normal,
/// expected outcome, not an error (spec.md §4.6: "must not raise on
/// low-confidence-but-answerable input").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub answer: Option<String>,
    pub confidence: f64,
    pub sources: Vec<u64>,
    pub latency_ms: u64,
    pub engine_name: String,
}

impl InferenceResponse {
    #[must_use]
    pub fn miss(engine_name: &str) -> Self {
        Self {
            answer: None,
            confidence: 0.0,
            sources: Vec::new(),
            latency_ms: 0,
            engine_name: engine_name.to_string(),
        }
    }
}

/// Engine health, reported independently of any single query's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineHealth {
    Healthy,
    Degraded,
    Unavailable,
}

/// The contract every cascade layer implements (spec.md §4.6).
///
/// A `query` call may raise on transport failure, in which case the
/// orchestrator treats it as a miss and moves to the next layer. It must
/// never raise merely because confidence came back low.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    fn name(&self) -> &str;
    async fn query(&self, request: InferenceRequest) -> crate::error::Result<InferenceResponse>;
    fn health(&self) -> EngineHealth;
}

/// Layer 0/1/2 engine: answers directly from already-crystallised grains.
pub struct GrainEngine {
    router: Arc<GrainRouter>,
}

impl GrainEngine {
    #[must_use]
    pub fn new(router: Arc<GrainRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl InferenceEngine for GrainEngine {
    fn name(&self) -> &str {
        "grain"
    }

    async fn query(&self, request: InferenceRequest) -> crate::error::Result<InferenceResponse> {
        let started = Instant::now();
        let terms = crate::cartridge::index::keywords_of(&request.query);
        let hits = self.router.search_grains(&terms, request.cartridge.as_deref());
        let Some(best) = hits.first() else {
            return Ok(InferenceResponse::miss(self.name()));
        };
        let layer = route_for_confidence(best.grain.confidence);
        if layer == RouteLayer::Skip {
            return Ok(InferenceResponse::miss(self.name()));
        }
        Ok(InferenceResponse {
            answer: Some(best.grain.grain_id.clone()),
            confidence: best.grain.confidence,
            sources: vec![best.grain.fact_id],
            latency_ms: started.elapsed().as_millis() as u64,
            engine_name: self.name().to_string(),
        })
    }

    fn health(&self) -> EngineHealth {
        EngineHealth::Healthy
    }
}

/// Layer 2/3 fallback engine: queries a cartridge's keyword index directly.
pub struct CartridgeEngine {
    store: Arc<CartridgeStore>,
}

impl CartridgeEngine {
    #[must_use]
    pub fn new(store: Arc<CartridgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl InferenceEngine for CartridgeEngine {
    fn name(&self) -> &str {
        "cartridge"
    }

    async fn query(&self, request: InferenceRequest) -> crate::error::Result<InferenceResponse> {
        let started = Instant::now();
        let terms = crate::cartridge::index::keywords_of(&request.query);
        let hits = self.store.query(&terms, true);
        let Some(&fact_id) = hits.first() else {
            return Ok(InferenceResponse::miss(self.name()));
        };
        let Some(annotation) = self.store.get_annotation(fact_id) else {
            return Ok(InferenceResponse::miss(self.name()));
        };
        let Some(fact) = self.store.get_fact(fact_id) else {
            return Ok(InferenceResponse::miss(self.name()));
        };
        Ok(InferenceResponse {
            answer: Some(fact.content),
            confidence: annotation.confidence,
            sources: vec![fact_id],
            latency_ms: started.elapsed().as_millis() as u64,
            engine_name: self.name().to_string(),
        })
    }

    fn health(&self) -> EngineHealth {
        EngineHealth::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Annotation;
    use crate::types::EpistemicLevel;

    #[tokio::test]
    async fn cartridge_engine_answers_from_best_match() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(CartridgeStore::create(tmp.path(), "geo"));
        store
            .add_fact(
                "mountains form from tectonic uplift",
                Annotation::new(0, 0.9, EpistemicLevel::L0Empirical),
            )
            .unwrap();
        let engine = CartridgeEngine::new(store);

        let response = engine
            .query(InferenceRequest {
                query: "tectonic uplift".to_string(),
                cartridge: None,
            })
            .await
            .unwrap();
        assert_eq!(response.answer.as_deref(), Some("mountains form from tectonic uplift"));
        assert!(response.confidence > 0.0);
        assert_eq!(response.engine_name, "cartridge");
    }

    #[tokio::test]
    async fn cartridge_engine_misses_cleanly_without_raising() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(CartridgeStore::create(tmp.path(), "geo"));
        let engine = CartridgeEngine::new(store);

        let response = engine
            .query(InferenceRequest {
                query: "nonexistent topic entirely".to_string(),
                cartridge: None,
            })
            .await
            .unwrap();
        assert!(response.answer.is_none());
        assert_eq!(response.confidence, 0.0);
    }
}
