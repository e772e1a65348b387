//! Query orchestrator: the cascade that tries each inference layer in turn
//! until one answers with sufficient confidence (spec.md §4.7, grounded on
//! `original_source/src/orchestration/query_orchestrator.py`).

use crate::constants::{
    DEFAULT_SPOTLIGHT_TTL_SECS, FALLBACK_THRESHOLD_BITNET, FALLBACK_THRESHOLD_CARTRIDGE,
    FALLBACK_THRESHOLD_GRAIN, FALLBACK_THRESHOLD_LLM, FALLBACK_THRESHOLD_SPECIALIST,
};
use crate::engine::{InferenceEngine, InferenceRequest, InferenceResponse};
use crate::heartbeat::HeartbeatService;
use crate::resonance::ResonanceWeightStore;
use crate::scheduler::MetabolismScheduler;
use crate::spotlight::{CouplingValidator, SpotlightSubstrate};
use crate::types::Severity;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Sentinel a triage decision may place at the end of its layer sequence to
/// cut the cascade short regardless of remaining layers (spec.md §4.7).
pub const ESCALATE_SENTINEL: &str = crate::constants::ESCALATE_SENTINEL;

/// The engine's canned answer once every layer has been tried and none
/// passed (spec.md §4.7 phase 6, §7 scenario C).
const EXHAUSTED_ANSWER: &str = "I don't know.";

/// The `winning_layer`/engine-name value recorded when the cascade exhausts.
const EXHAUSTED_ENGINE_NAME: &str = "NONE";

/// `QueryResult.error_state` value set when a CRITICAL coupling delta
/// suppresses an otherwise-winning response (spec.md §7).
const ERROR_STATE_COUPLING_CONFLICT: &str = "coupling_conflict";

/// One cascade layer's outcome, recorded for diagnostics regardless of
/// whether it ultimately answered the query (spec.md §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerAttempt {
    pub layer: String,
    pub confidence: f64,
    pub threshold: f64,
    pub passed: bool,
    pub answer: Option<String>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// The orchestrator's final verdict for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub query_id: Uuid,
    pub query: String,
    pub answer: Option<String>,
    pub confidence: f64,
    pub winning_layer: Option<String>,
    pub attempts: Vec<LayerAttempt>,
    pub escalated: bool,
    pub exhausted: bool,
    pub triage_reasoning: String,
    pub triage_latency_ms: u64,
    pub total_latency_ms: u64,
    pub error_state: Option<String>,
}

/// A named, ordered cascade layer.
pub struct CascadeLayer {
    pub name: &'static str,
    pub engine: Arc<dyn InferenceEngine>,
    pub threshold: f64,
}

fn default_threshold(name: &str) -> f64 {
    match name {
        "grain" => FALLBACK_THRESHOLD_GRAIN,
        "cartridge" => FALLBACK_THRESHOLD_CARTRIDGE,
        "bitnet" => FALLBACK_THRESHOLD_BITNET,
        "specialist" => FALLBACK_THRESHOLD_SPECIALIST,
        "llm" => FALLBACK_THRESHOLD_LLM,
        _ => 0.0,
    }
}

/// Hash a query the same way for pattern recording: trim, lowercase, sha256.
#[must_use]
pub fn pattern_hash(query: &str) -> String {
    let normalised = query.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalised.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Layer selection and per-layer thresholds for one query (spec.md §4.7
/// phase 3). Produced by a [`TriageAgent`], or by
/// [`QueryOrchestrator::safe_default_triage`] when none is configured or the
/// agent fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageDecision {
    pub layer_sequence: Vec<String>,
    pub confidence_thresholds: HashMap<String, f64>,
    pub recommended_cartridges: Option<Vec<String>>,
    pub reasoning: String,
}

/// The rules-based triage agent is an external collaborator (spec.md §1);
/// this is the seam a concrete implementation plugs into. A failing or
/// absent agent is never fatal — the orchestrator falls back to trying
/// every configured layer in registration order.
pub trait TriageAgent: Send + Sync {
    fn triage(&self, query: &str) -> crate::error::Result<TriageDecision>;
}

/// The seven-phase cascade runner (spec.md §4.7):
/// 1. scheduler tick (background metabolism, driven off the heartbeat's turn)
/// 2. context retrieval (left to callers / engines — no context service is
///    part of this crate's data model)
/// 3. triage (layer selection + per-layer thresholds)
/// 4. pause heartbeat for the duration of the cascade
/// 5. cascade: try each selected layer until one passes its threshold, or
///    the sequence reaches [`ESCALATE_SENTINEL`]
/// 6. finalise: record/reinforce the query's resonance pattern, run the
///    coupling validator, and fall back to the canned exhaustion answer
/// 7. resume + advance_turn, which always runs regardless of outcome
pub struct QueryOrchestrator {
    layers: Vec<CascadeLayer>,
    resonance: Arc<ResonanceWeightStore>,
    heartbeat: Arc<HeartbeatService>,
    scheduler: Option<Arc<MetabolismScheduler>>,
    triage: Option<Arc<dyn TriageAgent>>,
    spotlight: Option<Arc<dyn SpotlightSubstrate>>,
    spotlight_warned: AtomicBool,
}

impl QueryOrchestrator {
    #[must_use]
    pub fn new(
        layers: Vec<CascadeLayer>,
        resonance: Arc<ResonanceWeightStore>,
        heartbeat: Arc<HeartbeatService>,
    ) -> Self {
        Self {
            layers,
            resonance,
            heartbeat,
            scheduler: None,
            triage: None,
            spotlight: None,
            spotlight_warned: AtomicBool::new(false),
        }
    }

    /// Register a layer using its name's default fallback threshold.
    #[must_use]
    pub fn with_default_threshold_layer(
        mut self,
        name: &'static str,
        engine: Arc<dyn InferenceEngine>,
    ) -> Self {
        self.layers.push(CascadeLayer {
            name,
            engine,
            threshold: default_threshold(name),
        });
        self
    }

    /// Attach a background metabolism scheduler, ticked once at the start
    /// of every query (spec.md §4.7 phase 1).
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<MetabolismScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Attach a triage agent. Without one, every query uses
    /// [`Self::safe_default_triage`].
    #[must_use]
    pub fn with_triage(mut self, triage: Arc<dyn TriageAgent>) -> Self {
        self.triage = Some(triage);
        self
    }

    /// Attach a spotlight substrate so coupling validation can run. Without
    /// one, coupling validation is skipped and a single warning is logged
    /// the first time a query runs (spec.md §9: the spotlight is optional
    /// ambient state, not required for the cascade to answer queries).
    #[must_use]
    pub fn with_spotlight(mut self, spotlight: Arc<dyn SpotlightSubstrate>) -> Self {
        self.spotlight = Some(spotlight);
        self
    }

    /// Safe default: try every configured layer in registration order,
    /// ending with [`ESCALATE_SENTINEL`], using each layer's configured
    /// threshold.
    fn safe_default_triage(&self) -> TriageDecision {
        let mut layer_sequence: Vec<String> =
            self.layers.iter().map(|l| l.name.to_string()).collect();
        layer_sequence.push(ESCALATE_SENTINEL.to_string());
        let confidence_thresholds = self
            .layers
            .iter()
            .map(|l| (l.name.to_string(), l.threshold))
            .collect();
        TriageDecision {
            layer_sequence,
            confidence_thresholds,
            recommended_cartridges: None,
            reasoning: "safe default: configured layer order, no triage agent consulted"
                .to_string(),
        }
    }

    fn decide_triage(&self, query: &str) -> TriageDecision {
        match &self.triage {
            None => self.safe_default_triage(),
            Some(agent) => match agent.triage(query) {
                Ok(decision) => decision,
                Err(err) => {
                    warn!(error = %err, "triage agent failed, falling back to safe default");
                    self.safe_default_triage()
                }
            },
        }
    }

    #[instrument(skip(self))]
    pub async fn process_query(&self, query: &str) -> QueryResult {
        let started_total = Instant::now();
        let query_id = Uuid::new_v4();

        // Phase 1: scheduler tick, driven off the heartbeat's current turn.
        if let Some(scheduler) = &self.scheduler {
            scheduler.step(self.heartbeat.turn_number());
        }

        // Phase 2: context retrieval is left to callers / engines — no
        // context service is part of this crate's data model.

        // Phase 3: triage.
        let started_triage = Instant::now();
        let decision = self.decide_triage(query);
        let triage_latency_ms = started_triage.elapsed().as_millis() as u64;

        // Phase 4: pause the heartbeat for the duration of the cascade,
        // resuming automatically (or explicitly below) once it concludes.
        let pause_guard = self.heartbeat.pause_guard();

        let mut attempts = Vec::new();
        let mut answer = None;
        let mut confidence = 0.0;
        let mut winning_layer = None;
        let mut escalated = false;

        // Phase 5: cascade.
        for layer_name in &decision.layer_sequence {
            if layer_name == ESCALATE_SENTINEL {
                escalated = true;
                break;
            }

            let Some(layer) = self.layers.iter().find(|l| l.name == layer_name) else {
                warn!(layer = %layer_name, "triage named an unknown layer, skipping");
                continue;
            };

            let threshold = decision
                .confidence_thresholds
                .get(layer.name)
                .copied()
                .unwrap_or(layer.threshold);

            let request = InferenceRequest {
                query: query.to_string(),
                cartridge: decision
                    .recommended_cartridges
                    .as_ref()
                    .and_then(|c| c.first().cloned()),
            };

            let started_layer = Instant::now();
            let response = match layer.engine.query(request).await {
                Ok(r) => r,
                Err(err) => {
                    let latency_ms = started_layer.elapsed().as_millis() as u64;
                    warn!(layer = layer.name, error = %err, "layer transport error, treating as miss");
                    attempts.push(LayerAttempt {
                        layer: layer.name.to_string(),
                        confidence: 0.0,
                        threshold,
                        passed: false,
                        answer: None,
                        latency_ms,
                        error: Some(err.to_string()),
                    });
                    continue;
                }
            };
            let latency_ms = started_layer.elapsed().as_millis() as u64;

            if response.answer.as_deref() == Some(ESCALATE_SENTINEL) {
                escalated = true;
                attempts.push(LayerAttempt {
                    layer: layer.name.to_string(),
                    confidence: response.confidence,
                    threshold,
                    passed: false,
                    answer: response.answer.clone(),
                    latency_ms,
                    error: None,
                });
                break;
            }

            let passed = response.confidence >= threshold && response.answer.is_some();
            attempts.push(LayerAttempt {
                layer: layer.name.to_string(),
                confidence: response.confidence,
                threshold,
                passed,
                answer: response.answer.clone(),
                latency_ms,
                error: None,
            });

            if passed {
                answer = response.answer;
                confidence = response.confidence;
                winning_layer = Some(layer.name.to_string());
                break;
            }
        }

        let had_real_answer = answer.is_some();
        let exhausted = !had_real_answer && !escalated;

        // Phase 6: finalise.
        let hash = pattern_hash(query);
        if had_real_answer {
            if self.resonance.contains(&hash) {
                self.resonance.reinforce_pattern(&hash);
            } else {
                self.resonance.record_pattern(hash.clone(), HashMap::new(), None);
            }
        }

        let mut error_state = None;
        if had_real_answer {
            if let Some(spotlight) = &self.spotlight {
                let spotlight_query = spotlight
                    .get(&hash)
                    .unwrap_or_else(|| spotlight.create_query(&hash, DEFAULT_SPOTLIGHT_TTL_SECS));
                let (severity, _findings) = CouplingValidator::validate(&spotlight_query);
                if severity == Severity::Critical {
                    warn!(query_id = %query_id, "coupling CRITICAL delta, suppressing winning response");
                    answer = None;
                    confidence = 0.0;
                    error_state = Some(ERROR_STATE_COUPLING_CONFLICT.to_string());
                }
            } else if !self.spotlight_warned.swap(true, Ordering::SeqCst) {
                debug!("no spotlight substrate configured, coupling validation skipped");
            }
        }

        if exhausted {
            answer = Some(EXHAUSTED_ANSWER.to_string());
            confidence = 0.0;
            winning_layer = Some(EXHAUSTED_ENGINE_NAME.to_string());
        }

        // Phase 7: resume, then advance the turn, regardless of outcome.
        drop(pause_guard);
        self.heartbeat.resume();
        self.heartbeat.advance_turn();

        QueryResult {
            query_id,
            query: query.to_string(),
            answer,
            confidence,
            winning_layer,
            attempts,
            escalated,
            exhausted,
            triage_reasoning: decision.reasoning,
            triage_latency_ms,
            total_latency_ms: started_total.elapsed().as_millis() as u64,
            error_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineHealth;
    use crate::error::Result;
    use crate::spotlight::InMemorySpotlight;
    use crate::types::EpistemicLevel;
    use async_trait::async_trait;

    struct FixedEngine {
        name: &'static str,
        response: InferenceResponse,
    }

    #[async_trait]
    impl InferenceEngine for FixedEngine {
        fn name(&self) -> &str {
            self.name
        }

        async fn query(&self, _request: InferenceRequest) -> Result<InferenceResponse> {
            Ok(InferenceResponse {
                answer: self.response.answer.clone(),
                confidence: self.response.confidence,
                sources: self.response.sources.clone(),
                latency_ms: self.response.latency_ms,
                engine_name: self.response.engine_name.clone(),
            })
        }

        fn health(&self) -> EngineHealth {
            EngineHealth::Healthy
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl InferenceEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }

        async fn query(&self, _request: InferenceRequest) -> Result<InferenceResponse> {
            Err(crate::error::Error::Engine("transport down".to_string()))
        }

        fn health(&self) -> EngineHealth {
            EngineHealth::Unavailable
        }
    }

    fn fixed_response(answer: Option<&str>, confidence: f64, engine_name: &str) -> InferenceResponse {
        InferenceResponse {
            answer: answer.map(str::to_string),
            confidence,
            sources: Vec::new(),
            latency_ms: 0,
            engine_name: engine_name.to_string(),
        }
    }

    fn orchestrator(layers: Vec<CascadeLayer>) -> QueryOrchestrator {
        QueryOrchestrator::new(
            layers,
            Arc::new(ResonanceWeightStore::new(Default::default())),
            Arc::new(HeartbeatService::new()),
        )
    }

    #[tokio::test]
    async fn first_layer_above_threshold_wins_scenario_a() {
        let orch = orchestrator(vec![CascadeLayer {
            name: "grain",
            engine: Arc::new(FixedEngine {
                name: "grain",
                response: fixed_response(Some("sg_1"), 0.97, "grain"),
            }),
            threshold: FALLBACK_THRESHOLD_GRAIN,
        }]);

        let result = orch.process_query("what is water").await;
        assert_eq!(result.winning_layer.as_deref(), Some("grain"));
        assert!(!result.exhausted);
    }

    #[tokio::test]
    async fn falls_through_to_next_layer_scenario_b() {
        let orch = orchestrator(vec![
            CascadeLayer {
                name: "grain",
                engine: Arc::new(FixedEngine {
                    name: "grain",
                    response: InferenceResponse::miss("grain"),
                }),
                threshold: FALLBACK_THRESHOLD_GRAIN,
            },
            CascadeLayer {
                name: "cartridge",
                engine: Arc::new(FixedEngine {
                    name: "cartridge",
                    response: fixed_response(Some("fact_7"), 0.8, "cartridge"),
                }),
                threshold: FALLBACK_THRESHOLD_CARTRIDGE,
            },
        ]);

        let result = orch.process_query("fallthrough query").await;
        assert_eq!(result.winning_layer.as_deref(), Some("cartridge"));
        assert_eq!(result.attempts.len(), 2);
    }

    #[tokio::test]
    async fn exhausts_cleanly_when_nothing_passes_scenario_c() {
        let orch = orchestrator(vec![CascadeLayer {
            name: "grain",
            engine: Arc::new(FixedEngine {
                name: "grain",
                response: InferenceResponse::miss("grain"),
            }),
            threshold: FALLBACK_THRESHOLD_GRAIN,
        }]);

        let result = orch.process_query("unknowable query").await;
        assert!(result.exhausted);
        assert_eq!(result.answer.as_deref(), Some("I don't know."));
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.winning_layer.as_deref(), Some("NONE"));
    }

    #[tokio::test]
    async fn engine_transport_failure_is_treated_as_a_miss_scenario_d() {
        let orch = orchestrator(vec![
            CascadeLayer {
                name: "failing",
                engine: Arc::new(FailingEngine),
                threshold: 0.5,
            },
            CascadeLayer {
                name: "cartridge",
                engine: Arc::new(FixedEngine {
                    name: "cartridge",
                    response: fixed_response(Some("fact_2"), 0.8, "cartridge"),
                }),
                threshold: FALLBACK_THRESHOLD_CARTRIDGE,
            },
        ]);

        let result = orch.process_query("resilient query").await;
        assert_eq!(result.winning_layer.as_deref(), Some("cartridge"));
        assert_eq!(result.attempts[0].layer, "failing");
        assert!(result.attempts[0].error.as_deref().unwrap().contains("transport down"));
        assert!(!result.attempts[0].passed);
    }

    #[tokio::test]
    async fn escalate_sentinel_stops_the_cascade() {
        let orch = orchestrator(vec![
            CascadeLayer {
                name: "grain",
                engine: Arc::new(FixedEngine {
                    name: "grain",
                    response: fixed_response(Some(ESCALATE_SENTINEL), 0.0, "grain"),
                }),
                threshold: FALLBACK_THRESHOLD_GRAIN,
            },
            CascadeLayer {
                name: "cartridge",
                engine: Arc::new(FixedEngine {
                    name: "cartridge",
                    response: fixed_response(Some("fact_9"), 0.9, "cartridge"),
                }),
                threshold: FALLBACK_THRESHOLD_CARTRIDGE,
            },
        ]);

        let result = orch.process_query("escalate me").await;
        assert!(result.escalated);
        assert_eq!(result.attempts.len(), 1);
        assert!(result.answer.is_none());
    }

    #[tokio::test]
    async fn successful_query_reinforces_resonance_on_repeat() {
        let orch = orchestrator(vec![CascadeLayer {
            name: "grain",
            engine: Arc::new(FixedEngine {
                name: "grain",
                response: fixed_response(Some("sg_1"), 0.97, "grain"),
            }),
            threshold: FALLBACK_THRESHOLD_GRAIN,
        }]);

        orch.process_query("repeat query").await;
        let hash = pattern_hash("repeat query");
        assert!(orch.resonance.contains(&hash));

        orch.process_query("repeat query").await;
        let weight_entry = orch.resonance.get_promotion_candidates();
        let _ = weight_entry;
    }

    #[test]
    fn pattern_hash_is_case_and_whitespace_insensitive() {
        assert_eq!(pattern_hash("  Hello World  "), pattern_hash("hello world"));
    }

    #[tokio::test]
    async fn turn_always_advances_even_when_exhausted() {
        let orch = orchestrator(vec![CascadeLayer {
            name: "grain",
            engine: Arc::new(FixedEngine {
                name: "grain",
                response: InferenceResponse::miss("grain"),
            }),
            threshold: FALLBACK_THRESHOLD_GRAIN,
        }]);
        orch.process_query("q1").await;
        assert_eq!(orch.heartbeat.turn_number(), 1);
    }

    #[tokio::test]
    async fn heartbeat_is_running_again_after_the_query_completes() {
        let orch = orchestrator(vec![CascadeLayer {
            name: "grain",
            engine: Arc::new(FixedEngine {
                name: "grain",
                response: fixed_response(Some("sg_1"), 0.97, "grain"),
            }),
            threshold: FALLBACK_THRESHOLD_GRAIN,
        }]);
        orch.process_query("q1").await;
        assert!(orch.heartbeat.is_running());
    }

    #[tokio::test]
    async fn no_triage_agent_uses_every_configured_layer_in_order() {
        let orch = orchestrator(vec![
            CascadeLayer {
                name: "grain",
                engine: Arc::new(FixedEngine {
                    name: "grain",
                    response: InferenceResponse::miss("grain"),
                }),
                threshold: FALLBACK_THRESHOLD_GRAIN,
            },
            CascadeLayer {
                name: "cartridge",
                engine: Arc::new(FixedEngine {
                    name: "cartridge",
                    response: fixed_response(Some("fact_1"), 0.8, "cartridge"),
                }),
                threshold: FALLBACK_THRESHOLD_CARTRIDGE,
            },
        ]);
        let result = orch.process_query("default triage path").await;
        assert!(result.triage_reasoning.contains("safe default"));
        assert_eq!(result.winning_layer.as_deref(), Some("cartridge"));
    }

    #[tokio::test]
    async fn critical_coupling_delta_suppresses_the_winning_response() {
        let orch = orchestrator(vec![CascadeLayer {
            name: "grain",
            engine: Arc::new(FixedEngine {
                name: "grain",
                response: fixed_response(Some("sg_1"), 0.97, "grain"),
            }),
            threshold: FALLBACK_THRESHOLD_GRAIN,
        }])
        .with_spotlight(Arc::new(InMemorySpotlight::new()));

        let hash = pattern_hash("contradictory query");
        let mut spotlight_query = crate::spotlight::SpotlightQuery::new(hash.clone(), 3600);
        spotlight_query.push(EpistemicLevel::L0Empirical, 1, false);
        spotlight_query.push(EpistemicLevel::L1Axiomatic, 2, true);
        orch.spotlight.as_ref().unwrap().put(spotlight_query);

        let result = orch.process_query("contradictory query").await;
        assert!(result.answer.is_none());
        assert_eq!(result.error_state.as_deref(), Some("coupling_conflict"));
    }
}
