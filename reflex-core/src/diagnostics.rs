//! Diagnostics feed: an append-only, bounded event log for query and
//! worker-health observability (spec.md §4.11, grounded on
//! `original_source/src/orchestration/query_orchestrator.py`'s
//! `_NoOpDiagnosticFeed` and the teacher's trait-object "capability with a
//! silent no-op default" pattern in `storage/mod.rs`).

use crate::constants::DEFAULT_FEED_CAPACITY;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One diagnostics event kind (spec.md §4.11).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    QueryCreated { query_id: String },
    QueryStarted { query_id: String },
    LayerAttempt { query_id: String, layer: String, confidence: f64 },
    LayerHit { query_id: String, layer: String },
    LayerMiss { query_id: String, layer: String },
    Escalation { query_id: String, layer: String },
    Timeout { query_id: String, layer: String },
    Error { query_id: String, message: String },
    QueryCompleted { query_id: String, answered: bool },
    WorkerHealth { worker: String, healthy: bool },
    Metric { name: String, value: f64 },
}

/// Capability every diagnostics sink implements. A feed must never make a
/// caller's query path fail — `record` has no error return.
pub trait DiagnosticFeed: Send + Sync {
    fn record(&self, event: DiagnosticEvent);
    fn recent(&self, limit: usize) -> Vec<DiagnosticEvent>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded in-memory ring buffer (spec.md §4.11: "default capacity 10,000").
pub struct RingBufferFeed {
    capacity: usize,
    events: RwLock<VecDeque<DiagnosticEvent>>,
}

impl RingBufferFeed {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }
}

impl Default for RingBufferFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl DiagnosticFeed for RingBufferFeed {
    fn record(&self, event: DiagnosticEvent) {
        let mut events = self.events.write();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    fn recent(&self, limit: usize) -> Vec<DiagnosticEvent> {
        let events = self.events.read();
        events.iter().rev().take(limit).cloned().collect()
    }

    fn len(&self) -> usize {
        self.events.read().len()
    }
}

/// Silent no-op feed: used when diagnostics are deliberately disabled
/// (spec.md §4.11: "substitutable with a silent no-op implementation").
#[derive(Default)]
pub struct NoOpDiagnosticFeed;

impl DiagnosticFeed for NoOpDiagnosticFeed {
    fn record(&self, _event: DiagnosticEvent) {}

    fn recent(&self, _limit: usize) -> Vec<DiagnosticEvent> {
        Vec::new()
    }

    fn len(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_evicts_oldest_when_full() {
        let feed = RingBufferFeed::new(2);
        feed.record(DiagnosticEvent::Metric { name: "a".into(), value: 1.0 });
        feed.record(DiagnosticEvent::Metric { name: "b".into(), value: 2.0 });
        feed.record(DiagnosticEvent::Metric { name: "c".into(), value: 3.0 });
        assert_eq!(feed.len(), 2);
        let recent = feed.recent(10);
        assert_eq!(recent.len(), 2);
        assert!(matches!(&recent[0], DiagnosticEvent::Metric { name, .. } if name == "c"));
    }

    #[test]
    fn recent_respects_limit() {
        let feed = RingBufferFeed::new(10);
        for i in 0..5 {
            feed.record(DiagnosticEvent::Metric { name: format!("m{i}"), value: i as f64 });
        }
        assert_eq!(feed.recent(2).len(), 2);
    }

    #[test]
    fn noop_feed_records_nothing() {
        let feed = NoOpDiagnosticFeed;
        feed.record(DiagnosticEvent::QueryCreated { query_id: "q1".into() });
        assert!(feed.is_empty());
        assert!(feed.recent(10).is_empty());
    }
}
