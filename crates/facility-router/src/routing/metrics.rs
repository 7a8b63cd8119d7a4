//! Decision outcome counters and routing latency statistics.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use super::decision::DecisionStatus;

const EWMA_ALPHA: f64 = 0.2;
const LATENCY_WINDOW: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub routed: u64,
    pub fallback: u64,
    pub failed: u64,
    pub avg_confidence: f64,
    pub ewma_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
}

#[derive(Debug, Default)]
struct Counters {
    routed: u64,
    fallback: u64,
    failed: u64,
    total_confidence: f64,
    decisions: u64,
}

#[derive(Debug, Default)]
struct LatencyStats {
    ewma_ms: Option<f64>,
    samples: VecDeque<f64>,
}

impl LatencyStats {
    fn record(&mut self, duration_ms: f64) {
        self.ewma_ms = Some(match self.ewma_ms {
            Some(previous) => EWMA_ALPHA * duration_ms + (1.0 - EWMA_ALPHA) * previous,
            None => duration_ms,
        });
        if self.samples.len() == LATENCY_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(duration_ms);
    }

    /// Nearest-rank percentile over the retained window.
    fn percentile(&self, pct: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let last = sorted.len() - 1;
        let rank = ((pct / 100.0) * last as f64).round() as usize;
        sorted[rank.min(last)]
    }
}

/// Process-wide decision summary. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct DecisionMetrics {
    counters: Mutex<Counters>,
    latency: Mutex<LatencyStats>,
}

impl DecisionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decision(&self, status: DecisionStatus, confidence: f64) {
        let mut counters = self.counters.lock().expect("metrics mutex poisoned");
        match status {
            DecisionStatus::Routed => counters.routed += 1,
            DecisionStatus::Fallback => counters.fallback += 1,
            DecisionStatus::Failed => counters.failed += 1,
        }
        counters.total_confidence += confidence;
        counters.decisions += 1;
    }

    pub fn record_latency(&self, elapsed: Duration) {
        let mut latency = self.latency.lock().expect("metrics mutex poisoned");
        latency.record(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.counters.lock().expect("metrics mutex poisoned");
        let latency = self.latency.lock().expect("metrics mutex poisoned");

        let avg_confidence = if counters.decisions == 0 {
            0.0
        } else {
            counters.total_confidence / counters.decisions as f64
        };

        MetricsSnapshot {
            routed: counters.routed,
            fallback: counters.fallback,
            failed: counters.failed,
            avg_confidence: round_to(avg_confidence, 4),
            ewma_ms: round_to(latency.ewma_ms.unwrap_or(0.0), 2),
            p50_ms: round_to(latency.percentile(50.0), 2),
            p95_ms: round_to(latency.percentile(95.0), 2),
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
