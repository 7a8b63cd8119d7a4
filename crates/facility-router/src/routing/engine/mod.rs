mod confidence;
mod normalize;
mod scoring;

pub use confidence::{softmax_top3, CONFIDENCE_CLUSTER};
pub use normalize::{inverse_distance, min_max};
pub use scoring::{fingerprint, ScoringWeights, TIE_EPSILON, WEIGHTS};

use serde::{Deserialize, Serialize};

use super::candidates::Candidate;
use super::decision::{Decision, DecisionAssembler, DecisionStatus};
use super::domain::PatientId;
use super::history::HistoryCounts;

/// Normalized features behind one candidate's composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub capability: f64,
    pub inverse_distance: f64,
    pub history: f64,
    pub capacity: f64,
    pub composite: f64,
}

/// Everything a scoring pass reads. Borrowed, so concurrent callers share nothing mutable.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub candidates: &'a [Candidate],
    pub history: &'a HistoryCounts,
    pub patient_id: &'a PatientId,
    pub request_type: Option<&'a str>,
}

/// Winner of a scoring pass plus the evidence for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRoute<'a> {
    pub chosen: &'a Candidate,
    pub features: FeatureVector,
    pub confidence: f64,
    pub status: DecisionStatus,
    /// Composite score per candidate, in candidate order.
    pub scores: Vec<f64>,
}

/// Stateless scorer combining normalization, weighting, tie-breaking, and confidence.
#[derive(Debug, Clone, Copy)]
pub struct RoutingEngine {
    weights: ScoringWeights,
    assembler: DecisionAssembler,
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self {
            weights: WEIGHTS,
            assembler: DecisionAssembler,
        }
    }
}

impl RoutingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Scores the pool and picks a winner; `None` when there are no candidates.
    pub fn score<'a>(&self, input: ScoringInput<'a>) -> Option<ScoredRoute<'a>> {
        let candidates = input.candidates;
        if candidates.is_empty() {
            return None;
        }

        let distances: Vec<Option<f64>> = candidates.iter().map(|c| c.distance_km).collect();
        let inverse_distances = inverse_distance(&distances);

        let capacities: Vec<f64> = candidates.iter().map(|c| c.capacity_score).collect();
        let capacity_norm = min_max(&capacities);

        let counts: Vec<f64> = candidates
            .iter()
            .map(|c| f64::from(input.history.get(&c.facility_id)))
            .collect();
        let history_norm = min_max(&counts);

        let rows: Vec<FeatureVector> = candidates
            .iter()
            .enumerate()
            .map(|(i, candidate)| {
                let capability = if candidate.has_capability { 1.0 } else { 0.0 };
                FeatureVector {
                    capability,
                    inverse_distance: inverse_distances[i],
                    history: history_norm[i],
                    capacity: capacity_norm[i],
                    composite: self.weights.composite(
                        capability,
                        inverse_distances[i],
                        history_norm[i],
                        capacity_norm[i],
                    ),
                }
            })
            .collect();

        let patient = input.patient_id.as_str();
        let request_type = input.request_type.unwrap_or("");
        let winner = scoring::select_winner(&rows, |i| {
            fingerprint(patient, request_type, candidates[i].facility_id.as_str())
        });

        let scores: Vec<f64> = rows.iter().map(|row| row.composite).collect();
        let chosen = &candidates[winner];

        Some(ScoredRoute {
            chosen,
            features: rows[winner],
            confidence: softmax_top3(&scores),
            status: if chosen.has_capability {
                DecisionStatus::Routed
            } else {
                DecisionStatus::Fallback
            },
            scores,
        })
    }

    /// Full pure pass: score, then assemble the decision record.
    pub fn decide(&self, input: ScoringInput<'_>) -> Decision {
        let scored = self.score(input);
        self.assembler.assemble(input.candidates, scored)
    }
}
