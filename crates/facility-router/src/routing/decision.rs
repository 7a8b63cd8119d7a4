use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candidates::Candidate;
use super::domain::FacilityId;
use super::engine::{FeatureVector, ScoredRoute};

/// Lifetime callers may cache a decision for.
pub const DECISION_TTL_SECONDS: u32 = 3600;

pub const REASON_NO_CANDIDATES: &str = "no candidates";
pub const REASON_ROUTED: &str = "capable, close, and available";
pub const REASON_FALLBACK: &str = "no capable facility; nearest similar facility chosen";

/// Outcome class of a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    /// Winner can serve the requested category.
    Routed,
    /// Best available facility, but not a capable one.
    Fallback,
    /// No candidates at all.
    Failed,
}

impl DecisionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DecisionStatus::Routed => "routed",
            DecisionStatus::Fallback => "fallback",
            DecisionStatus::Failed => "failed",
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            DecisionStatus::Routed => REASON_ROUTED,
            DecisionStatus::Fallback => REASON_FALLBACK,
            DecisionStatus::Failed => REASON_NO_CANDIDATES,
        }
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-call decision identifier, e.g. `dec-1f3a9c02`.
///
/// Freshly random on every computation; replays of an idempotency key return the stored
/// decision and therefore the stored identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(pub String);

impl DecisionId {
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        DecisionId(format!("dec-{}", &raw[..8]))
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable routing decision as returned to callers and persisted with the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Empty when nothing was routed.
    pub route_to_facility_id: FacilityId,
    pub route_to_endpoint: String,
    pub confidence: f64,
    pub decision_status: DecisionStatus,
    pub reason: String,
    #[serde(default, with = "feature_map")]
    pub features_used: Option<FeatureVector>,
    pub decision_id: DecisionId,
    pub ttl_seconds: u32,
}

impl Decision {
    /// Decision for an empty candidate pool.
    pub fn failed() -> Self {
        Self {
            route_to_facility_id: FacilityId::default(),
            route_to_endpoint: String::new(),
            confidence: 0.0,
            decision_status: DecisionStatus::Failed,
            reason: REASON_NO_CANDIDATES.to_string(),
            features_used: None,
            decision_id: DecisionId::generate(),
            ttl_seconds: DECISION_TTL_SECONDS,
        }
    }

    pub fn routed_facility(&self) -> Option<&FacilityId> {
        if self.route_to_facility_id.is_empty() {
            None
        } else {
            Some(&self.route_to_facility_id)
        }
    }
}

/// Packages the scoring winner, or its absence, into a [`Decision`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionAssembler;

impl DecisionAssembler {
    pub fn assemble(&self, candidates: &[Candidate], scored: Option<ScoredRoute<'_>>) -> Decision {
        let Some(scored) = scored else {
            return Decision::failed();
        };

        let status = if !candidates.iter().any(|candidate| candidate.has_capability) {
            DecisionStatus::Fallback
        } else if scored.chosen.has_capability {
            DecisionStatus::Routed
        } else {
            DecisionStatus::Fallback
        };

        let facility = scored.chosen.facility_id.clone();
        Decision {
            route_to_endpoint: facility.endpoint(),
            route_to_facility_id: facility,
            confidence: scored.confidence,
            decision_status: status,
            reason: status.reason().to_string(),
            features_used: Some(scored.features),
            decision_id: DecisionId::generate(),
            ttl_seconds: DECISION_TTL_SECONDS,
        }
    }
}

/// Serializes a missing feature vector as `{}` rather than `null`.
mod feature_map {
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::FeatureVector;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Full(FeatureVector),
        Empty(serde::de::IgnoredAny),
    }

    pub(super) fn serialize<S>(value: &Option<FeatureVector>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(features) => features.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<FeatureVector>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Repr>::deserialize(deserializer)? {
            Some(Repr::Full(features)) => Ok(Some(features)),
            Some(Repr::Empty(_)) | None => Ok(None),
        }
    }
}
