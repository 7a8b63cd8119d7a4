use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::Decision;
use super::domain::{FacilityId, FacilityRecord, PatientId, PatientProfile};
use super::history::HistoryCounts;

/// Audit record written once per routed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEvent {
    pub event_id: Uuid,
    pub ts: DateTime<Utc>,
    pub patient_id: PatientId,
    /// Same identifier space as candidates, so history counts line up with scoring.
    pub routed_facility_id: Option<FacilityId>,
    pub request_text: Option<String>,
    pub decision: Decision,
    pub idempotency_key: Option<String>,
}

impl RoutingEvent {
    pub fn new(
        patient_id: PatientId,
        routed_facility_id: Option<FacilityId>,
        request_text: Option<String>,
        decision: Decision,
        idempotency_key: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            ts: Utc::now(),
            patient_id,
            routed_facility_id,
            request_text,
            decision,
            idempotency_key,
        }
    }

    /// Event for a freshly computed decision; the destination comes from the decision itself.
    pub fn for_decision(
        patient_id: PatientId,
        request_text: Option<String>,
        decision: Decision,
        idempotency_key: Option<String>,
    ) -> Self {
        let routed = decision.routed_facility().cloned();
        Self::new(patient_id, routed, request_text, decision, idempotency_key)
    }
}

/// Result of writing an event.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Stored(Decision),
    /// Another submission with the same idempotency key won; carries its stored decision.
    Duplicate(Decision),
}

impl PersistOutcome {
    pub fn into_decision(self) -> Decision {
        match self {
            PersistOutcome::Stored(decision) | PersistOutcome::Duplicate(decision) => decision,
        }
    }
}

pub trait PatientDirectory: Send + Sync {
    fn lookup(&self, id: &PatientId) -> Result<Option<PatientProfile>, RepositoryError>;
}

pub trait FacilityDirectory: Send + Sync {
    /// Every facility, active or not.
    fn list(&self) -> Result<Vec<FacilityRecord>, RepositoryError>;

    fn get(&self, id: &FacilityId) -> Result<Option<FacilityRecord>, RepositoryError> {
        Ok(self.list()?.into_iter().find(|facility| &facility.id == id))
    }
}

pub trait HistoryStore: Send + Sync {
    /// Prior routed visits per facility; an unknown patient yields an empty map.
    fn count_by_patient(&self, patient: &PatientId) -> Result<HistoryCounts, RepositoryError>;
}

/// Event persistence with at-most-one stored decision per idempotency key.
pub trait EventStore: Send + Sync {
    fn find_by_key(&self, key: &str) -> Result<Option<Decision>, RepositoryError>;
    fn persist(&self, event: RoutingEvent) -> Result<PersistOutcome, RepositoryError>;
    /// Newest first.
    fn recent(&self, limit: usize) -> Result<Vec<RoutingEvent>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
