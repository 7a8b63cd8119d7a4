use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::routing::assist::{DecisionExplainer, RequestClassifier, RequestLabel};
use crate::routing::candidates::Candidate;
use crate::routing::decision::Decision;
use crate::routing::domain::{
    CapabilityMap, Coordinates, FacilityId, FacilityRecord, PatientId, PatientProfile,
};
use crate::routing::engine::FeatureVector;
use crate::routing::history::HistoryCounts;
use crate::routing::memory::{InMemoryDirectory, InMemoryEventStore};
use crate::routing::repository::{
    EventStore, HistoryStore, PersistOutcome, RepositoryError, RoutingEvent,
};
use crate::routing::service::FacilityRoutingService;

pub(super) type MemoryService = FacilityRoutingService<InMemoryDirectory, InMemoryEventStore>;

pub(super) const DOWNTOWN: Coordinates = Coordinates {
    lat: 34.0522,
    lon: -118.2437,
};

pub(super) fn candidate(
    id: &str,
    capable: bool,
    distance_km: Option<f64>,
    capacity: f64,
) -> Candidate {
    Candidate {
        facility_id: FacilityId(id.to_string()),
        name: format!("Facility {id}"),
        coordinates: DOWNTOWN,
        capacity_score: capacity,
        distance_km,
        has_capability: capable,
    }
}

pub(super) fn patient(id: &str, coordinates: Option<Coordinates>) -> PatientProfile {
    PatientProfile {
        id: PatientId(id.to_string()),
        name: format!("Patient {id}"),
        coordinates,
        attributes: BTreeMap::new(),
    }
}

pub(super) fn facility(
    id: &str,
    name: &str,
    lat: f64,
    capabilities: CapabilityMap,
    capacity_score: f64,
) -> FacilityRecord {
    FacilityRecord {
        id: FacilityId(id.to_string()),
        name: name.to_string(),
        facility_type: "clinic".to_string(),
        is_active: true,
        coordinates: Coordinates::new(lat, DOWNTOWN.lon),
        capabilities,
        capacity_score,
    }
}

/// Two patients (one without coordinates) and four facilities north of downtown:
/// a close MRI center, a farther lab, a far cardiology clinic, and a closed imaging site.
pub(super) fn directory() -> InMemoryDirectory {
    let mut closed = facility(
        "f-closed",
        "Closed Imaging",
        34.0530,
        CapabilityMap::new().with("MRI", true),
        1.0,
    );
    closed.is_active = false;

    InMemoryDirectory::new(
        vec![patient("p-1", Some(DOWNTOWN)), patient("p-2", None)],
        vec![
            facility(
                "f-imaging",
                "Eastside Imaging",
                34.0600,
                CapabilityMap::new().with("MRI", true).with("CT", true),
                0.4,
            ),
            facility(
                "f-lab",
                "Harbor Lab",
                34.1000,
                CapabilityMap::new().with("LAB", true),
                0.9,
            ),
            facility(
                "f-cardio",
                "Valley Heart",
                34.3000,
                CapabilityMap::new().with("CARDIOLOGY", true),
                0.6,
            ),
            closed,
        ],
    )
}

pub(super) fn build_service() -> (Arc<MemoryService>, Arc<InMemoryEventStore>) {
    let events = Arc::new(InMemoryEventStore::new());
    let service = Arc::new(FacilityRoutingService::new(
        Arc::new(directory()),
        events.clone(),
    ));
    (service, events)
}

pub(super) fn features_of(decision: &Decision) -> FeatureVector {
    decision.features_used.expect("routed decision carries features")
}

/// Event store whose every call fails.
pub(super) struct UnavailableStore;

impl HistoryStore for UnavailableStore {
    fn count_by_patient(&self, _patient: &PatientId) -> Result<HistoryCounts, RepositoryError> {
        Err(RepositoryError::Unavailable("history offline".to_string()))
    }
}

impl EventStore for UnavailableStore {
    fn find_by_key(&self, _key: &str) -> Result<Option<Decision>, RepositoryError> {
        Err(RepositoryError::Unavailable("events offline".to_string()))
    }

    fn persist(&self, _event: RoutingEvent) -> Result<PersistOutcome, RepositoryError> {
        Err(RepositoryError::Unavailable("events offline".to_string()))
    }

    fn recent(&self, _limit: usize) -> Result<Vec<RoutingEvent>, RepositoryError> {
        Err(RepositoryError::Unavailable("events offline".to_string()))
    }
}

/// Classifier answering a fixed label and counting invocations.
#[derive(Default)]
pub(super) struct FixedClassifier {
    pub(super) label: Option<RequestLabel>,
    pub(super) calls: AtomicUsize,
}

impl FixedClassifier {
    pub(super) fn answering(label: RequestLabel) -> Self {
        Self {
            label: Some(label),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestClassifier for FixedClassifier {
    async fn classify(&self, _free_text: &str) -> RequestLabel {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.label.unwrap_or(RequestLabel::FALLBACK)
    }
}

/// Explainer returning a verbose, badly spaced sentence.
pub(super) struct VerboseExplainer;

#[async_trait]
impl DecisionExplainer for VerboseExplainer {
    async fn explain(
        &self,
        patient_id: &PatientId,
        facility_name: &str,
        _features: Option<&FeatureVector>,
    ) -> String {
        format!(
            "  {patient_id}\n\nsent to   {facility_name}. {}",
            "Nearby and capable. ".repeat(20)
        )
    }
}

pub(super) async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body collects");
    serde_json::from_slice(&bytes).expect("body is json")
}
