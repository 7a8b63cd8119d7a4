use std::collections::BTreeMap;
use std::sync::Arc;

use facility_router::routing::{
    CapabilityMap, Coordinates, DecisionStatus, FacilityId, FacilityRecord,
    FacilityRoutingService, InMemoryDirectory, InMemoryEventStore, PatientId, PatientProfile,
    RouteRequest,
};

fn facility(id: &str, lat: f64, lon: f64, mri: bool, capacity_score: f64) -> FacilityRecord {
    FacilityRecord {
        id: FacilityId(id.to_string()),
        name: format!("Site {id}"),
        facility_type: "imaging_center".to_string(),
        is_active: true,
        coordinates: Coordinates::new(lat, lon),
        capabilities: CapabilityMap::new().with("MRI", mri).with("CT", true),
        capacity_score,
    }
}

fn service() -> (
    FacilityRoutingService<InMemoryDirectory, InMemoryEventStore>,
    Arc<InMemoryEventStore>,
) {
    let patients = vec![PatientProfile {
        id: PatientId("p-0001".to_string()),
        name: "Avery Quinn".to_string(),
        coordinates: Some(Coordinates::new(34.0522, -118.2437)),
        attributes: BTreeMap::new(),
    }];
    let facilities = vec![
        facility("fac-001", 34.0600, -118.2500, false, 0.9),
        facility("fac-002", 34.1000, -118.3000, true, 0.3),
        facility("fac-003", 33.9000, -118.1000, true, 0.8),
    ];

    let events = Arc::new(InMemoryEventStore::new());
    let directory = Arc::new(InMemoryDirectory::new(patients, facilities));
    let service = FacilityRoutingService::new(directory, events.clone());
    (service, events)
}

#[tokio::test]
async fn mri_requests_skip_the_nearest_site_without_mri() {
    let (service, _) = service();

    let decision = service
        .route(RouteRequest::new("p-0001").with_request_type("MRI"), None)
        .await
        .expect("decision");

    assert_eq!(decision.decision_status, DecisionStatus::Routed);
    assert_ne!(decision.route_to_facility_id.as_str(), "fac-001");
    assert!(decision.confidence > 0.0 && decision.confidence <= 1.0);
}

#[tokio::test]
async fn repeat_visits_build_history_for_the_same_destination() {
    let (service, events) = service();

    let first = service
        .route(RouteRequest::new("p-0001").with_request_type("MRI"), None)
        .await
        .expect("first decision");
    let second = service
        .route(RouteRequest::new("p-0001").with_request_type("MRI"), None)
        .await
        .expect("second decision");

    assert_eq!(first.route_to_facility_id, second.route_to_facility_id);
    assert_eq!(
        second.features_used.map(|features| features.history),
        Some(1.0),
        "the prior visit should now be the strongest history signal"
    );
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn imaging_category_accepts_any_imaging_modality() {
    let (service, _) = service();

    let decision = service
        .route(RouteRequest::new("p-0001").with_department("imaging"), None)
        .await
        .expect("decision");

    // every site has CT, so the closest roomy one wins outright
    assert_eq!(decision.route_to_facility_id.as_str(), "fac-001");
    assert_eq!(decision.decision_status, DecisionStatus::Routed);
}
