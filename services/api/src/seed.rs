//! Deterministic sample directory and visit history centred on downtown Los Angeles.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use facility_router::routing::decision::REASON_ROUTED;
use facility_router::routing::{
    CapabilityMap, Coordinates, Decision, DecisionId, DecisionStatus, EventStore, FacilityId,
    FacilityRecord, InMemoryDirectory, InMemoryEventStore, PatientId, PatientProfile,
    RepositoryError, RoutingEvent, DECISION_TTL_SECONDS,
};
use serde_json::json;

pub(crate) const CENTER: Coordinates = Coordinates {
    lat: 34.0522,
    lon: -118.2437,
};

const FACILITY_COUNT: usize = 10;
const PATIENT_COUNT: usize = 100;
const KM_PER_DEGREE: f64 = 111.0;
const GOLDEN_ANGLE_DEGREES: f64 = 137.508;
const FACILITY_TYPES: [&str; 3] = ["hospital", "clinic", "imaging_center"];
const REQUEST_TEXTS: [Option<&str>; 3] = [None, Some("Needs MRI"), Some("Follow-up")];

pub(crate) struct SeedData {
    pub(crate) patients: Vec<PatientProfile>,
    pub(crate) facilities: Vec<FacilityRecord>,
    pub(crate) history: Vec<RoutingEvent>,
}

/// Point `km` away from `origin` along the `index`-th turn of a golden-angle spiral.
fn spiral_offset(origin: Coordinates, index: usize, km: f64) -> Coordinates {
    let angle = (index as f64 * GOLDEN_ANGLE_DEGREES).to_radians();
    let lat_km = km * angle.sin();
    let lon_km = km * angle.cos();
    let lon_scale = KM_PER_DEGREE * origin.lat.to_radians().cos();
    Coordinates::new(
        origin.lat + lat_km / KM_PER_DEGREE,
        origin.lon + lon_km / lon_scale,
    )
}

pub(crate) fn facilities() -> Vec<FacilityRecord> {
    let mut facilities: Vec<FacilityRecord> = (0..FACILITY_COUNT)
        .map(|i| {
            let facility_type = FACILITY_TYPES[i % FACILITY_TYPES.len()];
            let hospital = facility_type == "hospital";
            let capabilities = CapabilityMap::new()
                .with("MRI", i % 3 != 1)
                .with("CT", true)
                .with("LAB", hospital || i % 4 == 1)
                .with("CARDIOLOGY", hospital);

            FacilityRecord {
                id: FacilityId(format!("facility-{i:03}")),
                name: format!("Facility {i:03}"),
                facility_type: facility_type.to_string(),
                is_active: true,
                coordinates: spiral_offset(CENTER, i, 0.5 + 3.0 * i as f64),
                capabilities,
                capacity_score: 0.2 + ((i * 7) % 8) as f64 / 10.0,
            }
        })
        .collect();

    facilities.push(FacilityRecord {
        id: FacilityId("facility-closed".to_string()),
        name: "Shuttered Annex".to_string(),
        facility_type: "clinic".to_string(),
        is_active: false,
        coordinates: CENTER,
        capabilities: CapabilityMap::new().with("MRI", true).with("CT", true),
        capacity_score: 1.0,
    });
    facilities
}

/// Every tenth patient has no known location.
pub(crate) fn patients() -> Vec<PatientProfile> {
    (0..PATIENT_COUNT)
        .map(|i| {
            let coordinates =
                (i % 10 != 9).then(|| spiral_offset(CENTER, i + 3, 0.1 + (i % 50) as f64));
            let mut attributes = BTreeMap::new();
            attributes.insert("age".to_string(), json!(18 + (i * 37) % 73));

            PatientProfile {
                id: PatientId(format!("patient-{i:05}")),
                name: format!("Patient {i:05}"),
                coordinates,
                attributes,
            }
        })
        .collect()
}

fn past_decision(facility: Option<&FacilityId>, confidence: f64) -> Decision {
    match facility {
        Some(id) => Decision {
            route_to_facility_id: id.clone(),
            route_to_endpoint: id.endpoint(),
            confidence,
            decision_status: DecisionStatus::Routed,
            reason: REASON_ROUTED.to_string(),
            features_used: None,
            decision_id: DecisionId::generate(),
            ttl_seconds: DECISION_TTL_SECONDS,
        },
        None => Decision::failed(),
    }
}

/// Zero to three prior visits per patient, oldest first, spread over the last day.
pub(crate) fn history(patients: &[PatientProfile], facilities: &[FacilityRecord]) -> Vec<RoutingEvent> {
    let visits: Vec<(usize, usize)> = (0..patients.len())
        .flat_map(|p| (0..p % 4).map(move |k| (p, k)))
        .collect();
    let now = Utc::now();
    let total = visits.len() as i64;

    visits
        .into_iter()
        .enumerate()
        .map(|(n, (p, k))| {
            let routed = ((p + k) % 5 != 0).then(|| &facilities[(p + 3 * k) % FACILITY_COUNT].id);
            let confidence = 0.3 + ((p * 13 + k * 7) % 66) as f64 / 100.0;
            let mut event = RoutingEvent::for_decision(
                patients[p].id.clone(),
                REQUEST_TEXTS[(p + k) % REQUEST_TEXTS.len()].map(str::to_string),
                past_decision(routed, confidence),
                None,
            );
            event.ts = now - Duration::minutes((total - n as i64) * 10);
            event
        })
        .collect()
}

pub(crate) fn seed_data() -> SeedData {
    let patients = patients();
    let facilities = facilities();
    let history = history(&patients, &facilities);
    SeedData {
        patients,
        facilities,
        history,
    }
}

/// Builds the in-memory directory and event store with the sample data loaded.
pub(crate) fn seeded_stores(
) -> Result<(Arc<InMemoryDirectory>, Arc<InMemoryEventStore>), RepositoryError> {
    let SeedData {
        patients,
        facilities,
        history,
    } = seed_data();

    let events = InMemoryEventStore::new();
    for event in history {
        events.persist(event)?;
    }

    Ok((
        Arc::new(InMemoryDirectory::new(patients, facilities)),
        Arc::new(events),
    ))
}
