use serde::{Deserialize, Serialize};

use super::capability::{capability_key, resolve_capability, CapabilityAliasTable};
use super::domain::{Coordinates, FacilityId, FacilityRecord};
use super::geo::haversine_km;

/// A facility annotated with request-specific features for one scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub facility_id: FacilityId,
    pub name: String,
    pub coordinates: Coordinates,
    pub capacity_score: f64,
    /// `None` when the patient's location is unknown.
    pub distance_km: Option<f64>,
    pub has_capability: bool,
}

impl Candidate {
    /// Distance with "unknown" mapped to positive infinity.
    pub fn distance_or_infinity(&self) -> f64 {
        self.distance_km.unwrap_or(f64::INFINITY)
    }
}

/// Builds the request-scoped candidate pool from the facility directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateResolver {
    aliases: CapabilityAliasTable,
}

impl CandidateResolver {
    pub fn new(aliases: CapabilityAliasTable) -> Self {
        Self { aliases }
    }

    pub fn alias_table(&self) -> &CapabilityAliasTable {
        &self.aliases
    }

    /// Active facilities in directory order, each with distance and capability resolved.
    pub fn resolve(
        &self,
        request_type: Option<&str>,
        department: Option<&str>,
        patient: Option<Coordinates>,
        facilities: &[FacilityRecord],
    ) -> Vec<Candidate> {
        let key = capability_key(request_type, department);

        facilities
            .iter()
            .filter(|facility| facility.is_active)
            .map(|facility| Candidate {
                facility_id: facility.id.clone(),
                name: facility.name.clone(),
                coordinates: facility.coordinates,
                capacity_score: facility.capacity_score,
                distance_km: patient.map(|origin| haversine_km(origin, facility.coordinates)),
                has_capability: resolve_capability(
                    &facility.capabilities,
                    key.as_deref(),
                    &self.aliases,
                ),
            })
            .collect()
    }
}
