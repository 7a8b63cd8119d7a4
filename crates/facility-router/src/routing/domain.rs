use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// External patient identifier, as issued by the patient directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub String);

impl PatientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// External facility identifier.
///
/// This is the only facility key in the crate: candidates, history counts, persisted events,
/// and decisions all carry it, so no path can count by a storage key while scoring by another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacilityId(pub String);

impl FacilityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Endpoint reference handed back to callers, e.g. `/facilities/facility-003`.
    pub fn endpoint(&self) -> String {
        format!("/facilities/{}", self.0)
    }
}

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Capability name to availability flag, e.g. `MRI -> true`.
///
/// Keys are kept verbatim; lookups are exact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityMap(BTreeMap<String, bool>);

impl CapabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: impl Into<String>, available: bool) -> Self {
        self.insert(capability, available);
        self
    }

    pub fn insert(&mut self, capability: impl Into<String>, available: bool) {
        self.0.insert(capability.into(), available);
    }

    /// `None` when the facility does not list the capability at all.
    pub fn get(&self, capability: &str) -> Option<bool> {
        self.0.get(capability).copied()
    }

    pub fn supports(&self, capability: &str) -> bool {
        self.get(capability).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, available)| (name.as_str(), *available))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for CapabilityMap {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, available)| (name.into(), available))
                .collect(),
        )
    }
}

/// Read-only snapshot of a patient owned by the external directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: PatientId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Facility directory entry. Inactive facilities are listed but never routed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub id: FacilityId,
    pub name: String,
    #[serde(rename = "type")]
    pub facility_type: String,
    pub is_active: bool,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub capabilities: CapabilityMap,
    /// Available capacity in `[0, 1]`, higher means more room.
    pub capacity_score: f64,
}

/// Inbound routing request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub patient_id: PatientId,
    #[serde(default)]
    pub request_type: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    /// Informational only; never geocoded.
    #[serde(default)]
    pub location_hint: Option<String>,
    /// Consumed by the classifier only, never by scoring.
    #[serde(default)]
    pub free_text: Option<String>,
    #[serde(flatten)]
    pub reserved: ReservedRequestFields,
}

impl RouteRequest {
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: PatientId(patient_id.into()),
            ..Self::default()
        }
    }

    pub fn with_request_type(mut self, request_type: impl Into<String>) -> Self {
        self.request_type = Some(request_type.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_free_text(mut self, free_text: impl Into<String>) -> Self {
        self.free_text = Some(free_text.into());
        self
    }

    pub fn request_type(&self) -> Option<&str> {
        non_blank(self.request_type.as_deref())
    }

    pub fn department(&self) -> Option<&str> {
        non_blank(self.department.as_deref())
    }

    pub fn free_text(&self) -> Option<&str> {
        non_blank(self.free_text.as_deref())
    }
}

/// Fields accepted on the wire but not yet weighted by scoring.
///
/// They stay in the contract so a future weight extension has a defined slot; today the
/// engine ignores both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedRequestFields {
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub intended_site: Option<String>,
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
