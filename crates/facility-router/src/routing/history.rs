use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{FacilityId, PatientId};
use super::repository::RoutingEvent;

/// Prior routed visits per facility for one patient. Absent facilities count as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryCounts(BTreeMap<FacilityId, u32>);

impl HistoryCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, facility: &FacilityId) -> u32 {
        self.0.get(facility).copied().unwrap_or(0)
    }

    pub fn record(&mut self, facility: FacilityId) {
        *self.0.entry(facility).or_insert(0) += 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FacilityId, u32)> {
        self.0.iter().map(|(facility, count)| (facility, *count))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for HistoryCounts {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(facility, count)| (FacilityId(facility.into()), count))
                .filter(|(_, count)| *count > 0)
                .collect(),
        )
    }
}

/// Counts the patient's prior routings by destination, skipping events that routed nowhere.
pub fn aggregate_history<'a, I>(patient: &PatientId, events: I) -> HistoryCounts
where
    I: IntoIterator<Item = &'a RoutingEvent>,
{
    let mut counts = HistoryCounts::new();
    for event in events {
        if &event.patient_id != patient {
            continue;
        }
        if let Some(facility) = &event.routed_facility_id {
            counts.record(facility.clone());
        }
    }
    counts
}
