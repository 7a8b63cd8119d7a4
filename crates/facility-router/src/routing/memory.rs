//! In-process directory and event store used by the API service, the CLI, and tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use super::decision::Decision;
use super::domain::{FacilityRecord, PatientId, PatientProfile};
use super::history::{aggregate_history, HistoryCounts};
use super::repository::{
    EventStore, FacilityDirectory, HistoryStore, PatientDirectory, PersistOutcome,
    RepositoryError, RoutingEvent,
};

#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    patients: Arc<RwLock<BTreeMap<PatientId, PatientProfile>>>,
    facilities: Arc<RwLock<Vec<FacilityRecord>>>,
}

impl InMemoryDirectory {
    pub fn new(patients: Vec<PatientProfile>, facilities: Vec<FacilityRecord>) -> Self {
        let directory = Self::default();
        for patient in patients {
            directory.upsert_patient(patient);
        }
        for facility in facilities {
            directory.upsert_facility(facility);
        }
        directory
    }

    pub fn upsert_patient(&self, patient: PatientProfile) {
        let mut guard = self.patients.write().expect("patient lock poisoned");
        guard.insert(patient.id.clone(), patient);
    }

    /// Replaces an existing facility with the same id, otherwise appends.
    pub fn upsert_facility(&self, facility: FacilityRecord) {
        let mut guard = self.facilities.write().expect("facility lock poisoned");
        match guard.iter_mut().find(|existing| existing.id == facility.id) {
            Some(existing) => *existing = facility,
            None => guard.push(facility),
        }
    }
}

impl PatientDirectory for InMemoryDirectory {
    fn lookup(&self, id: &PatientId) -> Result<Option<PatientProfile>, RepositoryError> {
        let guard = self.patients.read().expect("patient lock poisoned");
        Ok(guard.get(id).cloned())
    }
}

impl FacilityDirectory for InMemoryDirectory {
    fn list(&self) -> Result<Vec<FacilityRecord>, RepositoryError> {
        let guard = self.facilities.read().expect("facility lock poisoned");
        Ok(guard.clone())
    }
}

/// Append-only event log. The key check and the append happen under one lock, so concurrent
/// submissions of the same idempotency key store exactly one decision.
#[derive(Default, Clone)]
pub struct InMemoryEventStore {
    events: Arc<Mutex<Vec<RoutingEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("event store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for InMemoryEventStore {
    fn find_by_key(&self, key: &str) -> Result<Option<Decision>, RepositoryError> {
        let guard = self.events.lock().expect("event store mutex poisoned");
        Ok(guard
            .iter()
            .find(|event| event.idempotency_key.as_deref() == Some(key))
            .map(|event| event.decision.clone()))
    }

    fn persist(&self, event: RoutingEvent) -> Result<PersistOutcome, RepositoryError> {
        let mut guard = self.events.lock().expect("event store mutex poisoned");
        if let Some(key) = event.idempotency_key.as_deref() {
            if let Some(existing) = guard
                .iter()
                .find(|stored| stored.idempotency_key.as_deref() == Some(key))
            {
                return Ok(PersistOutcome::Duplicate(existing.decision.clone()));
            }
        }

        let decision = event.decision.clone();
        guard.push(event);
        Ok(PersistOutcome::Stored(decision))
    }

    fn recent(&self, limit: usize) -> Result<Vec<RoutingEvent>, RepositoryError> {
        let guard = self.events.lock().expect("event store mutex poisoned");
        Ok(guard.iter().rev().take(limit).cloned().collect())
    }
}

impl HistoryStore for InMemoryEventStore {
    fn count_by_patient(&self, patient: &PatientId) -> Result<HistoryCounts, RepositoryError> {
        let guard = self.events.lock().expect("event store mutex poisoned");
        Ok(aggregate_history(patient, guard.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::domain::FacilityId;
    use std::thread;

    fn keyed_event(key: Option<&str>) -> RoutingEvent {
        RoutingEvent::new(
            PatientId("p1".to_string()),
            Some(FacilityId("f-1".to_string())),
            None,
            Decision::failed(),
            key.map(str::to_string),
        )
    }

    #[test]
    fn second_persist_with_same_key_returns_first_decision() {
        let store = InMemoryEventStore::new();
        let first = store.persist(keyed_event(Some("k1"))).expect("stored");
        let second = store.persist(keyed_event(Some("k1"))).expect("deduplicated");

        let PersistOutcome::Stored(stored) = first else {
            panic!("first write should store");
        };
        assert_eq!(second, PersistOutcome::Duplicate(stored.clone()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_key("k1").expect("lookup"), Some(stored));
    }

    #[test]
    fn unkeyed_events_always_append() {
        let store = InMemoryEventStore::new();
        store.persist(keyed_event(None)).expect("stored");
        store.persist(keyed_event(None)).expect("stored");
        assert_eq!(store.len(), 2);
        assert_eq!(
            store
                .count_by_patient(&PatientId("p1".to_string()))
                .expect("history")
                .get(&FacilityId("f-1".to_string())),
            2
        );
    }

    #[test]
    fn concurrent_submissions_store_one_decision_per_key() {
        let store = InMemoryEventStore::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || store.persist(keyed_event(Some("race"))).expect("persist"))
            })
            .collect();

        let outcomes: Vec<PersistOutcome> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread joins"))
            .collect();

        let stored: Vec<_> = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, PersistOutcome::Stored(_)))
            .collect();
        assert_eq!(stored.len(), 1);
        assert_eq!(store.len(), 1);

        let winner = store.find_by_key("race").expect("lookup").expect("stored");
        assert!(outcomes
            .into_iter()
            .all(|outcome| outcome.into_decision() == winner));
    }

    #[test]
    fn recent_returns_newest_first_with_limit() {
        let store = InMemoryEventStore::new();
        for key in ["a", "b", "c"] {
            store.persist(keyed_event(Some(key))).expect("stored");
        }
        let recent = store.recent(2).expect("recent");
        let keys: Vec<_> = recent
            .iter()
            .map(|event| event.idempotency_key.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(keys, vec!["c", "b"]);
    }

    #[test]
    fn directory_upserts_replace_by_id() {
        let directory = InMemoryDirectory::default();
        directory.upsert_patient(PatientProfile {
            id: PatientId("p1".to_string()),
            name: "First".to_string(),
            coordinates: None,
            attributes: BTreeMap::new(),
        });
        let found = directory
            .lookup(&PatientId("p1".to_string()))
            .expect("lookup")
            .expect("present");
        assert_eq!(found.name, "First");
        assert!(directory
            .lookup(&PatientId("p2".to_string()))
            .expect("lookup")
            .is_none());
    }
}
