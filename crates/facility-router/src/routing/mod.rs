//! Facility routing: candidate resolution, scoring, decision assembly, and the service and
//! HTTP surface wrapped around them.

pub mod assist;
pub mod candidates;
pub mod capability;
pub mod decision;
pub mod domain;
pub mod engine;
pub mod fhir;
pub mod geo;
pub mod history;
pub mod memory;
pub mod metrics;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use assist::{DecisionExplainer, RequestClassifier, RequestLabel, RoutingAssist};
pub use candidates::{Candidate, CandidateResolver};
pub use capability::{CapabilityAlias, CapabilityAliasTable};
pub use decision::{Decision, DecisionId, DecisionStatus, DECISION_TTL_SECONDS};
pub use domain::{
    CapabilityMap, Coordinates, FacilityId, FacilityRecord, PatientId, PatientProfile,
    ReservedRequestFields, RouteRequest,
};
pub use engine::{FeatureVector, RoutingEngine, ScoredRoute, ScoringInput};
pub use fhir::FhirMappingError;
pub use history::HistoryCounts;
pub use memory::{InMemoryDirectory, InMemoryEventStore};
pub use metrics::{DecisionMetrics, MetricsSnapshot};
pub use repository::{
    EventStore, FacilityDirectory, HistoryStore, PatientDirectory, PersistOutcome,
    RepositoryError, RoutingEvent,
};
pub use router::routing_router;
pub use service::{FacilityRoutingService, RoutingServiceError};
