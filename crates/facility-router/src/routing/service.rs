use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use super::assist::{template_explanation, tidy_explanation, RoutingAssist};
use super::candidates::CandidateResolver;
use super::decision::Decision;
use super::domain::{non_blank, FacilityRecord, PatientId, PatientProfile, RouteRequest};
use super::engine::{RoutingEngine, ScoringInput};
use super::fhir::{map_service_request, operation_outcome, FhirMappingError};
use super::metrics::{DecisionMetrics, MetricsSnapshot};
use super::repository::{
    EventStore, FacilityDirectory, HistoryStore, PatientDirectory, PersistOutcome,
    RepositoryError, RoutingEvent,
};

/// Service composing the directories, the event store, the scoring engine, and the optional
/// classifier/explainer.
pub struct FacilityRoutingService<D, S> {
    directory: Arc<D>,
    events: Arc<S>,
    resolver: CandidateResolver,
    engine: RoutingEngine,
    assist: RoutingAssist,
    metrics: Arc<DecisionMetrics>,
}

impl<D, S> FacilityRoutingService<D, S>
where
    D: PatientDirectory + FacilityDirectory + 'static,
    S: HistoryStore + EventStore + 'static,
{
    pub fn new(directory: Arc<D>, events: Arc<S>) -> Self {
        Self {
            directory,
            events,
            resolver: CandidateResolver::default(),
            engine: RoutingEngine::default(),
            assist: RoutingAssist::disabled(),
            metrics: Arc::new(DecisionMetrics::new()),
        }
    }

    pub fn with_assist(mut self, assist: RoutingAssist) -> Self {
        self.assist = assist;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<DecisionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Route a request end to end: replay, validate, classify, score, explain, persist.
    ///
    /// A non-blank `idempotency_key` that already has a stored decision short-circuits and
    /// returns that decision unchanged.
    pub async fn route(
        &self,
        request: RouteRequest,
        idempotency_key: Option<&str>,
    ) -> Result<Decision, RoutingServiceError> {
        let started = Instant::now();
        let key = non_blank(idempotency_key);

        if let Some(key) = key {
            if let Some(stored) = self.events.find_by_key(key)? {
                tracing::debug!(idempotency_key = key, decision_id = %stored.decision_id, "replaying stored decision");
                return Ok(stored);
            }
        }

        let patient = self
            .directory
            .lookup(&request.patient_id)?
            .ok_or_else(|| RoutingServiceError::UnknownPatient(request.patient_id.clone()))?;

        let request_type = match request.request_type() {
            Some(request_type) => Some(request_type.to_string()),
            None => self.classify(&request).await,
        };

        let mut decision = self.decide(&patient, request_type.as_deref(), request.department())?;

        if let Some(reason) = self.explain(&patient.id, &decision).await? {
            decision.reason = reason;
        }

        let event = RoutingEvent::for_decision(
            patient.id.clone(),
            request.free_text.clone(),
            decision,
            key.map(str::to_string),
        );

        let decision = match self.events.persist(event)? {
            PersistOutcome::Stored(decision) => {
                self.metrics
                    .record_decision(decision.decision_status, decision.confidence);
                self.metrics.record_latency(started.elapsed());
                tracing::info!(
                    patient_id = %patient.id,
                    facility_id = %decision.route_to_facility_id,
                    status = %decision.decision_status,
                    confidence = decision.confidence,
                    decision_id = %decision.decision_id,
                    "routing decision stored"
                );
                decision
            }
            PersistOutcome::Duplicate(decision) => {
                tracing::debug!(
                    decision_id = %decision.decision_id,
                    "concurrent submission won the idempotency key"
                );
                decision
            }
        };

        Ok(decision)
    }

    /// Route a FHIR `ServiceRequest` and wrap the result in an `OperationOutcome`.
    pub async fn route_fhir(
        &self,
        resource: &Value,
        idempotency_key: Option<&str>,
    ) -> Result<Value, RoutingServiceError> {
        let request = map_service_request(resource)?;
        let decision = self.route(request, idempotency_key).await?;
        Ok(operation_outcome(&decision))
    }

    /// Pure scoring pass over the current directory snapshot; nothing is persisted.
    pub fn decide(
        &self,
        patient: &PatientProfile,
        request_type: Option<&str>,
        department: Option<&str>,
    ) -> Result<Decision, RoutingServiceError> {
        let facilities = self.directory.list()?;
        let candidates =
            self.resolver
                .resolve(request_type, department, patient.coordinates, &facilities);
        let history = self.events.count_by_patient(&patient.id)?;

        Ok(self.engine.decide(ScoringInput {
            candidates: &candidates,
            history: &history,
            patient_id: &patient.id,
            request_type,
        }))
    }

    pub fn facilities(&self) -> Result<Vec<FacilityRecord>, RoutingServiceError> {
        Ok(self.directory.list()?)
    }

    pub fn patient(&self, id: &PatientId) -> Result<PatientProfile, RoutingServiceError> {
        self.directory
            .lookup(id)?
            .ok_or_else(|| RoutingServiceError::UnknownPatient(id.clone()))
    }

    pub fn recent_events(&self, limit: usize) -> Result<Vec<RoutingEvent>, RoutingServiceError> {
        Ok(self.events.recent(limit)?)
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn classify(&self, request: &RouteRequest) -> Option<String> {
        let classifier = self.assist.classifier.as_ref()?;
        let free_text = request.free_text()?;
        let label = classifier.classify(free_text).await;
        tracing::debug!(label = %label, "classified free text");
        Some(label.as_str().to_string())
    }

    async fn explain(
        &self,
        patient_id: &PatientId,
        decision: &Decision,
    ) -> Result<Option<String>, RoutingServiceError> {
        let (Some(explainer), Some(facility_id)) =
            (self.assist.explainer.as_ref(), decision.routed_facility())
        else {
            return Ok(None);
        };

        let facility_name = self
            .directory
            .get(facility_id)?
            .map(|facility| facility.name)
            .unwrap_or_else(|| facility_id.to_string());

        let text = explainer
            .explain(patient_id, &facility_name, decision.features_used.as_ref())
            .await;
        Ok(Some(
            tidy_explanation(&text).unwrap_or_else(|| template_explanation(&facility_name)),
        ))
    }
}

/// Error raised by the routing service.
#[derive(Debug, thiserror::Error)]
pub enum RoutingServiceError {
    #[error("patient {0} not found")]
    UnknownPatient(PatientId),
    #[error(transparent)]
    Fhir(#[from] FhirMappingError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
