use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::domain::{PatientId, RouteRequest};
use super::repository::{EventStore, FacilityDirectory, HistoryStore, PatientDirectory};
use super::service::{FacilityRoutingService, RoutingServiceError};

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const DEFAULT_EVENT_LIMIT: usize = 100;

/// Router builder exposing the routing, directory, event, and summary endpoints.
pub fn routing_router<D, S>(service: Arc<FacilityRoutingService<D, S>>) -> Router
where
    D: PatientDirectory + FacilityDirectory + 'static,
    S: HistoryStore + EventStore + 'static,
{
    Router::new()
        .route("/api/v1/route", post(route_handler::<D, S>))
        .route(
            "/api/v1/fhir/ServiceRequest",
            post(fhir_service_request_handler::<D, S>),
        )
        .route("/api/v1/events", get(events_handler::<D, S>))
        .route("/api/v1/facilities", get(facilities_handler::<D, S>))
        .route("/api/v1/patients/:patient_id", get(patient_handler::<D, S>))
        .route("/api/v1/metrics/summary", get(summary_handler::<D, S>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventsQuery {
    limit: Option<usize>,
}

pub(crate) async fn route_handler<D, S>(
    State(service): State<Arc<FacilityRoutingService<D, S>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<RouteRequest>,
) -> Response
where
    D: PatientDirectory + FacilityDirectory + 'static,
    S: HistoryStore + EventStore + 'static,
{
    let key = idempotency_key(&headers);
    match service.route(request, key).await {
        Ok(decision) => (StatusCode::OK, axum::Json(decision)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn fhir_service_request_handler<D, S>(
    State(service): State<Arc<FacilityRoutingService<D, S>>>,
    headers: HeaderMap,
    axum::Json(resource): axum::Json<Value>,
) -> Response
where
    D: PatientDirectory + FacilityDirectory + 'static,
    S: HistoryStore + EventStore + 'static,
{
    let key = idempotency_key(&headers);
    match service.route_fhir(&resource, key).await {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn events_handler<D, S>(
    State(service): State<Arc<FacilityRoutingService<D, S>>>,
    Query(query): Query<EventsQuery>,
) -> Response
where
    D: PatientDirectory + FacilityDirectory + 'static,
    S: HistoryStore + EventStore + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    match service.recent_events(limit) {
        Ok(events) => (StatusCode::OK, axum::Json(events)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn facilities_handler<D, S>(
    State(service): State<Arc<FacilityRoutingService<D, S>>>,
) -> Response
where
    D: PatientDirectory + FacilityDirectory + 'static,
    S: HistoryStore + EventStore + 'static,
{
    match service.facilities() {
        Ok(facilities) => (StatusCode::OK, axum::Json(facilities)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn patient_handler<D, S>(
    State(service): State<Arc<FacilityRoutingService<D, S>>>,
    Path(patient_id): Path<String>,
) -> Response
where
    D: PatientDirectory + FacilityDirectory + 'static,
    S: HistoryStore + EventStore + 'static,
{
    match service.patient(&PatientId(patient_id)) {
        Ok(patient) => (StatusCode::OK, axum::Json(patient)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn summary_handler<D, S>(
    State(service): State<Arc<FacilityRoutingService<D, S>>>,
) -> Response
where
    D: PatientDirectory + FacilityDirectory + 'static,
    S: HistoryStore + EventStore + 'static,
{
    (StatusCode::OK, axum::Json(service.metrics_snapshot())).into_response()
}

fn idempotency_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|value| value.to_str().ok())
}

fn error_response(error: RoutingServiceError) -> Response {
    match error {
        RoutingServiceError::UnknownPatient(_) => {
            let payload = json!({ "error": "Patient not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        RoutingServiceError::Fhir(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        RoutingServiceError::Repository(error) => {
            tracing::error!(error = %error, "repository failure while routing");
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
