use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use facility_router::routing::{
    routing_router, EventStore, FacilityDirectory, FacilityRoutingService, HistoryStore,
    PatientDirectory,
};
use serde_json::json;

use crate::infra::AppState;

pub(crate) fn with_operational_routes<D, S>(
    service: Arc<FacilityRoutingService<D, S>>,
) -> axum::Router
where
    D: PatientDirectory + FacilityDirectory + 'static,
    S: HistoryStore + EventStore + 'static,
{
    routing_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if state.readiness.load(Ordering::Relaxed) {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        )
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{build_routing_service, AppState};
    use axum::body::Body;
    use axum::http::Request;
    use facility_router::config::AssistConfig;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let service = build_routing_service(&AssistConfig::default()).expect("service builds");
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_operational_routes(Arc::new(service)).layer(Extension(state))
    }

    async fn call(router: axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.oneshot(request).await.expect("router responds");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body collects");
        (status, bytes.to_vec())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).expect("request builds")
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let (status, body) = call(app(false), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_reflects_startup_flag() {
        let (status, _) = call(app(false), get("/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = call(app(true), get("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body["status"], "ready");
    }

    #[tokio::test]
    async fn metrics_render_as_prometheus_text() {
        let router = app(true);
        let response = router.oneshot(get("/metrics")).await.expect("responds");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn seeded_service_routes_known_patients() {
        let request = Request::post("/api/v1/route")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "patient_id": "patient-00000", "request_type": "MRI" }).to_string(),
            ))
            .expect("request builds");

        let (status, body) = call(app(true), request).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body["decision_status"], "routed");
        assert_ne!(body["route_to_facility_id"], "facility-closed");
    }

    #[tokio::test]
    async fn seeded_events_are_listed() {
        let (status, body) = call(app(true), get("/api/v1/events?limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(body.as_array().map(Vec::len), Some(5));
    }
}
