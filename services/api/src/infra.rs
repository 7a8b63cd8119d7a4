use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use facility_router::config::AssistConfig;
use facility_router::error::AppError;
use facility_router::routing::{
    FacilityRoutingService, InMemoryDirectory, InMemoryEventStore, RoutingAssist,
    RoutingServiceError,
};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::seed::seeded_stores;

pub(crate) type RoutingService = FacilityRoutingService<InMemoryDirectory, InMemoryEventStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Routing service over the seeded in-memory stores, with assist collaborators per config.
pub(crate) fn build_routing_service(assist: &AssistConfig) -> Result<RoutingService, AppError> {
    let (directory, events) = seeded_stores().map_err(RoutingServiceError::from)?;
    let assist = RoutingAssist::from_config(assist)?;
    Ok(FacilityRoutingService::new(directory, events).with_assist(assist))
}
