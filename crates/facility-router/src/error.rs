use crate::config::ConfigError;
use crate::routing::assist::LlmError;
use crate::routing::service::RoutingServiceError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Routing(RoutingServiceError),
    Assist(LlmError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Routing(err) => write!(f, "routing error: {}", err),
            AppError::Assist(err) => write!(f, "assist client error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Routing(err) => Some(err),
            AppError::Assist(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Routing(RoutingServiceError::UnknownPatient(_)) => StatusCode::NOT_FOUND,
            AppError::Routing(RoutingServiceError::Fhir(_)) => StatusCode::BAD_REQUEST,
            AppError::Routing(RoutingServiceError::Repository(_))
            | AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Assist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RoutingServiceError> for AppError {
    fn from(value: RoutingServiceError) -> Self {
        Self::Routing(value)
    }
}

impl From<LlmError> for AppError {
    fn from(value: LlmError) -> Self {
        Self::Assist(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::domain::PatientId;
    use crate::routing::fhir::FhirMappingError;

    #[test]
    fn routing_errors_map_to_client_statuses() {
        let unknown = AppError::from(RoutingServiceError::UnknownPatient(PatientId(
            "p-9".to_string(),
        )));
        assert_eq!(unknown.into_response().status(), StatusCode::NOT_FOUND);

        let fhir = AppError::from(RoutingServiceError::Fhir(FhirMappingError::MissingSubject));
        assert_eq!(fhir.into_response().status(), StatusCode::BAD_REQUEST);

        let config = AppError::from(ConfigError::InvalidPort);
        assert_eq!(
            config.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
