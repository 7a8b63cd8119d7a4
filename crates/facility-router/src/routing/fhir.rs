//! Mapping between FHIR `ServiceRequest` resources and the internal request/decision types.

use serde_json::{json, Value};
use thiserror::Error;

use super::decision::Decision;
use super::domain::{non_blank, PatientId, RouteRequest};

pub const ROUTING_EXTENSION_URL: &str = "http://example.org/handoff-routing";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FhirMappingError {
    #[error("Missing subject.reference")]
    MissingSubject,
}

/// Builds a [`RouteRequest`] from a `ServiceRequest` body.
pub fn map_service_request(resource: &Value) -> Result<RouteRequest, FhirMappingError> {
    let patient_id = subject_reference(resource)
        .and_then(patient_from_reference)
        .ok_or(FhirMappingError::MissingSubject)?;

    let free_text = resource
        .get("code")
        .filter(|code| code.is_object())
        .and_then(|code| code.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(RouteRequest {
        patient_id: PatientId(patient_id.to_string()),
        request_type: first_code(resource, "code"),
        department: first_code(resource, "category"),
        location_hint: location_hint(resource),
        free_text,
        ..RouteRequest::default()
    })
}

fn subject_reference(resource: &Value) -> Option<&str> {
    match resource.get("subject")? {
        Value::Object(subject) => subject.get("reference")?.as_str(),
        Value::String(reference) => Some(reference.as_str()),
        _ => None,
    }
}

/// Accepts `Patient/123` or a bare `123`.
fn patient_from_reference(reference: &str) -> Option<&str> {
    let id = reference.rsplit('/').next().unwrap_or(reference);
    non_blank(Some(id))
}

/// First coding's `code` (then `display`) of a CodeableConcept, falling back to its `text`.
/// Lists of concepts use the first entry.
fn first_code(resource: &Value, field: &str) -> Option<String> {
    let concept = match resource.get(field)? {
        Value::Array(entries) => entries.first()?,
        concept @ Value::Object(_) => concept,
        _ => return None,
    };

    let coding = concept
        .get("coding")
        .and_then(Value::as_array)
        .and_then(|codings| codings.first());

    let raw = match coding {
        Some(coding) => string_field(coding, "code").or_else(|| string_field(coding, "display")),
        None => string_field(concept, "text"),
    };
    raw.map(str::to_string)
}

fn location_hint(resource: &Value) -> Option<String> {
    let field = resource
        .get("locationReference")
        .filter(|value| is_present(value))
        .or_else(|| resource.get("locationCode"))?;

    let hint = match field {
        Value::Object(_) => string_field(field, "reference").or_else(|| string_field(field, "text")),
        Value::String(text) => non_blank(Some(text.as_str())),
        _ => None,
    };
    hint.map(str::to_string)
}

fn string_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    non_blank(value.get(key).and_then(Value::as_str))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Wraps a decision in an informational `OperationOutcome` carrying the routing extension.
pub fn operation_outcome(decision: &Decision) -> Value {
    json!({
        "resourceType": "OperationOutcome",
        "issue": [{
            "severity": "information",
            "code": "informational",
            "diagnostics": "Routed",
        }],
        "extension": [{
            "url": ROUTING_EXTENSION_URL,
            "valueCodeableConcept": { "text": "routing-decision" },
            "extension": [
                { "url": "facilityId", "valueString": decision.route_to_facility_id },
                { "url": "endpointUrl", "valueString": decision.route_to_endpoint },
                { "url": "confidence", "valueDecimal": decision.confidence },
                { "url": "decisionStatus", "valueString": decision.decision_status },
            ],
        }],
    })
}
