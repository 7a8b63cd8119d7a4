//! Anthropic Messages API client plus the classifier and explainer built on it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{
    template_explanation, tidy_explanation, DecisionExplainer, RequestClassifier, RequestLabel,
};
use crate::routing::domain::PatientId;
use crate::routing::engine::FeatureVector;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 400;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const CLASSIFY_SYSTEM: &str =
    "You classify healthcare service requests into strict, lowercase labels.";
const EXPLAIN_SYSTEM: &str = "You write concise, clinical audit notes (<=25 words).";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured")]
    MissingKey,

    #[error("http client error: {0}")]
    Client(String),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("response was not a JSON object: {0}")]
    Parse(String),

    #[error("gave up after {0} attempts")]
    Exhausted(u32),
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Thin JSON-completion client. Without a key every call fails fast with
/// [`LlmError::MissingKey`], which callers treat as "use the fallback".
pub struct LlmClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: Option<String>, model: String) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one prompt and parses the reply as a JSON object, retrying with backoff.
    pub async fn json_completion(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<Value, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingKey)?;

        for attempt in 0..MAX_ATTEMPTS {
            match self.attempt(api_key, system, user, max_tokens).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let delay = backoff(attempt);
                    tracing::warn!(attempt, error = %err, ?delay, "llm completion failed");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(LlmError::Exhausted(MAX_ATTEMPTS))
    }

    async fn attempt(
        &self,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<Value, LlmError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            system,
            messages: [Message {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Client(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();

        parse_json_object(&text)
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt))
}

/// Parses the first `{ ... }` span of a model reply.
fn parse_json_object(text: &str) -> Result<Value, LlmError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let slice = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(LlmError::Parse(text.to_string())),
    };

    match serde_json::from_str::<Value>(slice) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(LlmError::Parse(text.to_string())),
        Err(err) => Err(LlmError::Parse(err.to_string())),
    }
}

/// Reads the `label` key of a classifier reply; anything outside the label set is rejected.
pub(crate) fn extract_label(reply: &Value) -> Option<RequestLabel> {
    reply.get("label")?.as_str().and_then(RequestLabel::parse)
}

/// Reads the `text` key of an explainer reply.
pub(crate) fn extract_text(reply: &Value) -> Option<String> {
    reply.get("text")?.as_str().and_then(tidy_explanation)
}

pub struct LlmClassifier {
    client: Arc<LlmClient>,
}

impl LlmClassifier {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RequestClassifier for LlmClassifier {
    async fn classify(&self, free_text: &str) -> RequestLabel {
        if !self.client.is_enabled() {
            return RequestLabel::FALLBACK;
        }

        let allowed: Vec<&str> = RequestLabel::ALL.iter().map(RequestLabel::as_str).collect();
        let prompt = format!(
            "Return a JSON object with a single key 'label' whose value is one of: {allowed:?}. \
             Do not add extra keys.\nRequest: {free_text}"
        );

        match self.client.json_completion(CLASSIFY_SYSTEM, &prompt, 50).await {
            Ok(reply) => extract_label(&reply).unwrap_or(RequestLabel::FALLBACK),
            Err(err) => {
                tracing::debug!(error = %err, "classifier falling back");
                RequestLabel::FALLBACK
            }
        }
    }
}

pub struct LlmExplainer {
    client: Arc<LlmClient>,
}

impl LlmExplainer {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DecisionExplainer for LlmExplainer {
    async fn explain(
        &self,
        patient_id: &PatientId,
        facility_name: &str,
        features: Option<&FeatureVector>,
    ) -> String {
        if !self.client.is_enabled() {
            return template_explanation(facility_name);
        }

        let scores = features
            .and_then(|features| serde_json::to_string(features).ok())
            .unwrap_or_else(|| "{}".to_string());
        let prompt = format!(
            "Return JSON with key 'text' containing a <=25-word sentence explaining the routing.\n\
             Patient: {patient_id}\nFacility: {facility_name}\nFeatureScores: {scores}"
        );

        let reply = self.client.json_completion(EXPLAIN_SYSTEM, &prompt, 80).await;
        reply
            .ok()
            .as_ref()
            .and_then(extract_text)
            .unwrap_or_else(|| template_explanation(facility_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keyless_client() -> Arc<LlmClient> {
        Arc::new(LlmClient::new(None, "test-model".to_string()).expect("client builds"))
    }

    #[test]
    fn backoff_doubles_from_400ms() {
        assert_eq!(backoff(0), Duration::from_millis(400));
        assert_eq!(backoff(1), Duration::from_millis(800));
        assert_eq!(backoff(2), Duration::from_millis(1600));
    }

    #[test]
    fn json_object_is_found_inside_prose() {
        let value = parse_json_object("Sure! {\"label\": \"lab\"} Hope that helps.")
            .expect("object parses");
        assert_eq!(value, json!({"label": "lab"}));
        assert!(parse_json_object("no braces here").is_err());
        assert!(parse_json_object("{not json}").is_err());
    }

    #[test]
    fn labels_outside_the_set_are_rejected() {
        assert_eq!(extract_label(&json!({"label": "Cardiology"})), Some(RequestLabel::Cardiology));
        assert_eq!(extract_label(&json!({"label": "dermatology"})), None);
        assert_eq!(extract_label(&json!({"other": "lab"})), None);
    }

    #[test]
    fn explanation_text_is_tidied() {
        assert_eq!(
            extract_text(&json!({"text": "  Chosen\nfor   proximity. "})),
            Some("Chosen for proximity.".to_string())
        );
        assert_eq!(extract_text(&json!({"text": "   "})), None);
    }

    #[tokio::test]
    async fn keyless_client_fails_fast() {
        let client = keyless_client();
        assert!(!client.is_enabled());
        let err = client
            .json_completion("system", "user", 10)
            .await
            .expect_err("no key");
        assert!(matches!(err, LlmError::MissingKey));
    }

    #[tokio::test]
    async fn keyless_collaborators_use_fallbacks() {
        let client = keyless_client();
        let classifier = LlmClassifier::new(client.clone());
        assert_eq!(classifier.classify("MRI of the knee").await, RequestLabel::Imaging);

        let explainer = LlmExplainer::new(client);
        let text = explainer
            .explain(&PatientId("p1".to_string()), "Westside Clinic", None)
            .await;
        assert_eq!(text, template_explanation("Westside Clinic"));
    }
}
