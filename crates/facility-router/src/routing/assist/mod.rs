//! Optional text-generation collaborators: a free-text request classifier and a decision
//! explainer. Each has a deterministic fallback so routing never depends on a provider.

mod llm;

pub use llm::{LlmClassifier, LlmClient, LlmError, LlmExplainer};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AssistConfig;

use super::domain::PatientId;
use super::engine::FeatureVector;

/// Longest explanation handed back to callers, in characters.
pub const MAX_EXPLANATION_CHARS: usize = 200;

/// Closed label set the classifier may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestLabel {
    Lab,
    Imaging,
    Referral,
    Telehealth,
    Cardiology,
    Orthopedics,
}

impl RequestLabel {
    pub const ALL: [RequestLabel; 6] = [
        RequestLabel::Lab,
        RequestLabel::Imaging,
        RequestLabel::Referral,
        RequestLabel::Telehealth,
        RequestLabel::Cardiology,
        RequestLabel::Orthopedics,
    ];

    /// Answer used when classification is disabled or inconclusive.
    pub const FALLBACK: RequestLabel = RequestLabel::Imaging;

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestLabel::Lab => "lab",
            RequestLabel::Imaging => "imaging",
            RequestLabel::Referral => "referral",
            RequestLabel::Telehealth => "telehealth",
            RequestLabel::Cardiology => "cardiology",
            RequestLabel::Orthopedics => "orthopedics",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let needle = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == needle)
    }
}

impl fmt::Display for RequestLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait RequestClassifier: Send + Sync {
    async fn classify(&self, free_text: &str) -> RequestLabel;
}

#[async_trait]
pub trait DecisionExplainer: Send + Sync {
    async fn explain(
        &self,
        patient_id: &PatientId,
        facility_name: &str,
        features: Option<&FeatureVector>,
    ) -> String;
}

/// Classifier that always answers with [`RequestLabel::FALLBACK`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackClassifier;

#[async_trait]
impl RequestClassifier for FallbackClassifier {
    async fn classify(&self, _free_text: &str) -> RequestLabel {
        RequestLabel::FALLBACK
    }
}

/// Explainer producing the fixed templated sentence.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateExplainer;

#[async_trait]
impl DecisionExplainer for TemplateExplainer {
    async fn explain(
        &self,
        _patient_id: &PatientId,
        facility_name: &str,
        _features: Option<&FeatureVector>,
    ) -> String {
        template_explanation(facility_name)
    }
}

pub fn template_explanation(facility_name: &str) -> String {
    format!("Routed to {facility_name} based on capability, proximity, and prior visits.")
}

/// Collapses whitespace and caps the length; blank input yields `None`.
pub fn tidy_explanation(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(MAX_EXPLANATION_CHARS).collect())
}

/// The collaborators enabled for this process. `None` means the step is skipped entirely.
#[derive(Clone, Default)]
pub struct RoutingAssist {
    pub classifier: Option<Arc<dyn RequestClassifier>>,
    pub explainer: Option<Arc<dyn DecisionExplainer>>,
}

impl RoutingAssist {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Wires the LLM-backed collaborators for whichever toggles are on.
    pub fn from_config(config: &AssistConfig) -> Result<Self, LlmError> {
        if !config.classify && !config.explain {
            return Ok(Self::disabled());
        }

        let client = Arc::new(LlmClient::new(config.api_key.clone(), config.model.clone())?);
        let classifier = config
            .classify
            .then(|| Arc::new(LlmClassifier::new(client.clone())) as Arc<dyn RequestClassifier>);
        let explainer = config
            .explain
            .then(|| Arc::new(LlmExplainer::new(client)) as Arc<dyn DecisionExplainer>);

        Ok(Self {
            classifier,
            explainer,
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn RequestClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_explainer(mut self, explainer: Arc<dyn DecisionExplainer>) -> Self {
        self.explainer = Some(explainer);
        self
    }
}

impl fmt::Debug for RoutingAssist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingAssist")
            .field("classifier", &self.classifier.is_some())
            .field("explainer", &self.explainer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!(RequestLabel::parse(" Cardiology "), Some(RequestLabel::Cardiology));
        assert_eq!(RequestLabel::parse("LAB"), Some(RequestLabel::Lab));
        assert_eq!(RequestLabel::parse("dermatology"), None);
    }

    #[test]
    fn tidy_explanation_collapses_and_truncates() {
        assert_eq!(
            tidy_explanation("  Routed\n to   Eastside  "),
            Some("Routed to Eastside".to_string())
        );
        assert_eq!(tidy_explanation(" \n\t "), None);
        let long = "word ".repeat(100);
        assert_eq!(
            tidy_explanation(&long).map(|text| text.chars().count()),
            Some(MAX_EXPLANATION_CHARS)
        );
    }

    #[tokio::test]
    async fn fallbacks_are_deterministic() {
        assert_eq!(FallbackClassifier.classify("chest pain").await, RequestLabel::Imaging);
        let text = TemplateExplainer
            .explain(&PatientId("p1".to_string()), "Eastside Imaging", None)
            .await;
        assert_eq!(
            text,
            "Routed to Eastside Imaging based on capability, proximity, and prior visits."
        );
    }

    #[test]
    fn config_toggles_select_collaborators() {
        let config = AssistConfig {
            classify: true,
            explain: false,
            api_key: None,
            model: "test-model".to_string(),
        };
        let assist = RoutingAssist::from_config(&config).expect("client builds");
        assert!(assist.classifier.is_some());
        assert!(assist.explainer.is_none());

        let none = RoutingAssist::from_config(&AssistConfig::default()).expect("disabled");
        assert!(none.classifier.is_none() && none.explainer.is_none());
    }
}
