//! AI classification adapter.
//!
//! Turns free text and/or one image into a [`DealDraft`] through a single
//! structured-output model call. [`classify`] never fails: any error along the
//! way yields [`fallback_draft`], which has zero confidence and a fixed
//! rationale.

pub mod extraction;
pub mod gemini;
pub mod prompt;

use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use dealdesk_shared::{DealDraft, Result};

pub use extraction::{ModelExtraction, fallback_draft, parse_extraction};
pub use gemini::GeminiClassifier;
pub use prompt::prompt_hash;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// An image forwarded to the model, base64-encoded and tagged with its MIME type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub mime_type: String,
    /// Standard base64 of the raw image bytes.
    pub data: String,
}

impl ImagePayload {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }
}

/// What the user handed over for analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePayload>,
}

impl ClassificationInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    /// True when there is neither non-blank text nor an image.
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(|t| t.trim().is_empty()) && self.image.is_none()
    }
}

// ---------------------------------------------------------------------------
// Classifier seam
// ---------------------------------------------------------------------------

/// A model provider able to extract deal fields from an input.
pub trait DealClassifier: Send + Sync {
    /// Identifier of the model in use (part of the cache key).
    fn model_id(&self) -> &str;

    /// One request, no retry. Errors are returned here and absorbed by [`classify`].
    fn extract(
        &self,
        input: &ClassificationInput,
    ) -> impl Future<Output = Result<ModelExtraction>> + Send;
}

/// Classify `input`, stamping the result as a draft dated `today`.
///
/// Never fails; on any error the fallback draft is returned.
pub async fn classify<C: DealClassifier>(
    classifier: &C,
    input: &ClassificationInput,
    today: NaiveDate,
) -> DealDraft {
    match classifier.extract(input).await {
        Ok(extraction) => {
            let draft = extraction.into_draft(today);
            info!(
                model = classifier.model_id(),
                confidence = draft.confidence.unwrap_or(0),
                "classification succeeded"
            );
            draft
        }
        Err(e) => {
            warn!(model = classifier.model_id(), error = %e, "classification failed, using fallback");
            fallback_draft()
        }
    }
}

/// Today's date in local time, the stamp used for drafts.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use dealdesk_shared::{Category, DealStatus};

    const MODEL: &str = "gemini-2.5-flash";

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn classifier_for(server: &MockServer, key: Option<&str>) -> GeminiClassifier {
        GeminiClassifier::new(
            Url::parse(&server.uri()).unwrap(),
            MODEL,
            key.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn gemini_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        })
    }

    #[test]
    fn input_emptiness() {
        assert!(ClassificationInput::default().is_empty());
        assert!(ClassificationInput::text("   ").is_empty());
        assert!(!ClassificationInput::text("NPL portfolio").is_empty());
        let image_only = ClassificationInput {
            text: None,
            image: Some(ImagePayload::from_bytes("image/png", b"x")),
        };
        assert!(!image_only.is_empty());
    }

    #[tokio::test]
    async fn successful_call_is_stamped_draft() {
        let server = MockServer::start().await;
        let model_json = r#"{"title":"Superbonus credit transfer","category":"finance","location":"Milan","indicativeValue":7500000,"confidence":92,"confidenceReason":"Certified documents"}"#;

        Mock::given(method("POST"))
            .and(path(format!("/models/{MODEL}:generateContent")))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(model_json)))
            .expect(1)
            .mount(&server)
            .await;

        let classifier = classifier_for(&server, Some("test-key"));
        let draft = classify(&classifier, &ClassificationInput::text("credits"), day()).await;

        assert!(!draft.failed);
        assert_eq!(draft.title.as_deref(), Some("Superbonus credit transfer"));
        assert_eq!(draft.category, Some(Category::Finance));
        assert_eq!(draft.confidence, Some(92));
        assert_eq!(draft.status, Some(DealStatus::Analysis));
        assert_eq!(draft.insertion_date, Some(day()));
        assert_eq!(draft.is_draft, Some(true));
    }

    #[tokio::test]
    async fn http_error_yields_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .expect(1)
            .mount(&server)
            .await;

        let classifier = classifier_for(&server, Some("test-key"));
        let draft = classify(&classifier, &ClassificationInput::text("x"), day()).await;

        assert!(draft.failed);
        assert_eq!(draft.confidence, Some(0));
        assert!(!draft.confidence_reason.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_model_json_yields_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(gemini_body("{ this is not json")),
            )
            .mount(&server)
            .await;

        let classifier = classifier_for(&server, Some("test-key"));
        let draft = classify(&classifier, &ClassificationInput::text("x"), day()).await;
        assert!(draft.failed);
        assert_eq!(draft.confidence, Some(0));
    }

    #[tokio::test]
    async fn empty_candidates_yield_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } })),
            )
            .mount(&server)
            .await;

        let classifier = classifier_for(&server, Some("test-key"));
        let draft = classify(&classifier, &ClassificationInput::text("x"), day()).await;
        assert!(draft.failed);
    }

    #[tokio::test]
    async fn missing_api_key_yields_fallback_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let classifier = classifier_for(&server, None);
        let draft = classify(&classifier, &ClassificationInput::text("x"), day()).await;
        assert!(draft.failed);
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_fallback() {
        // Port 9 (discard) on localhost: connection refused.
        let classifier = GeminiClassifier::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            MODEL,
            Some("k".into()),
            Duration::from_secs(2),
        )
        .unwrap();
        let draft = classify(&classifier, &ClassificationInput::text("x"), day()).await;
        assert!(draft.failed);
        assert_eq!(draft.confidence, Some(0));
    }
}
