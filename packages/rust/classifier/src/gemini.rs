//! Google Gemini `generateContent` client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use dealdesk_shared::{ClassifierConfig, DealDeskError, Result};

use crate::extraction::{ModelExtraction, parse_extraction};
use crate::prompt::{SYSTEM_PROMPT, TEXT_PREFIX, response_schema};
use crate::{ClassificationInput, DealClassifier};

/// User-Agent string for classification requests.
const USER_AGENT: &str = concat!("DealDesk/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Classifier backed by the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClassifier {
    client: Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
}

impl GeminiClassifier {
    /// Build a classifier. A missing API key is not an error here: calls made
    /// without one fail at the adapter boundary and yield the fallback draft.
    pub fn new(
        base_url: Url,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DealDeskError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            model: model.into(),
            api_key,
        })
    }

    /// Build from the `[classifier]` config section, reading the key from its env var.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        Self::new(
            config.endpoint()?,
            config.model.clone(),
            config.api_key(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            self.model
        )
    }

    fn build_request(input: &ClassificationInput) -> GenerateRequest {
        let mut parts = vec![RequestPart::Text {
            text: SYSTEM_PROMPT.to_string(),
        }];

        if let Some(text) = input.text.as_deref().filter(|t| !t.trim().is_empty()) {
            parts.push(RequestPart::Text {
                text: format!("{TEXT_PREFIX}{text}"),
            });
        }

        if let Some(image) = &input.image {
            parts.push(RequestPart::Inline {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }

        GenerateRequest {
            contents: vec![RequestContent { role: "user", parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
                temperature: 0.2,
            },
        }
    }
}

impl DealClassifier for GeminiClassifier {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, has_text = input.text.is_some(), has_image = input.image.is_some()))]
    async fn extract(&self, input: &ClassificationInput) -> Result<ModelExtraction> {
        if input.is_empty() {
            return Err(DealDeskError::validation("nothing to classify: no text and no image"));
        }

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            DealDeskError::Classification("no API key configured for the classifier".into())
        })?;

        let url = self.generate_url();
        let body = Self::build_request(input);

        debug!(%url, "sending classification request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DealDeskError::Classification(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DealDeskError::Classification(format!(
                "API error ({status}): {}",
                text.chars().take(300).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DealDeskError::Classification(format!("failed to parse response: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| DealDeskError::Classification("response has no candidates".into()))?;

        parse_extraction(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImagePayload;

    #[test]
    fn generate_url_joins_model() {
        let classifier = GeminiClassifier::new(
            Url::parse("https://generativelanguage.googleapis.com/v1beta/").unwrap(),
            "gemini-2.5-flash",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            classifier.generate_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn request_always_asks_for_json() {
        let input = ClassificationInput::text("Warehouse for sale");
        let json = serde_json::to_value(GeminiClassifier::build_request(&input)).unwrap();
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["generationConfig"]["responseSchema"]["type"], "OBJECT");
        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["text"], "Deal text: Warehouse for sale");
    }

    #[test]
    fn request_carries_inline_image() {
        let input = ClassificationInput {
            text: None,
            image: Some(ImagePayload::from_bytes("image/jpeg", b"jpegbytes")),
        };
        let json = serde_json::to_value(GeminiClassifier::build_request(&input)).unwrap();
        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "anBlZ2J5dGVz");
    }
}
