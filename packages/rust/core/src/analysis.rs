//! Classification with an optional result cache in front of the model call.

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use dealdesk_classifier::{
    ClassificationInput, DealClassifier, ModelExtraction, classify, fallback_draft, prompt_hash,
};
use dealdesk_shared::DealDraft;
use dealdesk_storage::Storage;

/// Classify `input`, consulting `cache` first when given.
///
/// Only successful extractions are cached; hits are re-stamped with `today`.
/// Cache failures are logged and otherwise ignored. Never fails.
#[instrument(skip_all, fields(model = classifier.model_id(), cached = cache.is_some()))]
pub async fn analyze<C: DealClassifier>(
    classifier: &C,
    cache: Option<&Storage>,
    input: &ClassificationInput,
    today: NaiveDate,
) -> DealDraft {
    let Some(storage) = cache else {
        return classify(classifier, input, today).await;
    };

    let hash = prompt_hash(input);
    let model = classifier.model_id();

    match storage.get_cached_extraction(&hash, model).await {
        Ok(Some(json)) => match serde_json::from_str::<ModelExtraction>(&json) {
            Ok(extraction) => {
                info!(%hash, "classification cache hit");
                return extraction.into_draft(today);
            }
            Err(e) => warn!(%hash, error = %e, "ignoring unreadable cache entry"),
        },
        Ok(None) => debug!(%hash, "classification cache miss"),
        Err(e) => warn!(error = %e, "classification cache lookup failed"),
    }

    match classifier.extract(input).await {
        Ok(extraction) => {
            match serde_json::to_string(&extraction) {
                Ok(json) => {
                    if let Err(e) = storage.put_cached_extraction(&hash, model, &json).await {
                        warn!(error = %e, "failed to cache classification");
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize classification"),
            }
            extraction.into_draft(today)
        }
        Err(e) => {
            warn!(error = %e, "classification failed, using fallback");
            fallback_draft()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use dealdesk_classifier::GeminiClassifier;
    use dealdesk_shared::DealStatus;
    use url::Url;
    use uuid::Uuid;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    async fn temp_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("dd_analysis_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.unwrap()
    }

    fn classifier(server: &MockServer) -> GeminiClassifier {
        GeminiClassifier::new(
            Url::parse(&server.uri()).unwrap(),
            "gemini-2.5-flash",
            Some("test-key".into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
    }

    #[tokio::test]
    async fn second_analysis_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply(
                r#"{"title":"Retail park Bologna","category":"real_estate","location":"Bologna","indicativeValue":9000000,"confidence":75}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let storage = temp_storage().await;
        let classifier = classifier(&server);
        let input = ClassificationInput::text("retail park for sale in Bologna");

        let first = analyze(&classifier, Some(&storage), &input, day()).await;
        let second = analyze(&classifier, Some(&storage), &input, day()).await;

        assert_eq!(first.title.as_deref(), Some("Retail park Bologna"));
        assert_eq!(first, second);
        assert_eq!(second.status, Some(DealStatus::Analysis));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let storage = temp_storage().await;
        let classifier = classifier(&server);
        let input = ClassificationInput::text("anything");

        for _ in 0..2 {
            let draft = analyze(&classifier, Some(&storage), &input, day()).await;
            assert!(draft.failed);
            assert_eq!(draft.confidence, Some(0));
        }
    }

    #[tokio::test]
    async fn without_cache_every_call_hits_the_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply(r#"{"title":"A","confidence":10}"#))
            .expect(2)
            .mount(&server)
            .await;

        let classifier = classifier(&server);
        let input = ClassificationInput::text("a");
        analyze(&classifier, None, &input, day()).await;
        let draft = analyze(&classifier, None, &input, day()).await;
        assert_eq!(draft.confidence, Some(10));
    }
}
