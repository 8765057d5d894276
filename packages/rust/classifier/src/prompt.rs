//! Fixed extraction prompt and response schema.

use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use dealdesk_shared::{Category, Priority};

use crate::ClassificationInput;

/// Instruction sent ahead of the user material on every call.
pub const SYSTEM_PROMPT: &str = "You are an expert real-estate and finance analyst. \
Analyse the supplied text and/or image (technical documents, appraisals, brochures, \
e-mails) and extract the structured fields of a deal record for the asset-management \
database. Report monetary values in euros as plain numbers. Set confidence to an \
integer percentage (0-100) and explain it in confidenceReason.";

/// Prefix for the free-text part.
pub const TEXT_PREFIX: &str = "Deal text: ";

/// Response schema in the OpenAPI subset accepted by `generationConfig.responseSchema`.
pub fn response_schema() -> Value {
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    let priorities: Vec<&str> = Priority::ALL.iter().map(|p| p.as_str()).collect();

    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "A professional title (e.g. Grottaferrata residential complex)."
            },
            "category": { "type": "STRING", "enum": categories },
            "subType": {
                "type": "STRING",
                "description": "Sub-category (e.g. Development, Whole building, NPL)."
            },
            "location": { "type": "STRING", "description": "Specific city or locality." },
            "indicativeValue": { "type": "NUMBER", "description": "Estimated monetary value." },
            "roi": { "type": "NUMBER" },
            "cagr": { "type": "NUMBER" },
            "description": {
                "type": "STRING",
                "description": "Executive summary, including surface areas in square metres when present."
            },
            "ndaSigned": { "type": "BOOLEAN" },
            "mandateAcquired": { "type": "BOOLEAN" },
            "priority": { "type": "STRING", "enum": priorities },
            "signals": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "label": { "type": "STRING" },
                        "score": { "type": "NUMBER", "description": "0 to 10." }
                    },
                    "required": ["label", "score"]
                }
            },
            "confidence": { "type": "NUMBER", "description": "0 to 100." },
            "confidenceReason": { "type": "STRING" }
        },
        "required": ["title", "category", "location", "indicativeValue", "confidence"]
    })
}

/// Cache key for an input: SHA-256 over the prompt and every part sent.
pub fn prompt_hash(input: &ClassificationInput) -> String {
    let mut hasher = Sha256::new();
    hasher.update(SYSTEM_PROMPT.as_bytes());
    if let Some(text) = &input.text {
        hasher.update(b"\0text\0");
        hasher.update(text.as_bytes());
    }
    if let Some(image) = &input.image {
        hasher.update(b"\0image\0");
        hasher.update(image.mime_type.as_bytes());
        hasher.update(image.data.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImagePayload;

    #[test]
    fn schema_enums_match_domain_wire_values() {
        let schema = response_schema();
        let cats = schema["properties"]["category"]["enum"].as_array().unwrap();
        assert_eq!(cats.len(), 3);
        assert!(cats.iter().any(|c| c == "real_estate"));
        let prios = schema["properties"]["priority"]["enum"].as_array().unwrap();
        assert_eq!(prios, &vec![json!("high"), json!("medium"), json!("low")]);
    }

    #[test]
    fn schema_required_fields() {
        let schema = response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(
            required,
            ["title", "category", "location", "indicativeValue", "confidence"]
        );
    }

    #[test]
    fn prompt_hash_deterministic_and_input_sensitive() {
        let a = ClassificationInput::text("warehouse in Turin");
        let b = ClassificationInput::text("warehouse in Milan");
        assert_eq!(prompt_hash(&a), prompt_hash(&a.clone()));
        assert_ne!(prompt_hash(&a), prompt_hash(&b));

        let with_image = ClassificationInput {
            text: Some("warehouse in Turin".into()),
            image: Some(ImagePayload::from_bytes("image/png", b"\x89PNG")),
        };
        assert_ne!(prompt_hash(&a), prompt_hash(&with_image));
    }
}
