//! Parsing the model's JSON into a [`DealDraft`].
//!
//! The model output is read into a lenient [`ModelExtraction`] first (enum
//! fields as plain strings, numbers as floats, unknown keys ignored) and then
//! converted field by field, so nothing outside the schema reaches a deal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use dealdesk_shared::{
    Category, DealDeskError, DealDraft, DealStatus, Priority, Result, Signal,
};

/// Title of the fallback draft.
pub const FALLBACK_TITLE: &str = "Document analysis failed";
/// Location of the fallback draft.
pub const FALLBACK_LOCATION: &str = "To be defined";
/// Confidence rationale of the fallback draft.
pub const FALLBACK_REASON: &str = "Multimodal document analysis failed.";

/// Raw signal as returned by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    pub label: String,
    pub score: f64,
}

/// Fields the model may return, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelExtraction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicative_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cagr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nda_signed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandate_acquired: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<Vec<RawSignal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_reason: Option<String>,
}

impl ModelExtraction {
    /// Convert into a draft stamped as a fresh draft in analysis dated `today`.
    pub fn into_draft(self, today: NaiveDate) -> DealDraft {
        DealDraft {
            title: non_blank(self.title),
            category: self.category.and_then(|c| c.parse::<Category>().ok()),
            sub_type: non_blank(self.sub_type),
            location: non_blank(self.location),
            indicative_value: self.indicative_value.filter(|v| v.is_finite() && *v >= 0.0),
            roi: self.roi.filter(|v| v.is_finite()),
            cagr: self.cagr.filter(|v| v.is_finite()),
            description: non_blank(self.description),
            nda_signed: self.nda_signed,
            mandate_acquired: self.mandate_acquired,
            priority: self.priority.and_then(|p| p.parse::<Priority>().ok()),
            signals: self.signals.map(|signals| {
                signals
                    .into_iter()
                    .filter(|s| !s.label.trim().is_empty())
                    .map(|s| Signal {
                        label: s.label.trim().to_string(),
                        score: clamp_score(s.score, 10.0),
                    })
                    .collect()
            }),
            confidence: self.confidence.map(|c| clamp_score(c, 100.0)),
            confidence_reason: non_blank(self.confidence_reason),
            status: Some(DealStatus::Analysis),
            insertion_date: Some(today),
            is_draft: Some(true),
            failed: false,
        }
    }
}

/// Parse the model's text output. Tolerates a surrounding Markdown code fence.
pub fn parse_extraction(output: &str) -> Result<ModelExtraction> {
    let payload = strip_code_fence(output);
    if payload.is_empty() {
        return Err(DealDeskError::Classification("model returned empty output".into()));
    }
    serde_json::from_str(&payload).map_err(|e| {
        DealDeskError::Classification(format!(
            "model output is not a valid extraction: {e} (got: {})",
            payload.chars().take(200).collect::<String>()
        ))
    })
}

/// The fixed draft returned whenever classification fails.
pub fn fallback_draft() -> DealDraft {
    DealDraft {
        title: Some(FALLBACK_TITLE.into()),
        category: Some(Category::RealEstate),
        location: Some(FALLBACK_LOCATION.into()),
        confidence: Some(0),
        confidence_reason: Some(FALLBACK_REASON.into()),
        failed: true,
        ..Default::default()
    }
}

fn strip_code_fence(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(stripped) = trimmed.strip_prefix("```json") {
        return stripped.trim().trim_end_matches("```").trim().to_string();
    }
    if let Some(stripped) = trimmed.strip_prefix("```") {
        return stripped.trim().trim_end_matches("```").trim().to_string();
    }
    trimmed.to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clamp_score(value: f64, max: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, max) as u8
}
