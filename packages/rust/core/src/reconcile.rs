//! Field-by-field reconciliation of a [`DealDraft`] into a [`Deal`].

use chrono::{DateTime, Local, NaiveDate, Utc};

use dealdesk_shared::{
    AuditLog, Category, Deal, DealDeskError, DealDraft, DealId, DealStatus, Priority, Result,
    Signal,
};

pub const DEFAULT_TITLE: &str = "New deal";
pub const DEFAULT_SUB_TYPE: &str = "Standard";
pub const DEFAULT_LOCATION: &str = "To be defined";
pub const AI_CLIENT: &str = "AI document lead";
pub const CREATED_ACTION: &str = "Created via AI document analysis";
pub const ENRICHED_ACTION: &str = "Enriched via AI document analysis";

/// Who is reconciling, when, and from what.
#[derive(Debug, Clone)]
pub struct DraftContext {
    /// Name of the referent chosen as responsible, if any.
    pub referent: Option<String>,
    /// Session user recorded in the audit log.
    pub user: String,
    /// The analysed text, used as description when the draft has none.
    pub source_text: Option<String>,
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
}

impl DraftContext {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            referent: None,
            user: user.into(),
            source_text: None,
            now: Utc::now(),
            today: Local::now().date_naive(),
        }
    }

    pub fn with_referent(mut self, referent: Option<String>) -> Self {
        self.referent = referent.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_source_text(mut self, text: Option<String>) -> Self {
        self.source_text = text.filter(|t| !t.trim().is_empty());
        self
    }
}

/// Display bucket for an indicative value: `7.5M`, or `N/A` when unknown.
pub fn value_range_for(value: f64) -> String {
    if value > 0.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else {
        "N/A".to_string()
    }
}

/// Build a new draft deal. The id does not collide with any in `existing`.
pub fn new_deal_from_draft(draft: &DealDraft, ctx: &DraftContext, existing: &[Deal]) -> Deal {
    let id = loop {
        let candidate = DealId::generate(ctx.today);
        if !existing.iter().any(|d| d.id == candidate) {
            break candidate;
        }
    };

    let indicative_value = draft.indicative_value.unwrap_or(0.0);
    let mut audit_log = AuditLog::new();
    audit_log.record(ctx.now, &ctx.user, CREATED_ACTION);

    Deal {
        id,
        title: draft.title.clone().unwrap_or_else(|| DEFAULT_TITLE.into()),
        category: draft.category.unwrap_or(Category::RealEstate),
        sub_type: draft.sub_type.clone().unwrap_or_else(|| DEFAULT_SUB_TYPE.into()),
        location: draft.location.clone().unwrap_or_else(|| DEFAULT_LOCATION.into()),
        value_range: value_range_for(indicative_value),
        indicative_value,
        currency: "EUR".into(),
        cagr: draft.cagr,
        roi: draft.roi,
        irr: None,
        signals: draft.signals.as_deref().map(clamp_signals).unwrap_or_default(),
        internal_referent: ctx.referent.clone().unwrap_or_else(|| ctx.user.clone()),
        client: AI_CLIENT.into(),
        insertion_date: ctx.today,
        status: DealStatus::Analysis,
        priority: draft.priority.unwrap_or(Priority::Medium),
        nda_signed: draft.nda_signed.unwrap_or(false),
        nda_date: None,
        mandate_acquired: draft.mandate_acquired.unwrap_or(false),
        mandate_date: None,
        confidence: draft.confidence.unwrap_or(0).min(100),
        confidence_reason: draft.confidence_reason.clone().unwrap_or_default(),
        description: draft
            .description
            .clone()
            .or_else(|| ctx.source_text.clone())
            .unwrap_or_default(),
        contacts: Vec::new(),
        documents: Vec::new(),
        audit_log,
        is_draft: true,
    }
}

/// Overlay `draft` onto `existing`. Fields absent from the draft are kept.
pub fn enrich_deal(existing: &Deal, draft: &DealDraft, ctx: &DraftContext) -> Result<Deal> {
    if draft.failed {
        return Err(DealDeskError::validation(
            "classification failed; the deal was not modified",
        ));
    }

    let mut deal = existing.clone();

    if let Some(title) = &draft.title {
        deal.title = title.clone();
    }
    if let Some(category) = draft.category {
        deal.category = category;
    }
    if let Some(sub_type) = &draft.sub_type {
        deal.sub_type = sub_type.clone();
    }
    if let Some(location) = &draft.location {
        deal.location = location.clone();
    }
    if let Some(value) = draft.indicative_value.filter(|v| *v != deal.indicative_value) {
        deal.indicative_value = value;
        deal.value_range = value_range_for(value);
    }
    if draft.roi.is_some() {
        deal.roi = draft.roi;
    }
    if draft.cagr.is_some() {
        deal.cagr = draft.cagr;
    }
    if let Some(description) = &draft.description {
        deal.description = description.clone();
    }
    if let Some(nda) = draft.nda_signed {
        deal.nda_signed = nda;
    }
    if let Some(mandate) = draft.mandate_acquired {
        deal.mandate_acquired = mandate;
    }
    if let Some(priority) = draft.priority {
        deal.priority = priority;
    }
    if let Some(signals) = &draft.signals {
        deal.signals = clamp_signals(signals);
    }
    if let Some(confidence) = draft.confidence {
        deal.confidence = confidence.min(100);
    }
    if let Some(reason) = &draft.confidence_reason {
        deal.confidence_reason = reason.clone();
    }
    if let Some(status) = draft.status {
        deal.status = status;
    }
    if let Some(is_draft) = draft.is_draft {
        deal.is_draft = is_draft;
    }
    if let Some(referent) = &ctx.referent {
        deal.internal_referent = referent.clone();
    }

    deal.audit_log.record(ctx.now, &ctx.user, ENRICHED_ACTION);
    Ok(deal)
}

fn clamp_signals(signals: &[Signal]) -> Vec<Signal> {
    signals
        .iter()
        .map(|s| Signal {
            label: s.label.clone(),
            score: s.score.min(10),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::seed_deals;

    fn ctx() -> DraftContext {
        DraftContext {
            referent: None,
            user: "Admin".into(),
            source_text: Some("Warehouse offered in Turin".into()),
            now: Utc::now(),
            today: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        }
    }

    #[test]
    fn value_range_buckets() {
        assert_eq!(value_range_for(7_500_000.0), "7.5M");
        assert_eq!(value_range_for(260_000.0), "0.3M");
        assert_eq!(value_range_for(0.0), "N/A");
    }

    #[test]
    fn new_deal_defaults_from_sparse_draft() {
        let deal = new_deal_from_draft(&DealDraft::default(), &ctx(), &[]);

        assert!(deal.id.as_str().starts_with("DEAL-20261018-"));
        assert_eq!(deal.title, DEFAULT_TITLE);
        assert_eq!(deal.category, Category::RealEstate);
        assert_eq!(deal.sub_type, DEFAULT_SUB_TYPE);
        assert_eq!(deal.location, DEFAULT_LOCATION);
        assert_eq!(deal.value_range, "N/A");
        assert_eq!(deal.currency, "EUR");
        assert_eq!(deal.internal_referent, "Admin");
        assert_eq!(deal.client, AI_CLIENT);
        assert_eq!(deal.status, DealStatus::Analysis);
        assert_eq!(deal.priority, Priority::Medium);
        assert_eq!(deal.description, "Warehouse offered in Turin");
        assert!(deal.is_draft);
        assert_eq!(deal.audit_log.len(), 1);
        assert_eq!(deal.audit_log.entries()[0].action, CREATED_ACTION);
    }

    #[test]
    fn new_deal_takes_draft_fields_and_referent() {
        let draft = DealDraft {
            title: Some("NPL portfolio".into()),
            category: Some(Category::Finance),
            indicative_value: Some(12_000_000.0),
            priority: Some(Priority::High),
            confidence: Some(88),
            signals: Some(vec![Signal {
                label: "Secured".into(),
                score: 14,
            }]),
            ..Default::default()
        };
        let ctx = ctx().with_referent(Some("Luca Neri".into()));
        let deal = new_deal_from_draft(&draft, &ctx, &seed_deals());

        assert_eq!(deal.title, "NPL portfolio");
        assert_eq!(deal.category, Category::Finance);
        assert_eq!(deal.value_range, "12.0M");
        assert_eq!(deal.priority, Priority::High);
        assert_eq!(deal.confidence, 88);
        assert_eq!(deal.signals[0].score, 10);
        assert_eq!(deal.internal_referent, "Luca Neri");
    }

    #[test]
    fn enrich_overlays_present_fields_and_appends_audit() {
        let existing = seed_deals().remove(1);
        let draft = DealDraft {
            location: Some("Turin".into()),
            indicative_value: Some(3_500_000.0),
            status: Some(DealStatus::Analysis),
            is_draft: Some(true),
            ..Default::default()
        };
        let enriched = enrich_deal(&existing, &draft, &ctx()).unwrap();

        assert_eq!(enriched.id, existing.id);
        assert_eq!(enriched.title, existing.title);
        assert_eq!(enriched.location, "Turin");
        assert_eq!(enriched.value_range, "3.5M");
        assert_eq!(enriched.insertion_date, existing.insertion_date);
        assert!(enriched.is_draft);
        assert!(enriched.audit_log.extends(&existing.audit_log));
        assert_eq!(enriched.audit_log.len(), existing.audit_log.len() + 1);
    }

    #[test]
    fn enrich_with_unchanged_value_keeps_range_label() {
        let existing = seed_deals().remove(0);
        let draft = DealDraft {
            indicative_value: Some(existing.indicative_value),
            ..Default::default()
        };
        let enriched = enrich_deal(&existing, &draft, &ctx()).unwrap();
        assert_eq!(enriched.value_range, "5M - 10M");
    }

    #[test]
    fn enrich_rejects_fallback() {
        let existing = seed_deals().remove(0);
        let fallback = dealdesk_classifier::fallback_draft();
        assert!(enrich_deal(&existing, &fallback, &ctx()).is_err());
    }
}
