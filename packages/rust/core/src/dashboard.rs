//! Dashboard figures derived from the deal collection.

use dealdesk_shared::{Category, Deal, DealStatus};

/// Number of deals shown in the "recent" panel.
pub const RECENT_LIMIT: usize = 5;

/// Headline indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    /// Deals not archived.
    pub active: usize,
    /// Sum of indicative values over all deals.
    pub total_value: f64,
    /// Mean ROI over deals reporting a non-zero ROI.
    pub avg_roi: f64,
    pub pending_nda: usize,
    pub pending_mandate: usize,
    /// Deals created by classification and not yet validated.
    pub drafts: usize,
}

impl Kpis {
    pub fn compute(deals: &[Deal]) -> Self {
        let roi_sum: f64 = deals.iter().filter_map(|d| d.roi).sum();
        let roi_count = deals
            .iter()
            .filter(|d| d.roi.is_some_and(|r| r != 0.0))
            .count()
            .max(1);

        Self {
            active: deals
                .iter()
                .filter(|d| d.status != DealStatus::Archived)
                .count(),
            total_value: deals.iter().map(|d| d.indicative_value).sum(),
            avg_roi: roi_sum / roi_count as f64,
            pending_nda: deals.iter().filter(|d| !d.nda_signed).count(),
            pending_mandate: deals.iter().filter(|d| !d.mandate_acquired).count(),
            drafts: deals.iter().filter(|d| d.is_draft).count(),
        }
    }
}

/// The first [`RECENT_LIMIT`] deals (the collection is kept newest first).
pub fn recent_deals(deals: &[Deal]) -> &[Deal] {
    &deals[..deals.len().min(RECENT_LIMIT)]
}

/// Deal count per category, in [`Category::ALL`] order.
pub fn category_counts(deals: &[Deal]) -> Vec<(Category, usize)> {
    Category::ALL
        .iter()
        .map(|c| (*c, deals.iter().filter(|d| d.category == *c).count()))
        .collect()
}

/// A suggested follow-up shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub title: String,
    pub detail: String,
}

/// Follow-ups derived from unvalidated drafts and active deals without an NDA.
pub fn recommended_actions(deals: &[Deal]) -> Vec<Recommendation> {
    let mut actions = Vec::new();

    let drafts = deals.iter().filter(|d| d.is_draft).count();
    if drafts > 0 {
        actions.push(Recommendation {
            title: "Data validation required".into(),
            detail: format!(
                "{drafts} automatically imported deal(s) need manual confirmation."
            ),
        });
    }

    for deal in deals
        .iter()
        .filter(|d| !d.nda_signed && d.status != DealStatus::Archived)
    {
        actions.push(Recommendation {
            title: "NDA not signed".into(),
            detail: format!("Deal {} ({}) has no signed NDA yet.", deal.id, deal.title),
        });
    }

    actions
}

/// Format euros the way the desk reads them: `7.500.000 €`.
pub fn format_eur(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{sign}{grouped} €")
}
