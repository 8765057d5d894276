//! Deal list filtering.

use dealdesk_shared::{Category, Deal};

/// Search term plus optional category, as offered by the deal list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealFilter {
    /// Case-insensitive substring over title, id, location and internal referent.
    pub search: String,
    pub category: Option<Category>,
}

impl DealFilter {
    pub fn new(search: impl Into<String>, category: Option<Category>) -> Self {
        Self {
            search: search.into(),
            category,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty() && self.category.is_none()
    }

    pub fn matches(&self, deal: &Deal) -> bool {
        if self.category.is_some_and(|c| c != deal.category) {
            return false;
        }
        let term = self.search.trim().to_lowercase();
        term.is_empty()
            || [
                deal.title.as_str(),
                deal.id.as_str(),
                deal.location.as_str(),
                deal.internal_referent.as_str(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }

    pub fn apply<'a>(&self, deals: &'a [Deal]) -> Vec<&'a Deal> {
        deals.iter().filter(|d| self.matches(d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::seed_deals;

    #[test]
    fn empty_filter_keeps_everything() {
        let deals = seed_deals();
        let filter = DealFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&deals).len(), 2);
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let deals = seed_deals();
        assert_eq!(DealFilter::new("TURIN", None).apply(&deals).len(), 1);
        assert_eq!(DealFilter::new("elena", None).apply(&deals).len(), 1);
        assert_eq!(DealFilter::new("deal-2024", None).apply(&deals).len(), 2);
        assert!(DealFilter::new("nothing like this", None).apply(&deals).is_empty());
    }

    #[test]
    fn category_combines_with_search() {
        let deals = seed_deals();
        let finance = DealFilter::new("", Some(Category::Finance)).apply(&deals);
        assert_eq!(finance.len(), 1);
        assert!(DealFilter::new("turin", Some(Category::Finance)).apply(&deals).is_empty());
    }
}
