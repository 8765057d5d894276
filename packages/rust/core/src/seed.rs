//! Built-in seed collections and the restore-or-seed rule.

use serde::de::DeserializeOwned;
use tracing::{error, warn};

use dealdesk_shared::{Deal, Referent};

const SEED_DEALS: &str = include_str!("seed/deals.json");
const SEED_REFERENTS: &str = include_str!("seed/referents.json");

/// Where a restored collection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restored {
    Stored,
    Seed,
}

pub fn seed_deals() -> Vec<Deal> {
    parse_seed(SEED_DEALS, "deals")
}

pub fn seed_referents() -> Vec<Referent> {
    parse_seed(SEED_REFERENTS, "referents")
}

fn parse_seed<T: DeserializeOwned>(json: &str, name: &str) -> Vec<T> {
    serde_json::from_str(json).unwrap_or_else(|e| {
        error!(collection = name, error = %e, "built-in seed is invalid");
        Vec::new()
    })
}

/// Decode a stored snapshot, falling back to `seed` when it is absent,
/// not valid JSON, not a list of records, or empty. Never fails.
pub fn restore_or_seed<T: DeserializeOwned>(
    raw: Option<&str>,
    name: &str,
    seed: impl FnOnce() -> Vec<T>,
) -> (Vec<T>, Restored) {
    let Some(raw) = raw else {
        return (seed(), Restored::Seed);
    };

    match serde_json::from_str::<Vec<T>>(raw) {
        Ok(items) if !items.is_empty() => (items, Restored::Stored),
        Ok(_) => (seed(), Restored::Seed),
        Err(e) => {
            warn!(collection = name, error = %e, "stored collection unreadable, using seed");
            (seed(), Restored::Seed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealdesk_shared::{Category, DealStatus};

    #[test]
    fn seeds_parse() {
        let deals = seed_deals();
        assert_eq!(deals.len(), 2);
        assert_eq!(deals[0].category, Category::Finance);
        assert_eq!(deals[0].status, DealStatus::DueDiligence);
        assert_eq!(deals[0].audit_log.len(), 1);
        assert_eq!(deals[1].irr, None);

        let referents = seed_referents();
        assert_eq!(referents.len(), 4);
        assert_eq!(referents[0].id.as_str(), "REF-001");
    }

    #[test]
    fn empty_list_falls_back_to_seed() {
        let (deals, source) = restore_or_seed(Some("[]"), "deals", seed_deals);
        assert_eq!(source, Restored::Seed);
        assert_eq!(deals.len(), 2);
    }

    #[test]
    fn absent_corrupt_or_non_list_falls_back() {
        for raw in [None, Some("{not json"), Some(r#"{"id":"x"}"#), Some("42")] {
            let (referents, source) = restore_or_seed(raw, "referents", seed_referents);
            assert_eq!(source, Restored::Seed);
            assert_eq!(referents.len(), 4);
        }
    }

    #[test]
    fn stored_list_wins() {
        let one = serde_json::to_string(&seed_referents()[..1]).unwrap();
        let (referents, source) = restore_or_seed(Some(&one), "referents", seed_referents);
        assert_eq!(source, Restored::Stored);
        assert_eq!(referents.len(), 1);
    }
}
