//! Domain logic for DealDesk.
//!
//! This crate owns the application state and everything the front ends do
//! with it: CSV referent import, draft reconciliation, dashboard figures,
//! deal filtering, navigation rules, file intake, and cached analysis.

pub mod analysis;
pub mod csv_import;
pub mod dashboard;
pub mod intake;
pub mod navigation;
pub mod query;
pub mod reconcile;
pub mod seed;
pub mod state;

pub use analysis::analyze;
pub use csv_import::{ColumnMap, Delimiter, ImportOutcome, detect_delimiter, import_referents};
pub use dashboard::{Kpis, Recommendation, format_eur};
pub use intake::{Attachment, AttachmentBody, load_attachment};
pub use navigation::{Navigation, Tab};
pub use query::DealFilter;
pub use reconcile::{DraftContext, enrich_deal, new_deal_from_draft, value_range_for};
pub use state::{AppState, DeletionTarget, NewReferent, PendingDeletion};
