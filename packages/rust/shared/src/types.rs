//! Core domain types for DealDesk: deals, referents, and the classification draft.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DealDeskError;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Business area a deal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Finance,
    RealEstate,
    Corporate,
}

impl Category {
    pub const ALL: [Category; 3] = [Self::Finance, Self::RealEstate, Self::Corporate];

    /// Wire value, as stored in JSON and offered to the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Finance => "finance",
            Self::RealEstate => "real_estate",
            Self::Corporate => "corporate",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Finance => "Finance",
            Self::RealEstate => "Real Estate",
            Self::Corporate => "Corporate",
        }
    }
}

/// Pipeline stage of a deal. Any stage may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Lead,
    Analysis,
    DueDiligence,
    Negotiation,
    Closing,
    Archived,
}

impl DealStatus {
    pub const ALL: [DealStatus; 6] = [
        Self::Lead,
        Self::Analysis,
        Self::DueDiligence,
        Self::Negotiation,
        Self::Closing,
        Self::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Analysis => "analysis",
            Self::DueDiligence => "due_diligence",
            Self::Negotiation => "negotiation",
            Self::Closing => "closing",
            Self::Archived => "archived",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Lead => "Lead",
            Self::Analysis => "Analysis",
            Self::DueDiligence => "Due Diligence",
            Self::Negotiation => "Negotiation",
            Self::Closing => "Closing",
            Self::Archived => "Archived",
        }
    }

    /// The next stage in display order, wrapping around (used by the TUI picker).
    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Deal priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Self::High, Self::Medium, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// Session role label.
///
/// Presentation-only: it is shown in the UI and recorded as the audit-log
/// user, but no operation checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Admin,
    Manager,
    Operator,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [Self::Admin, Self::Manager, Self::Operator, Self::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Operator => "operator",
            Self::Viewer => "viewer",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Manager => "Manager",
            Self::Operator => "Operator",
            Self::Viewer => "Viewer",
        }
    }
}

/// Case-insensitive match against either the wire value or the display label.
fn parse_enum<T: Copy>(
    s: &str,
    all: &[T],
    as_str: fn(&T) -> &'static str,
    label: fn(&T) -> &'static str,
    kind: &str,
) -> std::result::Result<T, DealDeskError> {
    let needle = s.trim();
    all.iter()
        .copied()
        .find(|v| as_str(v).eq_ignore_ascii_case(needle) || label(v).eq_ignore_ascii_case(needle))
        .ok_or_else(|| DealDeskError::parse(format!("unknown {kind} '{needle}'")))
}

impl FromStr for Category {
    type Err = DealDeskError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_enum(s, &Self::ALL, Self::as_str, Self::label, "category")
    }
}

impl FromStr for DealStatus {
    type Err = DealDeskError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_enum(s, &Self::ALL, Self::as_str, Self::label, "status")
    }
}

impl FromStr for Priority {
    type Err = DealDeskError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_enum(s, &Self::ALL, Self::as_str, Self::label, "priority")
    }
}

impl FromStr for Role {
    type Err = DealDeskError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_enum(s, &Self::ALL, Self::as_str, Self::label, "role")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Deal identifier, e.g. `DEAL-20240115-7421ab`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealId(pub String);

impl DealId {
    /// Generate an identifier stamped with `date`. The suffix comes from the
    /// random tail of a UUID v7.
    pub fn generate(date: NaiveDate) -> Self {
        let uuid = Uuid::now_v7().simple().to_string();
        let suffix = &uuid[uuid.len() - 6..];
        Self(format!("DEAL-{}-{suffix}", date.format("%Y%m%d")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DealId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Referent identifier, e.g. `REF-0192f1c4-...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferentId(pub String);

impl ReferentId {
    /// Generate a new time-sortable referent identifier.
    pub fn generate() -> Self {
        Self(format!("REF-{}", Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReferentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Referent
// ---------------------------------------------------------------------------

/// A person in the contact directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referent {
    pub id: ReferentId,
    pub name: String,
    pub email: String,
    pub role: String,
    pub department: String,
}

impl Referent {
    /// Case-insensitive email comparison, the directory's uniqueness rule.
    pub fn has_email(&self, email: &str) -> bool {
        self.email.to_lowercase() == email.to_lowercase()
    }
}

// ---------------------------------------------------------------------------
// Deal
// ---------------------------------------------------------------------------

/// A named 0–10 score for one dimension of attractiveness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub label: String,
    pub score: u8,
}

/// Counterparty attached to a deal (not part of the referent directory).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    pub role: String,
    pub email: String,
    pub phone: String,
    pub is_private: bool,
}

/// Metadata of a file attached to a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealDocument {
    pub name: String,
    /// Human-readable size, e.g. `1.2 MB`.
    pub size: String,
    /// MIME type or short kind label.
    #[serde(rename = "type")]
    pub kind: String,
    pub upload_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub action: String,
}

/// Append-only audit trail. There is no API to remove or rewrite entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog(Vec<AuditEntry>);

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&mut self, at: DateTime<Utc>, user: impl Into<String>, action: impl Into<String>) {
        self.0.push(AuditEntry {
            timestamp: at,
            user: user.into(),
            action: action.into(),
        });
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` is `earlier` with zero or more entries appended.
    pub fn extends(&self, earlier: &AuditLog) -> bool {
        self.0.len() >= earlier.0.len() && self.0[..earlier.0.len()] == earlier.0[..]
    }
}

/// A tracked business opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: DealId,
    pub title: String,
    pub category: Category,
    pub sub_type: String,
    pub location: String,
    /// Display bucket, e.g. `5M - 10M` or `7.5M`.
    pub value_range: String,
    pub indicative_value: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cagr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irr: Option<f64>,
    #[serde(default)]
    pub signals: Vec<Signal>,
    /// Name of the responsible referent.
    pub internal_referent: String,
    pub client: String,
    pub insertion_date: NaiveDate,
    pub status: DealStatus,
    pub priority: Priority,
    pub nda_signed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nda_date: Option<NaiveDate>,
    pub mandate_acquired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandate_date: Option<NaiveDate>,
    /// Classification confidence, 0–100.
    pub confidence: u8,
    #[serde(default)]
    pub confidence_reason: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub documents: Vec<DealDocument>,
    #[serde(default)]
    pub audit_log: AuditLog,
    #[serde(default)]
    pub is_draft: bool,
}

// ---------------------------------------------------------------------------
// DealDraft
// ---------------------------------------------------------------------------

/// Best-effort subset of deal fields produced by automated classification.
///
/// Every field is optional; [`crate::types::DealDraft::failed`] marks the
/// fixed fallback returned when classification did not succeed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
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
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals: Option<Vec<Signal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DealStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insertion_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_draft: Option<bool>,
    /// Set only on the classification fallback.
    #[serde(skip)]
    pub failed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_parsing_accepts_wire_value_and_label() {
        assert_eq!("real_estate".parse::<Category>().unwrap(), Category::RealEstate);
        assert_eq!("Real Estate".parse::<Category>().unwrap(), Category::RealEstate);
        assert_eq!("DUE DILIGENCE".parse::<DealStatus>().unwrap(), DealStatus::DueDiligence);
        assert_eq!(" high ".parse::<Priority>().unwrap(), Priority::High);
        assert!("sideways".parse::<DealStatus>().is_err());
    }

    #[test]
    fn status_next_wraps() {
        assert_eq!(DealStatus::Lead.next(), DealStatus::Analysis);
        assert_eq!(DealStatus::Archived.next(), DealStatus::Lead);
    }

    #[test]
    fn deal_id_format() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let id = DealId::generate(date);
        assert!(id.as_str().starts_with("DEAL-20240115-"));
        assert_eq!(id.as_str().len(), "DEAL-20240115-".len() + 6);
    }

    #[test]
    fn referent_email_match_is_case_insensitive() {
        let r = Referent {
            id: ReferentId::generate(),
            name: "Mario Bianchi".into(),
            email: "M.Bianchi@Nexus.it".into(),
            role: "Senior Analyst".into(),
            department: "Finance".into(),
        };
        assert!(r.has_email("m.bianchi@nexus.it"));
        assert!(!r.has_email("l.neri@nexus.it"));
    }

    #[test]
    fn audit_log_extends() {
        let mut base = AuditLog::new();
        base.record(Utc::now(), "Admin", "Created");
        let mut grown = base.clone();
        grown.record(Utc::now(), "Admin", "Status changed to Closing");
        assert!(grown.extends(&base));
        assert!(!base.extends(&grown));
        assert!(!AuditLog::new().extends(&base));
    }

    #[test]
    fn deal_serializes_camel_case() {
        let deal = Deal {
            id: DealId::from("DEAL-20240201-000001"),
            title: "Logistics warehouse".into(),
            category: Category::RealEstate,
            sub_type: "Income property".into(),
            location: "Turin".into(),
            value_range: "1M - 5M".into(),
            indicative_value: 3_200_000.0,
            currency: "EUR".into(),
            cagr: None,
            roi: Some(6.2),
            irr: None,
            signals: vec![Signal { label: "Leased".into(), score: 10 }],
            internal_referent: "Elena Verdi".into(),
            client: "Private Investor".into(),
            insertion_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            status: DealStatus::Analysis,
            priority: Priority::Medium,
            nda_signed: true,
            nda_date: None,
            mandate_acquired: false,
            mandate_date: None,
            confidence: 80,
            confidence_reason: String::new(),
            description: String::new(),
            contacts: vec![],
            documents: vec![],
            audit_log: AuditLog::new(),
            is_draft: false,
        };

        let json = serde_json::to_string(&deal).expect("serialize");
        assert!(json.contains(r#""indicativeValue":3200000.0"#));
        assert!(json.contains(r#""category":"real_estate""#));
        assert!(json.contains(r#""auditLog":[]"#));
        assert!(!json.contains("cagr"));

        let parsed: Deal = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, deal);
    }

    #[test]
    fn draft_failed_flag_is_not_serialized() {
        let draft = DealDraft {
            confidence: Some(0),
            failed: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&draft).unwrap();
        assert_eq!(json, r#"{"confidence":0}"#);
    }
}
