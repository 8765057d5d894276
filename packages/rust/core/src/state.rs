//! Application state: the single owner of the deal and referent collections.
//!
//! Every mutation builds the next collection, persists it, and only then
//! swaps it in, so a failed save leaves memory as it was. Readers get
//! borrowed snapshots only.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use dealdesk_shared::{
    AppConfig, Deal, DealDeskError, DealDocument, DealDraft, DealId, DealStatus, ImportConfig,
    Referent, ReferentId, Result,
};
use dealdesk_storage::{Collection, Storage};

use crate::csv_import::{self, ImportOutcome};
use crate::reconcile::{self, DraftContext};
use crate::seed::{self, Restored};

/// What a confirmed deletion will remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionTarget {
    Deal { id: DealId, title: String },
    Referent { id: ReferentId, name: String },
}

/// A deletion that has been requested but not applied.
///
/// Only obtainable through [`AppState::request_deal_deletion`] or
/// [`AppState::request_referent_deletion`]; nothing changes until it is
/// passed to [`AppState::confirm_deletion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeletion {
    target: DeletionTarget,
}

impl PendingDeletion {
    pub fn target(&self) -> &DeletionTarget {
        &self.target
    }

    /// Question to put to the user.
    pub fn prompt(&self) -> String {
        match &self.target {
            DeletionTarget::Deal { id, title } => {
                format!("Permanently delete deal {id} ({title})?")
            }
            DeletionTarget::Referent { name, .. } => {
                format!("Remove {name} from the referent directory?")
            }
        }
    }
}

impl fmt::Display for PendingDeletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prompt())
    }
}

/// Fields of a manually entered referent.
#[derive(Debug, Clone, Default)]
pub struct NewReferent {
    pub name: String,
    pub email: String,
    pub role: String,
    pub department: String,
}

pub struct AppState {
    storage: Arc<Storage>,
    deals: Vec<Deal>,
    referents: Vec<Referent>,
    user: String,
    import: ImportConfig,
}

impl AppState {
    /// Restore both collections, using the built-in seed for any collection
    /// that is absent, unreadable, or empty. Never fails.
    #[instrument(skip_all)]
    pub async fn open(storage: Arc<Storage>, config: &AppConfig) -> Self {
        let raw_deals = load_raw(&storage, Collection::Deals).await;
        let raw_referents = load_raw(&storage, Collection::Referents).await;

        let (deals, deals_from) =
            seed::restore_or_seed(raw_deals.as_deref(), "deals", seed::seed_deals);
        let (referents, referents_from) =
            seed::restore_or_seed(raw_referents.as_deref(), "referents", seed::seed_referents);

        info!(
            deals = deals.len(),
            deals_seeded = deals_from == Restored::Seed,
            referents = referents.len(),
            referents_seeded = referents_from == Restored::Seed,
            "state restored"
        );

        Self {
            storage,
            deals,
            referents,
            user: config.session.user.clone(),
            import: config.import.clone(),
        }
    }

    /// Shared storage handle (also used by the classification cache).
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Session user recorded in audit entries.
    pub fn user(&self) -> &str {
        &self.user
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Deals, newest first.
    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn referents(&self) -> &[Referent] {
        &self.referents
    }

    pub fn deal(&self, id: &DealId) -> Option<&Deal> {
        self.deals.iter().find(|d| &d.id == id)
    }

    pub fn referent(&self, id: &ReferentId) -> Option<&Referent> {
        self.referents.iter().find(|r| &r.id == id)
    }

    /// A fresh reconciliation context for the session user.
    pub fn draft_context(&self) -> DraftContext {
        DraftContext::new(self.user.clone())
    }

    // -----------------------------------------------------------------------
    // Deals
    // -----------------------------------------------------------------------

    /// Insert a deal at the top of the list.
    pub async fn add_deal(&mut self, deal: Deal) -> Result<()> {
        if self.deal(&deal.id).is_some() {
            return Err(DealDeskError::validation(format!(
                "deal {} already exists",
                deal.id
            )));
        }
        let id = deal.id.clone();
        let mut next = Vec::with_capacity(self.deals.len() + 1);
        next.push(deal);
        next.extend(self.deals.iter().cloned());
        self.commit_deals(next).await?;
        info!(%id, "deal added");
        Ok(())
    }

    /// Create a draft deal from a classification result.
    pub async fn create_deal_from_draft(
        &mut self,
        draft: &DealDraft,
        ctx: &DraftContext,
    ) -> Result<Deal> {
        let deal = reconcile::new_deal_from_draft(draft, ctx, &self.deals);
        self.add_deal(deal.clone()).await?;
        Ok(deal)
    }

    /// Overlay a classification result onto an existing deal.
    pub async fn enrich_deal(
        &mut self,
        id: &DealId,
        draft: &DealDraft,
        ctx: &DraftContext,
    ) -> Result<Deal> {
        let existing = self
            .deal(id)
            .ok_or_else(|| DealDeskError::NotFound(format!("deal {id}")))?;
        let enriched = reconcile::enrich_deal(existing, draft, ctx)?;
        self.update_deal(enriched.clone()).await?;
        Ok(enriched)
    }

    /// Replace a deal by id. The audit log may only grow.
    pub async fn update_deal(&mut self, deal: Deal) -> Result<()> {
        let idx = self
            .deals
            .iter()
            .position(|d| d.id == deal.id)
            .ok_or_else(|| DealDeskError::NotFound(format!("deal {}", deal.id)))?;

        if !deal.audit_log.extends(&self.deals[idx].audit_log) {
            return Err(DealDeskError::validation(format!(
                "audit log of deal {} cannot be rewritten",
                deal.id
            )));
        }

        let mut next = self.deals.clone();
        next[idx] = deal;
        self.commit_deals(next).await
    }

    /// Move a deal to `status`. Any status may follow any other.
    pub async fn set_status(&mut self, id: &DealId, status: DealStatus) -> Result<()> {
        let mut deal = self
            .deal(id)
            .cloned()
            .ok_or_else(|| DealDeskError::NotFound(format!("deal {id}")))?;
        deal.status = status;
        deal.audit_log.record(
            Utc::now(),
            &self.user,
            format!("Status changed to {}", status.label()),
        );
        info!(%id, status = status.as_str(), "status changed");
        self.update_deal(deal).await
    }

    /// Record an uploaded file's metadata on a deal.
    pub async fn append_document(&mut self, id: &DealId, document: DealDocument) -> Result<()> {
        let mut deal = self
            .deal(id)
            .cloned()
            .ok_or_else(|| DealDeskError::NotFound(format!("deal {id}")))?;
        let action = format!("Document uploaded: {}", document.name);
        deal.documents.push(document);
        deal.audit_log.record(Utc::now(), &self.user, action);
        self.update_deal(deal).await
    }

    // -----------------------------------------------------------------------
    // Referents
    // -----------------------------------------------------------------------

    /// Add a manually entered referent. Name and email are required.
    pub async fn add_referent(&mut self, new: NewReferent) -> Result<Referent> {
        let name = new.name.trim();
        let email = new.email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(DealDeskError::validation("name and email are required"));
        }

        let role = non_empty_or(new.role.trim(), &self.import.default_role);
        let department = non_empty_or(new.department.trim(), &self.import.default_department);

        let referent = Referent {
            id: ReferentId::generate(),
            name: name.to_string(),
            email: email.to_string(),
            role,
            department,
        };
        let mut next = self.referents.clone();
        next.push(referent.clone());
        self.commit_referents(next).await?;
        info!(id = %referent.id, "referent added");
        Ok(referent)
    }

    /// Import referents from delimited text; accepted rows are appended.
    #[instrument(skip_all)]
    pub async fn import_referents(&mut self, text: &str) -> Result<ImportOutcome> {
        let outcome = csv_import::import_referents(text, &self.referents, &self.import)?;
        if !outcome.added.is_empty() {
            let mut next = self.referents.clone();
            next.extend(outcome.added.iter().cloned());
            self.commit_referents(next).await?;
        }
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Two-phase deletion
    // -----------------------------------------------------------------------

    pub fn request_deal_deletion(&self, id: &DealId) -> Result<PendingDeletion> {
        let deal = self
            .deal(id)
            .ok_or_else(|| DealDeskError::NotFound(format!("deal {id}")))?;
        Ok(PendingDeletion {
            target: DeletionTarget::Deal {
                id: deal.id.clone(),
                title: deal.title.clone(),
            },
        })
    }

    pub fn request_referent_deletion(&self, id: &ReferentId) -> Result<PendingDeletion> {
        let referent = self
            .referent(id)
            .ok_or_else(|| DealDeskError::NotFound(format!("referent {id}")))?;
        Ok(PendingDeletion {
            target: DeletionTarget::Referent {
                id: referent.id.clone(),
                name: referent.name.clone(),
            },
        })
    }

    /// Apply a previously requested deletion.
    pub async fn confirm_deletion(&mut self, pending: PendingDeletion) -> Result<()> {
        match pending.target {
            DeletionTarget::Deal { id, .. } => {
                let next: Vec<Deal> = self.deals.iter().filter(|d| d.id != id).cloned().collect();
                if next.len() == self.deals.len() {
                    return Err(DealDeskError::NotFound(format!("deal {id}")));
                }
                self.commit_deals(next).await?;
                info!(%id, "deal deleted");
                Ok(())
            }
            DeletionTarget::Referent { id, .. } => {
                let next: Vec<Referent> =
                    self.referents.iter().filter(|r| r.id != id).cloned().collect();
                if next.len() == self.referents.len() {
                    return Err(DealDeskError::NotFound(format!("referent {id}")));
                }
                self.commit_referents(next).await?;
                info!(%id, "referent deleted");
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Persist `next`, then make it the current deal collection. On error the
    /// in-memory collection is left as it was.
    async fn commit_deals(&mut self, next: Vec<Deal>) -> Result<()> {
        persist(&self.storage, Collection::Deals, &next).await?;
        self.deals = next;
        Ok(())
    }

    async fn commit_referents(&mut self, next: Vec<Referent>) -> Result<()> {
        persist(&self.storage, Collection::Referents, &next).await?;
        self.referents = next;
        Ok(())
    }
}

async fn load_raw(storage: &Storage, collection: Collection) -> Option<String> {
    match storage.load_collection(collection).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(collection = collection.key(), error = %e, "failed to load collection");
            None
        }
    }
}

async fn persist<T: Serialize>(storage: &Storage, collection: Collection, items: &[T]) -> Result<()> {
    let json = serde_json::to_string(items)
        .map_err(|e| DealDeskError::Storage(format!("failed to serialize {}: {e}", collection.key())))?;
    storage.save_collection(collection, &json).await
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealdesk_shared::{AuditLog, Category};
    use uuid::Uuid;

    async fn temp_storage() -> Arc<Storage> {
        let tmp = std::env::temp_dir().join(format!("dd_state_{}.db", Uuid::now_v7()));
        Arc::new(Storage::open(&tmp).await.expect("open test db"))
    }

    /// A state whose backing `collections` table is dropped after opening,
    /// so every save fails.
    async fn state_with_broken_store() -> AppState {
        let tmp = std::env::temp_dir().join(format!("dd_state_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&tmp).await.expect("open test db"));
        let state = AppState::open(storage, &AppConfig::default()).await;

        let db = libsql::Builder::new_local(&tmp).build().await.unwrap();
        let conn = db.connect().unwrap();
        conn.execute("DROP TABLE collections", ()).await.unwrap();
        state
    }

    async fn fresh_state() -> AppState {
        AppState::open(temp_storage().await, &AppConfig::default()).await
    }

    fn draft() -> DealDraft {
        DealDraft {
            title: Some("Hotel conversion Rome".into()),
            category: Some(Category::RealEstate),
            indicative_value: Some(4_000_000.0),
            confidence: Some(70),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_store_uses_seed() {
        let state = fresh_state().await;
        assert_eq!(state.deals().len(), 2);
        assert_eq!(state.referents().len(), 4);
    }

    #[tokio::test]
    async fn stored_empty_list_uses_seed() {
        let storage = temp_storage().await;
        storage.save_collection(Collection::Deals, "[]").await.unwrap();
        let state = AppState::open(storage, &AppConfig::default()).await;
        assert_eq!(state.deals().len(), 2);
    }

    #[tokio::test]
    async fn mutations_persist_before_returning() {
        let storage = temp_storage().await;
        let mut state = AppState::open(storage.clone(), &AppConfig::default()).await;
        let ctx = state.draft_context();
        let created = state.create_deal_from_draft(&draft(), &ctx).await.unwrap();
        assert_eq!(state.deals()[0].id, created.id);

        let reopened = AppState::open(storage, &AppConfig::default()).await;
        assert_eq!(reopened.deals().len(), 3);
        assert_eq!(reopened.deals()[0].title, "Hotel conversion Rome");
    }

    #[tokio::test]
    async fn set_status_appends_audit_entry() {
        let mut state = fresh_state().await;
        let id = state.deals()[0].id.clone();
        let before = state.deal(&id).unwrap().audit_log.clone();

        state.set_status(&id, DealStatus::Archived).await.unwrap();

        let deal = state.deal(&id).unwrap();
        assert_eq!(deal.status, DealStatus::Archived);
        assert!(deal.audit_log.extends(&before));
        assert_eq!(deal.audit_log.len(), before.len() + 1);
        assert_eq!(
            deal.audit_log.entries().last().unwrap().action,
            "Status changed to Archived"
        );
    }

    #[tokio::test]
    async fn update_rejects_shrinking_audit_log() {
        let mut state = fresh_state().await;
        let mut deal = state.deals()[0].clone();
        assert!(!deal.audit_log.is_empty());
        deal.audit_log = AuditLog::new();
        let err = state.update_deal(deal).await.unwrap_err();
        assert!(matches!(err, DealDeskError::Validation { .. }));
    }

    #[tokio::test]
    async fn enrich_keeps_id_and_grows_audit() {
        let mut state = fresh_state().await;
        let id = state.deals()[1].id.clone();
        let ctx = state.draft_context().with_referent(Some("Sara Rossi".into()));
        let enriched = state.enrich_deal(&id, &draft(), &ctx).await.unwrap();
        assert_eq!(enriched.id, id);
        assert_eq!(enriched.internal_referent, "Sara Rossi");
        assert_eq!(state.deal(&id).unwrap().title, "Hotel conversion Rome");
    }

    #[tokio::test]
    async fn append_document_records_metadata() {
        let mut state = fresh_state().await;
        let id = state.deals()[0].id.clone();
        let doc = DealDocument {
            name: "appraisal.pdf".into(),
            size: "1.2 MB".into(),
            kind: "application/pdf".into(),
            upload_date: chrono::NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        };
        state.append_document(&id, doc).await.unwrap();
        let deal = state.deal(&id).unwrap();
        assert_eq!(deal.documents.len(), 1);
        assert!(deal.audit_log.entries().last().unwrap().action.contains("appraisal.pdf"));
    }

    #[tokio::test]
    async fn deletion_requires_confirmation() {
        let mut state = fresh_state().await;
        let id = state.deals()[0].id.clone();

        let pending = state.request_deal_deletion(&id).unwrap();
        assert!(pending.prompt().contains(id.as_str()));
        // Requesting alone changes nothing
        assert_eq!(state.deals().len(), 2);

        state.confirm_deletion(pending.clone()).await.unwrap();
        assert!(state.deal(&id).is_none());
        assert!(state.confirm_deletion(pending).await.is_err());
    }

    #[tokio::test]
    async fn referent_deletion_and_missing_target() {
        let mut state = fresh_state().await;
        let id = state.referents()[0].id.clone();
        let pending = state.request_referent_deletion(&id).unwrap();
        state.confirm_deletion(pending).await.unwrap();
        assert_eq!(state.referents().len(), 3);

        let missing = ReferentId::from("REF-missing");
        assert!(matches!(
            state.request_referent_deletion(&missing),
            Err(DealDeskError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn manual_referent_requires_name_and_email() {
        let mut state = fresh_state().await;
        let missing = NewReferent {
            name: "Solo Name".into(),
            ..Default::default()
        };
        assert!(state.add_referent(missing).await.is_err());

        let added = state
            .add_referent(NewReferent {
                name: "Giulia Conti".into(),
                email: "g.conti@nexus.it".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(added.role, "External contact");
        assert_eq!(added.department, "General");
        assert_eq!(state.referents().len(), 5);
    }

    #[tokio::test]
    async fn import_is_idempotent_and_persisted() {
        let storage = temp_storage().await;
        let mut state = AppState::open(storage.clone(), &AppConfig::default()).await;
        let csv = "NOME;EMAIL;RUOLO\nMario Rossi;mario@x.it;Advisor\nMario Bianchi;m.bianchi@nexus.it;Analyst";

        let first = state.import_referents(csv).await.unwrap();
        assert_eq!(first.added.len(), 1);
        assert_eq!(state.referents().len(), 5);

        let second = state.import_referents(csv).await.unwrap();
        assert!(second.added.is_empty());
        assert_eq!(state.referents().len(), 5);

        let reopened = AppState::open(storage, &AppConfig::default()).await;
        assert_eq!(reopened.referents().len(), 5);
    }

    #[tokio::test]
    async fn rejected_import_changes_nothing() {
        let mut state = fresh_state().await;
        assert!(state.import_referents("A,B\n1,2").await.is_err());
        assert_eq!(state.referents().len(), 4);
    }

    #[tokio::test]
    async fn failed_save_leaves_memory_unchanged() {
        let mut state = state_with_broken_store().await;
        let deals_before = state.deals().to_vec();
        let referents_before = state.referents().to_vec();
        let ctx = state.draft_context();

        assert!(state.create_deal_from_draft(&draft(), &ctx).await.is_err());
        assert_eq!(state.deals(), deals_before.as_slice());

        let id = deals_before[0].id.clone();
        assert!(state.set_status(&id, DealStatus::Closing).await.is_err());
        assert_eq!(state.deals(), deals_before.as_slice());

        let pending = state.request_deal_deletion(&id).unwrap();
        assert!(state.confirm_deletion(pending).await.is_err());
        assert_eq!(state.deals(), deals_before.as_slice());

        let new = NewReferent {
            name: "Giulia Conti".into(),
            email: "g.conti@nexus.it".into(),
            ..Default::default()
        };
        assert!(state.add_referent(new).await.is_err());
        assert!(state.import_referents("NOME;EMAIL\nAnna Verdi;anna@x.it").await.is_err());
        let pending = state.request_referent_deletion(&referents_before[0].id).unwrap();
        assert!(state.confirm_deletion(pending).await.is_err());
        assert_eq!(state.referents(), referents_before.as_slice());
    }
}
