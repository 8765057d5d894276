//! libSQL storage layer (local file).
//!
//! The [`Storage`] struct wraps a libSQL database holding one JSON snapshot
//! per [`Collection`] plus the classification cache. Snapshots are written
//! whole on every mutation; the last writer wins.

mod migrations;

use std::path::Path;

use chrono::Utc;
use dealdesk_shared::{DealDeskError, Result};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// The independently persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Deals,
    Referents,
}

impl Collection {
    /// Row key in the `collections` table.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Deals => "deals",
            Self::Referents => "referents",
        }
    }
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DealDeskError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DealDeskError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DealDeskError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        DealDeskError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    pub async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Collection snapshots
    // -----------------------------------------------------------------------

    /// Raw JSON stored for `collection`, if any. The content is not validated.
    pub async fn load_collection(&self, collection: Collection) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value_json FROM collections WHERE key = ?1",
                params![collection.key()],
            )
            .await
            .map_err(|e| DealDeskError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| DealDeskError::Storage(e.to_string()))?;
                Ok(Some(json))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DealDeskError::Storage(e.to_string())),
        }
    }

    /// Replace the stored snapshot of `collection`.
    pub async fn save_collection(&self, collection: Collection, json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO collections (key, value_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                   value_json = excluded.value_json,
                   updated_at = excluded.updated_at",
                params![collection.key(), json, now.as_str()],
            )
            .await
            .map_err(|e| DealDeskError::Storage(e.to_string()))?;
        tracing::debug!(collection = collection.key(), bytes = json.len(), "collection saved");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Classification cache
    // -----------------------------------------------------------------------

    /// Look up a cached model extraction.
    pub async fn get_cached_extraction(
        &self,
        prompt_hash: &str,
        model_id: &str,
    ) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT result_json FROM classification_cache
                 WHERE prompt_hash = ?1 AND model_id = ?2",
                params![prompt_hash, model_id],
            )
            .await
            .map_err(|e| DealDeskError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let result: String = row
                    .get(0)
                    .map_err(|e| DealDeskError::Storage(e.to_string()))?;
                Ok(Some(result))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DealDeskError::Storage(e.to_string())),
        }
    }

    /// Store a model extraction in the cache (upserts).
    pub async fn put_cached_extraction(
        &self,
        prompt_hash: &str,
        model_id: &str,
        result_json: &str,
    ) -> Result<()> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO classification_cache (id, prompt_hash, model_id, result_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(prompt_hash, model_id) DO UPDATE SET
                   result_json = excluded.result_json,
                   created_at = excluded.created_at",
                params![id.as_str(), prompt_hash, model_id, result_json, now.as_str()],
            )
            .await
            .map_err(|e| DealDeskError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("dd_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("dd_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.schema_version().await, 2);
    }

    #[tokio::test]
    async fn collection_absent_then_saved_then_replaced() {
        let storage = test_storage().await;
        assert!(storage.load_collection(Collection::Deals).await.unwrap().is_none());

        storage
            .save_collection(Collection::Deals, r#"[{"id":"a"}]"#)
            .await
            .unwrap();
        storage.save_collection(Collection::Deals, "[]").await.unwrap();

        let stored = storage.load_collection(Collection::Deals).await.unwrap();
        assert_eq!(stored.as_deref(), Some("[]"));
        // Collections are independent
        assert!(storage.load_collection(Collection::Referents).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let tmp = std::env::temp_dir().join(format!("dd_test_{}.db", Uuid::now_v7()));
        {
            let storage = Storage::open(&tmp).await.unwrap();
            storage
                .save_collection(Collection::Referents, r#"[{"id":"REF-1"}]"#)
                .await
                .unwrap();
        }
        let storage = Storage::open(&tmp).await.unwrap();
        let stored = storage.load_collection(Collection::Referents).await.unwrap();
        assert_eq!(stored.as_deref(), Some(r#"[{"id":"REF-1"}]"#));
    }

    #[tokio::test]
    async fn classification_cache_upsert() {
        let storage = test_storage().await;
        assert!(
            storage
                .get_cached_extraction("hash-1", "gemini-2.5-flash")
                .await
                .unwrap()
                .is_none()
        );

        storage
            .put_cached_extraction("hash-1", "gemini-2.5-flash", r#"{"title":"A"}"#)
            .await
            .unwrap();
        storage
            .put_cached_extraction("hash-1", "gemini-2.5-flash", r#"{"title":"B"}"#)
            .await
            .unwrap();

        let cached = storage
            .get_cached_extraction("hash-1", "gemini-2.5-flash")
            .await
            .unwrap();
        assert_eq!(cached.as_deref(), Some(r#"{"title":"B"}"#));

        // Different model, different entry
        assert!(
            storage
                .get_cached_extraction("hash-1", "other-model")
                .await
                .unwrap()
                .is_none()
        );
    }
}
