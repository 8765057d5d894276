//! Shared types, error model, and configuration for DealDesk.
//!
//! This crate is the foundation depended on by all other DealDesk crates.
//! It provides:
//! - [`DealDeskError`]: the unified error type
//! - Domain types ([`Deal`], [`Referent`], [`DealDraft`], enumerations)
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClassifierConfig, ImportConfig, SessionConfig, StorageConfig, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from,
};
pub use error::{DealDeskError, Result};
pub use types::{
    AuditEntry, AuditLog, Category, Contact, Deal, DealDocument, DealDraft, DealId, DealStatus,
    Priority, Referent, ReferentId, Role, Signal,
};
