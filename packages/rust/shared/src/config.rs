//! Application configuration for DealDesk.
//!
//! User config lives at `~/.dealdesk/dealdesk.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DealDeskError, Result};
use crate::types::Role;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dealdesk.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dealdesk";

// ---------------------------------------------------------------------------
// Config structs (matching dealdesk.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the deal and referent collections are persisted.
    #[serde(default)]
    pub storage: StorageConfig,

    /// AI classification settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Session identity (cosmetic).
    #[serde(default)]
    pub session: SessionConfig,

    /// CSV import defaults.
    #[serde(default)]
    pub import: ImportConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; a leading `~` is expanded to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl StorageConfig {
    /// The database path with `~` expanded.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }
}

fn default_db_path() -> String {
    "~/.dealdesk/dealdesk.db".into()
}

/// `[classifier]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for document classification.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL (the model path is appended).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Cache successful extractions keyed by input hash.
    #[serde(default = "default_true")]
    pub cache: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            cache: true,
        }
    }
}

impl ClassifierConfig {
    /// Parse `base_url`.
    pub fn endpoint(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            DealDeskError::config(format!("invalid classifier.base_url '{}': {e}", self.base_url))
        })
    }

    /// Read the API key from the configured env var, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
    }
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name written into audit-log entries.
    #[serde(default = "default_user")]
    pub user: String,

    /// Display role. Not enforced anywhere.
    #[serde(default)]
    pub role: Role,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            role: Role::default(),
        }
    }
}

fn default_user() -> String {
    "Admin".into()
}

/// `[import]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Role given to imported contacts when the CSV has no role column.
    #[serde(default = "default_import_role")]
    pub default_role: String,

    /// Department given to every imported contact.
    #[serde(default = "default_import_department")]
    pub default_department: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_role: default_import_role(),
            default_department: default_import_department(),
        }
    }
}

fn default_import_role() -> String {
    "External contact".into()
}
fn default_import_department() -> String {
    "General".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dealdesk/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DealDeskError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dealdesk/dealdesk.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DealDeskError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DealDeskError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DealDeskError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DealDeskError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DealDeskError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
