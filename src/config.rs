//! Deploy-time configuration.
//!
//! Field maps, table ids, link templates, and CSV feed names are data, not
//! code: they drift per deployment, so they come from a TOML file whose
//! path is read from `SURVEY_CONFIG`. Secrets never live here; provider
//! tokens are environment variables owned by the provider configs (see
//! `providers::email` and `providers::records`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::survey::SurveyType;

/// Config file path used when `SURVEY_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "survey.toml";

/// Deploy-time settings: which CSV feeds exist, where invitation links
/// point, and how question keys map onto record-service field ids.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Directory holding the per-survey CSV exports.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Per-survey configuration, keyed by survey type. A type absent here
    /// is unknown to both dispatch and submission.
    #[serde(default)]
    pub surveys: BTreeMap<SurveyType, SurveySettings>,

    /// Optional send-log destination. Absent disables send logging.
    pub send_log: Option<SendLogSettings>,
}

/// One survey type's configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SurveySettings {
    /// CSV file name under `data_dir`.
    pub csv_file: String,

    /// Base URL of the hosted form. A survey without a link template is
    /// never dispatched.
    pub link: Option<String>,

    /// Human-readable name used in email subjects and bodies.
    pub label: String,

    /// Record-service table receiving submissions. A survey without one
    /// rejects submissions as unconfigured.
    pub table_id: Option<String>,

    /// Question key → record-service field id.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Where and how send events are logged.
#[derive(Debug, Clone, Deserialize)]
pub struct SendLogSettings {
    pub table_id: String,
    pub fields: SendLogFields,
}

/// Record-service field ids for the send-log table.
#[derive(Debug, Clone, Deserialize)]
pub struct SendLogFields {
    pub email: String,
    pub property: String,
    pub survey_type: String,
    pub sent_at: String,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load settings from the path named by `SURVEY_CONFIG`, falling back
    /// to [`DEFAULT_CONFIG_PATH`].
    pub fn from_env_path() -> Result<Self, ConfigError> {
        let path =
            std::env::var("SURVEY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(Path::new(&path))
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
