//! Record-keeping service client (Quickbase records API).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::RecordError;

/// Record-service seam. Production talks to Quickbase; tests stub this.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert one field-keyed record (`{fid: {"value": v}}`) into
    /// `table_id`, returning the service's raw result.
    async fn insert(
        &self,
        table_id: &str,
        record: serde_json::Value,
    ) -> Result<serde_json::Value, RecordError>;
}

/// Quickbase configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct QuickbaseConfig {
    pub token: SecretString,
    /// Realm hostname, e.g. `company.quickbase.com`.
    pub realm: String,
    /// API origin; overridable for tests.
    pub api_base: String,
}

impl QuickbaseConfig {
    /// Build config from environment variables. Returns `None` when
    /// `QUICKBASE_TOKEN` or `QUICKBASE_REALM` is not set (submission
    /// reports the missing configuration at flow start).
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("QUICKBASE_TOKEN").ok()?;
        let realm = std::env::var("QUICKBASE_REALM").ok()?;
        let api_base = std::env::var("QUICKBASE_API_BASE")
            .unwrap_or_else(|_| "https://api.quickbase.com/v1".to_string());
        Some(Self {
            token: SecretString::from(token),
            realm,
            api_base,
        })
    }
}

/// Quickbase records API client.
pub struct QuickbaseClient {
    config: QuickbaseConfig,
    client: reqwest::Client,
}

impl QuickbaseClient {
    pub fn new(config: QuickbaseConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn records_url(&self) -> String {
        format!("{}/records", self.config.api_base)
    }
}

#[async_trait]
impl RecordStore for QuickbaseClient {
    async fn insert(
        &self,
        table_id: &str,
        record: serde_json::Value,
    ) -> Result<serde_json::Value, RecordError> {
        let body = serde_json::json!({
            "to": table_id,
            "data": [record],
        });

        let resp = self
            .client
            .post(self.records_url())
            .header(
                "Authorization",
                format!("QB-USER-TOKEN {}", self.config.token.expose_secret()),
            )
            .header("QB-Realm-Hostname", &self.config.realm)
            .json(&body)
            .send()
            .await
            .map_err(|e| RecordError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(RecordError::Rejected {
                table: table_id.to_string(),
                detail: format!("{status}: {detail}"),
            });
        }

        resp.json().await.map_err(|e| RecordError::Http(e.to_string()))
    }
}
