//! Email delivery via the SendGrid v3 mail API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::EmailError;

/// A rendered outbound invitation.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivery-provider seam. Production uses SendGrid; tests stub this.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), EmailError>;
}

/// SendGrid configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct SendGridConfig {
    pub api_key: SecretString,
    /// Verified sender address.
    pub from_address: String,
    /// API origin; overridable for tests.
    pub api_base: String,
}

impl SendGridConfig {
    /// Build config from environment variables. Returns `None` when
    /// `SENDGRID_API_KEY` or `SENDGRID_FROM_ADDRESS` is not set (dispatch
    /// reports the missing configuration at flow start).
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("SENDGRID_API_KEY").ok()?;
        let from_address = std::env::var("SENDGRID_FROM_ADDRESS").ok()?;
        let api_base = std::env::var("SENDGRID_API_BASE")
            .unwrap_or_else(|_| "https://api.sendgrid.com".to_string());
        Some(Self {
            api_key: SecretString::from(api_key),
            from_address,
            api_base,
        })
    }
}

/// SendGrid mail-send client.
pub struct SendGridClient {
    config: SendGridConfig,
    client: reqwest::Client,
}

impl SendGridClient {
    pub fn new(config: SendGridConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/v3/mail/send", self.config.api_base)
    }
}

#[async_trait]
impl EmailSender for SendGridClient {
    async fn send(&self, email: &OutboundEmail) -> Result<(), EmailError> {
        let body = serde_json::json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": self.config.from_address },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.text },
                { "type": "text/html", "value": email.html },
            ],
        });

        let resp = self
            .client
            .post(self.api_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(EmailError::SendFailed {
                to: email.to.clone(),
                reason: format!("{status}: {detail}"),
            });
        }

        tracing::debug!(to = %email.to, "invitation sent");
        Ok(())
    }
}
