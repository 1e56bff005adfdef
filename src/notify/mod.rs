//! Workflow-engine notifier
//!
//! After certain production transitions the gateway tells the external
//! workflow engine to start its content-approval flow. Delivery is
//! fire-and-forget from the caller's point of view: the service layer
//! logs a failed notification and returns success for the update that
//! triggered it, since the state change has already committed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("workflow engine request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("workflow engine returned status {0}")]
    Status(u16),
}

/// One approval notification, derived from a committed gist update
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalNotice {
    pub user_id: String,
    pub gist_id: String,
    pub production_status: String,
    /// Present only for the gist-and-links flow
    pub link_url: Option<String>,
}

impl ApprovalNotice {
    fn payload(&self) -> Value {
        let mut body = json!({
            "userId": self.user_id,
            "gistId": self.gist_id,
            "production_status": self.production_status,
            "timestamp": Utc::now().to_rfc3339(),
        });
        if let Some(url) = &self.link_url {
            body["linkUrl"] = json!(url);
        }
        body
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notice. The engine's response body is passed through
    /// opaquely; callers do not interpret it.
    async fn notify(&self, notice: &ApprovalNotice) -> Result<Value, NotifyError>;
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            api_key: "dev-workflow-api-key".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Notifier speaking the workflow engine's HTTP API
pub struct HttpNotifier {
    client: reqwest::Client,
    config: NotifierConfig,
}

impl HttpNotifier {
    pub fn new(config: NotifierConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/api/content-approval/initiate",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notice: &ApprovalNotice) -> Result<Value, NotifyError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("X-API-Key", &self.config.api_key)
            .json(&notice.payload())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        debug!(
            user_id = %notice.user_id,
            gist_id = %notice.gist_id,
            "notified workflow engine"
        );
        // Engines that reply without a JSON body are still a success
        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(link_url: Option<&str>) -> ApprovalNotice {
        ApprovalNotice {
            user_id: "u1".into(),
            gist_id: "g1".into(),
            production_status: "review".into(),
            link_url: link_url.map(str::to_string),
        }
    }

    #[test]
    fn test_payload_includes_link_url_when_present() {
        let body = notice(Some("https://a")).payload();
        assert_eq!(body["userId"], "u1");
        assert_eq!(body["gistId"], "g1");
        assert_eq!(body["production_status"], "review");
        assert_eq!(body["linkUrl"], "https://a");
        assert!(body["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_payload_omits_link_url_when_absent() {
        let body = notice(None).payload();
        assert!(body.get("linkUrl").is_none());
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash() {
        let notifier = HttpNotifier::new(NotifierConfig {
            base_url: "http://engine:5000/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            notifier.endpoint(),
            "http://engine:5000/api/content-approval/initiate"
        );
    }
}
