//! Live announcer posting to a status endpoint
//!
//! Sends `{"text": "..."}` with a Bearer token and reads the created post id
//! from `{"data": {"id": "..."}}`. There is no retry here: a failed post
//! aborts the run and the next scheduled run picks the candidate up again.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{AnnounceResult, Announcer, PostReceipt};
use crate::config::AnnouncerConfig;
use crate::utils::error::AnnounceError;

#[derive(Debug, Deserialize)]
struct CreatedPost {
    data: CreatedPostData,
}

#[derive(Debug, Deserialize)]
struct CreatedPostData {
    id: String,
}

/// Announcer backed by the social feed's status API
pub struct StatusPostAnnouncer {
    config: AnnouncerConfig,
    access_token: String,
    client: Client,
}

impl StatusPostAnnouncer {
    /// Create a new announcer
    ///
    /// # Errors
    ///
    /// Returns `AnnounceError::InvalidConfig` when the endpoint is not an
    /// http(s) URL or no access token is configured
    pub fn new(config: AnnouncerConfig) -> AnnounceResult<Self> {
        if !config.status_url.starts_with("http://") && !config.status_url.starts_with("https://")
        {
            return Err(AnnounceError::InvalidConfig(
                "status URL must start with http:// or https://".to_string(),
            ));
        }

        let access_token = config
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AnnounceError::InvalidConfig("missing access token".to_string()))?;

        if config.request_timeout_secs == 0 {
            return Err(AnnounceError::InvalidConfig(
                "timeout must be greater than 0".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            config,
            access_token,
            client,
        })
    }
}

#[async_trait]
impl Announcer for StatusPostAnnouncer {
    fn name(&self) -> &str {
        "status"
    }

    async fn post(&self, message: &str) -> AnnounceResult<PostReceipt> {
        if message.trim().is_empty() {
            return Err(AnnounceError::InvalidMessage("message is empty".to_string()));
        }

        let response = self
            .client
            .post(&self.config.status_url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        if !status.is_success() {
            tracing::error!(
                status = %status,
                url = %self.config.status_url,
                "Status post rejected"
            );
            return Err(AnnounceError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let receipt = PostReceipt::new(self.name(), message);
        let receipt = match serde_json::from_str::<CreatedPost>(&body) {
            Ok(created) => receipt.with_post_id(created.data.id),
            Err(e) => {
                tracing::warn!(error = %e, "Status post accepted but response had no post id");
                receipt
            }
        };

        tracing::info!(post_id = ?receipt.post_id, "Status posted");
        Ok(receipt)
    }
}
