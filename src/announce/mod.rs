//! Announcer port: publishing messages to the social feed
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │      AnnouncementEngine                    │
//! │  - candidate selection                     │
//! │  - message formatting                      │
//! │  - announce cap and pacing                 │
//! └────────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//!   ┌────────────┐         ┌────────────┐
//!   │ StatusPost │         │   DryRun   │
//!   │ Announcer  │         │ Announcer  │
//!   └────────────┘         └────────────┘
//! ```
//!
//! The engine receives an `Arc<dyn Announcer>` at construction, so a
//! dry-run implementation can be swapped in without touching engine logic.

pub mod dry_run;
pub mod message;
pub mod status;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{AnnouncerConfig, AnnouncerMode};
use crate::utils::error::AnnounceError;

pub use dry_run::DryRunAnnouncer;
pub use message::format_announcement;
pub use status::StatusPostAnnouncer;

/// Result type for announcer operations
pub type AnnounceResult<T> = Result<T, AnnounceError>;

/// Confirmation of a published message
///
/// Carries no timestamp: the announce time is taken from the engine's clock
/// when the record is marked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostReceipt {
    /// Identifier assigned by the feed, when it reports one
    pub post_id: Option<String>,
    /// Announcer that published the message
    pub channel: String,
    /// Text as published
    pub text: String,
}

impl PostReceipt {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            post_id: None,
            channel: channel.into(),
            text: text.into(),
        }
    }

    pub fn with_post_id(mut self, post_id: impl Into<String>) -> Self {
        self.post_id = Some(post_id.into());
        self
    }
}

impl fmt::Display for PostReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.channel)?;
        if let Some(id) = &self.post_id {
            write!(f, " #{id}")?;
        }
        write!(f, " {}", self.text)
    }
}

/// Capability to publish one message to the social feed
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Get the announcer name
    fn name(&self) -> &str;

    /// Publish `message`
    async fn post(&self, message: &str) -> AnnounceResult<PostReceipt>;
}

/// Build the announcer selected by configuration
pub fn create_announcer(config: &AnnouncerConfig) -> AnnounceResult<Arc<dyn Announcer>> {
    match config.mode {
        AnnouncerMode::Live => Ok(Arc::new(StatusPostAnnouncer::new(config.clone())?)),
        AnnouncerMode::DryRun => Ok(Arc::new(DryRunAnnouncer::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_receipt_display() {
        let receipt = PostReceipt::new("status", "hello").with_post_id("42");
        assert_eq!(receipt.to_string(), "[status] #42 hello");

        let receipt = PostReceipt::new("dry_run", "hello");
        assert_eq!(receipt.to_string(), "[dry_run] hello");
    }

    #[test]
    fn test_receipt_has_no_wall_clock_field() {
        let receipt = PostReceipt::new("status", "hello").with_post_id("42");
        let value = serde_json::to_value(&receipt).unwrap();

        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["channel", "post_id", "text"]);
    }

    #[test]
    fn test_create_announcer_by_mode() {
        let mut config = Config::default().announcer;
        let announcer = create_announcer(&config).unwrap();
        assert_eq!(announcer.name(), "dry_run");

        config.mode = AnnouncerMode::Live;
        assert!(create_announcer(&config).is_err());

        config.access_token = Some("token".to_string());
        let announcer = create_announcer(&config).unwrap();
        assert_eq!(announcer.name(), "status");
    }
}
