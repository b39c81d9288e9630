//! Announcer that only logs

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{AnnounceResult, Announcer, PostReceipt};

/// Logs each message instead of publishing it.
///
/// Announcements made through it are still recorded by the engine, exactly
/// as with a live announcer.
#[derive(Debug, Default)]
pub struct DryRunAnnouncer {
    posted: AtomicU64,
}

impl DryRunAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages "posted" so far
    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Announcer for DryRunAnnouncer {
    fn name(&self) -> &str {
        "dry_run"
    }

    async fn post(&self, message: &str) -> AnnounceResult<PostReceipt> {
        let n = self.posted.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(status = %message, "Dry run: status not posted");
        Ok(PostReceipt::new(self.name(), message).with_post_id(format!("dry-run-{n}")))
    }
}
