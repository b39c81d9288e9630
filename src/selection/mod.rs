//! Selection and announcement
//!
//! Picks unannounced, high-engagement videos from the trailing window and
//! announces a capped number of them per run, oldest first.
//!
//! A video qualifies when it has not been announced yet and at least one of
//! its counters reaches the threshold:
//!
//! | counter  | threshold |
//! |----------|-----------|
//! | views    | 10,000    |
//! | comments | 500       |
//! | mylists  | 100       |

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::announce::{format_announcement, Announcer};
use crate::clock::Clock;
use crate::error::Result;
use crate::models::VideoRecord;
use crate::storage::SharedVideoRepository;
use crate::utils::error::StoreError;

pub const VIEW_COUNT_THRESHOLD: u64 = 10_000;
pub const COMMENT_COUNT_THRESHOLD: u64 = 500;
pub const MYLIST_COUNT_THRESHOLD: u64 = 100;

/// Maximum announcements per run
pub const ANNOUNCE_CAP: usize = 3;

/// Candidates must have been published within this many days
pub const ANNOUNCE_WINDOW_DAYS: i64 = 7;

/// Pause between two consecutive announcements
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// Policy
// ============================================================================

/// Thresholds, cap and window of the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub view_threshold: u64,
    pub comment_threshold: u64,
    pub mylist_threshold: u64,
    pub cap: usize,
    pub window_days: i64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            view_threshold: VIEW_COUNT_THRESHOLD,
            comment_threshold: COMMENT_COUNT_THRESHOLD,
            mylist_threshold: MYLIST_COUNT_THRESHOLD,
            cap: ANNOUNCE_CAP,
            window_days: ANNOUNCE_WINDOW_DAYS,
        }
    }
}

impl SelectionPolicy {
    /// At least one counter at or above its threshold
    pub fn meets_threshold(&self, record: &VideoRecord) -> bool {
        record.view_count >= self.view_threshold
            || record.comment_count >= self.comment_threshold
            || record.mylist_count >= self.mylist_threshold
    }

    pub fn is_eligible(&self, record: &VideoRecord) -> bool {
        !record.is_announced() && self.meets_threshold(record)
    }

    /// Eligible candidates, keeping the input order
    pub fn select<'a>(&self, candidates: &'a [VideoRecord]) -> Vec<&'a VideoRecord> {
        candidates
            .iter()
            .filter(|record| {
                if let Some(announced_at) = record.announced_at {
                    tracing::debug!(
                        content_id = %record.content_id,
                        announced_at = %announced_at,
                        "Skip video: already announced"
                    );
                    return false;
                }

                if !self.meets_threshold(record) {
                    tracing::debug!(
                        content_id = %record.content_id,
                        view_count = record.view_count,
                        comment_count = record.comment_count,
                        mylist_count = record.mylist_count,
                        "Skip video: below thresholds"
                    );
                    return false;
                }

                true
            })
            .collect()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Outcome of one announcement pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnnounceStats {
    /// Records in the window
    pub candidates: usize,
    /// Records passing the filters
    pub eligible: usize,
    /// Identities announced during this pass, in order
    pub announced: Vec<String>,
}

/// Selects candidates and drives the capped announce loop
pub struct AnnouncementEngine {
    store: SharedVideoRepository,
    announcer: Arc<dyn Announcer>,
    clock: Arc<dyn Clock>,
    policy: SelectionPolicy,
    interval: Duration,
}

impl AnnouncementEngine {
    pub fn new(
        store: SharedVideoRepository,
        announcer: Arc<dyn Announcer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            announcer,
            clock,
            policy: SelectionPolicy::default(),
            interval: ANNOUNCE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Announce up to `policy.cap` eligible videos.
    ///
    /// The first failed post aborts the pass; everything announced before it
    /// stays recorded.
    pub async fn run(&self) -> Result<AnnounceStats> {
        let since = self.clock.days_ago(self.policy.window_days);
        let candidates = self.store.find_recent(since)?;
        tracing::debug!(since = %since, count = candidates.len(), "Announce window loaded");

        let eligible = self.policy.select(&candidates);
        let mut stats = AnnounceStats {
            candidates: candidates.len(),
            eligible: eligible.len(),
            announced: Vec::new(),
        };

        for record in eligible {
            if stats.announced.len() >= self.policy.cap {
                break;
            }

            if !stats.announced.is_empty() {
                tokio::time::sleep(self.interval).await;
            }

            let message = format_announcement(record);
            tracing::debug!(content_id = %record.content_id, status = %message, "Announcing");

            let receipt = self.announcer.post(&message).await.map_err(|e| {
                tracing::error!(content_id = %record.content_id, error = %e, "Announcement failed");
                e
            })?;
            tracing::info!(content_id = %record.content_id, receipt = %receipt, "Announced");

            match self.store.mark_announced(&record.content_id, self.clock.now()) {
                Ok(()) => {}
                Err(StoreError::AlreadyAnnounced(id)) => {
                    tracing::warn!(
                        content_id = %id,
                        "Video was announced concurrently by another run"
                    );
                }
                Err(e) => return Err(e.into()),
            }

            stats.announced.push(record.content_id.clone());
        }

        tracing::info!(
            candidates = stats.candidates,
            eligible = stats.eligible,
            announced = stats.announced.len(),
            "Announcement finished"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announce::{AnnounceResult, PostReceipt};
    use crate::clock::{parse_timestamp, FixedClock};
    use crate::error::Error;
    use crate::storage::{MemoryVideoRepository, VideoRepository};
    use crate::utils::error::AnnounceError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records messages; fails on the call with index `fail_on`
    #[derive(Default)]
    struct RecordingAnnouncer {
        messages: Mutex<Vec<String>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl Announcer for RecordingAnnouncer {
        fn name(&self) -> &str {
            "recording"
        }

        async fn post(&self, message: &str) -> AnnounceResult<PostReceipt> {
            let mut messages = self.messages.lock().unwrap();
            if self.fail_on == Some(messages.len()) {
                return Err(AnnounceError::Rejected {
                    status: 503,
                    body: "over capacity".to_string(),
                });
            }
            messages.push(message.to_string());
            Ok(PostReceipt::new(self.name(), message))
        }
    }

    fn record(id: &str, start: &str, views: u64, comments: u64, mylists: u64) -> VideoRecord {
        let start_time = parse_timestamp(start).unwrap();
        VideoRecord {
            content_id: id.to_string(),
            title: format!("video {id}"),
            view_count: views,
            comment_count: comments,
            mylist_count: mylists,
            start_time,
            announced_at: None,
            last_updated_at: start_time,
        }
    }

    /// `n` videos over the view threshold, one day apart, oldest first
    fn popular_records(n: u32) -> Vec<VideoRecord> {
        (1..=n)
            .map(|i| {
                let start = format!("2024-05-0{}T00:00:00+09:00", 4 + i);
                record(&format!("sm{i}"), &start, 20_000, 0, 0)
            })
            .collect()
    }

    fn setup(
        records: &[VideoRecord],
        announcer: Arc<RecordingAnnouncer>,
    ) -> (AnnouncementEngine, Arc<MemoryVideoRepository>, FixedClock) {
        let clock = FixedClock::at(2024, 5, 10, 12, 0, 0);
        let store = Arc::new(MemoryVideoRepository::new(Arc::new(clock.clone())));
        store.upsert_batch(records).unwrap();
        let engine = AnnouncementEngine::new(store.clone(), announcer, Arc::new(clock.clone()))
            .with_interval(Duration::ZERO);
        (engine, store, clock)
    }

    #[test]
    fn test_threshold_gating() {
        let policy = SelectionPolicy::default();
        let t = "2024-05-09T00:00:00+09:00";

        assert!(!policy.is_eligible(&record("sm1", t, 9_999, 499, 99)));
        assert!(policy.is_eligible(&record("sm2", t, 10_000, 0, 0)));
        assert!(policy.is_eligible(&record("sm3", t, 0, 500, 0)));
        assert!(policy.is_eligible(&record("sm4", t, 0, 0, 100)));

        let mut announced = record("sm5", t, 50_000, 0, 0);
        announced.announced_at = Some(parse_timestamp(t).unwrap());
        assert!(!policy.is_eligible(&announced));
    }

    #[test]
    fn test_select_keeps_order() {
        let policy = SelectionPolicy::default();
        let candidates = vec![
            record("sm1", "2024-05-08T00:00:00+09:00", 20_000, 0, 0),
            record("sm2", "2024-05-08T01:00:00+09:00", 1, 0, 0),
            record("sm3", "2024-05-08T02:00:00+09:00", 0, 0, 150),
        ];
        let ids: Vec<&str> = policy
            .select(&candidates)
            .iter()
            .map(|r| r.content_id.as_str())
            .collect();
        assert_eq!(ids, vec!["sm1", "sm3"]);
    }

    #[tokio::test]
    async fn test_cap_announces_oldest_three() {
        let records = popular_records(5);
        let announcer = Arc::new(RecordingAnnouncer::default());
        let (engine, store, _clock) = setup(&records, announcer.clone());

        let stats = engine.run().await.unwrap();

        assert_eq!(stats.eligible, 5);
        assert_eq!(stats.announced, vec!["sm1", "sm2", "sm3"]);
        assert_eq!(announcer.messages.lock().unwrap().len(), 3);

        for id in ["sm1", "sm2", "sm3"] {
            assert!(store.find_by_content_id(id).unwrap().unwrap().is_announced());
        }
        for id in ["sm4", "sm5"] {
            assert!(!store.find_by_content_id(id).unwrap().unwrap().is_announced());
        }
    }

    #[tokio::test]
    async fn test_second_run_continues_with_remaining() {
        let records = popular_records(5);
        let announcer = Arc::new(RecordingAnnouncer::default());
        let (engine, _store, _clock) = setup(&records, announcer.clone());

        engine.run().await.unwrap();
        let second = engine.run().await.unwrap();
        let third = engine.run().await.unwrap();

        assert_eq!(second.announced, vec!["sm4", "sm5"]);
        assert!(third.announced.is_empty());
        assert_eq!(announcer.messages.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_window_excludes_old_videos() {
        let records = vec![
            record("sm1", "2024-05-03T11:59:59+09:00", 90_000, 0, 0),
            record("sm2", "2024-05-03T12:00:00+09:00", 90_000, 0, 0),
        ];
        let announcer = Arc::new(RecordingAnnouncer::default());
        let (engine, store, _clock) = setup(&records, announcer);

        let stats = engine.run().await.unwrap();

        assert_eq!(stats.candidates, 1);
        assert_eq!(stats.announced, vec!["sm2"]);
        assert!(!store.find_by_content_id("sm1").unwrap().unwrap().is_announced());
    }

    #[tokio::test]
    async fn test_post_failure_aborts_remaining() {
        let records = popular_records(3);
        let announcer = Arc::new(RecordingAnnouncer {
            fail_on: Some(1),
            ..Default::default()
        });
        let (engine, store, _clock) = setup(&records, announcer.clone());

        let err = engine.run().await.unwrap_err();

        assert!(matches!(err, Error::Announce(AnnounceError::Rejected { .. })));
        assert!(store.find_by_content_id("sm1").unwrap().unwrap().is_announced());
        assert!(!store.find_by_content_id("sm2").unwrap().unwrap().is_announced());
        assert!(!store.find_by_content_id("sm3").unwrap().unwrap().is_announced());
        assert_eq!(announcer.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_announced_at_comes_from_clock() {
        let records = vec![record("sm1", "2024-05-09T00:00:00+09:00", 20_000, 0, 0)];
        let announcer = Arc::new(RecordingAnnouncer::default());
        let (engine, store, clock) = setup(&records, announcer);

        engine.run().await.unwrap();

        let stored = store.find_by_content_id("sm1").unwrap().unwrap();
        assert_eq!(stored.announced_at, Some(clock.now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_only_between_announcements() {
        let records = popular_records(5);
        let announcer = Arc::new(RecordingAnnouncer::default());
        let (engine, _store, _clock) = setup(&records, announcer);
        let engine = engine.with_interval(ANNOUNCE_INTERVAL);

        let started = tokio::time::Instant::now();
        engine.run().await.unwrap();
        let elapsed = started.elapsed();

        // three posts, two pauses, no pause after the last one
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_nothing_eligible() {
        let records = vec![record("sm1", "2024-05-09T00:00:00+09:00", 9_999, 499, 99)];
        let announcer = Arc::new(RecordingAnnouncer::default());
        let (engine, _store, _clock) = setup(&records, announcer.clone());

        let stats = engine.run().await.unwrap();

        assert_eq!(stats.candidates, 1);
        assert_eq!(stats.eligible, 0);
        assert!(announcer.messages.lock().unwrap().is_empty());
    }
}
