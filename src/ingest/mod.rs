//! Ingestion: search results into the record store
//!
//! Walks every search page from offset 0, merges each hit with the stored
//! record of the same identity and commits the page as one batch before
//! requesting the next. A failed page aborts the walk; pages already
//! committed stay committed and are simply refreshed by the next run.

use std::sync::Arc;

use serde::Serialize;

use crate::clock::Clock;
use crate::error::Result;
use crate::models::{SearchPage, VideoRecord};
use crate::search::{SearchPages, VideoSearch};
use crate::storage::SharedVideoRepository;

/// Counters for one ingestion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Pages fetched
    pub pages: usize,
    /// Hits received across all pages
    pub fetched: usize,
    /// Records created
    pub inserted: usize,
    /// Records refreshed
    pub updated: usize,
    /// Total reported by the service on the last page
    pub total_count: usize,
}

/// Drives the search client across all pages and commits each page
pub struct IngestionCoordinator {
    search: Arc<dyn VideoSearch>,
    store: SharedVideoRepository,
    clock: Arc<dyn Clock>,
}

impl IngestionCoordinator {
    pub fn new(
        search: Arc<dyn VideoSearch>,
        store: SharedVideoRepository,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            search,
            store,
            clock,
        }
    }

    /// Ingest every page of the current result set
    pub async fn run(&self) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        let mut pages = SearchPages::new(self.search.as_ref());

        while let Some(page) = pages.next_page().await? {
            stats.pages += 1;
            stats.total_count = page.total_count;
            stats.fetched += page.items.len();

            if page.items.is_empty() {
                continue;
            }

            let offset = page.offset;
            let records = self.merge_page(page)?;
            let summary = self.store.upsert_batch(&records)?;

            stats.inserted += summary.inserted;
            stats.updated += summary.updated;

            tracing::info!(
                offset,
                inserted = summary.inserted,
                updated = summary.updated,
                "Committed search page"
            );
        }

        tracing::info!(
            pages = stats.pages,
            fetched = stats.fetched,
            inserted = stats.inserted,
            updated = stats.updated,
            total_count = stats.total_count,
            "Ingestion finished"
        );

        Ok(stats)
    }

    /// Build the records to write for one page, carrying over stored state
    fn merge_page(&self, page: SearchPage) -> Result<Vec<VideoRecord>> {
        let now = self.clock.now();
        let mut records = Vec::with_capacity(page.items.len());

        for item in page.items {
            tracing::debug!(
                content_id = %item.content_id,
                title = %item.title,
                view_count = item.view_count,
                comment_count = item.comment_count,
                mylist_count = item.mylist_count,
                start_time = %item.start_time,
                "Search hit"
            );

            let record = match self.store.find_by_content_id(&item.content_id)? {
                Some(existing) => existing.refreshed(item, now),
                None => VideoRecord::from_item(item, now),
            };
            records.push(record);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{parse_timestamp, FixedClock};
    use crate::error::Error;
    use crate::models::SearchItem;
    use crate::storage::{MemoryVideoRepository, VideoRepository};
    use crate::utils::error::SearchError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn hit(i: usize, views: u64) -> SearchItem {
        SearchItem {
            content_id: format!("sm{i}"),
            title: format!("video {i}"),
            view_count: views,
            comment_count: 0,
            mylist_count: 0,
            start_time: parse_timestamp("2024-05-08T00:00:00+09:00").unwrap(),
        }
    }

    /// Pages over a fixed hit list; optionally fails at one offset
    struct ListSearch {
        hits: Vec<SearchItem>,
        page_size: usize,
        fail_at: Option<usize>,
        offsets: Mutex<Vec<usize>>,
    }

    impl ListSearch {
        fn new(hits: Vec<SearchItem>, page_size: usize) -> Self {
            Self {
                hits,
                page_size,
                fail_at: None,
                offsets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VideoSearch for ListSearch {
        async fn fetch_page(&self, offset: usize) -> std::result::Result<SearchPage, SearchError> {
            self.offsets.lock().unwrap().push(offset);
            if self.fail_at == Some(offset) {
                return Err(SearchError::upstream(503));
            }
            let end = (offset + self.page_size).min(self.hits.len());
            Ok(SearchPage {
                offset,
                total_count: self.hits.len(),
                items: self.hits[offset.min(end)..end].to_vec(),
            })
        }
    }

    fn coordinator(
        search: Arc<ListSearch>,
        clock: &FixedClock,
    ) -> (IngestionCoordinator, Arc<MemoryVideoRepository>) {
        let store = Arc::new(MemoryVideoRepository::new(Arc::new(clock.clone())));
        let coordinator = IngestionCoordinator::new(search, store.clone(), Arc::new(clock.clone()));
        (coordinator, store)
    }

    #[tokio::test]
    async fn test_ingests_all_pages() {
        let clock = FixedClock::at(2024, 5, 10, 12, 0, 0);
        let search = Arc::new(ListSearch::new((0..250).map(|i| hit(i, 1)).collect(), 100));
        let (coordinator, store) = coordinator(search.clone(), &clock);

        let stats = coordinator.run().await.unwrap();

        assert_eq!(*search.offsets.lock().unwrap(), vec![0, 100, 200]);
        assert_eq!(stats.pages, 3);
        assert_eq!(stats.fetched, 250);
        assert_eq!(stats.inserted, 250);
        assert_eq!(store.len(), 250);
    }

    #[tokio::test]
    async fn test_zero_results_writes_nothing() {
        let clock = FixedClock::at(2024, 5, 10, 12, 0, 0);
        let search = Arc::new(ListSearch::new(Vec::new(), 100));
        let (coordinator, store) = coordinator(search.clone(), &clock);

        let stats = coordinator.run().await.unwrap();

        assert_eq!(stats.inserted + stats.updated, 0);
        assert!(store.is_empty());
        assert_eq!(*search.offsets.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let clock = FixedClock::at(2024, 5, 10, 12, 0, 0);
        let search = Arc::new(ListSearch::new((0..5).map(|i| hit(i, 7)).collect(), 100));
        let (coordinator, store) = coordinator(search, &clock);

        coordinator.run().await.unwrap();
        let second = coordinator.run().await.unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 5);
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_pages() {
        let clock = FixedClock::at(2024, 5, 10, 12, 0, 0);
        let mut search = ListSearch::new((0..250).map(|i| hit(i, 1)).collect(), 100);
        search.fail_at = Some(100);
        let search = Arc::new(search);
        let (coordinator, store) = coordinator(search.clone(), &clock);

        let err = coordinator.run().await.unwrap_err();

        assert!(matches!(err, Error::Search(SearchError::Upstream { status: 503, .. })));
        // first page stays committed, third page never requested
        assert_eq!(store.len(), 100);
        assert_eq!(*search.offsets.lock().unwrap(), vec![0, 100]);
    }

    #[tokio::test]
    async fn test_reingestion_keeps_announce_state() {
        let clock = FixedClock::at(2024, 5, 10, 12, 0, 0);
        let search = Arc::new(ListSearch::new(vec![hit(1, 10)], 100));
        let (coordinator, store) = coordinator(search, &clock);
        coordinator.run().await.unwrap();

        let announced = clock.now();
        store.mark_announced("sm1", announced).unwrap();

        let refreshed = Arc::new(ListSearch::new(vec![hit(1, 50_000)], 100));
        let coordinator =
            IngestionCoordinator::new(refreshed, store.clone(), Arc::new(clock.clone()));
        clock.advance(chrono::Duration::minutes(10));
        coordinator.run().await.unwrap();

        let stored = store.find_by_content_id("sm1").unwrap().unwrap();
        assert_eq!(stored.view_count, 50_000);
        assert_eq!(stored.announced_at, Some(announced));
        assert_eq!(stored.last_updated_at, clock.now());
    }
}
