//! Content search: paginated discovery of videos
//!
//! [`VideoSearch`] is the seam between the ingestion coordinator and the
//! HTTP client, and [`SearchPages`] walks it page by page.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nicoherald::clock::SystemClock;
//! use nicoherald::config::SearchConfig;
//! use nicoherald::search::{NicoSearchClient, SearchPages};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = NicoSearchClient::new(SearchConfig::default(), Arc::new(SystemClock))?;
//! let mut pages = SearchPages::new(&client);
//! while let Some(page) = pages.next_page().await? {
//!     println!("{} hits at offset {}", page.items.len(), page.offset);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;

use async_trait::async_trait;

use crate::models::SearchPage;
use crate::utils::error::SearchError;

pub use client::{NicoSearchClient, PAGE_SIZE, SEARCH_WINDOW_DAYS};

/// Source of search result pages
#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Fetch the page starting at the zero-based `offset`
    async fn fetch_page(&self, offset: usize) -> Result<SearchPage, SearchError>;
}

/// Finite, non-restartable sequence of result pages.
///
/// Yields pages until the cumulative item count reaches the reported total
/// or an empty page comes back. Each offset is requested at most once, and
/// after an error the sequence is exhausted.
pub struct SearchPages<'a> {
    search: &'a dyn VideoSearch,
    next_offset: usize,
    finished: bool,
    pages_fetched: usize,
}

impl<'a> SearchPages<'a> {
    /// Start a new walk at offset 0
    pub fn new(search: &'a dyn VideoSearch) -> Self {
        Self {
            search,
            next_offset: 0,
            finished: false,
            pages_fetched: 0,
        }
    }

    /// Fetch the next page, or `None` once the result set is exhausted
    pub async fn next_page(&mut self) -> Result<Option<SearchPage>, SearchError> {
        if self.finished {
            return Ok(None);
        }

        let page = match self.search.fetch_page(self.next_offset).await {
            Ok(page) => page,
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };

        self.pages_fetched += 1;
        self.next_offset = page.next_offset();
        self.finished = page.is_last();

        tracing::debug!(
            offset = page.offset,
            items = page.items.len(),
            total_count = page.total_count,
            "Fetched search page"
        );

        Ok(Some(page))
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Whether no further request will be made
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
