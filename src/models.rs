// Core data structures for the nicoherald pipeline

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One search hit as returned by the content search API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub content_id: String, // e.g. "sm12345678"
    pub title: String,
    pub view_count: u64,
    pub comment_count: u64,
    pub mylist_count: u64,
    pub start_time: DateTime<FixedOffset>, // publication time, UTC+9
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// Offset this page was requested at
    pub offset: usize,

    /// Total hit count reported by the service
    pub total_count: usize,

    /// Hits on this page
    pub items: Vec<SearchItem>,
}

impl SearchPage {
    /// Offset of the following page
    pub fn next_offset(&self) -> usize {
        self.offset + self.items.len()
    }

    /// Whether the service has reported everything once this page is consumed
    pub fn is_last(&self) -> bool {
        self.items.is_empty() || self.next_offset() >= self.total_count
    }
}

/// Persisted state of one video, keyed by `content_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub content_id: String,
    pub title: String,
    pub view_count: u64,
    pub comment_count: u64,
    pub mylist_count: u64,
    pub start_time: DateTime<FixedOffset>,
    pub announced_at: Option<DateTime<FixedOffset>>,
    pub last_updated_at: DateTime<FixedOffset>,
}

impl VideoRecord {
    /// Build a record from a first sighting
    pub fn from_item(item: SearchItem, now: DateTime<FixedOffset>) -> Self {
        Self {
            content_id: item.content_id,
            title: item.title,
            view_count: item.view_count,
            comment_count: item.comment_count,
            mylist_count: item.mylist_count,
            start_time: item.start_time,
            announced_at: None,
            last_updated_at: now,
        }
    }

    /// Build the refreshed version of `self` from a later sighting.
    ///
    /// Identity, publication time and announce state are kept; metrics and
    /// title come from `item`.
    pub fn refreshed(&self, item: SearchItem, now: DateTime<FixedOffset>) -> Self {
        Self {
            content_id: self.content_id.clone(),
            title: item.title,
            view_count: item.view_count,
            comment_count: item.comment_count,
            mylist_count: item.mylist_count,
            start_time: self.start_time,
            announced_at: self.announced_at,
            last_updated_at: now.max(self.last_updated_at),
        }
    }

    pub fn is_announced(&self) -> bool {
        self.announced_at.is_some()
    }

    /// Canonical short link
    pub fn short_url(&self) -> String {
        format!("https://nico.ms/{}", self.content_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::parse_timestamp;

    fn item(id: &str, views: u64) -> SearchItem {
        SearchItem {
            content_id: id.to_string(),
            title: format!("title {id}"),
            view_count: views,
            comment_count: 1,
            mylist_count: 2,
            start_time: parse_timestamp("2024-05-01T10:00:00+09:00").unwrap(),
        }
    }

    #[test]
    fn test_page_offsets() {
        let page = SearchPage {
            offset: 100,
            total_count: 250,
            items: vec![item("sm1", 1); 100],
        };
        assert_eq!(page.next_offset(), 200);
        assert!(!page.is_last());

        let tail = SearchPage {
            offset: 200,
            total_count: 250,
            items: vec![item("sm1", 1); 50],
        };
        assert!(tail.is_last());
    }

    #[test]
    fn test_empty_page_is_last() {
        let page = SearchPage {
            offset: 0,
            total_count: 10,
            items: Vec::new(),
        };
        assert!(page.is_last());
    }

    #[test]
    fn test_refresh_keeps_announce_state() {
        let t0 = parse_timestamp("2024-05-02T00:00:00+09:00").unwrap();
        let t1 = parse_timestamp("2024-05-03T00:00:00+09:00").unwrap();

        let mut record = VideoRecord::from_item(item("sm9", 10), t0);
        record.announced_at = Some(t0);

        let mut newer = item("sm9", 20_000);
        newer.start_time = t1;
        let refreshed = record.refreshed(newer, t1);

        assert_eq!(refreshed.view_count, 20_000);
        assert_eq!(refreshed.announced_at, Some(t0));
        assert_eq!(refreshed.start_time, record.start_time);
        assert_eq!(refreshed.last_updated_at, t1);
    }

    #[test]
    fn test_refresh_never_moves_last_updated_backwards() {
        let later = parse_timestamp("2024-05-05T00:00:00+09:00").unwrap();
        let earlier = parse_timestamp("2024-05-04T00:00:00+09:00").unwrap();

        let record = VideoRecord::from_item(item("sm9", 10), later);
        let refreshed = record.refreshed(item("sm9", 11), earlier);
        assert_eq!(refreshed.last_updated_at, later);
    }

    #[test]
    fn test_short_url() {
        let record = VideoRecord::from_item(
            item("sm42", 1),
            parse_timestamp("2024-05-02T00:00:00+09:00").unwrap(),
        );
        assert_eq!(record.short_url(), "https://nico.ms/sm42");
    }
}
