//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use nicoherald::clock::FixedClock;
use nicoherald::config::{AnnouncerConfig, AnnouncerMode, Config, SearchConfig};
use serde_json::{json, Value};

/// Path the mock search service is mounted under
pub const SEARCH_PATH: &str = "/api/v2/video/contents/search";

/// Path the mock status endpoint is mounted under
pub const STATUS_PATH: &str = "/2/tweets";

/// Clock pinned to 2024-05-10 12:00:00 +09:00
pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::at(2024, 5, 10, 12, 0, 0))
}

/// Search configuration pointing at a mock server
pub fn search_config(server_uri: &str) -> SearchConfig {
    SearchConfig {
        base_url: format!("{server_uri}{SEARCH_PATH}"),
        app_name: "nicoherald-test".to_string(),
        user_agent: Some("nicoherald-test/1.0".to_string()),
        request_timeout_secs: 5,
        ..Config::default().search
    }
}

/// Live announcer configuration pointing at a mock server
pub fn status_config(server_uri: &str) -> AnnouncerConfig {
    AnnouncerConfig {
        mode: AnnouncerMode::Live,
        status_url: format!("{server_uri}{STATUS_PATH}"),
        access_token: Some("test-token".to_string()),
        request_timeout_secs: 5,
    }
}

/// One search hit as the service encodes it
pub fn hit(id: &str, views: u64, comments: u64, mylists: u64, start: &str) -> Value {
    json!({
        "contentId": id,
        "title": format!("RTA {id}"),
        "viewCounter": views,
        "commentCounter": comments,
        "mylistCounter": mylists,
        "startTime": start,
    })
}

/// A successful search response
pub fn search_body(total: usize, hits: Vec<Value>) -> Value {
    json!({
        "meta": {"status": 200, "totalCount": total, "id": "test-request"},
        "data": hits,
    })
}

/// `count` low-engagement hits with ids `sm{first}..`
pub fn filler_hits(first: usize, count: usize) -> Vec<Value> {
    (first..first + count)
        .map(|i| hit(&format!("sm{i}"), 10, 0, 0, "2024-05-08T00:00:00+09:00"))
        .collect()
}

/// Status endpoint response for a created post
pub fn created_post(id: &str) -> Value {
    json!({"data": {"id": id, "text": "ok"}})
}
