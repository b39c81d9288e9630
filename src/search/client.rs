//! HTTP client for the niconico content search API
//!
//! Builds the fixed tag/category query, performs the request and maps the
//! JSON envelope into [`SearchPage`]s. Failure modes are kept apart:
//! - network and timeout failures
//! - non-success HTTP status or `meta.status`
//! - bodies that are not the expected JSON document

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::VideoSearch;
use crate::clock::{format_timestamp, parse_timestamp, Clock};
use crate::config::SearchConfig;
use crate::models::{SearchItem, SearchPage};
use crate::utils::error::SearchError;

/// Hits requested per page
pub const PAGE_SIZE: usize = 100;

/// Only videos published within this many days are requested
pub const SEARCH_WINDOW_DAYS: i64 = 7;

const FIELDS: &str = "contentId,title,viewCounter,mylistCounter,commentCounter,startTime";
const SORT: &str = "-viewCounter";

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse {
    meta: ApiMeta,
    #[serde(default)]
    data: Vec<ApiItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMeta {
    status: u16,
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiItem {
    #[serde(alias = "contentID")]
    content_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    view_counter: u64,
    #[serde(default)]
    comment_counter: u64,
    #[serde(default)]
    mylist_counter: u64,
    start_time: String,
}

impl ApiItem {
    fn into_item(self) -> Result<SearchItem, SearchError> {
        let start_time = parse_timestamp(&self.start_time).ok_or_else(|| {
            SearchError::Parse(format!(
                "invalid startTime {:?} for {}",
                self.start_time, self.content_id
            ))
        })?;

        Ok(SearchItem {
            content_id: self.content_id,
            title: self.title,
            view_count: self.view_counter,
            comment_count: self.comment_counter,
            mylist_count: self.mylist_counter,
            start_time,
        })
    }
}

// ============================================================================
// Client
// ============================================================================

/// Content search client
pub struct NicoSearchClient {
    client: Client,
    config: SearchConfig,
    clock: Arc<dyn Clock>,
}

impl NicoSearchClient {
    /// Create a client with its own HTTP connection pool
    ///
    /// # Errors
    ///
    /// Returns `SearchError::InvalidUrl` if the base URL does not parse and
    /// `SearchError::Transport` if the HTTP client cannot be created
    pub fn new(config: SearchConfig, clock: Arc<dyn Clock>) -> Result<Self, SearchError> {
        Url::parse(&config.base_url).map_err(|e| SearchError::InvalidUrl(e.to_string()))?;

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        let client = builder.build().map_err(SearchError::Transport)?;

        Ok(Self {
            client,
            config,
            clock,
        })
    }

    /// Build the request URL for `offset`
    pub fn build_url(&self, offset: usize) -> Result<Url, SearchError> {
        let since = format_timestamp(&self.clock.days_ago(SEARCH_WINDOW_DAYS));
        let limit = PAGE_SIZE.to_string();
        let offset = offset.to_string();

        Url::parse_with_params(
            &self.config.base_url,
            &[
                ("q", self.config.query.as_str()),
                ("targets", self.config.targets.as_str()),
                ("filters[categoryTags][0]", self.config.category.as_str()),
                ("filters[startTime][gte]", since.as_str()),
                ("fields", FIELDS),
                ("_limit", limit.as_str()),
                ("_offset", offset.as_str()),
                ("_sort", SORT),
                ("_context", self.config.app_name.as_str()),
            ],
        )
        .map_err(|e| SearchError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl VideoSearch for NicoSearchClient {
    async fn fetch_page(&self, offset: usize) -> Result<SearchPage, SearchError> {
        let url = self.build_url(offset)?;
        tracing::info!(url = %url, "Requesting search page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(SearchError::from_reqwest)?;

        let status = response.status();
        tracing::info!(status = %status, offset, "Search response received");

        let body = response.text().await.map_err(SearchError::from_reqwest)?;

        if !status.is_success() {
            return Err(upstream_error(status.as_u16(), &body));
        }

        parse_page(offset, &body)
    }
}

/// Decode a response body into a page
pub(crate) fn parse_page(offset: usize, body: &str) -> Result<SearchPage, SearchError> {
    let response: ApiResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Parse(e.to_string()))?;

    let meta = response.meta;
    tracing::info!(
        status = meta.status,
        id = meta.id.as_deref().unwrap_or(""),
        total_count = meta.total_count,
        count = response.data.len(),
        "Search meta"
    );

    if meta.status != 200 {
        return Err(SearchError::Upstream {
            status: meta.status,
            code: meta.error_code,
            message: meta.error_message,
        });
    }

    let items = response
        .data
        .into_iter()
        .map(ApiItem::into_item)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SearchPage {
        offset,
        total_count: meta.total_count,
        items,
    })
}

/// Best-effort extraction of the error envelope from a failed response
fn upstream_error(status: u16, body: &str) -> SearchError {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        meta: ApiMeta,
    }

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => SearchError::Upstream {
            status,
            code: envelope.meta.error_code,
            message: envelope.meta.error_message,
        },
        Err(_) => SearchError::upstream(status),
    }
}
