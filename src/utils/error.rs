//! Error types for the nicoherald pipeline
//!
//! One enum per collaborator: the search client, the record store and the
//! announcer port.

use thiserror::Error;

/// Errors raised while querying the content search API
#[derive(Error, Debug)]
pub enum SearchError {
    /// Network failure before a response arrived
    #[error("Search request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Request timeout
    #[error("Search request timed out")]
    Timeout,

    /// The service answered but reported a failure
    #[error("Search service returned status {status}{}", describe_upstream(.code, .message))]
    Upstream {
        status: u16,
        code: Option<String>,
        message: Option<String>,
    },

    /// Response body was not the expected JSON document
    #[error("Malformed search response: {0}")]
    Parse(String),

    /// Request URL could not be built
    #[error("Invalid search URL: {0}")]
    InvalidUrl(String),
}

fn describe_upstream(code: &Option<String>, message: &Option<String>) -> String {
    match (code, message) {
        (Some(code), Some(message)) => format!(" ({code}: {message})"),
        (Some(code), None) => format!(" ({code})"),
        (None, Some(message)) => format!(" ({message})"),
        (None, None) => String::new(),
    }
}

impl SearchError {
    /// Classify a reqwest failure
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Transport(err)
        }
    }

    /// Upstream failure with only a status code
    pub fn upstream(status: u16) -> Self {
        Self::Upstream {
            status,
            code: None,
            message: None,
        }
    }
}

/// Errors raised by the record store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The record already carries an announcement timestamp
    #[error("Video {0} was already announced")]
    AlreadyAnnounced(String),

    /// No record exists for the identity
    #[error("Video {0} not found")]
    NotFound(String),

    /// A persisted timestamp could not be read back
    #[error("Invalid timestamp in column {column}: {value}")]
    InvalidTimestamp { column: &'static str, value: String },

    /// Failed to prepare the storage location
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by an announcer
#[derive(Error, Debug)]
pub enum AnnounceError {
    /// Network failure while posting
    #[error("Post request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The posting service refused the message
    #[error("Post rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Message is not acceptable before sending
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Announcer is misconfigured
    #[error("Invalid announcer configuration: {0}")]
    InvalidConfig(String),
}
