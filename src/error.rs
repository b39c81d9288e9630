//! Unified error handling for the nicoherald crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`HeraldErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use nicoherald::error::{Error, HeraldErrorTrait};
//!
//! fn report(err: &Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(category = ?err.category(), "run failed, next run will resume: {err}");
//!     } else {
//!         tracing::error!("run failed: {err}");
//!     }
//! }
//! ```

use thiserror::Error;

pub use crate::utils::error::{AnnounceError, SearchError, StoreError};

/// Common trait for all nicoherald error types
pub trait HeraldErrorTrait: std::error::Error {
    /// Check if this error is likely to go away on the next scheduled run
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout)
    Network,
    /// The remote service answered with a failure
    Upstream,
    /// Parsing and data extraction errors
    Parsing,
    /// Storage and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Upstream => "upstream",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl HeraldErrorTrait for SearchError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::Parse(_) | Self::InvalidUrl(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) | Self::Timeout => ErrorCategory::Network,
            Self::Upstream { .. } => ErrorCategory::Upstream,
            Self::Parse(_) => ErrorCategory::Parsing,
            Self::InvalidUrl(_) => ErrorCategory::Config,
        }
    }
}

impl HeraldErrorTrait for StoreError {
    fn is_recoverable(&self) -> bool {
        match self {
            // SQLITE_BUSY and friends clear up once the other writer is done
            Self::Database(e) => matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            Self::AlreadyAnnounced(_) => true,
            Self::NotFound(_) | Self::InvalidTimestamp { .. } | Self::Io(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidTimestamp { .. } => ErrorCategory::Parsing,
            _ => ErrorCategory::Storage,
        }
    }
}

impl HeraldErrorTrait for AnnounceError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidMessage(_) | Self::InvalidConfig(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) => ErrorCategory::Network,
            Self::Rejected { .. } => ErrorCategory::Upstream,
            Self::InvalidMessage(_) => ErrorCategory::Other,
            Self::InvalidConfig(_) => ErrorCategory::Config,
        }
    }
}

/// Unified error type for the nicoherald crate
#[derive(Error, Debug)]
pub enum Error {
    /// Content search failures
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Record store failures
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Announcer failures
    #[error("Announce error: {0}")]
    Announce(#[from] AnnounceError),
}

impl HeraldErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Search(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            Self::Announce(e) => e.is_recoverable(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Search(e) => e.category(),
            Self::Store(e) => e.category(),
            Self::Announce(e) => e.category(),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let search_err = Error::Search(SearchError::Timeout);
        assert_eq!(search_err.category(), ErrorCategory::Network);

        let parse_err = Error::Search(SearchError::Parse("eof".to_string()));
        assert_eq!(parse_err.category(), ErrorCategory::Parsing);

        let store_err = Error::Store(StoreError::NotFound("sm1".to_string()));
        assert_eq!(store_err.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::Search(SearchError::Timeout).is_recoverable());
        assert!(Error::Search(SearchError::upstream(503)).is_recoverable());
        assert!(!Error::Search(SearchError::upstream(400)).is_recoverable());

        let rejected = AnnounceError::Rejected {
            status: 403,
            body: "duplicate".to_string(),
        };
        assert!(!Error::Announce(rejected).is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let unified: Error = StoreError::AlreadyAnnounced("sm1".to_string()).into();
        assert!(matches!(unified, Error::Store(StoreError::AlreadyAnnounced(_))));

        let unified: Error = SearchError::Timeout.into();
        assert!(matches!(unified, Error::Search(SearchError::Timeout)));
    }

    #[test]
    fn test_category_labels() {
        let err = Error::Announce(AnnounceError::InvalidConfig("missing access token".into()));
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_recoverable());
        assert_eq!(ErrorCategory::Other.as_str(), "other");
    }
}
