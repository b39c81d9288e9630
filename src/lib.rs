//! nicoherald - ingest, dedupe and announce trending niconico videos
//!
//! Each run pages through the content search API for a fixed query, upserts
//! every hit into a local SQLite store keyed by content id, then announces a
//! capped number of high-engagement videos from the last seven days that
//! were never announced before.
//!
//! # Architecture
//!
//! - [`search`] - Search client and page iteration
//! - [`storage`] - Record store (SQLite and in-memory)
//! - [`ingest`] - Pages into the record store
//! - [`selection`] - Candidate filtering and the capped announce loop
//! - [`announce`] - Announcer port, message formatting, live and dry-run posting
//! - [`pipeline`] - One complete run
//! - [`server`] - HTTP trigger for an external scheduler
//! - [`config`] - Configuration management and settings
//! - [`clock`] - Time source and timestamp format
//!
//! # Example
//!
//! ```no_run
//! use nicoherald::config::Config;
//! use nicoherald::pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let pipeline = Pipeline::from_config(&config)?;
//!     let report = pipeline.run().await?;
//!     println!("announced {:?}", report.announce.announced);
//!     Ok(())
//! }
//! ```

pub mod announce;
pub mod clock;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod selection;
pub mod server;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::announce::{Announcer, DryRunAnnouncer, StatusPostAnnouncer};
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, HeraldErrorTrait, Result};
    pub use crate::models::{SearchItem, SearchPage, VideoRecord};
    pub use crate::pipeline::{Pipeline, RunReport};
    pub use crate::storage::{SqliteVideoRepository, VideoRepository};
}

pub use models::{SearchItem, SearchPage, VideoRecord};
