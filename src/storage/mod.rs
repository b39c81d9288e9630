//! Durable storage of video records
//!
//! The pipeline only talks to [`VideoRepository`]; SQLite is the production
//! backend and the in-memory store backs tests and dry runs.

pub mod repository;

pub use repository::{
    create_memory_repository, create_sqlite_repository, MemoryVideoRepository,
    SharedVideoRepository, SqliteVideoRepository, StoreResult, UpsertSummary, VideoRepository,
};
