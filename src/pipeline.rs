//! One pipeline run: ingest everything, then announce
//!
//! Ingestion must finish before selection starts, so the announce pass
//! always sees the freshest counters. Any error ends the run; what was
//! committed before it stays committed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::announce::{create_announcer, Announcer};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::ingest::{IngestStats, IngestionCoordinator};
use crate::search::{NicoSearchClient, VideoSearch};
use crate::selection::{AnnounceStats, AnnouncementEngine};
use crate::storage::{create_sqlite_repository, SharedVideoRepository};

/// Summary of a completed run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub ingest: IngestStats,
    pub announce: AnnounceStats,
    pub elapsed_ms: u64,
}

/// Assembled components of the ingest-and-announce job
pub struct Pipeline {
    ingestion: IngestionCoordinator,
    engine: AnnouncementEngine,
    store: SharedVideoRepository,
}

impl Pipeline {
    pub fn new(
        search: Arc<dyn VideoSearch>,
        store: SharedVideoRepository,
        announcer: Arc<dyn Announcer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ingestion = IngestionCoordinator::new(search, store.clone(), clock.clone());
        let engine = AnnouncementEngine::new(store.clone(), announcer, clock);

        Self {
            ingestion,
            engine,
            store,
        }
    }

    /// Wire the production components described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store = create_sqlite_repository(&config.database.sqlite_path, clock.clone())?;
        let search = Arc::new(NicoSearchClient::new(config.search.clone(), clock.clone())?);
        let announcer = create_announcer(&config.announcer)?;

        tracing::info!(
            database = %config.database.sqlite_path.display(),
            announcer = announcer.name(),
            "Pipeline assembled"
        );

        Ok(Self::new(search, store, announcer, clock))
    }

    /// Override the pause between announcements
    pub fn with_announce_interval(mut self, interval: Duration) -> Self {
        self.engine = self.engine.with_interval(interval);
        self
    }

    pub fn store(&self) -> &SharedVideoRepository {
        &self.store
    }

    /// Execute one run
    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        tracing::info!("Run started");

        let ingest = self.ingestion.run().await?;
        let announce = self.engine.run().await?;

        let report = RunReport {
            ingest,
            announce,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            fetched = report.ingest.fetched,
            announced = report.announce.announced.len(),
            elapsed_ms = report.elapsed_ms,
            "Run finished"
        );

        Ok(report)
    }
}
