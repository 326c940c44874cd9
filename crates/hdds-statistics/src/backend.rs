// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Top-level facade: database + queue + resolver thread, wired together.

use crate::config::QueueConfig;
use crate::database::Database;
use crate::error::Result;
use crate::ingest::{DdsEvent, SampleQueue, SampleResolver};
use crate::types::Timestamp;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Owns the statistics database and its ingestion pipeline.
///
/// `start` spawns the resolver on a named thread; `stop` (or drop)
/// signals shutdown, lets the resolver drain the queue and joins it.
/// The database handle stays valid after stop, so a monitor can keep
/// querying or dump the final state.
pub struct StatisticsBackend {
    database: Arc<Database>,
    queue: Arc<SampleQueue>,
    resolver: Option<JoinHandle<()>>,
}

impl StatisticsBackend {
    /// Start a backend with an empty database.
    ///
    /// # Errors
    /// `Io` if the resolver thread cannot be spawned.
    pub fn start(config: &QueueConfig) -> Result<Self> {
        let database = Arc::new(Database::new());
        let queue = Arc::new(SampleQueue::new(config));
        let resolver = SampleResolver::new(database.clone(), queue.clone());

        let handle = std::thread::Builder::new()
            .name("stats-resolver".to_string())
            .spawn(move || resolver.run())?;
        log::debug!("[StatisticsBackend::start] resolver thread running");

        Ok(Self {
            database,
            queue,
            resolver: Some(handle),
        })
    }

    /// Enqueue a listener event. See [`SampleQueue::push`].
    pub fn push(&self, src_ts: Timestamp, event: DdsEvent) -> Result<bool> {
        self.queue.push(src_ts, event)
    }

    /// Shared handle to the database, for query threads.
    pub fn database(&self) -> Arc<Database> {
        self.database.clone()
    }

    /// Shared handle to the queue, for the listener thread.
    pub fn queue(&self) -> Arc<SampleQueue> {
        self.queue.clone()
    }

    /// Events dropped under backpressure so far.
    pub fn dropped_events(&self) -> u64 {
        self.queue.dropped_events()
    }

    /// Signal shutdown, drain the queue and join the resolver thread.
    pub fn stop(&mut self) {
        self.queue.shutdown();
        if let Some(handle) = self.resolver.take() {
            if handle.join().is_err() {
                log::warn!("[StatisticsBackend::stop] resolver thread panicked");
            }
        }
    }
}

impl Drop for StatisticsBackend {
    fn drop(&mut self) {
        self.stop();
    }
}
