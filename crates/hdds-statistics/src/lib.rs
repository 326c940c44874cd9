// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HDDS Statistics Backend
//!
//! In-process statistics backend for an HDDS deployment: ingests the
//! telemetry event stream emitted by running DDS endpoints, resolves
//! each event against a live topological inventory of the fleet (hosts,
//! users, processes, participants, topics, endpoints, locators), and
//! aggregates the measurements onto the matching node of that inventory
//! so monitors can query time series by entity.
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                      Listener (external)                     |
//! +--------------------------------------------------------------+
//!                |  SampleQueue::push (backpressure)
//!                v
//! +--------------------------------------------------------------+
//! |  SampleQueue        bounded FIFO of (src_ts, DdsEvent)       |
//! +--------------------------------------------------------------+
//!                |  resolver thread pops
//!                v
//! +--------------------------------------------------------------+
//! |  SampleResolver     dispatch by kind, resolve GUIDs/locators |
//! +--------------------------------------------------------------+
//!                |  insert_sample / topology upsert
//!                v
//! +--------------------------------------------------------------+
//! |  Database           cross-indexed entity graph + time series |
//! |                     dump/load snapshot persistence           |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`StatisticsBackend`] | Facade owning database, queue and resolver thread |
//! | [`Database`] | Entity graph with per-entity sample buckets |
//! | [`DdsEvent`] | Telemetry event sum queued by the listener |
//! | [`SampleQueue`] | Bounded blocking FIFO with graceful drain |
//! | [`SampleResolver`] | Event-to-sample resolution and commit |
//! | [`DatabaseDump`] | Serializable snapshot, byte-stable round trip |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hdds_statistics::{QueueConfig, StatisticsBackend};
//!
//! fn main() -> hdds_statistics::Result<()> {
//!     let mut backend = StatisticsBackend::start(&QueueConfig::default())?;
//!
//!     // The DDS listener pushes events as they arrive:
//!     // backend.push(src_ts, event)?;
//!
//!     // A monitor thread queries the graph concurrently:
//!     let database = backend.database();
//!     let snapshot = database.dump_database();
//!     println!("{}", snapshot.to_json()?);
//!
//!     backend.stop();
//!     Ok(())
//! }
//! ```

/// Backend facade owning the ingestion pipeline.
pub mod backend;
/// Queue sizing and backpressure configuration.
pub mod config;
/// Entity graph, sample buckets and snapshot persistence.
pub mod database;
/// Error types.
pub mod error;
/// Event protocol, queue and resolver.
pub mod ingest;
/// Identifier types.
pub mod types;

pub use backend::StatisticsBackend;
pub use config::QueueConfig;
pub use database::data::Sample;
pub use database::dump::DatabaseDump;
pub use database::entities::{Entity, EntityPayload};
pub use database::Database;
pub use error::{Error, Result};
pub use ingest::{DdsEvent, SampleQueue, SampleResolver};
pub use types::{EntityId, EntityKind, Qos, Timestamp};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
