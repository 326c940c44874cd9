// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Backend configuration - single source of truth for queue sizing.
//!
//! All tunables live here; nothing is hardcoded at the call sites.

use std::time::Duration;

/// Default capacity of the sample queue (events in flight).
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Default time a producer blocks on a full queue before the event is
/// dropped and counted.
pub const DEFAULT_PUSH_TIMEOUT_MS: u64 = 100;

/// Default bound of a consumer wait; the shutdown latch is re-checked at
/// this cadence, so it also bounds shutdown wake latency.
pub const DEFAULT_POP_WAIT_MS: u64 = 100;

/// Sizing and backpressure configuration of the [`SampleQueue`].
///
/// [`SampleQueue`]: crate::ingest::SampleQueue
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of queued events.
    pub capacity: usize,
    /// How long `push` blocks on a full queue before dropping.
    pub push_timeout: Duration,
    /// Upper bound of a single blocking `pop` wait.
    pub pop_wait: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            push_timeout: Duration::from_millis(DEFAULT_PUSH_TIMEOUT_MS),
            pop_wait: Duration::from_millis(DEFAULT_POP_WAIT_MS),
        }
    }
}

impl QueueConfig {
    /// Config with a custom capacity and default timeouts.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}
