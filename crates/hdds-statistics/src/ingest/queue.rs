// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded FIFO decoupling the DDS listener thread from the resolver.
//!
//! The producer blocks on a full queue up to a bounded timeout, after
//! which the event is dropped and counted (lossy under sustained
//! overload, telemetry semantics). The consumer blocks on an empty queue
//! in bounded waits so it observes shutdown promptly; after shutdown it
//! drains every queued item before returning the terminator.

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::ingest::events::DdsEvent;
use crate::types::Timestamp;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// One queued item: source timestamp plus event.
pub type QueueItem = (Timestamp, DdsEvent);

/// Bounded blocking FIFO of `(src_ts, DdsEvent)` pairs.
///
/// Queue order is preserved per producer, so per-entity sample order in
/// the graph equals arrival order. Each item is popped exactly once.
pub struct SampleQueue {
    tx: Sender<QueueItem>,
    rx: Receiver<QueueItem>,
    shutdown: AtomicBool,
    dropped: AtomicU64,
    push_timeout: Duration,
    pop_wait: Duration,
}

impl SampleQueue {
    /// New queue with the given sizing configuration.
    pub fn new(config: &QueueConfig) -> Self {
        let (tx, rx) = bounded(config.capacity);
        Self {
            tx,
            rx,
            shutdown: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            push_timeout: config.push_timeout,
            pop_wait: config.pop_wait,
        }
    }

    /// Enqueue an event.
    ///
    /// Blocks up to the configured backpressure timeout when the queue is
    /// full. A timed-out event is dropped and counted; `Ok(false)` tells
    /// the producer so.
    ///
    /// # Errors
    /// `Shutdown` once the shutdown latch is set; producers fail fast and
    /// nothing is enqueued.
    pub fn push(&self, src_ts: Timestamp, event: DdsEvent) -> Result<bool> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        match self.tx.send_timeout((src_ts, event), self.push_timeout) {
            Ok(()) => Ok(true),
            Err(err) => {
                let kind = match &err {
                    crossbeam::channel::SendTimeoutError::Timeout((_, ev)) => ev.kind_name(),
                    crossbeam::channel::SendTimeoutError::Disconnected((_, ev)) => ev.kind_name(),
                };
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "[SampleQueue::push] queue full, dropping {} event ({} dropped so far)",
                    kind,
                    self.dropped.load(Ordering::Relaxed)
                );
                Ok(false)
            }
        }
    }

    /// Dequeue the next item.
    ///
    /// Blocks while the queue is empty and the queue is live. After
    /// shutdown, remaining items are still returned; `None` is the
    /// terminator once the queue is both shut down and empty.
    pub fn pop(&self) -> Option<QueueItem> {
        loop {
            match self.rx.try_recv() {
                Ok(item) => return Some(item),
                Err(crossbeam::channel::TryRecvError::Empty) => {
                    if self.shutdown.load(Ordering::Acquire) {
                        return None;
                    }
                }
                Err(crossbeam::channel::TryRecvError::Disconnected) => return None,
            }
            match self.rx.recv_timeout(self.pop_wait) {
                Ok(item) => return Some(item),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Enqueue without blocking; used by producers that must never stall.
    ///
    /// # Errors
    /// `Shutdown` after the latch is set.
    pub fn try_push(&self, src_ts: Timestamp, event: DdsEvent) -> Result<bool> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        match self.tx.try_send((src_ts, event)) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(false)
            }
        }
    }

    /// Set the one-shot shutdown latch. Producers are rejected from now
    /// on; consumers drain the remaining items, then see the terminator.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// True once shutdown has been signalled.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Number of events dropped under backpressure so far.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
