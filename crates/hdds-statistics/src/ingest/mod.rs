// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sample ingestion: event protocol, bounded queue and resolver.
//!
//! ```text
//! listener thread            resolver thread
//!      |                          |
//!      v                          v
//!  SampleQueue::push --FIFO--> SampleQueue::pop
//!                                  |
//!                                  v
//!                        SampleResolver::process_one
//!                                  |
//!                                  v
//!                        Database::insert_sample
//! ```

pub mod events;
pub mod queue;
pub mod resolver;
pub mod wire;

pub use events::DdsEvent;
pub use queue::{QueueItem, SampleQueue};
pub use resolver::SampleResolver;
