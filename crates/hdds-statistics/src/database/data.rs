// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Aggregated time-series buckets carried by DDS entities, and the
//! [`Sample`] sum committed into them.
//!
//! Every sequence is ordered by `src_ts` (arrival order equals report
//! order for a single producer, and the resolver never reorders).
//! Cumulative `last_reported_*` counters track the highest value seen per
//! (entity, remote-key) pair.

use crate::types::{EntityId, EntityKind, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Time-stamped measurement (latency, throughput).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    /// Source timestamp, nanoseconds since epoch.
    pub src_ts: Timestamp,
    /// Measured value.
    pub value: f64,
}

/// Time-stamped cumulative count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountValue {
    pub src_ts: Timestamp,
    pub count: u64,
}

/// Time-stamped byte count with a decimal magnitude order.
///
/// The effective byte count is `count * 10^magnitude_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteCountValue {
    pub src_ts: Timestamp,
    pub count: u64,
    pub magnitude_order: i16,
}

/// Time-stamped discovery event for one remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryValue {
    pub src_ts: Timestamp,
    /// Discovery time reported by the middleware, nanoseconds.
    pub time: i64,
    /// Id of the discovered remote entity.
    pub remote_entity: EntityId,
}

/// Statistics buckets of a participant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticipantData {
    pub pdp_packets: Vec<CountValue>,
    pub last_reported_pdp_packets: u64,
    pub edp_packets: Vec<CountValue>,
    pub last_reported_edp_packets: u64,
    /// Discovery times keyed by discovered remote entity id.
    pub discovered_entity: BTreeMap<EntityId, Vec<DiscoveryValue>>,
}

/// Statistics buckets of a data writer.
///
/// RTPS traffic sequences are keyed by remote locator id; each keyed
/// sequence has a matching cumulative counter under the same key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataWriterData {
    pub publication_throughput: Vec<DataValue>,
    pub rtps_packets_sent: BTreeMap<EntityId, Vec<CountValue>>,
    pub last_reported_rtps_packets_sent: BTreeMap<EntityId, u64>,
    pub rtps_bytes_sent: BTreeMap<EntityId, Vec<ByteCountValue>>,
    pub last_reported_rtps_bytes_sent: BTreeMap<EntityId, u64>,
    pub rtps_packets_lost: BTreeMap<EntityId, Vec<CountValue>>,
    pub last_reported_rtps_packets_lost: BTreeMap<EntityId, u64>,
    pub rtps_bytes_lost: BTreeMap<EntityId, Vec<ByteCountValue>>,
    pub last_reported_rtps_bytes_lost: BTreeMap<EntityId, u64>,
    pub resent_datas: Vec<CountValue>,
    pub last_reported_resent_datas: u64,
    pub heartbeat_count: Vec<CountValue>,
    pub last_reported_heartbeat_count: u64,
    pub gap_count: Vec<CountValue>,
    pub last_reported_gap_count: u64,
    pub data_count: Vec<CountValue>,
    pub last_reported_data_count: u64,
    /// Per-sample publication counts keyed by sequence number.
    pub sample_datas: BTreeMap<u64, Vec<CountValue>>,
    /// History-to-history latencies keyed by reader id.
    pub history2history_latency: BTreeMap<EntityId, Vec<DataValue>>,
}

/// Statistics buckets of a data reader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataReaderData {
    pub subscription_throughput: Vec<DataValue>,
    pub acknack_count: Vec<CountValue>,
    pub last_reported_acknack_count: u64,
    pub nackfrag_count: Vec<CountValue>,
    pub last_reported_nackfrag_count: u64,
}

/// Statistics buckets of a locator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocatorData {
    /// Network latencies keyed by remote locator id.
    pub network_latency_per_locator: BTreeMap<EntityId, Vec<DataValue>>,
}

/// A resolved, typed measurement targeted at one entity.
///
/// Each variant maps to exactly one bucket of one entity kind; the graph
/// rejects a commit whose target entity has a different kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    HistoryLatency {
        src_ts: Timestamp,
        data: f64,
        reader: EntityId,
    },
    NetworkLatency {
        src_ts: Timestamp,
        data: f64,
        remote_locator: EntityId,
    },
    PublicationThroughput {
        src_ts: Timestamp,
        data: f64,
    },
    SubscriptionThroughput {
        src_ts: Timestamp,
        data: f64,
    },
    RtpsPacketsSent {
        src_ts: Timestamp,
        count: u64,
        remote_locator: EntityId,
    },
    RtpsBytesSent {
        src_ts: Timestamp,
        count: u64,
        magnitude_order: i16,
        remote_locator: EntityId,
    },
    RtpsPacketsLost {
        src_ts: Timestamp,
        count: u64,
        remote_locator: EntityId,
    },
    RtpsBytesLost {
        src_ts: Timestamp,
        count: u64,
        magnitude_order: i16,
        remote_locator: EntityId,
    },
    ResentDatas {
        src_ts: Timestamp,
        count: u64,
    },
    HeartbeatCount {
        src_ts: Timestamp,
        count: u64,
    },
    AcknackCount {
        src_ts: Timestamp,
        count: u64,
    },
    NackfragCount {
        src_ts: Timestamp,
        count: u64,
    },
    GapCount {
        src_ts: Timestamp,
        count: u64,
    },
    DataCount {
        src_ts: Timestamp,
        count: u64,
    },
    PdpPackets {
        src_ts: Timestamp,
        count: u64,
    },
    EdpPackets {
        src_ts: Timestamp,
        count: u64,
    },
    DiscoveryTime {
        src_ts: Timestamp,
        time: i64,
        remote_entity: EntityId,
    },
    SampleDatas {
        src_ts: Timestamp,
        count: u64,
        sequence_number: u64,
    },
}

impl Sample {
    /// Entity kind this sample may be committed to.
    pub fn target_kind(&self) -> EntityKind {
        match self {
            Sample::HistoryLatency { .. }
            | Sample::PublicationThroughput { .. }
            | Sample::RtpsPacketsSent { .. }
            | Sample::RtpsBytesSent { .. }
            | Sample::RtpsPacketsLost { .. }
            | Sample::RtpsBytesLost { .. }
            | Sample::ResentDatas { .. }
            | Sample::HeartbeatCount { .. }
            | Sample::GapCount { .. }
            | Sample::DataCount { .. }
            | Sample::SampleDatas { .. } => EntityKind::DataWriter,
            Sample::SubscriptionThroughput { .. }
            | Sample::AcknackCount { .. }
            | Sample::NackfragCount { .. } => EntityKind::DataReader,
            Sample::PdpPackets { .. }
            | Sample::EdpPackets { .. }
            | Sample::DiscoveryTime { .. } => EntityKind::Participant,
            Sample::NetworkLatency { .. } => EntityKind::Locator,
        }
    }

    /// Source timestamp of the measurement.
    pub fn src_ts(&self) -> Timestamp {
        match self {
            Sample::HistoryLatency { src_ts, .. }
            | Sample::NetworkLatency { src_ts, .. }
            | Sample::PublicationThroughput { src_ts, .. }
            | Sample::SubscriptionThroughput { src_ts, .. }
            | Sample::RtpsPacketsSent { src_ts, .. }
            | Sample::RtpsBytesSent { src_ts, .. }
            | Sample::RtpsPacketsLost { src_ts, .. }
            | Sample::RtpsBytesLost { src_ts, .. }
            | Sample::ResentDatas { src_ts, .. }
            | Sample::HeartbeatCount { src_ts, .. }
            | Sample::AcknackCount { src_ts, .. }
            | Sample::NackfragCount { src_ts, .. }
            | Sample::GapCount { src_ts, .. }
            | Sample::DataCount { src_ts, .. }
            | Sample::PdpPackets { src_ts, .. }
            | Sample::EdpPackets { src_ts, .. }
            | Sample::DiscoveryTime { src_ts, .. }
            | Sample::SampleDatas { src_ts, .. } => *src_ts,
        }
    }

    /// Ids of other entities referenced by this sample, if any.
    ///
    /// The graph validates these resolve to live entities before the
    /// sample is committed.
    pub fn referenced_ids(&self) -> Vec<EntityId> {
        match self {
            Sample::HistoryLatency { reader, .. } => vec![*reader],
            Sample::NetworkLatency { remote_locator, .. }
            | Sample::RtpsPacketsSent { remote_locator, .. }
            | Sample::RtpsBytesSent { remote_locator, .. }
            | Sample::RtpsPacketsLost { remote_locator, .. }
            | Sample::RtpsBytesLost { remote_locator, .. } => vec![*remote_locator],
            Sample::DiscoveryTime { remote_entity, .. } => vec![*remote_entity],
            _ => Vec::new(),
        }
    }
}

/// Raise a cumulative counter, keeping it monotone under reporter
/// regressions.
pub(crate) fn raise_counter(slot: &mut u64, reported: u64) {
    if reported > *slot {
        *slot = reported;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kinds() {
        let s = Sample::PublicationThroughput {
            src_ts: 1,
            data: 2.0,
        };
        assert_eq!(s.target_kind(), EntityKind::DataWriter);

        let s = Sample::AcknackCount { src_ts: 1, count: 3 };
        assert_eq!(s.target_kind(), EntityKind::DataReader);

        let s = Sample::PdpPackets { src_ts: 1, count: 3 };
        assert_eq!(s.target_kind(), EntityKind::Participant);

        let s = Sample::NetworkLatency {
            src_ts: 1,
            data: 0.5,
            remote_locator: EntityId::new(7),
        };
        assert_eq!(s.target_kind(), EntityKind::Locator);
    }

    #[test]
    fn test_referenced_ids() {
        let s = Sample::HistoryLatency {
            src_ts: 1,
            data: 2.0,
            reader: EntityId::new(9),
        };
        assert_eq!(s.referenced_ids(), vec![EntityId::new(9)]);

        let s = Sample::DataCount { src_ts: 1, count: 1 };
        assert!(s.referenced_ids().is_empty());
    }

    #[test]
    fn test_raise_counter_is_monotone() {
        let mut slot = 10;
        raise_counter(&mut slot, 12);
        assert_eq!(slot, 12);

        // A regressing reporter does not lower the counter.
        raise_counter(&mut slot, 5);
        assert_eq!(slot, 12);
    }

    #[test]
    fn test_src_ts_accessor() {
        let s = Sample::SampleDatas {
            src_ts: 77,
            count: 1,
            sequence_number: 4,
        };
        assert_eq!(s.src_ts(), 77);
    }
}
