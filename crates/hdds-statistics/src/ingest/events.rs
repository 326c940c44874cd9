// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Telemetry event protocol emitted by the DDS listener.
//!
//! Each event kind carries one of a small set of typed payloads. GUIDs
//! arrive as raw 16-byte arrays and locators as `(kind, port, address)`
//! triplets; the resolver decodes both into canonical strings before
//! lookup (see [`super::wire`]).

/// Raw 16-byte DDS GUID as carried on the wire.
pub type WireGuid = [u8; 16];

/// Raw locator triplet as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireLocator {
    /// Transport kind discriminant (UDPv4, UDPv6, TCPv4, TCPv6, SHM).
    pub kind: u32,
    pub port: u32,
    /// 16-byte address; IPv4 kinds use the last 4 bytes.
    pub address: [u8; 16],
}

/// Latency between a writer history cache and a reader history cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriterReaderData {
    pub writer_guid: WireGuid,
    pub reader_guid: WireGuid,
    pub data: f32,
}

/// Latency between two locators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Locator2LocatorData {
    pub src_locator: WireLocator,
    pub dst_locator: WireLocator,
    pub data: f32,
}

/// Scalar measurement attributed to one DDS entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityData {
    pub guid: WireGuid,
    pub data: f32,
}

/// Wire-level traffic from one DDS entity towards one locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entity2LocatorTraffic {
    pub src_guid: WireGuid,
    pub dst_locator: WireLocator,
    pub packet_count: u64,
    pub byte_count: u64,
    pub byte_magnitude_order: i16,
}

/// Cumulative count attributed to one DDS entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityCount {
    pub guid: WireGuid,
    pub count: u64,
}

/// Time at which a participant discovered a remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryTime {
    pub local_participant_guid: WireGuid,
    pub remote_entity_guid: WireGuid,
    /// Nanoseconds reported by the middleware clock.
    pub time: i64,
}

/// Count attributed to one published sample identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleIdentityCount {
    pub writer_guid: WireGuid,
    pub sequence_number: u64,
    pub count: u64,
}

/// Physical topology report: where a participant actually runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalData {
    pub participant_guid: WireGuid,
    pub host: String,
    pub user: String,
    /// `command:pid` - split at the last `:` by the resolver.
    pub process: String,
}

/// Telemetry event as queued by the DDS listener.
#[derive(Debug, Clone, PartialEq)]
pub enum DdsEvent {
    History2HistoryLatency(WriterReaderData),
    NetworkLatency(Locator2LocatorData),
    PublicationThroughput(EntityData),
    SubscriptionThroughput(EntityData),
    RtpsSent(Entity2LocatorTraffic),
    RtpsLost(Entity2LocatorTraffic),
    ResentDatas(EntityCount),
    HeartbeatCount(EntityCount),
    AcknackCount(EntityCount),
    NackfragCount(EntityCount),
    GapCount(EntityCount),
    DataCount(EntityCount),
    PdpPackets(EntityCount),
    EdpPackets(EntityCount),
    DiscoveredEntity(DiscoveryTime),
    SampleDatas(SampleIdentityCount),
    PhysicalData(PhysicalData),
}

impl DdsEvent {
    /// Wire name of the event kind, used in log messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            DdsEvent::History2HistoryLatency(_) => "HISTORY2HISTORY_LATENCY",
            DdsEvent::NetworkLatency(_) => "NETWORK_LATENCY",
            DdsEvent::PublicationThroughput(_) => "PUBLICATION_THROUGHPUT",
            DdsEvent::SubscriptionThroughput(_) => "SUBSCRIPTION_THROUGHPUT",
            DdsEvent::RtpsSent(_) => "RTPS_SENT",
            DdsEvent::RtpsLost(_) => "RTPS_LOST",
            DdsEvent::ResentDatas(_) => "RESENT_DATAS",
            DdsEvent::HeartbeatCount(_) => "HEARTBEAT_COUNT",
            DdsEvent::AcknackCount(_) => "ACKNACK_COUNT",
            DdsEvent::NackfragCount(_) => "NACKFRAG_COUNT",
            DdsEvent::GapCount(_) => "GAP_COUNT",
            DdsEvent::DataCount(_) => "DATA_COUNT",
            DdsEvent::PdpPackets(_) => "PDP_PACKETS",
            DdsEvent::EdpPackets(_) => "EDP_PACKETS",
            DdsEvent::DiscoveredEntity(_) => "DISCOVERED_ENTITY",
            DdsEvent::SampleDatas(_) => "SAMPLE_DATAS",
            DdsEvent::PhysicalData(_) => "PHYSICAL_DATA",
        }
    }
}
