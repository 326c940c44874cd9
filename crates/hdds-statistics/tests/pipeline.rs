// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end ingestion: listener-side pushes through the queue, the
//! resolver thread commits into the graph, shutdown drains everything.

use hdds_statistics::database::entities::EntityPayload;
use hdds_statistics::ingest::events::{
    Entity2LocatorTraffic, EntityCount, EntityData, PhysicalData, WireLocator,
};
use hdds_statistics::ingest::wire::{deserialize_guid, LOCATOR_KIND_UDPV4};
use hdds_statistics::{
    DdsEvent, Entity, EntityId, EntityKind, QueueConfig, StatisticsBackend,
};
use serde_json::json;
use std::collections::BTreeSet;

const PARTICIPANT_GUID: [u8; 16] = [1, 15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 193];
const WRITER_GUID: [u8; 16] = [1, 15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 2];

fn test_locator() -> WireLocator {
    let mut address = [0u8; 16];
    address[12..16].copy_from_slice(&[192, 168, 1, 4]);
    WireLocator {
        kind: LOCATOR_KIND_UDPV4,
        port: 7412,
        address,
    }
}

/// Topology the listener would have announced before telemetry flows.
fn seed_topology(backend: &StatisticsBackend) -> (EntityId, EntityId, EntityId) {
    let db = backend.database();
    let domain = db.insert(Entity::domain("0")).expect("domain");
    let topic = db
        .insert(Entity::topic("rt/chatter", "std_msgs::String", domain))
        .expect("topic");
    let locator = db
        .insert(Entity::locator("UDPv4:[192.168.1.4]:7412"))
        .expect("locator");
    let participant = db
        .insert(Entity::participant(
            "participant_0",
            deserialize_guid(&PARTICIPANT_GUID),
            json!({}),
            domain,
        ))
        .expect("participant");
    let locators: BTreeSet<EntityId> = [locator].into_iter().collect();
    let writer = db
        .insert(Entity::data_writer(
            "writer_0",
            deserialize_guid(&WRITER_GUID),
            json!({}),
            participant,
            topic,
            locators,
        ))
        .expect("writer");
    (participant, writer, locator)
}

#[test]
fn test_events_flow_from_queue_to_graph() {
    let mut backend = StatisticsBackend::start(&QueueConfig::default()).expect("start");
    let (_, writer, locator) = seed_topology(&backend);

    backend
        .push(
            10,
            DdsEvent::PublicationThroughput(EntityData {
                guid: WRITER_GUID,
                data: 2048.0,
            }),
        )
        .expect("push throughput");
    backend
        .push(
            11,
            DdsEvent::RtpsSent(Entity2LocatorTraffic {
                src_guid: WRITER_GUID,
                dst_locator: test_locator(),
                packet_count: 10,
                byte_count: 4096,
                byte_magnitude_order: 0,
            }),
        )
        .expect("push rtps");
    backend
        .push(
            12,
            DdsEvent::PhysicalData(PhysicalData {
                participant_guid: PARTICIPANT_GUID,
                host: "h1".to_string(),
                user: "u1".to_string(),
                process: "svc:42".to_string(),
            }),
        )
        .expect("push physical");

    // An unresolvable event is logged and dropped without stalling the
    // pipeline.
    backend
        .push(
            13,
            DdsEvent::HeartbeatCount(EntityCount {
                guid: [0xff; 16],
                count: 1,
            }),
        )
        .expect("push bad event");

    let database = backend.database();
    backend.stop();

    let entity = database.get_entity(writer).expect("writer");
    if let EntityPayload::DataWriter(w) = entity.payload {
        assert_eq!(w.data.publication_throughput.len(), 1);
        assert_eq!(w.data.publication_throughput[0].src_ts, 10);
        assert_eq!(w.data.rtps_packets_sent[&locator].len(), 1);
        assert_eq!(w.data.rtps_bytes_sent[&locator].len(), 1);
        assert!(w.data.heartbeat_count.is_empty());
    } else {
        panic!("wrong payload");
    }

    // PHYSICAL_DATA bootstrapped host/user/process.
    assert_eq!(
        database
            .get_entities_by_name(EntityKind::Host, "h1")
            .expect("hosts")
            .len(),
        1
    );
    assert_eq!(
        database
            .get_entities_by_name(EntityKind::Process, "svc")
            .expect("processes")
            .len(),
        1
    );
    assert_eq!(backend.dropped_events(), 0);
}

#[test]
fn test_shutdown_drains_pending_events() {
    let mut backend = StatisticsBackend::start(&QueueConfig::default()).expect("start");
    let (participant, _, _) = seed_topology(&backend);

    for i in 0..200u64 {
        backend
            .push(
                i,
                DdsEvent::PdpPackets(EntityCount {
                    guid: PARTICIPANT_GUID,
                    count: i,
                }),
            )
            .expect("push");
    }

    let database = backend.database();
    backend.stop();

    let entity = database.get_entity(participant).expect("participant");
    if let EntityPayload::Participant(p) = entity.payload {
        // Every queued event was processed before the resolver exited.
        assert_eq!(p.data.pdp_packets.len(), 200);
        assert_eq!(p.data.last_reported_pdp_packets, 199);
    } else {
        panic!("wrong payload");
    }
}

#[test]
fn test_push_after_stop_is_rejected() {
    let mut backend = StatisticsBackend::start(&QueueConfig::default()).expect("start");
    backend.stop();
    assert!(backend
        .push(
            1,
            DdsEvent::PdpPackets(EntityCount {
                guid: PARTICIPANT_GUID,
                count: 1,
            }),
        )
        .is_err());
}
