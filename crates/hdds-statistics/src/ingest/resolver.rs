// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event resolution: from untrusted [`DdsEvent`]s to typed samples
//! committed into the entity graph.
//!
//! One resolver instance owns one consumer position on the queue and is
//! single-threaded by design. A failing event never mutates the graph
//! (with the one documented exception of the two-sample RTPS events,
//! where the packets sample may land before the bytes sample fails); the
//! failure is logged with the event kind and the resolver moves on.

use super::events::{
    DdsEvent, DiscoveryTime, Entity2LocatorTraffic, EntityCount, Locator2LocatorData,
    PhysicalData, SampleIdentityCount, WireGuid, WireLocator, WriterReaderData,
};
#[cfg(test)]
use super::events::EntityData;
use super::queue::SampleQueue;
use super::wire::{deserialize_guid, deserialize_locator};
use crate::database::data::Sample;
use crate::database::entities::{Entity, EntityPayload};
use crate::database::Database;
use crate::error::{Error, Result};
use crate::types::{EntityId, EntityKind, Timestamp};
use std::sync::Arc;

/// Consumes queued events and commits resolved samples to the database.
pub struct SampleResolver {
    database: Arc<Database>,
    queue: Arc<SampleQueue>,
}

impl SampleResolver {
    pub fn new(database: Arc<Database>, queue: Arc<SampleQueue>) -> Self {
        Self { database, queue }
    }

    /// Thread body: process items until the queue returns the terminator.
    ///
    /// Per-event failures are logged and skipped; the loop only ends on
    /// shutdown-plus-drained.
    pub fn run(&self) {
        while let Some((src_ts, event)) = self.queue.pop() {
            if let Err(e) = self.process_one(src_ts, &event) {
                log::warn!(
                    "[SampleResolver::run] error processing {} event, data not added to the statistics collection: {}",
                    event.kind_name(),
                    e
                );
            }
        }
        log::debug!("[SampleResolver::run] queue drained, resolver exiting");
    }

    /// Resolve and commit a single event.
    ///
    /// # Errors
    /// `NotFound` when an embedded identifier does not resolve,
    /// `BadParameter` for protocol-level payload errors. Either way the
    /// event is dropped and the graph is left unchanged.
    pub fn process_one(&self, src_ts: Timestamp, event: &DdsEvent) -> Result<()> {
        match event {
            DdsEvent::History2HistoryLatency(data) => self.history_latency(src_ts, data),
            DdsEvent::NetworkLatency(data) => self.network_latency(src_ts, data),
            DdsEvent::PublicationThroughput(data) => {
                let (domain, entity) = self.resolve_guid(EntityKind::DataWriter, &data.guid)?;
                self.database.insert_sample(
                    domain,
                    entity,
                    Sample::PublicationThroughput {
                        src_ts,
                        data: f64::from(data.data),
                    },
                )
            }
            DdsEvent::SubscriptionThroughput(data) => {
                let (domain, entity) = self.resolve_guid(EntityKind::DataReader, &data.guid)?;
                self.database.insert_sample(
                    domain,
                    entity,
                    Sample::SubscriptionThroughput {
                        src_ts,
                        data: f64::from(data.data),
                    },
                )
            }
            DdsEvent::RtpsSent(traffic) => self.rtps_traffic(src_ts, traffic, true),
            DdsEvent::RtpsLost(traffic) => self.rtps_traffic(src_ts, traffic, false),
            DdsEvent::ResentDatas(count) => {
                self.entity_count(src_ts, count, EntityKind::DataWriter, |src_ts, count| {
                    Sample::ResentDatas { src_ts, count }
                })
            }
            DdsEvent::HeartbeatCount(count) => {
                self.entity_count(src_ts, count, EntityKind::DataWriter, |src_ts, count| {
                    Sample::HeartbeatCount { src_ts, count }
                })
            }
            DdsEvent::AcknackCount(count) => {
                self.entity_count(src_ts, count, EntityKind::DataReader, |src_ts, count| {
                    Sample::AcknackCount { src_ts, count }
                })
            }
            DdsEvent::NackfragCount(count) => {
                self.entity_count(src_ts, count, EntityKind::DataReader, |src_ts, count| {
                    Sample::NackfragCount { src_ts, count }
                })
            }
            DdsEvent::GapCount(count) => {
                self.entity_count(src_ts, count, EntityKind::DataWriter, |src_ts, count| {
                    Sample::GapCount { src_ts, count }
                })
            }
            DdsEvent::DataCount(count) => {
                self.entity_count(src_ts, count, EntityKind::DataWriter, |src_ts, count| {
                    Sample::DataCount { src_ts, count }
                })
            }
            DdsEvent::PdpPackets(count) => {
                self.entity_count(src_ts, count, EntityKind::Participant, |src_ts, count| {
                    Sample::PdpPackets { src_ts, count }
                })
            }
            DdsEvent::EdpPackets(count) => {
                self.entity_count(src_ts, count, EntityKind::Participant, |src_ts, count| {
                    Sample::EdpPackets { src_ts, count }
                })
            }
            DdsEvent::DiscoveredEntity(discovery) => self.discovered_entity(src_ts, discovery),
            DdsEvent::SampleDatas(sample) => self.sample_datas(src_ts, sample),
            DdsEvent::PhysicalData(physical) => self.physical_data(physical),
        }
    }

    /// Queue this resolver consumes.
    pub fn queue(&self) -> &Arc<SampleQueue> {
        &self.queue
    }

    fn resolve_guid(&self, kind: EntityKind, guid: &WireGuid) -> Result<(EntityId, EntityId)> {
        let text = deserialize_guid(guid);
        self.database
            .get_entities_by_guid(kind, &text)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("{} {}", kind, text)))
    }

    fn resolve_locator(&self, locator: &WireLocator) -> Result<(EntityId, EntityId)> {
        let text = deserialize_locator(locator)?;
        self.database
            .get_entities_by_name(EntityKind::Locator, &text)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("locator {}", text)))
    }

    fn history_latency(&self, src_ts: Timestamp, data: &WriterReaderData) -> Result<()> {
        let (_, reader) = self.resolve_guid(EntityKind::DataReader, &data.reader_guid)?;
        let (domain, writer) = self.resolve_guid(EntityKind::DataWriter, &data.writer_guid)?;
        self.database.insert_sample(
            domain,
            writer,
            Sample::HistoryLatency {
                src_ts,
                data: f64::from(data.data),
                reader,
            },
        )
    }

    fn network_latency(&self, src_ts: Timestamp, data: &Locator2LocatorData) -> Result<()> {
        let (_, remote_locator) = self.resolve_locator(&data.dst_locator)?;
        let (domain, source) = self.resolve_locator(&data.src_locator)?;
        self.database.insert_sample(
            domain,
            source,
            Sample::NetworkLatency {
                src_ts,
                data: f64::from(data.data),
                remote_locator,
            },
        )
    }

    /// RTPS traffic events commit two samples: packets first, then bytes
    /// with its magnitude order.
    fn rtps_traffic(
        &self,
        src_ts: Timestamp,
        traffic: &Entity2LocatorTraffic,
        sent: bool,
    ) -> Result<()> {
        let (_, remote_locator) = self.resolve_locator(&traffic.dst_locator)?;
        let (domain, writer) = self.resolve_guid(EntityKind::DataWriter, &traffic.src_guid)?;

        let packets = if sent {
            Sample::RtpsPacketsSent {
                src_ts,
                count: traffic.packet_count,
                remote_locator,
            }
        } else {
            Sample::RtpsPacketsLost {
                src_ts,
                count: traffic.packet_count,
                remote_locator,
            }
        };
        self.database.insert_sample(domain, writer, packets)?;

        let bytes = if sent {
            Sample::RtpsBytesSent {
                src_ts,
                count: traffic.byte_count,
                magnitude_order: traffic.byte_magnitude_order,
                remote_locator,
            }
        } else {
            Sample::RtpsBytesLost {
                src_ts,
                count: traffic.byte_count,
                magnitude_order: traffic.byte_magnitude_order,
                remote_locator,
            }
        };
        self.database.insert_sample(domain, writer, bytes)
    }

    fn entity_count(
        &self,
        src_ts: Timestamp,
        count: &EntityCount,
        kind: EntityKind,
        build: impl FnOnce(Timestamp, u64) -> Sample,
    ) -> Result<()> {
        let (domain, entity) = self.resolve_guid(kind, &count.guid)?;
        self.database
            .insert_sample(domain, entity, build(src_ts, count.count))
    }

    fn discovered_entity(&self, src_ts: Timestamp, discovery: &DiscoveryTime) -> Result<()> {
        let (_, remote_entity) =
            self.resolve_guid(EntityKind::Participant, &discovery.remote_entity_guid)?;
        let (domain, participant) =
            self.resolve_guid(EntityKind::Participant, &discovery.local_participant_guid)?;
        self.database.insert_sample(
            domain,
            participant,
            Sample::DiscoveryTime {
                src_ts,
                time: discovery.time,
                remote_entity,
            },
        )
    }

    fn sample_datas(&self, src_ts: Timestamp, sample: &SampleIdentityCount) -> Result<()> {
        let (domain, writer) = self.resolve_guid(EntityKind::DataWriter, &sample.writer_guid)?;
        self.database.insert_sample(
            domain,
            writer,
            Sample::SampleDatas {
                src_ts,
                count: sample.count,
                sequence_number: sample.sequence_number,
            },
        )
    }

    /// The one event that may create entities: find-or-create host, user
    /// and process, then link the participant to the process.
    fn physical_data(&self, physical: &PhysicalData) -> Result<()> {
        let participant_guid = deserialize_guid(&physical.participant_guid);
        let (_, participant_id) = self
            .database
            .get_entities_by_guid(EntityKind::Participant, &participant_guid)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::BadParameter(format!(
                    "no participant with GUID {} exists",
                    participant_guid
                ))
            })?;

        let (process_name, process_pid) = split_process(&physical.process)?;

        // Host names are reported unique; reuse or create.
        let host_id = match self
            .database
            .get_entities_by_name(EntityKind::Host, &physical.host)?
            .first()
        {
            Some((_, id)) => *id,
            None => self.database.insert(Entity::host(physical.host.clone()))?,
        };

        // User names are unique within their host.
        let mut user_id = None;
        for (_, candidate) in self
            .database
            .get_entities_by_name(EntityKind::User, &physical.user)?
        {
            let entity = self.database.get_entity(candidate)?;
            if matches!(&entity.payload, EntityPayload::User(u) if u.host == host_id) {
                user_id = Some(candidate);
                break;
            }
        }
        let user_id = match user_id {
            Some(id) => id,
            None => self
                .database
                .insert(Entity::user(physical.user.clone(), host_id))?,
        };

        // Process names are unique within their user; the pid recorded on
        // first sighting wins.
        let mut process_id = None;
        for (_, candidate) in self
            .database
            .get_entities_by_name(EntityKind::Process, process_name)?
        {
            let entity = self.database.get_entity(candidate)?;
            if matches!(&entity.payload, EntityPayload::Process(p) if p.user == user_id) {
                process_id = Some(candidate);
                break;
            }
        }
        let process_id = match process_id {
            Some(id) => id,
            None => self
                .database
                .insert(Entity::process(process_name, process_pid, user_id))?,
        };

        self.database
            .link_participant_with_process(participant_id, process_id)
    }
}

/// Split a `command:pid` field at the *last* `:`.
///
/// # Errors
/// `BadParameter` when no separator is present; the event is a protocol
/// error and gets dropped.
fn split_process(process: &str) -> Result<(&str, &str)> {
    process.rsplit_once(':').ok_or_else(|| {
        Error::BadParameter(format!(
            "process name {} does not follow the [command]:[PID] pattern",
            process
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::ingest::wire::LOCATOR_KIND_UDPV4;
    use serde_json::json;
    use std::collections::BTreeSet;

    const WRITER_GUID: WireGuid = [
        1, 15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 2,
    ];
    const READER_GUID: WireGuid = [
        1, 15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 7,
    ];
    const PARTICIPANT_GUID: WireGuid = [
        1, 15, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 193,
    ];

    fn locator() -> WireLocator {
        let mut address = [0u8; 16];
        address[12..16].copy_from_slice(&[192, 168, 1, 4]);
        WireLocator {
            kind: LOCATOR_KIND_UDPV4,
            port: 7412,
            address,
        }
    }

    struct Fixture {
        resolver: SampleResolver,
        database: Arc<Database>,
        domain: EntityId,
        participant: EntityId,
        writer: EntityId,
        reader: EntityId,
        locator: EntityId,
    }

    fn fixture() -> Fixture {
        let database = Arc::new(Database::new());
        let queue = Arc::new(SampleQueue::new(&QueueConfig::with_capacity(16)));

        let domain = database.insert(Entity::domain("0")).expect("domain");
        let topic = database
            .insert(Entity::topic("rt/chatter", "std_msgs::String", domain))
            .expect("topic");
        let locator_id = database
            .insert(Entity::locator("UDPv4:[192.168.1.4]:7412"))
            .expect("locator");
        let participant = database
            .insert(Entity::participant(
                "participant_0",
                deserialize_guid(&PARTICIPANT_GUID),
                json!({}),
                domain,
            ))
            .expect("participant");
        let locators: BTreeSet<EntityId> = [locator_id].into_iter().collect();
        let writer = database
            .insert(Entity::data_writer(
                "writer_0",
                deserialize_guid(&WRITER_GUID),
                json!({}),
                participant,
                topic,
                locators.clone(),
            ))
            .expect("writer");
        let reader = database
            .insert(Entity::data_reader(
                "reader_0",
                deserialize_guid(&READER_GUID),
                json!({}),
                participant,
                topic,
                locators,
            ))
            .expect("reader");

        Fixture {
            resolver: SampleResolver::new(database.clone(), queue),
            database,
            domain,
            participant,
            writer,
            reader,
            locator: locator_id,
        }
    }

    fn writer_data(f: &Fixture) -> crate::database::data::DataWriterData {
        match f.database.get_entity(f.writer).expect("writer").payload {
            EntityPayload::DataWriter(w) => w.data,
            _ => panic!("wrong payload"),
        }
    }

    #[test]
    fn test_split_process() {
        assert_eq!(split_process("svc:42").expect("split"), ("svc", "42"));
        // Split at the last separator.
        assert_eq!(
            split_process("path/to/bin:1234").expect("split"),
            ("path/to/bin", "1234")
        );
        assert_eq!(split_process("a:b:9").expect("split"), ("a:b", "9"));
        assert!(matches!(
            split_process("no_colon"),
            Err(Error::BadParameter(_))
        ));
    }

    #[test]
    fn test_publication_throughput() {
        let f = fixture();
        let event = DdsEvent::PublicationThroughput(EntityData {
            guid: WRITER_GUID,
            data: 12.5,
        });
        f.resolver.process_one(10, &event).expect("process");

        let data = writer_data(&f);
        assert_eq!(data.publication_throughput.len(), 1);
        assert_eq!(data.publication_throughput[0].src_ts, 10);
        assert_eq!(data.publication_throughput[0].value, 12.5);
    }

    #[test]
    fn test_history_latency_resolves_both_guids() {
        let f = fixture();
        let event = DdsEvent::History2HistoryLatency(WriterReaderData {
            writer_guid: WRITER_GUID,
            reader_guid: READER_GUID,
            data: 0.25,
        });
        f.resolver.process_one(5, &event).expect("process");

        let data = writer_data(&f);
        assert_eq!(data.history2history_latency[&f.reader].len(), 1);
        assert_eq!(data.history2history_latency[&f.reader][0].value, 0.25);
    }

    #[test]
    fn test_rtps_sent_produces_two_samples() {
        let f = fixture();
        let event = DdsEvent::RtpsSent(Entity2LocatorTraffic {
            src_guid: WRITER_GUID,
            dst_locator: locator(),
            packet_count: 10,
            byte_count: 4096,
            byte_magnitude_order: 0,
        });
        f.resolver.process_one(7, &event).expect("process");

        let data = writer_data(&f);
        let packets = &data.rtps_packets_sent[&f.locator];
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].count, 10);
        let bytes = &data.rtps_bytes_sent[&f.locator];
        assert_eq!(bytes.len(), 1);
        assert_eq!(bytes[0].count, 4096);
        assert_eq!(bytes[0].magnitude_order, 0);
    }

    #[test]
    fn test_unknown_guid_drops_event_and_graph_unchanged() {
        let f = fixture();
        let before = f.database.dump_database();

        let event = DdsEvent::History2HistoryLatency(WriterReaderData {
            writer_guid: [0xff; 16],
            reader_guid: READER_GUID,
            data: 1.0,
        });
        assert!(matches!(
            f.resolver.process_one(1, &event),
            Err(Error::NotFound(_))
        ));
        assert_eq!(f.database.dump_database(), before);

        // Subsequent events are still processed.
        let ok = DdsEvent::HeartbeatCount(EntityCount {
            guid: WRITER_GUID,
            count: 3,
        });
        f.resolver.process_one(2, &ok).expect("next event");
        assert_eq!(writer_data(&f).heartbeat_count.len(), 1);
    }

    #[test]
    fn test_network_latency_targets_source_locator() {
        let f = fixture();
        let remote = f
            .database
            .insert(Entity::locator("UDPv4:[192.168.1.99]:7412"))
            .expect("remote locator");

        let mut dst = locator();
        dst.address[12..16].copy_from_slice(&[192, 168, 1, 99]);
        let event = DdsEvent::NetworkLatency(Locator2LocatorData {
            src_locator: locator(),
            dst_locator: dst,
            data: 0.5,
        });
        f.resolver.process_one(3, &event).expect("process");

        let entity = f.database.get_entity(f.locator).expect("locator");
        if let EntityPayload::Locator(l) = entity.payload {
            assert_eq!(l.data.network_latency_per_locator[&remote].len(), 1);
        } else {
            panic!("wrong payload");
        }
    }

    #[test]
    fn test_discovered_entity_and_counts() {
        let f = fixture();
        let event = DdsEvent::DiscoveredEntity(DiscoveryTime {
            local_participant_guid: PARTICIPANT_GUID,
            remote_entity_guid: PARTICIPANT_GUID,
            time: 123_456,
        });
        f.resolver.process_one(4, &event).expect("discovery");

        let event = DdsEvent::PdpPackets(EntityCount {
            guid: PARTICIPANT_GUID,
            count: 11,
        });
        f.resolver.process_one(5, &event).expect("pdp");

        let entity = f.database.get_entity(f.participant).expect("participant");
        if let EntityPayload::Participant(p) = entity.payload {
            assert_eq!(p.data.discovered_entity[&f.participant].len(), 1);
            assert_eq!(p.data.discovered_entity[&f.participant][0].time, 123_456);
            assert_eq!(p.data.pdp_packets.len(), 1);
            assert_eq!(p.data.last_reported_pdp_packets, 11);
        } else {
            panic!("wrong payload");
        }
    }

    #[test]
    fn test_sample_datas_keyed_by_sequence_number() {
        let f = fixture();
        let event = DdsEvent::SampleDatas(SampleIdentityCount {
            writer_guid: WRITER_GUID,
            sequence_number: 9,
            count: 2,
        });
        f.resolver.process_one(6, &event).expect("sample datas");

        let data = writer_data(&f);
        assert_eq!(data.sample_datas[&9].len(), 1);
        assert_eq!(data.sample_datas[&9][0].count, 2);
    }

    #[test]
    fn test_physical_data_bootstraps_topology() {
        let f = fixture();
        let event = DdsEvent::PhysicalData(PhysicalData {
            participant_guid: PARTICIPANT_GUID,
            host: "h1".to_string(),
            user: "u1".to_string(),
            process: "svc:42".to_string(),
        });
        f.resolver.process_one(1, &event).expect("physical data");

        let hosts = f
            .database
            .get_entities_by_name(EntityKind::Host, "h1")
            .expect("hosts");
        assert_eq!(hosts.len(), 1);
        let host_id = hosts[0].1;

        let users = f
            .database
            .get_entities_by_name(EntityKind::User, "u1")
            .expect("users");
        assert_eq!(users.len(), 1);
        let user = f.database.get_entity(users[0].1).expect("user");
        assert!(matches!(&user.payload, EntityPayload::User(u) if u.host == host_id));

        let processes = f
            .database
            .get_entities_by_name(EntityKind::Process, "svc")
            .expect("processes");
        assert_eq!(processes.len(), 1);
        let process = f.database.get_entity(processes[0].1).expect("process");
        if let EntityPayload::Process(p) = &process.payload {
            assert_eq!(p.pid, "42");
            assert_eq!(p.user, users[0].1);
            assert!(p.participants.contains(&f.participant));
        } else {
            panic!("wrong payload");
        }

        let participant = f.database.get_entity(f.participant).expect("participant");
        assert!(
            matches!(&participant.payload, EntityPayload::Participant(p) if p.process == Some(process.id))
        );

        let dump = f.database.dump_database();
        assert_eq!(
            dump.domains_by_process.get(&process.id.to_string()),
            Some(&vec![f.domain])
        );
    }

    #[test]
    fn test_physical_data_reuses_existing_topology() {
        let f = fixture();
        let event = DdsEvent::PhysicalData(PhysicalData {
            participant_guid: PARTICIPANT_GUID,
            host: "h1".to_string(),
            user: "u1".to_string(),
            process: "svc:42".to_string(),
        });
        f.resolver.process_one(1, &event).expect("first report");
        let count = f.database.entity_count();

        // Same report again, pid differs: everything is reused, the pid
        // from the first sighting stays.
        let event = DdsEvent::PhysicalData(PhysicalData {
            participant_guid: PARTICIPANT_GUID,
            host: "h1".to_string(),
            user: "u1".to_string(),
            process: "svc:4242".to_string(),
        });
        f.resolver.process_one(2, &event).expect("second report");
        assert_eq!(f.database.entity_count(), count);

        let processes = f
            .database
            .get_entities_by_name(EntityKind::Process, "svc")
            .expect("processes");
        let process = f.database.get_entity(processes[0].1).expect("process");
        assert!(matches!(&process.payload, EntityPayload::Process(p) if p.pid == "42"));
    }

    #[test]
    fn test_physical_data_bad_process_field() {
        let f = fixture();
        let before = f.database.dump_database();
        let event = DdsEvent::PhysicalData(PhysicalData {
            participant_guid: PARTICIPANT_GUID,
            host: "h1".to_string(),
            user: "u1".to_string(),
            process: "no_colon".to_string(),
        });
        assert!(matches!(
            f.resolver.process_one(1, &event),
            Err(Error::BadParameter(_))
        ));
        assert_eq!(f.database.dump_database(), before);
    }

    #[test]
    fn test_physical_data_unknown_participant() {
        let f = fixture();
        let before = f.database.dump_database();
        let event = DdsEvent::PhysicalData(PhysicalData {
            participant_guid: [0xee; 16],
            host: "h1".to_string(),
            user: "u1".to_string(),
            process: "svc:42".to_string(),
        });
        assert!(matches!(
            f.resolver.process_one(1, &event),
            Err(Error::BadParameter(_))
        ));
        assert_eq!(f.database.dump_database(), before);
    }

    #[test]
    fn test_wrong_kind_guid_is_rejected() {
        let f = fixture();
        // A reader GUID fed through a writer-targeted event resolves to
        // nothing in the writer index.
        let event = DdsEvent::DataCount(EntityCount {
            guid: READER_GUID,
            count: 1,
        });
        assert!(matches!(
            f.resolver.process_one(1, &event),
            Err(Error::NotFound(_))
        ));
    }
}
