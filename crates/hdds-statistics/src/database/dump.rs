// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Snapshot document and its conversions to and from graph state.
//!
//! The dump is a JSON-shaped document: one section per entity kind keyed
//! by stringified id, the four M:N cross-index sections, and the
//! `next_id` scalar. String-keyed `BTreeMap`s give the canonical
//! lexicographic key ordering, so serializing the same dump twice yields
//! identical bytes and `dump(load(dump(G))) == dump(G)` holds
//! byte-for-byte.
//!
//! `restore_state` rebuilds every primary and secondary index and
//! validates the invariants (ids resolve, relations are bidirectional,
//! scope uniqueness) before the loaded state replaces anything.

use super::data::{
    ByteCountValue, CountValue, DataReaderData, DataValue, DataWriterData, DiscoveryValue,
    LocatorData, ParticipantData,
};
use super::entities::{
    DataReaderEntity, DataWriterEntity, DomainEntity, Entity, EntityPayload, HostEntity,
    LocatorEntity, ParticipantEntity, ProcessEntity, TopicEntity, UserEntity,
};
use super::GraphState;
use crate::error::{Error, Result};
use crate::types::{EntityId, EntityKind, Qos};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Full serialized image of the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseDump {
    pub hosts: BTreeMap<String, HostDump>,
    pub users: BTreeMap<String, UserDump>,
    pub processes: BTreeMap<String, ProcessDump>,
    pub domains: BTreeMap<String, DomainDump>,
    pub topics: BTreeMap<String, TopicDump>,
    pub participants: BTreeMap<String, ParticipantDump>,
    pub data_readers: BTreeMap<String, DataReaderDump>,
    pub data_writers: BTreeMap<String, DataWriterDump>,
    pub locators: BTreeMap<String, LocatorDump>,
    pub locators_by_participant: BTreeMap<String, Vec<EntityId>>,
    pub participants_by_locator: BTreeMap<String, Vec<EntityId>>,
    pub domains_by_process: BTreeMap<String, Vec<EntityId>>,
    pub processes_by_domain: BTreeMap<String, Vec<EntityId>>,
    pub next_id: u64,
}

impl DatabaseDump {
    /// Canonical JSON rendering of the snapshot.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a snapshot from its JSON rendering.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostDump {
    pub kind: EntityKind,
    pub name: String,
    pub alias: String,
    pub users: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDump {
    pub kind: EntityKind,
    pub name: String,
    pub alias: String,
    pub host: EntityId,
    pub processes: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDump {
    pub kind: EntityKind,
    pub name: String,
    pub alias: String,
    pub pid: String,
    pub user: EntityId,
    pub participants: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDump {
    pub kind: EntityKind,
    pub name: String,
    pub alias: String,
    pub topics: Vec<EntityId>,
    pub participants: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDump {
    pub kind: EntityKind,
    pub name: String,
    pub alias: String,
    pub data_type: String,
    pub domain: EntityId,
    pub data_readers: Vec<EntityId>,
    pub data_writers: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantDump {
    pub kind: EntityKind,
    pub name: String,
    pub alias: String,
    pub guid: String,
    pub qos: Qos,
    pub domain: EntityId,
    /// Hosting process; [`EntityId::INVALID`] when not linked yet.
    pub process: EntityId,
    pub data_readers: Vec<EntityId>,
    pub data_writers: Vec<EntityId>,
    pub data: ParticipantDataDump,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataReaderDump {
    pub kind: EntityKind,
    pub name: String,
    pub alias: String,
    pub guid: String,
    pub qos: Qos,
    pub participant: EntityId,
    pub topic: EntityId,
    pub locators: Vec<EntityId>,
    pub data: DataReaderDataDump,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataWriterDump {
    pub kind: EntityKind,
    pub name: String,
    pub alias: String,
    pub guid: String,
    pub qos: Qos,
    pub participant: EntityId,
    pub topic: EntityId,
    pub locators: Vec<EntityId>,
    pub data: DataWriterDataDump,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorDump {
    pub kind: EntityKind,
    pub name: String,
    pub alias: String,
    pub data_readers: Vec<EntityId>,
    pub data_writers: Vec<EntityId>,
    pub data: LocatorDataDump,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantDataDump {
    pub pdp_packets: Vec<CountValue>,
    pub last_reported_pdp_packets: u64,
    pub edp_packets: Vec<CountValue>,
    pub last_reported_edp_packets: u64,
    pub discovered_entity: BTreeMap<String, Vec<DiscoveryValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataWriterDataDump {
    pub publication_throughput: Vec<DataValue>,
    pub rtps_packets_sent: BTreeMap<String, Vec<CountValue>>,
    pub last_reported_rtps_packets_sent: BTreeMap<String, u64>,
    pub rtps_bytes_sent: BTreeMap<String, Vec<ByteCountValue>>,
    pub last_reported_rtps_bytes_sent: BTreeMap<String, u64>,
    pub rtps_packets_lost: BTreeMap<String, Vec<CountValue>>,
    pub last_reported_rtps_packets_lost: BTreeMap<String, u64>,
    pub rtps_bytes_lost: BTreeMap<String, Vec<ByteCountValue>>,
    pub last_reported_rtps_bytes_lost: BTreeMap<String, u64>,
    pub resent_datas: Vec<CountValue>,
    pub last_reported_resent_datas: u64,
    pub heartbeat_count: Vec<CountValue>,
    pub last_reported_heartbeat_count: u64,
    pub gap_count: Vec<CountValue>,
    pub last_reported_gap_count: u64,
    pub data_count: Vec<CountValue>,
    pub last_reported_data_count: u64,
    pub sample_datas: BTreeMap<String, Vec<CountValue>>,
    pub history2history_latency: BTreeMap<String, Vec<DataValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataReaderDataDump {
    pub subscription_throughput: Vec<DataValue>,
    pub acknack_count: Vec<CountValue>,
    pub last_reported_acknack_count: u64,
    pub nackfrag_count: Vec<CountValue>,
    pub last_reported_nackfrag_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocatorDataDump {
    pub network_latency_per_locator: BTreeMap<String, Vec<DataValue>>,
}

// ===== graph -> dump =====

fn id_vec(set: &BTreeSet<EntityId>) -> Vec<EntityId> {
    set.iter().copied().collect()
}

fn key_by_id<V: Clone>(map: &BTreeMap<EntityId, V>) -> BTreeMap<String, V> {
    map.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn key_by_seq<V: Clone>(map: &BTreeMap<u64, V>) -> BTreeMap<String, V> {
    map.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn index_section(map: &BTreeMap<EntityId, BTreeSet<EntityId>>) -> BTreeMap<String, Vec<EntityId>> {
    map.iter().map(|(k, v)| (k.to_string(), id_vec(v))).collect()
}

fn participant_data_dump(data: &ParticipantData) -> ParticipantDataDump {
    ParticipantDataDump {
        pdp_packets: data.pdp_packets.clone(),
        last_reported_pdp_packets: data.last_reported_pdp_packets,
        edp_packets: data.edp_packets.clone(),
        last_reported_edp_packets: data.last_reported_edp_packets,
        discovered_entity: key_by_id(&data.discovered_entity),
    }
}

fn data_writer_data_dump(data: &DataWriterData) -> DataWriterDataDump {
    DataWriterDataDump {
        publication_throughput: data.publication_throughput.clone(),
        rtps_packets_sent: key_by_id(&data.rtps_packets_sent),
        last_reported_rtps_packets_sent: key_by_id(&data.last_reported_rtps_packets_sent),
        rtps_bytes_sent: key_by_id(&data.rtps_bytes_sent),
        last_reported_rtps_bytes_sent: key_by_id(&data.last_reported_rtps_bytes_sent),
        rtps_packets_lost: key_by_id(&data.rtps_packets_lost),
        last_reported_rtps_packets_lost: key_by_id(&data.last_reported_rtps_packets_lost),
        rtps_bytes_lost: key_by_id(&data.rtps_bytes_lost),
        last_reported_rtps_bytes_lost: key_by_id(&data.last_reported_rtps_bytes_lost),
        resent_datas: data.resent_datas.clone(),
        last_reported_resent_datas: data.last_reported_resent_datas,
        heartbeat_count: data.heartbeat_count.clone(),
        last_reported_heartbeat_count: data.last_reported_heartbeat_count,
        gap_count: data.gap_count.clone(),
        last_reported_gap_count: data.last_reported_gap_count,
        data_count: data.data_count.clone(),
        last_reported_data_count: data.last_reported_data_count,
        sample_datas: key_by_seq(&data.sample_datas),
        history2history_latency: key_by_id(&data.history2history_latency),
    }
}

fn data_reader_data_dump(data: &DataReaderData) -> DataReaderDataDump {
    DataReaderDataDump {
        subscription_throughput: data.subscription_throughput.clone(),
        acknack_count: data.acknack_count.clone(),
        last_reported_acknack_count: data.last_reported_acknack_count,
        nackfrag_count: data.nackfrag_count.clone(),
        last_reported_nackfrag_count: data.last_reported_nackfrag_count,
    }
}

fn locator_data_dump(data: &LocatorData) -> LocatorDataDump {
    LocatorDataDump {
        network_latency_per_locator: key_by_id(&data.network_latency_per_locator),
    }
}

/// Produce the snapshot document for the given state.
pub(crate) fn dump_state(state: &GraphState) -> DatabaseDump {
    let mut dump = DatabaseDump {
        hosts: BTreeMap::new(),
        users: BTreeMap::new(),
        processes: BTreeMap::new(),
        domains: BTreeMap::new(),
        topics: BTreeMap::new(),
        participants: BTreeMap::new(),
        data_readers: BTreeMap::new(),
        data_writers: BTreeMap::new(),
        locators: BTreeMap::new(),
        locators_by_participant: index_section(&state.locators_by_participant),
        participants_by_locator: index_section(&state.participants_by_locator),
        domains_by_process: index_section(&state.domains_by_process),
        processes_by_domain: index_section(&state.processes_by_domain),
        next_id: state.next_id,
    };

    for (id, entity) in &state.entities {
        let key = id.to_string();
        match &entity.payload {
            EntityPayload::Host(h) => {
                dump.hosts.insert(
                    key,
                    HostDump {
                        kind: EntityKind::Host,
                        name: entity.name.clone(),
                        alias: entity.alias.clone(),
                        users: id_vec(&h.users),
                    },
                );
            }
            EntityPayload::User(u) => {
                dump.users.insert(
                    key,
                    UserDump {
                        kind: EntityKind::User,
                        name: entity.name.clone(),
                        alias: entity.alias.clone(),
                        host: u.host,
                        processes: id_vec(&u.processes),
                    },
                );
            }
            EntityPayload::Process(p) => {
                dump.processes.insert(
                    key,
                    ProcessDump {
                        kind: EntityKind::Process,
                        name: entity.name.clone(),
                        alias: entity.alias.clone(),
                        pid: p.pid.clone(),
                        user: p.user,
                        participants: id_vec(&p.participants),
                    },
                );
            }
            EntityPayload::Domain(d) => {
                dump.domains.insert(
                    key,
                    DomainDump {
                        kind: EntityKind::Domain,
                        name: entity.name.clone(),
                        alias: entity.alias.clone(),
                        topics: id_vec(&d.topics),
                        participants: id_vec(&d.participants),
                    },
                );
            }
            EntityPayload::Topic(t) => {
                dump.topics.insert(
                    key,
                    TopicDump {
                        kind: EntityKind::Topic,
                        name: entity.name.clone(),
                        alias: entity.alias.clone(),
                        data_type: t.data_type.clone(),
                        domain: t.domain,
                        data_readers: id_vec(&t.data_readers),
                        data_writers: id_vec(&t.data_writers),
                    },
                );
            }
            EntityPayload::Participant(p) => {
                dump.participants.insert(
                    key,
                    ParticipantDump {
                        kind: EntityKind::Participant,
                        name: entity.name.clone(),
                        alias: entity.alias.clone(),
                        guid: p.guid.clone(),
                        qos: p.qos.clone(),
                        domain: p.domain,
                        process: p.process.unwrap_or(EntityId::INVALID),
                        data_readers: id_vec(&p.data_readers),
                        data_writers: id_vec(&p.data_writers),
                        data: participant_data_dump(&p.data),
                    },
                );
            }
            EntityPayload::DataReader(r) => {
                dump.data_readers.insert(
                    key,
                    DataReaderDump {
                        kind: EntityKind::DataReader,
                        name: entity.name.clone(),
                        alias: entity.alias.clone(),
                        guid: r.guid.clone(),
                        qos: r.qos.clone(),
                        participant: r.participant,
                        topic: r.topic,
                        locators: id_vec(&r.locators),
                        data: data_reader_data_dump(&r.data),
                    },
                );
            }
            EntityPayload::DataWriter(w) => {
                dump.data_writers.insert(
                    key,
                    DataWriterDump {
                        kind: EntityKind::DataWriter,
                        name: entity.name.clone(),
                        alias: entity.alias.clone(),
                        guid: w.guid.clone(),
                        qos: w.qos.clone(),
                        participant: w.participant,
                        topic: w.topic,
                        locators: id_vec(&w.locators),
                        data: data_writer_data_dump(&w.data),
                    },
                );
            }
            EntityPayload::Locator(l) => {
                dump.locators.insert(
                    key,
                    LocatorDump {
                        kind: EntityKind::Locator,
                        name: entity.name.clone(),
                        alias: entity.alias.clone(),
                        data_readers: id_vec(&l.data_readers),
                        data_writers: id_vec(&l.data_writers),
                        data: locator_data_dump(&l.data),
                    },
                );
            }
        }
    }

    dump
}

// ===== dump -> graph =====

fn parse_key(section: &str, key: &str) -> Result<EntityId> {
    let value: u64 = key.parse().map_err(|_| {
        Error::BadParameter(format!("section {}: key {:?} is not an id", section, key))
    })?;
    if value == 0 {
        return Err(Error::BadParameter(format!(
            "section {}: id 0 is reserved",
            section
        )));
    }
    Ok(EntityId::new(value))
}

fn unkey_by_id<V: Clone>(
    section: &str,
    map: &BTreeMap<String, V>,
) -> Result<BTreeMap<EntityId, V>> {
    map.iter()
        .map(|(k, v)| Ok((parse_key(section, k)?, v.clone())))
        .collect()
}

fn unkey_by_seq<V: Clone>(section: &str, map: &BTreeMap<String, V>) -> Result<BTreeMap<u64, V>> {
    map.iter()
        .map(|(k, v)| {
            let seq: u64 = k.parse().map_err(|_| {
                Error::BadParameter(format!(
                    "section {}: key {:?} is not a sequence number",
                    section, k
                ))
            })?;
            Ok((seq, v.clone()))
        })
        .collect()
}

fn check_kind(section: &str, key: &str, found: EntityKind, expected: EntityKind) -> Result<()> {
    if found != expected {
        return Err(Error::BadParameter(format!(
            "section {}: entry {} has kind {}, expected {}",
            section, key, found, expected
        )));
    }
    Ok(())
}

fn participant_data_restore(dump: &ParticipantDataDump) -> Result<ParticipantData> {
    Ok(ParticipantData {
        pdp_packets: dump.pdp_packets.clone(),
        last_reported_pdp_packets: dump.last_reported_pdp_packets,
        edp_packets: dump.edp_packets.clone(),
        last_reported_edp_packets: dump.last_reported_edp_packets,
        discovered_entity: unkey_by_id("discovered_entity", &dump.discovered_entity)?,
    })
}

fn data_writer_data_restore(dump: &DataWriterDataDump) -> Result<DataWriterData> {
    Ok(DataWriterData {
        publication_throughput: dump.publication_throughput.clone(),
        rtps_packets_sent: unkey_by_id("rtps_packets_sent", &dump.rtps_packets_sent)?,
        last_reported_rtps_packets_sent: unkey_by_id(
            "last_reported_rtps_packets_sent",
            &dump.last_reported_rtps_packets_sent,
        )?,
        rtps_bytes_sent: unkey_by_id("rtps_bytes_sent", &dump.rtps_bytes_sent)?,
        last_reported_rtps_bytes_sent: unkey_by_id(
            "last_reported_rtps_bytes_sent",
            &dump.last_reported_rtps_bytes_sent,
        )?,
        rtps_packets_lost: unkey_by_id("rtps_packets_lost", &dump.rtps_packets_lost)?,
        last_reported_rtps_packets_lost: unkey_by_id(
            "last_reported_rtps_packets_lost",
            &dump.last_reported_rtps_packets_lost,
        )?,
        rtps_bytes_lost: unkey_by_id("rtps_bytes_lost", &dump.rtps_bytes_lost)?,
        last_reported_rtps_bytes_lost: unkey_by_id(
            "last_reported_rtps_bytes_lost",
            &dump.last_reported_rtps_bytes_lost,
        )?,
        resent_datas: dump.resent_datas.clone(),
        last_reported_resent_datas: dump.last_reported_resent_datas,
        heartbeat_count: dump.heartbeat_count.clone(),
        last_reported_heartbeat_count: dump.last_reported_heartbeat_count,
        gap_count: dump.gap_count.clone(),
        last_reported_gap_count: dump.last_reported_gap_count,
        data_count: dump.data_count.clone(),
        last_reported_data_count: dump.last_reported_data_count,
        sample_datas: unkey_by_seq("sample_datas", &dump.sample_datas)?,
        history2history_latency: unkey_by_id(
            "history2history_latency",
            &dump.history2history_latency,
        )?,
    })
}

fn data_reader_data_restore(dump: &DataReaderDataDump) -> DataReaderData {
    DataReaderData {
        subscription_throughput: dump.subscription_throughput.clone(),
        acknack_count: dump.acknack_count.clone(),
        last_reported_acknack_count: dump.last_reported_acknack_count,
        nackfrag_count: dump.nackfrag_count.clone(),
        last_reported_nackfrag_count: dump.last_reported_nackfrag_count,
    }
}

fn locator_data_restore(dump: &LocatorDataDump) -> Result<LocatorData> {
    Ok(LocatorData {
        network_latency_per_locator: unkey_by_id(
            "network_latency_per_locator",
            &dump.network_latency_per_locator,
        )?,
    })
}

/// Rebuild a complete graph state from a snapshot.
///
/// Every primary and secondary index is reconstructed; ids are taken
/// exactly as recorded. Fails without side effects if any id does not
/// resolve, a relation is one-sided, scope uniqueness is violated, or
/// `next_id` does not dominate the recorded ids.
pub(crate) fn restore_state(dump: &DatabaseDump) -> Result<GraphState> {
    let mut state = GraphState::new();

    let add = |state: &mut GraphState, id: EntityId, entity: Entity| -> Result<()> {
        if state.entities.insert(id, entity).is_some() {
            return Err(Error::BadParameter(format!("id {} appears twice", id)));
        }
        Ok(())
    };

    for (key, host) in &dump.hosts {
        let id = parse_key("hosts", key)?;
        check_kind("hosts", key, host.kind, EntityKind::Host)?;
        if state.hosts_by_name.insert(host.name.clone(), id).is_some() {
            return Err(Error::Duplicate(format!("host {}", host.name)));
        }
        add(
            &mut state,
            id,
            Entity {
                id,
                name: host.name.clone(),
                alias: host.alias.clone(),
                payload: EntityPayload::Host(HostEntity {
                    users: host.users.iter().copied().collect(),
                }),
            },
        )?;
    }

    for (key, user) in &dump.users {
        let id = parse_key("users", key)?;
        check_kind("users", key, user.kind, EntityKind::User)?;
        for existing in state.users_by_name.get(&user.name).into_iter().flatten() {
            if let Some(EntityPayload::User(u)) =
                state.entities.get(existing).map(|e| &e.payload)
            {
                if u.host == user.host {
                    return Err(Error::Duplicate(format!(
                        "user {} on host {}",
                        user.name, user.host
                    )));
                }
            }
        }
        state.users_by_name.entry(user.name.clone()).or_default().push(id);
        add(
            &mut state,
            id,
            Entity {
                id,
                name: user.name.clone(),
                alias: user.alias.clone(),
                payload: EntityPayload::User(UserEntity {
                    host: user.host,
                    processes: user.processes.iter().copied().collect(),
                }),
            },
        )?;
    }

    for (key, process) in &dump.processes {
        let id = parse_key("processes", key)?;
        check_kind("processes", key, process.kind, EntityKind::Process)?;
        for existing in state
            .processes_by_name
            .get(&process.name)
            .into_iter()
            .flatten()
        {
            if let Some(EntityPayload::Process(p)) =
                state.entities.get(existing).map(|e| &e.payload)
            {
                if p.user == process.user {
                    return Err(Error::Duplicate(format!(
                        "process {} for user {}",
                        process.name, process.user
                    )));
                }
            }
        }
        state
            .processes_by_name
            .entry(process.name.clone())
            .or_default()
            .push(id);
        add(
            &mut state,
            id,
            Entity {
                id,
                name: process.name.clone(),
                alias: process.alias.clone(),
                payload: EntityPayload::Process(ProcessEntity {
                    pid: process.pid.clone(),
                    user: process.user,
                    participants: process.participants.iter().copied().collect(),
                }),
            },
        )?;
    }

    for (key, domain) in &dump.domains {
        let id = parse_key("domains", key)?;
        check_kind("domains", key, domain.kind, EntityKind::Domain)?;
        if state.domains_by_name.insert(domain.name.clone(), id).is_some() {
            return Err(Error::Duplicate(format!("domain {}", domain.name)));
        }
        add(
            &mut state,
            id,
            Entity {
                id,
                name: domain.name.clone(),
                alias: domain.alias.clone(),
                payload: EntityPayload::Domain(DomainEntity {
                    topics: domain.topics.iter().copied().collect(),
                    participants: domain.participants.iter().copied().collect(),
                }),
            },
        )?;
    }

    for (key, topic) in &dump.topics {
        let id = parse_key("topics", key)?;
        check_kind("topics", key, topic.kind, EntityKind::Topic)?;
        for existing in state.topics_by_name.get(&topic.name).into_iter().flatten() {
            if let Some(EntityPayload::Topic(t)) =
                state.entities.get(existing).map(|e| &e.payload)
            {
                if t.domain == topic.domain && t.data_type == topic.data_type {
                    return Err(Error::Duplicate(format!(
                        "topic {} <{}> in domain {}",
                        topic.name, topic.data_type, topic.domain
                    )));
                }
            }
        }
        state.topics_by_name.entry(topic.name.clone()).or_default().push(id);
        add(
            &mut state,
            id,
            Entity {
                id,
                name: topic.name.clone(),
                alias: topic.alias.clone(),
                payload: EntityPayload::Topic(TopicEntity {
                    data_type: topic.data_type.clone(),
                    domain: topic.domain,
                    data_readers: topic.data_readers.iter().copied().collect(),
                    data_writers: topic.data_writers.iter().copied().collect(),
                }),
            },
        )?;
    }

    for (key, participant) in &dump.participants {
        let id = parse_key("participants", key)?;
        check_kind("participants", key, participant.kind, EntityKind::Participant)?;
        if state
            .participants_by_guid
            .insert(participant.guid.clone(), id)
            .is_some()
        {
            return Err(Error::Duplicate(format!("participant {}", participant.guid)));
        }
        add(
            &mut state,
            id,
            Entity {
                id,
                name: participant.name.clone(),
                alias: participant.alias.clone(),
                payload: EntityPayload::Participant(ParticipantEntity {
                    guid: participant.guid.clone(),
                    qos: participant.qos.clone(),
                    domain: participant.domain,
                    process: participant.process.is_valid().then_some(participant.process),
                    data_readers: participant.data_readers.iter().copied().collect(),
                    data_writers: participant.data_writers.iter().copied().collect(),
                    data: participant_data_restore(&participant.data)?,
                }),
            },
        )?;
    }

    for (key, reader) in &dump.data_readers {
        let id = parse_key("data_readers", key)?;
        check_kind("data_readers", key, reader.kind, EntityKind::DataReader)?;
        if state.data_readers_by_guid.insert(reader.guid.clone(), id).is_some() {
            return Err(Error::Duplicate(format!("datareader {}", reader.guid)));
        }
        add(
            &mut state,
            id,
            Entity {
                id,
                name: reader.name.clone(),
                alias: reader.alias.clone(),
                payload: EntityPayload::DataReader(DataReaderEntity {
                    guid: reader.guid.clone(),
                    qos: reader.qos.clone(),
                    participant: reader.participant,
                    topic: reader.topic,
                    locators: reader.locators.iter().copied().collect(),
                    data: data_reader_data_restore(&reader.data),
                }),
            },
        )?;
    }

    for (key, writer) in &dump.data_writers {
        let id = parse_key("data_writers", key)?;
        check_kind("data_writers", key, writer.kind, EntityKind::DataWriter)?;
        if state.data_writers_by_guid.insert(writer.guid.clone(), id).is_some() {
            return Err(Error::Duplicate(format!("datawriter {}", writer.guid)));
        }
        add(
            &mut state,
            id,
            Entity {
                id,
                name: writer.name.clone(),
                alias: writer.alias.clone(),
                payload: EntityPayload::DataWriter(DataWriterEntity {
                    guid: writer.guid.clone(),
                    qos: writer.qos.clone(),
                    participant: writer.participant,
                    topic: writer.topic,
                    locators: writer.locators.iter().copied().collect(),
                    data: data_writer_data_restore(&writer.data)?,
                }),
            },
        )?;
    }

    for (key, locator) in &dump.locators {
        let id = parse_key("locators", key)?;
        check_kind("locators", key, locator.kind, EntityKind::Locator)?;
        if state.locators_by_name.insert(locator.name.clone(), id).is_some() {
            return Err(Error::Duplicate(format!("locator {}", locator.name)));
        }
        add(
            &mut state,
            id,
            Entity {
                id,
                name: locator.name.clone(),
                alias: locator.alias.clone(),
                payload: EntityPayload::Locator(LocatorEntity {
                    data_readers: locator.data_readers.iter().copied().collect(),
                    data_writers: locator.data_writers.iter().copied().collect(),
                    data: locator_data_restore(&locator.data)?,
                }),
            },
        )?;
    }

    state.locators_by_participant =
        restore_index("locators_by_participant", &dump.locators_by_participant)?;
    state.participants_by_locator =
        restore_index("participants_by_locator", &dump.participants_by_locator)?;
    state.domains_by_process = restore_index("domains_by_process", &dump.domains_by_process)?;
    state.processes_by_domain = restore_index("processes_by_domain", &dump.processes_by_domain)?;

    if let Some(max_id) = state.entities.keys().next_back() {
        if dump.next_id <= max_id.value() {
            return Err(Error::BadParameter(format!(
                "next_id {} does not dominate max recorded id {}",
                dump.next_id, max_id
            )));
        }
    }
    if dump.next_id == 0 {
        return Err(Error::BadParameter("next_id 0 is reserved".to_string()));
    }
    state.next_id = dump.next_id;

    validate_consistency(&state)?;
    Ok(state)
}

fn restore_index(
    section: &str,
    dump: &BTreeMap<String, Vec<EntityId>>,
) -> Result<BTreeMap<EntityId, BTreeSet<EntityId>>> {
    dump.iter()
        .map(|(k, v)| Ok((parse_key(section, k)?, v.iter().copied().collect())))
        .collect()
}

fn expect_entity<'a>(
    state: &'a GraphState,
    id: EntityId,
    kind: EntityKind,
    ctx: &str,
) -> Result<&'a Entity> {
    let entity = state
        .entities
        .get(&id)
        .ok_or_else(|| Error::NotFound(format!("{}: entity {}", ctx, id)))?;
    if entity.kind() != kind {
        return Err(Error::BadParameter(format!(
            "{}: entity {} is {}, expected {}",
            ctx,
            id,
            entity.kind(),
            kind
        )));
    }
    Ok(entity)
}

fn one_sided(ctx: &str, a: EntityId, b: EntityId) -> Error {
    Error::BadParameter(format!("{}: relation {} <-> {} is one-sided", ctx, a, b))
}

/// Verify the loaded state against the graph invariants: every id in any
/// relation or index resolves to a live entity of the expected kind, and
/// every parent/child relation is present in both directions.
fn validate_consistency(state: &GraphState) -> Result<()> {
    let expect = |id: EntityId, kind: EntityKind, ctx: &str| expect_entity(state, id, kind, ctx);

    for (id, entity) in &state.entities {
        match &entity.payload {
            EntityPayload::Host(h) => {
                for user in &h.users {
                    let u = expect(*user, EntityKind::User, "host.users")?;
                    if !matches!(&u.payload, EntityPayload::User(p) if p.host == *id) {
                        return Err(one_sided("host.users", *id, *user));
                    }
                }
            }
            EntityPayload::User(u) => {
                let host = expect(u.host, EntityKind::Host, "user.host")?;
                if !matches!(&host.payload, EntityPayload::Host(h) if h.users.contains(id)) {
                    return Err(one_sided("user.host", *id, u.host));
                }
                for process in &u.processes {
                    let p = expect(*process, EntityKind::Process, "user.processes")?;
                    if !matches!(&p.payload, EntityPayload::Process(pp) if pp.user == *id) {
                        return Err(one_sided("user.processes", *id, *process));
                    }
                }
            }
            EntityPayload::Process(p) => {
                let user = expect(p.user, EntityKind::User, "process.user")?;
                if !matches!(&user.payload, EntityPayload::User(u) if u.processes.contains(id)) {
                    return Err(one_sided("process.user", *id, p.user));
                }
                for participant in &p.participants {
                    let pe = expect(*participant, EntityKind::Participant, "process.participants")?;
                    if !matches!(&pe.payload, EntityPayload::Participant(pp) if pp.process == Some(*id))
                    {
                        return Err(one_sided("process.participants", *id, *participant));
                    }
                }
            }
            EntityPayload::Domain(d) => {
                for topic in &d.topics {
                    let t = expect(*topic, EntityKind::Topic, "domain.topics")?;
                    if !matches!(&t.payload, EntityPayload::Topic(tp) if tp.domain == *id) {
                        return Err(one_sided("domain.topics", *id, *topic));
                    }
                }
                for participant in &d.participants {
                    let p = expect(*participant, EntityKind::Participant, "domain.participants")?;
                    if !matches!(&p.payload, EntityPayload::Participant(pp) if pp.domain == *id) {
                        return Err(one_sided("domain.participants", *id, *participant));
                    }
                }
            }
            EntityPayload::Topic(t) => {
                let domain = expect(t.domain, EntityKind::Domain, "topic.domain")?;
                if !matches!(&domain.payload, EntityPayload::Domain(d) if d.topics.contains(id)) {
                    return Err(one_sided("topic.domain", *id, t.domain));
                }
                for reader in &t.data_readers {
                    let r = expect(*reader, EntityKind::DataReader, "topic.data_readers")?;
                    if !matches!(&r.payload, EntityPayload::DataReader(rp) if rp.topic == *id) {
                        return Err(one_sided("topic.data_readers", *id, *reader));
                    }
                }
                for writer in &t.data_writers {
                    let w = expect(*writer, EntityKind::DataWriter, "topic.data_writers")?;
                    if !matches!(&w.payload, EntityPayload::DataWriter(wp) if wp.topic == *id) {
                        return Err(one_sided("topic.data_writers", *id, *writer));
                    }
                }
            }
            EntityPayload::Participant(p) => {
                let domain = expect(p.domain, EntityKind::Domain, "participant.domain")?;
                if !matches!(&domain.payload, EntityPayload::Domain(d) if d.participants.contains(id))
                {
                    return Err(one_sided("participant.domain", *id, p.domain));
                }
                if let Some(process) = p.process {
                    let pe = expect(process, EntityKind::Process, "participant.process")?;
                    if !matches!(&pe.payload, EntityPayload::Process(pp) if pp.participants.contains(id))
                    {
                        return Err(one_sided("participant.process", *id, process));
                    }
                }
                for reader in &p.data_readers {
                    let r = expect(*reader, EntityKind::DataReader, "participant.data_readers")?;
                    if !matches!(&r.payload, EntityPayload::DataReader(rp) if rp.participant == *id)
                    {
                        return Err(one_sided("participant.data_readers", *id, *reader));
                    }
                }
                for writer in &p.data_writers {
                    let w = expect(*writer, EntityKind::DataWriter, "participant.data_writers")?;
                    if !matches!(&w.payload, EntityPayload::DataWriter(wp) if wp.participant == *id)
                    {
                        return Err(one_sided("participant.data_writers", *id, *writer));
                    }
                }
                for remote in p.data.discovered_entity.keys() {
                    if !state.entities.contains_key(remote) {
                        return Err(Error::NotFound(format!(
                            "discovered_entity: entity {}",
                            remote
                        )));
                    }
                }
            }
            EntityPayload::DataReader(r) => {
                let participant =
                    expect(r.participant, EntityKind::Participant, "reader.participant")?;
                if !matches!(&participant.payload, EntityPayload::Participant(pp) if pp.data_readers.contains(id))
                {
                    return Err(one_sided("reader.participant", *id, r.participant));
                }
                let topic = expect(r.topic, EntityKind::Topic, "reader.topic")?;
                if !matches!(&topic.payload, EntityPayload::Topic(tp) if tp.data_readers.contains(id))
                {
                    return Err(one_sided("reader.topic", *id, r.topic));
                }
                for locator in &r.locators {
                    let l = expect(*locator, EntityKind::Locator, "reader.locators")?;
                    if !matches!(&l.payload, EntityPayload::Locator(lp) if lp.data_readers.contains(id))
                    {
                        return Err(one_sided("reader.locators", *id, *locator));
                    }
                }
            }
            EntityPayload::DataWriter(w) => {
                let participant =
                    expect(w.participant, EntityKind::Participant, "writer.participant")?;
                if !matches!(&participant.payload, EntityPayload::Participant(pp) if pp.data_writers.contains(id))
                {
                    return Err(one_sided("writer.participant", *id, w.participant));
                }
                let topic = expect(w.topic, EntityKind::Topic, "writer.topic")?;
                if !matches!(&topic.payload, EntityPayload::Topic(tp) if tp.data_writers.contains(id))
                {
                    return Err(one_sided("writer.topic", *id, w.topic));
                }
                for locator in &w.locators {
                    let l = expect(*locator, EntityKind::Locator, "writer.locators")?;
                    if !matches!(&l.payload, EntityPayload::Locator(lp) if lp.data_writers.contains(id))
                    {
                        return Err(one_sided("writer.locators", *id, *locator));
                    }
                }
                for remote in w
                    .data
                    .rtps_packets_sent
                    .keys()
                    .chain(w.data.rtps_bytes_sent.keys())
                    .chain(w.data.rtps_packets_lost.keys())
                    .chain(w.data.rtps_bytes_lost.keys())
                {
                    expect(*remote, EntityKind::Locator, "writer rtps bucket")?;
                }
                for reader in w.data.history2history_latency.keys() {
                    expect(*reader, EntityKind::DataReader, "history2history_latency")?;
                }
            }
            EntityPayload::Locator(l) => {
                for reader in &l.data_readers {
                    let r = expect(*reader, EntityKind::DataReader, "locator.data_readers")?;
                    if !matches!(&r.payload, EntityPayload::DataReader(rp) if rp.locators.contains(id))
                    {
                        return Err(one_sided("locator.data_readers", *id, *reader));
                    }
                }
                for writer in &l.data_writers {
                    let w = expect(*writer, EntityKind::DataWriter, "locator.data_writers")?;
                    if !matches!(&w.payload, EntityPayload::DataWriter(wp) if wp.locators.contains(id))
                    {
                        return Err(one_sided("locator.data_writers", *id, *writer));
                    }
                }
                for remote in l.data.network_latency_per_locator.keys() {
                    expect(*remote, EntityKind::Locator, "network_latency_per_locator")?;
                }
            }
        }
    }

    for (participant, locators) in &state.locators_by_participant {
        expect(*participant, EntityKind::Participant, "locators_by_participant")?;
        for locator in locators {
            expect(*locator, EntityKind::Locator, "locators_by_participant")?;
        }
    }
    for (locator, participants) in &state.participants_by_locator {
        expect(*locator, EntityKind::Locator, "participants_by_locator")?;
        for participant in participants {
            expect(*participant, EntityKind::Participant, "participants_by_locator")?;
        }
    }
    for (process, domains) in &state.domains_by_process {
        expect(*process, EntityKind::Process, "domains_by_process")?;
        for domain in domains {
            expect(*domain, EntityKind::Domain, "domains_by_process")?;
        }
    }
    for (domain, processes) in &state.processes_by_domain {
        expect(*domain, EntityKind::Domain, "processes_by_domain")?;
        for process in processes {
            expect(*process, EntityKind::Process, "processes_by_domain")?;
        }
    }

    Ok(())
}
