// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Entity graph
//!
//! In-memory, cross-indexed database of the DDS fleet topology with
//! per-entity aggregated time series.
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                         Database                             |
//! |  RwLock<GraphState>                                          |
//! |  +--------------------+  +--------------------------------+  |
//! |  | primary index      |  | secondary indices              |  |
//! |  | id -> Entity       |  | name/guid -> id, M:N id sets   |  |
//! |  +--------------------+  +--------------------------------+  |
//! +--------------------------------------------------------------+
//! ```
//!
//! The graph owns every entity in the primary table. Cross-references
//! are `EntityId` values resolved through that table; both directions of
//! every parent/child relation are maintained together, never one
//! without the other. All mutations take the write lock, all lookups
//! and `dump_database` take the read lock.

pub mod data;
pub mod dump;
pub mod entities;

use crate::error::{Error, Result};
use crate::types::{EntityId, EntityKind};
use data::{raise_counter, ByteCountValue, CountValue, DataValue, DiscoveryValue, Sample};
use dump::DatabaseDump;
use entities::{Entity, EntityPayload};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Read, Write};

/// Shared-state backing of [`Database`]; every field is kept in
/// lock-step with the primary index by insert/link/load.
#[derive(Debug, Default)]
pub(crate) struct GraphState {
    /// Primary index. Owns every entity.
    pub(crate) entities: BTreeMap<EntityId, Entity>,
    /// Next id to issue. Ids are never reused.
    pub(crate) next_id: u64,

    pub(crate) hosts_by_name: HashMap<String, EntityId>,
    pub(crate) users_by_name: HashMap<String, Vec<EntityId>>,
    pub(crate) processes_by_name: HashMap<String, Vec<EntityId>>,
    pub(crate) domains_by_name: HashMap<String, EntityId>,
    pub(crate) topics_by_name: HashMap<String, Vec<EntityId>>,
    pub(crate) locators_by_name: HashMap<String, EntityId>,
    pub(crate) participants_by_guid: HashMap<String, EntityId>,
    pub(crate) data_readers_by_guid: HashMap<String, EntityId>,
    pub(crate) data_writers_by_guid: HashMap<String, EntityId>,

    pub(crate) locators_by_participant: BTreeMap<EntityId, BTreeSet<EntityId>>,
    pub(crate) participants_by_locator: BTreeMap<EntityId, BTreeSet<EntityId>>,
    pub(crate) domains_by_process: BTreeMap<EntityId, BTreeSet<EntityId>>,
    pub(crate) processes_by_domain: BTreeMap<EntityId, BTreeSet<EntityId>>,
}

impl GraphState {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    fn get(&self, id: EntityId) -> Result<&Entity> {
        self.entities
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("entity {}", id)))
    }

    fn ensure_kind(&self, id: EntityId, kind: EntityKind) -> Result<&Entity> {
        let entity = self.get(id)?;
        if entity.kind() != kind {
            return Err(Error::BadParameter(format!(
                "entity {} is {}, expected {}",
                id,
                entity.kind(),
                kind
            )));
        }
        Ok(entity)
    }

    /// Domain an entity reports in name/guid lookups. Non-DDS kinds get
    /// the invalid sentinel, domains report themselves.
    pub(crate) fn domain_of(&self, entity: &Entity) -> EntityId {
        match &entity.payload {
            EntityPayload::Domain(_) => entity.id,
            EntityPayload::Topic(t) => t.domain,
            EntityPayload::Participant(p) => p.domain,
            EntityPayload::DataReader(r) => self.participant_domain(r.participant),
            EntityPayload::DataWriter(w) => self.participant_domain(w.participant),
            _ => EntityId::INVALID,
        }
    }

    fn participant_domain(&self, participant: EntityId) -> EntityId {
        match self.entities.get(&participant).map(|e| &e.payload) {
            Some(EntityPayload::Participant(p)) => p.domain,
            _ => EntityId::INVALID,
        }
    }

    fn check_unique(&self, entity: &Entity) -> Result<()> {
        match &entity.payload {
            EntityPayload::Host(_) => {
                if self.hosts_by_name.contains_key(&entity.name) {
                    return Err(Error::Duplicate(format!("host {}", entity.name)));
                }
            }
            EntityPayload::User(u) => {
                self.ensure_kind(u.host, EntityKind::Host)?;
                for id in self.users_by_name.get(&entity.name).into_iter().flatten() {
                    if let Some(EntityPayload::User(existing)) =
                        self.entities.get(id).map(|e| &e.payload)
                    {
                        if existing.host == u.host {
                            return Err(Error::Duplicate(format!(
                                "user {} on host {}",
                                entity.name, u.host
                            )));
                        }
                    }
                }
            }
            EntityPayload::Process(p) => {
                self.ensure_kind(p.user, EntityKind::User)?;
                for id in self
                    .processes_by_name
                    .get(&entity.name)
                    .into_iter()
                    .flatten()
                {
                    if let Some(EntityPayload::Process(existing)) =
                        self.entities.get(id).map(|e| &e.payload)
                    {
                        if existing.user == p.user {
                            return Err(Error::Duplicate(format!(
                                "process {} for user {}",
                                entity.name, p.user
                            )));
                        }
                    }
                }
            }
            EntityPayload::Domain(_) => {
                if self.domains_by_name.contains_key(&entity.name) {
                    return Err(Error::Duplicate(format!("domain {}", entity.name)));
                }
            }
            EntityPayload::Topic(t) => {
                self.ensure_kind(t.domain, EntityKind::Domain)?;
                for id in self.topics_by_name.get(&entity.name).into_iter().flatten() {
                    if let Some(EntityPayload::Topic(existing)) =
                        self.entities.get(id).map(|e| &e.payload)
                    {
                        if existing.domain == t.domain && existing.data_type == t.data_type {
                            return Err(Error::Duplicate(format!(
                                "topic {} <{}> in domain {}",
                                entity.name, t.data_type, t.domain
                            )));
                        }
                    }
                }
            }
            EntityPayload::Participant(p) => {
                self.ensure_kind(p.domain, EntityKind::Domain)?;
                if self.participants_by_guid.contains_key(&p.guid) {
                    return Err(Error::Duplicate(format!("participant {}", p.guid)));
                }
            }
            EntityPayload::DataReader(r) => {
                self.check_endpoint(&r.guid, r.participant, r.topic, &r.locators)?;
                if self.data_readers_by_guid.contains_key(&r.guid) {
                    return Err(Error::Duplicate(format!("datareader {}", r.guid)));
                }
            }
            EntityPayload::DataWriter(w) => {
                self.check_endpoint(&w.guid, w.participant, w.topic, &w.locators)?;
                if self.data_writers_by_guid.contains_key(&w.guid) {
                    return Err(Error::Duplicate(format!("datawriter {}", w.guid)));
                }
            }
            EntityPayload::Locator(_) => {
                if self.locators_by_name.contains_key(&entity.name) {
                    return Err(Error::Duplicate(format!("locator {}", entity.name)));
                }
            }
        }
        Ok(())
    }

    fn check_endpoint(
        &self,
        guid: &str,
        participant: EntityId,
        topic: EntityId,
        locators: &BTreeSet<EntityId>,
    ) -> Result<()> {
        let participant_entity = self.ensure_kind(participant, EntityKind::Participant)?;
        let participant_domain = match &participant_entity.payload {
            EntityPayload::Participant(p) => p.domain,
            _ => EntityId::INVALID,
        };
        let topic_entity = self.ensure_kind(topic, EntityKind::Topic)?;
        if let EntityPayload::Topic(t) = &topic_entity.payload {
            if t.domain != participant_domain {
                return Err(Error::BadParameter(format!(
                    "endpoint {}: topic domain {} differs from participant domain {}",
                    guid, t.domain, participant_domain
                )));
            }
        }
        for locator in locators {
            self.ensure_kind(*locator, EntityKind::Locator)?;
        }
        Ok(())
    }

    /// Insert a new entity, wiring both directions of every relation and
    /// every secondary index it participates in.
    pub(crate) fn insert_entity(&mut self, mut entity: Entity) -> Result<EntityId> {
        self.check_unique(&entity)?;

        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        entity.id = id;
        let name = entity.name.clone();
        let parent = match &entity.payload {
            EntityPayload::User(u) => Some(u.host),
            EntityPayload::Process(p) => Some(p.user),
            EntityPayload::Topic(t) => Some(t.domain),
            EntityPayload::Participant(p) => Some(p.domain),
            _ => None,
        };
        let endpoint_refs = match &entity.payload {
            EntityPayload::DataReader(r) => {
                Some((r.participant, r.topic, r.locators.clone(), EntityKind::DataReader))
            }
            EntityPayload::DataWriter(w) => {
                Some((w.participant, w.topic, w.locators.clone(), EntityKind::DataWriter))
            }
            _ => None,
        };

        // Secondary name/guid indices.
        match &entity.payload {
            EntityPayload::Host(_) => {
                self.hosts_by_name.insert(name.clone(), id);
            }
            EntityPayload::User(_) => {
                self.users_by_name.entry(name.clone()).or_default().push(id);
            }
            EntityPayload::Process(_) => {
                self.processes_by_name
                    .entry(name.clone())
                    .or_default()
                    .push(id);
            }
            EntityPayload::Domain(_) => {
                self.domains_by_name.insert(name.clone(), id);
            }
            EntityPayload::Topic(_) => {
                self.topics_by_name.entry(name.clone()).or_default().push(id);
            }
            EntityPayload::Participant(p) => {
                self.participants_by_guid.insert(p.guid.clone(), id);
            }
            EntityPayload::DataReader(r) => {
                self.data_readers_by_guid.insert(r.guid.clone(), id);
            }
            EntityPayload::DataWriter(w) => {
                self.data_writers_by_guid.insert(w.guid.clone(), id);
            }
            EntityPayload::Locator(_) => {
                self.locators_by_name.insert(name.clone(), id);
            }
        }

        self.entities.insert(id, entity);

        // Parent-side back-references.
        if let Some(parent) = parent {
            self.wire_child(parent, id);
        }
        if let Some((participant, topic, locators, kind)) = endpoint_refs {
            self.wire_endpoint_kind(participant, topic, kind, id);
            for locator in locators {
                self.wire_endpoint_locator(locator, kind, id);
                self.participants_by_locator
                    .entry(locator)
                    .or_default()
                    .insert(participant);
                self.locators_by_participant
                    .entry(participant)
                    .or_default()
                    .insert(locator);
            }
        }

        Ok(id)
    }

    fn wire_child(&mut self, parent: EntityId, child: EntityId) {
        let child_kind = match self.entities.get(&child) {
            Some(e) => e.kind(),
            None => return,
        };
        let Some(entity) = self.entities.get_mut(&parent) else {
            return;
        };
        match (&mut entity.payload, child_kind) {
            (EntityPayload::Host(h), EntityKind::User) => {
                h.users.insert(child);
            }
            (EntityPayload::User(u), EntityKind::Process) => {
                u.processes.insert(child);
            }
            (EntityPayload::Domain(d), EntityKind::Topic) => {
                d.topics.insert(child);
            }
            (EntityPayload::Domain(d), EntityKind::Participant) => {
                d.participants.insert(child);
            }
            _ => {}
        }
    }

    fn wire_endpoint_kind(
        &mut self,
        participant: EntityId,
        topic: EntityId,
        kind: EntityKind,
        endpoint: EntityId,
    ) {
        if let Some(entity) = self.entities.get_mut(&participant) {
            if let EntityPayload::Participant(p) = &mut entity.payload {
                match kind {
                    EntityKind::DataReader => {
                        p.data_readers.insert(endpoint);
                    }
                    EntityKind::DataWriter => {
                        p.data_writers.insert(endpoint);
                    }
                    _ => {}
                }
            }
        }
        if let Some(entity) = self.entities.get_mut(&topic) {
            if let EntityPayload::Topic(t) = &mut entity.payload {
                match kind {
                    EntityKind::DataReader => {
                        t.data_readers.insert(endpoint);
                    }
                    EntityKind::DataWriter => {
                        t.data_writers.insert(endpoint);
                    }
                    _ => {}
                }
            }
        }
    }

    fn wire_endpoint_locator(&mut self, locator: EntityId, kind: EntityKind, endpoint: EntityId) {
        if let Some(entity) = self.entities.get_mut(&locator) {
            if let EntityPayload::Locator(l) = &mut entity.payload {
                match kind {
                    EntityKind::DataReader => {
                        l.data_readers.insert(endpoint);
                    }
                    EntityKind::DataWriter => {
                        l.data_writers.insert(endpoint);
                    }
                    _ => {}
                }
            }
        }
    }

    pub(crate) fn link_participant_with_process(
        &mut self,
        participant_id: EntityId,
        process_id: EntityId,
    ) -> Result<()> {
        let participant = self.ensure_kind(participant_id, EntityKind::Participant)?;
        let (domain, current_process) = match &participant.payload {
            EntityPayload::Participant(p) => (p.domain, p.process),
            _ => (EntityId::INVALID, None),
        };
        self.ensure_kind(process_id, EntityKind::Process)?;

        match current_process {
            Some(existing) if existing == process_id => return Ok(()),
            Some(existing) => {
                return Err(Error::Duplicate(format!(
                    "participant {} already linked to process {}",
                    participant_id, existing
                )));
            }
            None => {}
        }

        if let Some(entity) = self.entities.get_mut(&participant_id) {
            if let EntityPayload::Participant(p) = &mut entity.payload {
                p.process = Some(process_id);
            }
        }
        if let Some(entity) = self.entities.get_mut(&process_id) {
            if let EntityPayload::Process(p) = &mut entity.payload {
                p.participants.insert(participant_id);
            }
        }
        self.domains_by_process
            .entry(process_id)
            .or_default()
            .insert(domain);
        self.processes_by_domain
            .entry(domain)
            .or_default()
            .insert(process_id);
        Ok(())
    }

    pub(crate) fn entities_by_guid(
        &self,
        kind: EntityKind,
        guid: &str,
    ) -> Result<Vec<(EntityId, EntityId)>> {
        let index = match kind {
            EntityKind::Participant => &self.participants_by_guid,
            EntityKind::DataReader => &self.data_readers_by_guid,
            EntityKind::DataWriter => &self.data_writers_by_guid,
            _ => {
                return Err(Error::BadParameter(format!(
                    "kind {} does not carry a GUID",
                    kind
                )));
            }
        };
        Ok(index
            .get(guid)
            .and_then(|id| self.entities.get(id))
            .map(|e| vec![(self.domain_of(e), e.id)])
            .unwrap_or_default())
    }

    pub(crate) fn entities_by_name(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> Result<Vec<(EntityId, EntityId)>> {
        let single = |id: Option<&EntityId>| -> Vec<(EntityId, EntityId)> {
            id.map(|id| vec![(EntityId::INVALID, *id)]).unwrap_or_default()
        };
        let many = |ids: Option<&Vec<EntityId>>| -> Vec<(EntityId, EntityId)> {
            ids.map(|ids| ids.iter().map(|id| (EntityId::INVALID, *id)).collect())
                .unwrap_or_default()
        };
        Ok(match kind {
            EntityKind::Host => single(self.hosts_by_name.get(name)),
            EntityKind::User => many(self.users_by_name.get(name)),
            EntityKind::Process => many(self.processes_by_name.get(name)),
            EntityKind::Locator => single(self.locators_by_name.get(name)),
            EntityKind::Domain => self
                .domains_by_name
                .get(name)
                .map(|id| vec![(*id, *id)])
                .unwrap_or_default(),
            EntityKind::Topic => self
                .topics_by_name
                .get(name)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| self.entities.get(id))
                        .map(|e| (self.domain_of(e), e.id))
                        .collect()
                })
                .unwrap_or_default(),
            EntityKind::Participant | EntityKind::DataReader | EntityKind::DataWriter => self
                .entities
                .values()
                .filter(|e| e.kind() == kind && e.name == name)
                .map(|e| (self.domain_of(e), e.id))
                .collect(),
            EntityKind::Invalid => {
                return Err(Error::BadParameter("cannot look up INVALID kind".to_string()));
            }
        })
    }

    pub(crate) fn insert_sample(
        &mut self,
        domain_id: EntityId,
        entity_id: EntityId,
        sample: Sample,
    ) -> Result<()> {
        let entity = self.get(entity_id)?;
        let expected = sample.target_kind();
        if entity.kind() != expected {
            return Err(Error::BadParameter(format!(
                "sample targets {}, entity {} is {}",
                expected,
                entity_id,
                entity.kind()
            )));
        }
        if expected.has_guid() {
            let domain = self.domain_of(entity);
            if domain != domain_id {
                return Err(Error::BadParameter(format!(
                    "entity {} belongs to domain {}, not {}",
                    entity_id, domain, domain_id
                )));
            }
        }
        for referenced in sample.referenced_ids() {
            self.get(referenced)?;
        }

        // Checks done; select the bucket by variant and append.
        let Some(entity) = self.entities.get_mut(&entity_id) else {
            return Err(Error::NotFound(format!("entity {}", entity_id)));
        };
        match (&mut entity.payload, sample) {
            (
                EntityPayload::DataWriter(w),
                Sample::HistoryLatency {
                    src_ts,
                    data,
                    reader,
                },
            ) => {
                w.data
                    .history2history_latency
                    .entry(reader)
                    .or_default()
                    .push(DataValue { src_ts, value: data });
            }
            (
                EntityPayload::Locator(l),
                Sample::NetworkLatency {
                    src_ts,
                    data,
                    remote_locator,
                },
            ) => {
                l.data
                    .network_latency_per_locator
                    .entry(remote_locator)
                    .or_default()
                    .push(DataValue { src_ts, value: data });
            }
            (EntityPayload::DataWriter(w), Sample::PublicationThroughput { src_ts, data }) => {
                w.data
                    .publication_throughput
                    .push(DataValue { src_ts, value: data });
            }
            (EntityPayload::DataReader(r), Sample::SubscriptionThroughput { src_ts, data }) => {
                r.data
                    .subscription_throughput
                    .push(DataValue { src_ts, value: data });
            }
            (
                EntityPayload::DataWriter(w),
                Sample::RtpsPacketsSent {
                    src_ts,
                    count,
                    remote_locator,
                },
            ) => {
                w.data
                    .rtps_packets_sent
                    .entry(remote_locator)
                    .or_default()
                    .push(CountValue { src_ts, count });
                raise_counter(
                    w.data
                        .last_reported_rtps_packets_sent
                        .entry(remote_locator)
                        .or_insert(0),
                    count,
                );
            }
            (
                EntityPayload::DataWriter(w),
                Sample::RtpsBytesSent {
                    src_ts,
                    count,
                    magnitude_order,
                    remote_locator,
                },
            ) => {
                w.data
                    .rtps_bytes_sent
                    .entry(remote_locator)
                    .or_default()
                    .push(ByteCountValue {
                        src_ts,
                        count,
                        magnitude_order,
                    });
                raise_counter(
                    w.data
                        .last_reported_rtps_bytes_sent
                        .entry(remote_locator)
                        .or_insert(0),
                    count,
                );
            }
            (
                EntityPayload::DataWriter(w),
                Sample::RtpsPacketsLost {
                    src_ts,
                    count,
                    remote_locator,
                },
            ) => {
                w.data
                    .rtps_packets_lost
                    .entry(remote_locator)
                    .or_default()
                    .push(CountValue { src_ts, count });
                raise_counter(
                    w.data
                        .last_reported_rtps_packets_lost
                        .entry(remote_locator)
                        .or_insert(0),
                    count,
                );
            }
            (
                EntityPayload::DataWriter(w),
                Sample::RtpsBytesLost {
                    src_ts,
                    count,
                    magnitude_order,
                    remote_locator,
                },
            ) => {
                w.data
                    .rtps_bytes_lost
                    .entry(remote_locator)
                    .or_default()
                    .push(ByteCountValue {
                        src_ts,
                        count,
                        magnitude_order,
                    });
                raise_counter(
                    w.data
                        .last_reported_rtps_bytes_lost
                        .entry(remote_locator)
                        .or_insert(0),
                    count,
                );
            }
            (EntityPayload::DataWriter(w), Sample::ResentDatas { src_ts, count }) => {
                w.data.resent_datas.push(CountValue { src_ts, count });
                raise_counter(&mut w.data.last_reported_resent_datas, count);
            }
            (EntityPayload::DataWriter(w), Sample::HeartbeatCount { src_ts, count }) => {
                w.data.heartbeat_count.push(CountValue { src_ts, count });
                raise_counter(&mut w.data.last_reported_heartbeat_count, count);
            }
            (EntityPayload::DataWriter(w), Sample::GapCount { src_ts, count }) => {
                w.data.gap_count.push(CountValue { src_ts, count });
                raise_counter(&mut w.data.last_reported_gap_count, count);
            }
            (EntityPayload::DataWriter(w), Sample::DataCount { src_ts, count }) => {
                w.data.data_count.push(CountValue { src_ts, count });
                raise_counter(&mut w.data.last_reported_data_count, count);
            }
            (EntityPayload::DataReader(r), Sample::AcknackCount { src_ts, count }) => {
                r.data.acknack_count.push(CountValue { src_ts, count });
                raise_counter(&mut r.data.last_reported_acknack_count, count);
            }
            (EntityPayload::DataReader(r), Sample::NackfragCount { src_ts, count }) => {
                r.data.nackfrag_count.push(CountValue { src_ts, count });
                raise_counter(&mut r.data.last_reported_nackfrag_count, count);
            }
            (EntityPayload::Participant(p), Sample::PdpPackets { src_ts, count }) => {
                p.data.pdp_packets.push(CountValue { src_ts, count });
                raise_counter(&mut p.data.last_reported_pdp_packets, count);
            }
            (EntityPayload::Participant(p), Sample::EdpPackets { src_ts, count }) => {
                p.data.edp_packets.push(CountValue { src_ts, count });
                raise_counter(&mut p.data.last_reported_edp_packets, count);
            }
            (
                EntityPayload::Participant(p),
                Sample::DiscoveryTime {
                    src_ts,
                    time,
                    remote_entity,
                },
            ) => {
                p.data
                    .discovered_entity
                    .entry(remote_entity)
                    .or_default()
                    .push(DiscoveryValue {
                        src_ts,
                        time,
                        remote_entity,
                    });
            }
            (
                EntityPayload::DataWriter(w),
                Sample::SampleDatas {
                    src_ts,
                    count,
                    sequence_number,
                },
            ) => {
                w.data
                    .sample_datas
                    .entry(sequence_number)
                    .or_default()
                    .push(CountValue { src_ts, count });
            }
            (_, sample) => {
                // Unreachable after the kind check above; fail loud anyway.
                return Err(Error::BadParameter(format!(
                    "sample {:?} does not match entity {}",
                    sample, entity_id
                )));
            }
        }
        Ok(())
    }
}

/// The statistics database: entity graph plus aggregated time series,
/// protected by a single readers-writer lock.
#[derive(Debug)]
pub struct Database {
    state: RwLock<GraphState>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// Empty database; first issued id is 1.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GraphState::new()),
        }
    }

    /// Insert a new entity.
    ///
    /// Validates the scope-uniqueness rule of the entity's kind (hosts
    /// globally by name, users per host, processes per user, topics per
    /// (domain, name, type), locators by name, DDS entities by GUID) and
    /// the liveness of every referenced entity. On success assigns a
    /// fresh id, registers the entity in the primary and every secondary
    /// index, and wires back-references on both endpoints.
    ///
    /// # Errors
    /// - `Duplicate` if scope uniqueness would be violated (no mutation).
    /// - `NotFound` / `BadParameter` if a referenced entity is missing or
    ///   of the wrong kind.
    pub fn insert(&self, entity: Entity) -> Result<EntityId> {
        self.state.write().insert_entity(entity)
    }

    /// Establish the participant->process link and the process<->domain
    /// M:N relation it implies. Idempotent for the same pair.
    ///
    /// # Errors
    /// `Duplicate` if the participant is already linked to a different
    /// process; `NotFound`/`BadParameter` if either id is missing or of
    /// the wrong kind.
    pub fn link_participant_with_process(
        &self,
        participant_id: EntityId,
        process_id: EntityId,
    ) -> Result<()> {
        self.state
            .write()
            .link_participant_with_process(participant_id, process_id)
    }

    /// Clone of the entity with the given id.
    pub fn get_entity(&self, id: EntityId) -> Result<Entity> {
        self.state.read().get(id).cloned()
    }

    /// Replace the user-editable alias of an entity.
    pub fn set_alias(&self, id: EntityId, alias: impl Into<String>) -> Result<()> {
        let mut state = self.state.write();
        state.get(id)?;
        if let Some(entity) = state.entities.get_mut(&id) {
            entity.alias = alias.into();
        }
        Ok(())
    }

    /// Kind of the entity with the given id.
    pub fn get_entity_kind(&self, id: EntityId) -> Result<EntityKind> {
        Ok(self.state.read().get(id)?.kind())
    }

    /// All `(domain_id, entity_id)` pairs whose GUID matches.
    ///
    /// GUIDs are globally unique per kind, so at most one pair is
    /// returned today; the shape accommodates future disambiguation.
    pub fn get_entities_by_guid(
        &self,
        kind: EntityKind,
        guid: &str,
    ) -> Result<Vec<(EntityId, EntityId)>> {
        self.state.read().entities_by_guid(kind, guid)
    }

    /// All `(domain_id, entity_id)` pairs whose name matches. Non-DDS
    /// kinds report [`EntityId::INVALID`] as domain.
    pub fn get_entities_by_name(
        &self,
        kind: EntityKind,
        name: &str,
    ) -> Result<Vec<(EntityId, EntityId)>> {
        self.state.read().entities_by_name(kind, name)
    }

    /// Append a typed sample to the bucket selected by its variant.
    ///
    /// # Errors
    /// `NotFound` if the entity or any referenced remote id is absent;
    /// `BadParameter` if the entity kind does not match the sample
    /// variant or the domain does not match.
    pub fn insert_sample(
        &self,
        domain_id: EntityId,
        entity_id: EntityId,
        sample: Sample,
    ) -> Result<()> {
        self.state.write().insert_sample(domain_id, entity_id, sample)
    }

    /// Full serializable snapshot of the graph and all time series.
    pub fn dump_database(&self) -> DatabaseDump {
        dump::dump_state(&self.state.read())
    }

    /// Replace the current state with a snapshot.
    ///
    /// Ids are restored exactly as recorded, so a dump->load->dump cycle
    /// is bit-identical. The current state is untouched if the snapshot
    /// fails validation.
    pub fn load_database(&self, dump: &DatabaseDump) -> Result<()> {
        let state = dump::restore_state(dump)?;
        *self.state.write() = state;
        Ok(())
    }

    /// Next id that would be issued.
    pub fn next_id(&self) -> EntityId {
        EntityId::new(self.state.read().next_id)
    }

    /// Number of entities in the graph.
    pub fn entity_count(&self) -> usize {
        self.state.read().entities.len()
    }

    /// Serialize a snapshot as JSON into `writer`.
    pub fn dump_to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let dump = self.dump_database();
        serde_json::to_writer(writer, &dump)?;
        Ok(())
    }

    /// Load a snapshot from JSON read from `reader`.
    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<()> {
        let dump: DatabaseDump = serde_json::from_reader(reader)?;
        self.load_database(&dump)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty_qos() -> crate::types::Qos {
        json!({})
    }

    /// host -> user -> process, domain -> topic -> participant with one
    /// writer, one reader and one locator.
    fn populate(db: &Database) -> BTreeMap<&'static str, EntityId> {
        let mut ids = BTreeMap::new();
        ids.insert("host", db.insert(Entity::host("h1")).expect("insert host"));
        ids.insert(
            "user",
            db.insert(Entity::user("u1", ids["host"])).expect("insert user"),
        );
        ids.insert(
            "process",
            db.insert(Entity::process("proc", "42", ids["user"]))
                .expect("insert process"),
        );
        ids.insert("domain", db.insert(Entity::domain("0")).expect("insert domain"));
        ids.insert(
            "topic",
            db.insert(Entity::topic("rt/chatter", "std_msgs::String", ids["domain"]))
                .expect("insert topic"),
        );
        ids.insert(
            "locator",
            db.insert(Entity::locator("UDPv4:[192.168.1.4]:7412"))
                .expect("insert locator"),
        );
        ids.insert(
            "participant",
            db.insert(Entity::participant(
                "participant_0",
                "01.0f.00.00.00.00.00.00.00.00.00.01|0x000001c1",
                empty_qos(),
                ids["domain"],
            ))
            .expect("insert participant"),
        );
        let locators: BTreeSet<EntityId> = [ids["locator"]].into_iter().collect();
        ids.insert(
            "writer",
            db.insert(Entity::data_writer(
                "writer_0",
                "01.0f.00.00.00.00.00.00.00.00.00.01|0x00000002",
                empty_qos(),
                ids["participant"],
                ids["topic"],
                locators.clone(),
            ))
            .expect("insert writer"),
        );
        ids.insert(
            "reader",
            db.insert(Entity::data_reader(
                "reader_0",
                "01.0f.00.00.00.00.00.00.00.00.00.01|0x00000007",
                empty_qos(),
                ids["participant"],
                ids["topic"],
                locators,
            ))
            .expect("insert reader"),
        );
        ids
    }

    #[test]
    fn test_insert_assigns_monotonic_ids() {
        let db = Database::new();
        let a = db.insert(Entity::host("h1")).expect("first host");
        let b = db.insert(Entity::host("h2")).expect("second host");
        assert_eq!(a, EntityId::new(1));
        assert_eq!(b, EntityId::new(2));
        assert_eq!(db.next_id(), EntityId::new(3));
    }

    #[test]
    fn test_insert_host_twice_is_duplicate() {
        let db = Database::new();
        db.insert(Entity::host("h1")).expect("first insert");
        let before = db.entity_count();

        match db.insert(Entity::host("h1")) {
            Err(Error::Duplicate(_)) => {}
            other => panic!("expected Duplicate, got {:?}", other),
        }
        assert_eq!(db.entity_count(), before);
    }

    #[test]
    fn test_user_uniqueness_is_scoped_to_host() {
        let db = Database::new();
        let h1 = db.insert(Entity::host("h1")).expect("host h1");
        let h2 = db.insert(Entity::host("h2")).expect("host h2");

        db.insert(Entity::user("alice", h1)).expect("alice on h1");
        // Same name on another host is fine.
        db.insert(Entity::user("alice", h2)).expect("alice on h2");
        // Same name on the same host is not.
        assert!(matches!(
            db.insert(Entity::user("alice", h1)),
            Err(Error::Duplicate(_))
        ));
    }

    #[test]
    fn test_insert_user_with_missing_host_fails() {
        let db = Database::new();
        assert!(matches!(
            db.insert(Entity::user("alice", EntityId::new(99))),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_insert_user_with_wrong_kind_parent_fails() {
        let db = Database::new();
        let domain = db.insert(Entity::domain("0")).expect("domain");
        assert!(matches!(
            db.insert(Entity::user("alice", domain)),
            Err(Error::BadParameter(_))
        ));
    }

    #[test]
    fn test_topic_uniqueness_includes_data_type() {
        let db = Database::new();
        let domain = db.insert(Entity::domain("0")).expect("domain");
        db.insert(Entity::topic("t", "TypeA", domain)).expect("first");
        // Same name, different type: allowed.
        db.insert(Entity::topic("t", "TypeB", domain))
            .expect("same name different type");
        assert!(matches!(
            db.insert(Entity::topic("t", "TypeA", domain)),
            Err(Error::Duplicate(_))
        ));
    }

    #[test]
    fn test_back_references_are_wired_both_ways() {
        let db = Database::new();
        let ids = populate(&db);

        let host = db.get_entity(ids["host"]).expect("host");
        if let EntityPayload::Host(h) = &host.payload {
            assert!(h.users.contains(&ids["user"]));
        } else {
            panic!("wrong payload");
        }

        let topic = db.get_entity(ids["topic"]).expect("topic");
        if let EntityPayload::Topic(t) = &topic.payload {
            assert!(t.data_writers.contains(&ids["writer"]));
            assert!(t.data_readers.contains(&ids["reader"]));
        } else {
            panic!("wrong payload");
        }

        let locator = db.get_entity(ids["locator"]).expect("locator");
        if let EntityPayload::Locator(l) = &locator.payload {
            assert!(l.data_writers.contains(&ids["writer"]));
            assert!(l.data_readers.contains(&ids["reader"]));
        } else {
            panic!("wrong payload");
        }
    }

    #[test]
    fn test_endpoint_insert_updates_locator_mn_indices() {
        let db = Database::new();
        let ids = populate(&db);

        let dump = db.dump_database();
        let p_key = ids["participant"].to_string();
        let l_key = ids["locator"].to_string();
        assert_eq!(
            dump.locators_by_participant.get(&p_key),
            Some(&vec![ids["locator"]])
        );
        assert_eq!(
            dump.participants_by_locator.get(&l_key),
            Some(&vec![ids["participant"]])
        );
    }

    #[test]
    fn test_lookup_by_guid() {
        let db = Database::new();
        let ids = populate(&db);

        let found = db
            .get_entities_by_guid(
                EntityKind::DataWriter,
                "01.0f.00.00.00.00.00.00.00.00.00.01|0x00000002",
            )
            .expect("guid lookup");
        assert_eq!(found, vec![(ids["domain"], ids["writer"])]);

        let missing = db
            .get_entities_by_guid(EntityKind::DataWriter, "ff.ff|0x0")
            .expect("guid lookup");
        assert!(missing.is_empty());

        assert!(matches!(
            db.get_entities_by_guid(EntityKind::Host, "x"),
            Err(Error::BadParameter(_))
        ));
    }

    #[test]
    fn test_lookup_by_name_domain_sentinel() {
        let db = Database::new();
        let ids = populate(&db);

        let hosts = db
            .get_entities_by_name(EntityKind::Host, "h1")
            .expect("host lookup");
        assert_eq!(hosts, vec![(EntityId::INVALID, ids["host"])]);

        let topics = db
            .get_entities_by_name(EntityKind::Topic, "rt/chatter")
            .expect("topic lookup");
        assert_eq!(topics, vec![(ids["domain"], ids["topic"])]);
    }

    #[test]
    fn test_link_participant_with_process_idempotent() {
        let db = Database::new();
        let ids = populate(&db);

        db.link_participant_with_process(ids["participant"], ids["process"])
            .expect("first link");
        let dump_once = db.dump_database();

        db.link_participant_with_process(ids["participant"], ids["process"])
            .expect("second link");
        let dump_twice = db.dump_database();

        assert_eq!(dump_once.domains_by_process, dump_twice.domains_by_process);
        assert_eq!(dump_once.processes_by_domain, dump_twice.processes_by_domain);
    }

    #[test]
    fn test_link_to_second_process_is_duplicate() {
        let db = Database::new();
        let ids = populate(&db);
        let other = db
            .insert(Entity::process("other", "43", ids["user"]))
            .expect("second process");

        db.link_participant_with_process(ids["participant"], ids["process"])
            .expect("link");
        assert!(matches!(
            db.link_participant_with_process(ids["participant"], other),
            Err(Error::Duplicate(_))
        ));
    }

    #[test]
    fn test_set_alias() {
        let db = Database::new();
        let ids = populate(&db);

        db.set_alias(ids["host"], "rack-4 node").expect("set alias");
        let host = db.get_entity(ids["host"]).expect("host");
        assert_eq!(host.alias, "rack-4 node");
        assert_eq!(host.name, "h1");

        assert!(matches!(
            db.set_alias(EntityId::new(999), "x"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_insert_sample_kind_mismatch() {
        let db = Database::new();
        let ids = populate(&db);

        let sample = Sample::AcknackCount { src_ts: 1, count: 1 };
        assert!(matches!(
            db.insert_sample(ids["domain"], ids["writer"], sample),
            Err(Error::BadParameter(_))
        ));
    }

    #[test]
    fn test_insert_sample_missing_entity() {
        let db = Database::new();
        let ids = populate(&db);

        let sample = Sample::DataCount { src_ts: 1, count: 1 };
        assert!(matches!(
            db.insert_sample(ids["domain"], EntityId::new(999), sample),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_insert_sample_missing_reference() {
        let db = Database::new();
        let ids = populate(&db);

        let sample = Sample::HistoryLatency {
            src_ts: 1,
            data: 0.5,
            reader: EntityId::new(999),
        };
        assert!(matches!(
            db.insert_sample(ids["domain"], ids["writer"], sample),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_last_reported_counter_monotone() {
        let db = Database::new();
        let ids = populate(&db);

        for (ts, count) in [(1u64, 10u64), (2, 17), (3, 5)] {
            db.insert_sample(
                ids["domain"],
                ids["writer"],
                Sample::HeartbeatCount { src_ts: ts, count },
            )
            .expect("heartbeat sample");
        }

        let writer = db.get_entity(ids["writer"]).expect("writer");
        if let EntityPayload::DataWriter(w) = &writer.payload {
            assert_eq!(w.data.heartbeat_count.len(), 3);
            // 5 < 17: the regression is kept in the series but does not
            // lower the cumulative counter.
            assert_eq!(w.data.last_reported_heartbeat_count, 17);
        } else {
            panic!("wrong payload");
        }
    }

    #[test]
    fn test_rtps_samples_keyed_by_locator() {
        let db = Database::new();
        let ids = populate(&db);

        db.insert_sample(
            ids["domain"],
            ids["writer"],
            Sample::RtpsPacketsSent {
                src_ts: 1,
                count: 10,
                remote_locator: ids["locator"],
            },
        )
        .expect("packets sample");
        db.insert_sample(
            ids["domain"],
            ids["writer"],
            Sample::RtpsBytesSent {
                src_ts: 1,
                count: 4096,
                magnitude_order: 0,
                remote_locator: ids["locator"],
            },
        )
        .expect("bytes sample");

        let writer = db.get_entity(ids["writer"]).expect("writer");
        if let EntityPayload::DataWriter(w) = &writer.payload {
            assert_eq!(w.data.rtps_packets_sent[&ids["locator"]].len(), 1);
            assert_eq!(w.data.last_reported_rtps_packets_sent[&ids["locator"]], 10);
            assert_eq!(w.data.rtps_bytes_sent[&ids["locator"]][0].count, 4096);
        } else {
            panic!("wrong payload");
        }
    }

    #[test]
    fn test_every_index_id_resolves() {
        let db = Database::new();
        let ids = populate(&db);
        db.link_participant_with_process(ids["participant"], ids["process"])
            .expect("link");

        let dump = db.dump_database();
        let all_sections = dump
            .locators_by_participant
            .iter()
            .chain(dump.participants_by_locator.iter())
            .chain(dump.domains_by_process.iter())
            .chain(dump.processes_by_domain.iter());
        for (key, targets) in all_sections {
            let id = EntityId::new(key.parse::<u64>().expect("numeric key"));
            db.get_entity(id).expect("index key resolves");
            for target in targets {
                db.get_entity(*target).expect("index target resolves");
            }
        }
    }
}
