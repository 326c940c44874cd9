// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Graph nodes: one [`Entity`] struct with shared base fields and a
//! per-kind payload.
//!
//! The graph owns every entity in its primary table; all relations here
//! are stored as [`EntityId`] values and resolved through that table.
//! Back-references are lookups, never ownership edges, so the topology
//! cannot form reference cycles.

use super::data::{DataReaderData, DataWriterData, LocatorData, ParticipantData};
use crate::types::{EntityId, EntityKind, Qos};
use std::collections::BTreeSet;

/// A node of the entity graph.
///
/// `alias` is a user-editable label; it defaults to `name` on creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Unique id, assigned by the graph on insert.
    pub id: EntityId,
    /// Reported name (uniqueness scope depends on the kind).
    pub name: String,
    /// User-editable label, defaults to `name`.
    pub alias: String,
    /// Kind-specific attributes, relations and statistics buckets.
    pub payload: EntityPayload,
}

/// Kind-specific part of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityPayload {
    Host(HostEntity),
    User(UserEntity),
    Process(ProcessEntity),
    Domain(DomainEntity),
    Topic(TopicEntity),
    Participant(ParticipantEntity),
    DataReader(DataReaderEntity),
    DataWriter(DataWriterEntity),
    Locator(LocatorEntity),
}

/// Physical host. Name is globally unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostEntity {
    /// Users running on this host.
    pub users: BTreeSet<EntityId>,
}

/// Host user. Name is unique within its host.
#[derive(Debug, Clone, PartialEq)]
pub struct UserEntity {
    /// Host this user belongs to.
    pub host: EntityId,
    /// Processes owned by this user.
    pub processes: BTreeSet<EntityId>,
}

/// Operating-system process. Name is unique within its user.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessEntity {
    /// PID as reported, recorded on first sighting.
    pub pid: String,
    /// User this process runs as.
    pub user: EntityId,
    /// Participants hosted by this process.
    pub participants: BTreeSet<EntityId>,
}

/// DDS domain. Name is globally unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainEntity {
    pub topics: BTreeSet<EntityId>,
    pub participants: BTreeSet<EntityId>,
}

/// Topic. Unique per (domain, name, data type).
#[derive(Debug, Clone, PartialEq)]
pub struct TopicEntity {
    /// Name of the topic's data type.
    pub data_type: String,
    /// Domain the topic lives in.
    pub domain: EntityId,
    pub data_readers: BTreeSet<EntityId>,
    pub data_writers: BTreeSet<EntityId>,
}

/// Domain participant. GUID is globally unique.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantEntity {
    pub guid: String,
    pub qos: Qos,
    /// Domain the participant joined.
    pub domain: EntityId,
    /// Hosting process; unset until physical data links it.
    pub process: Option<EntityId>,
    pub data_readers: BTreeSet<EntityId>,
    pub data_writers: BTreeSet<EntityId>,
    pub data: ParticipantData,
}

/// Data reader endpoint. GUID is unique among readers.
#[derive(Debug, Clone, PartialEq)]
pub struct DataReaderEntity {
    pub guid: String,
    pub qos: Qos,
    pub participant: EntityId,
    pub topic: EntityId,
    /// Locators this reader listens on.
    pub locators: BTreeSet<EntityId>,
    pub data: DataReaderData,
}

/// Data writer endpoint. GUID is unique among writers.
#[derive(Debug, Clone, PartialEq)]
pub struct DataWriterEntity {
    pub guid: String,
    pub qos: Qos,
    pub participant: EntityId,
    pub topic: EntityId,
    /// Locators this writer sends from.
    pub locators: BTreeSet<EntityId>,
    pub data: DataWriterData,
}

/// Transport endpoint address. Name is globally unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocatorEntity {
    pub data_readers: BTreeSet<EntityId>,
    pub data_writers: BTreeSet<EntityId>,
    pub data: LocatorData,
}

impl Entity {
    fn new(name: String, payload: EntityPayload) -> Self {
        Self {
            id: EntityId::INVALID,
            alias: name.clone(),
            name,
            payload,
        }
    }

    /// New host entity, not yet inserted.
    pub fn host(name: impl Into<String>) -> Self {
        Self::new(name.into(), EntityPayload::Host(HostEntity::default()))
    }

    /// New user entity scoped to `host`.
    pub fn user(name: impl Into<String>, host: EntityId) -> Self {
        Self::new(
            name.into(),
            EntityPayload::User(UserEntity {
                host,
                processes: BTreeSet::new(),
            }),
        )
    }

    /// New process entity scoped to `user`, with its reported pid.
    pub fn process(name: impl Into<String>, pid: impl Into<String>, user: EntityId) -> Self {
        Self::new(
            name.into(),
            EntityPayload::Process(ProcessEntity {
                pid: pid.into(),
                user,
                participants: BTreeSet::new(),
            }),
        )
    }

    /// New domain entity.
    pub fn domain(name: impl Into<String>) -> Self {
        Self::new(name.into(), EntityPayload::Domain(DomainEntity::default()))
    }

    /// New topic entity in `domain` with the given data type.
    pub fn topic(name: impl Into<String>, data_type: impl Into<String>, domain: EntityId) -> Self {
        Self::new(
            name.into(),
            EntityPayload::Topic(TopicEntity {
                data_type: data_type.into(),
                domain,
                data_readers: BTreeSet::new(),
                data_writers: BTreeSet::new(),
            }),
        )
    }

    /// New participant entity in `domain`. The process back-reference is
    /// established later by physical-data linking.
    pub fn participant(
        name: impl Into<String>,
        guid: impl Into<String>,
        qos: Qos,
        domain: EntityId,
    ) -> Self {
        Self::new(
            name.into(),
            EntityPayload::Participant(ParticipantEntity {
                guid: guid.into(),
                qos,
                domain,
                process: None,
                data_readers: BTreeSet::new(),
                data_writers: BTreeSet::new(),
                data: ParticipantData::default(),
            }),
        )
    }

    /// New data reader under `participant` on `topic`, bound to `locators`.
    pub fn data_reader(
        name: impl Into<String>,
        guid: impl Into<String>,
        qos: Qos,
        participant: EntityId,
        topic: EntityId,
        locators: BTreeSet<EntityId>,
    ) -> Self {
        Self::new(
            name.into(),
            EntityPayload::DataReader(DataReaderEntity {
                guid: guid.into(),
                qos,
                participant,
                topic,
                locators,
                data: DataReaderData::default(),
            }),
        )
    }

    /// New data writer under `participant` on `topic`, bound to `locators`.
    pub fn data_writer(
        name: impl Into<String>,
        guid: impl Into<String>,
        qos: Qos,
        participant: EntityId,
        topic: EntityId,
        locators: BTreeSet<EntityId>,
    ) -> Self {
        Self::new(
            name.into(),
            EntityPayload::DataWriter(DataWriterEntity {
                guid: guid.into(),
                qos,
                participant,
                topic,
                locators,
                data: DataWriterData::default(),
            }),
        )
    }

    /// New locator entity.
    pub fn locator(name: impl Into<String>) -> Self {
        Self::new(name.into(), EntityPayload::Locator(LocatorEntity::default()))
    }

    /// Kind discriminant of the payload.
    pub fn kind(&self) -> EntityKind {
        match &self.payload {
            EntityPayload::Host(_) => EntityKind::Host,
            EntityPayload::User(_) => EntityKind::User,
            EntityPayload::Process(_) => EntityKind::Process,
            EntityPayload::Domain(_) => EntityKind::Domain,
            EntityPayload::Topic(_) => EntityKind::Topic,
            EntityPayload::Participant(_) => EntityKind::Participant,
            EntityPayload::DataReader(_) => EntityKind::DataReader,
            EntityPayload::DataWriter(_) => EntityKind::DataWriter,
            EntityPayload::Locator(_) => EntityKind::Locator,
        }
    }

    /// GUID of a DDS entity, if the kind carries one.
    pub fn guid(&self) -> Option<&str> {
        match &self.payload {
            EntityPayload::Participant(p) => Some(&p.guid),
            EntityPayload::DataReader(r) => Some(&r.guid),
            EntityPayload::DataWriter(w) => Some(&w.guid),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_defaults_to_name() {
        let host = Entity::host("node-a");
        assert_eq!(host.name, "node-a");
        assert_eq!(host.alias, "node-a");
        assert_eq!(host.id, EntityId::INVALID);
    }

    #[test]
    fn test_kind_discriminant() {
        assert_eq!(Entity::host("h").kind(), EntityKind::Host);
        assert_eq!(Entity::user("u", EntityId::new(1)).kind(), EntityKind::User);
        assert_eq!(
            Entity::process("p", "42", EntityId::new(2)).kind(),
            EntityKind::Process
        );
        assert_eq!(Entity::domain("0").kind(), EntityKind::Domain);
        assert_eq!(Entity::locator("UDPv4:[127.0.0.1]:7400").kind(), EntityKind::Locator);
    }

    #[test]
    fn test_guid_accessor() {
        let qos = serde_json::json!({});
        let p = Entity::participant("p", "01.02|0x000001c1", qos, EntityId::new(1));
        assert_eq!(p.guid(), Some("01.02|0x000001c1"));
        assert_eq!(Entity::host("h").guid(), None);
    }
}
