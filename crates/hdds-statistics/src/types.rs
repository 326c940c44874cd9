// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Identifier types shared by the entity graph and the ingestion pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source timestamp in nanoseconds since the Unix epoch.
pub type Timestamp = u64;

/// Opaque Quality of Service document attached to DDS entities.
///
/// The backend does not interpret QoS policies; it stores the tree as
/// reported and round-trips it through snapshots.
pub type Qos = serde_json::Value;

/// Unique identifier of a graph entity.
///
/// Ids are issued monotonically by the graph on insert and are never
/// reused. `EntityId::INVALID` (0) is reserved and never issued; it doubles
/// as the "no domain" sentinel in name lookups for non-DDS entity kinds.
#[derive(
    Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Reserved invalid id, never issued by a graph.
    pub const INVALID: EntityId = EntityId(0);

    /// Build an id from its raw value. `0` yields [`EntityId::INVALID`].
    pub fn new(value: u64) -> Self {
        EntityId(value)
    }

    /// Raw numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// True for every id except the invalid sentinel.
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind discriminant of a graph entity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Host,
    User,
    Process,
    Domain,
    Topic,
    Participant,
    DataReader,
    DataWriter,
    Locator,
    Invalid,
}

impl EntityKind {
    /// True for kinds that carry a DDS GUID (participants and endpoints).
    pub fn has_guid(&self) -> bool {
        matches!(
            self,
            EntityKind::Participant | EntityKind::DataReader | EntityKind::DataWriter
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Host => "HOST",
            EntityKind::User => "USER",
            EntityKind::Process => "PROCESS",
            EntityKind::Domain => "DOMAIN",
            EntityKind::Topic => "TOPIC",
            EntityKind::Participant => "PARTICIPANT",
            EntityKind::DataReader => "DATAREADER",
            EntityKind::DataWriter => "DATAWRITER",
            EntityKind::Locator => "LOCATOR",
            EntityKind::Invalid => "INVALID",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_id_is_zero() {
        assert_eq!(EntityId::INVALID.value(), 0);
        assert!(!EntityId::INVALID.is_valid());
        assert!(EntityId::new(1).is_valid());
    }

    #[test]
    fn test_id_ordering() {
        assert!(EntityId::new(2) < EntityId::new(10));
    }

    #[test]
    fn test_id_serializes_as_number() {
        let json = serde_json::to_string(&EntityId::new(42)).expect("serialize id");
        assert_eq!(json, "42");

        let back: EntityId = serde_json::from_str("42").expect("deserialize id");
        assert_eq!(back, EntityId::new(42));
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&EntityKind::DataReader).expect("serialize kind");
        assert_eq!(json, "\"datareader\"");

        let back: EntityKind = serde_json::from_str("\"locator\"").expect("deserialize kind");
        assert_eq!(back, EntityKind::Locator);
    }

    #[test]
    fn test_kind_guid_predicate() {
        assert!(EntityKind::Participant.has_guid());
        assert!(EntityKind::DataWriter.has_guid());
        assert!(!EntityKind::Host.has_guid());
        assert!(!EntityKind::Locator.has_guid());
    }
}
