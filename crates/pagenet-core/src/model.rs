//! Entity records of the replicated configuration model.
//!
//! Every entity is a plain serialisable record. Identity is the
//! case-insensitive name string — repositories key their collections by
//! [`normalize_name`] so lookups and replication agree on casing.

use std::collections::BTreeSet;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Highest pager address: the POCSAG RIC space is 21 bits wide.
pub const PAGER_MAX_NUMBER: u32 = 2_097_151;

/// Number of slots in a rubric's news list.
pub const NEWS_SLOTS: usize = 10;

/// Normalizes an entity name for use as a collection key.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Cluster-facing status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Member of the current view.
    Online,
    /// Announced a graceful shutdown; not counted against quorum.
    Suspended,
    /// Dropped out of the view without announcing shutdown.
    Unknown,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Online => write!(f, "online"),
            NodeStatus::Suspended => write!(f, "suspended"),
            NodeStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A cluster member: one operator-run server instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Physical address as last reported by the transport.
    pub address: Option<SocketAddr>,
    pub latitude: f64,
    pub longitude: f64,
    pub status: NodeStatus,
    /// Salted hash of the shared cluster secret. `None` only before the
    /// node has been bootstrapped.
    pub key: Option<String>,
}

impl Node {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            address: None,
            latitude,
            longitude,
            status: NodeStatus::Suspended,
            key: None,
        }
    }
}

/// An operator account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    /// Fixed-length salted password hash (see [`crate::auth`]).
    pub hash: String,
    pub mail: String,
    pub admin: bool,
}

/// A single pager address belonging to a call sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pager {
    /// 21-bit POCSAG address.
    pub number: u32,
    pub name: String,
    /// Device can only display digits.
    pub numeric: bool,
}

/// A subscriber call sign with one or more pagers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSign {
    pub name: String,
    pub description: String,
    pub numeric: bool,
    pub pagers: Vec<Pager>,
    pub owner_names: BTreeSet<String>,
}

/// Operational status of a transmitter device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransmitterStatus {
    Online,
    Offline,
    Error,
    Disabled,
}

impl std::fmt::Display for TransmitterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransmitterStatus::Online => write!(f, "online"),
            TransmitterStatus::Offline => write!(f, "offline"),
            TransmitterStatus::Error => write!(f, "error"),
            TransmitterStatus::Disabled => write!(f, "disabled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AntennaType {
    Omni,
    Directional,
}

/// A radio transmitter managed by exactly one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transmitter {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Transmission power in watts.
    pub power: f32,
    /// Name of the owning node. A transmitter has no life of its own:
    /// deleting the node deletes it.
    pub node_name: String,
    pub address: Option<SocketAddr>,
    /// Allowed transmission slots, hex digits `0`..`F`.
    pub timeslot: String,
    pub owner_names: BTreeSet<String>,
    pub device_type: Option<String>,
    pub device_version: Option<String>,
    pub status: TransmitterStatus,
    pub antenna_type: AntennaType,
    /// Metres above ground level.
    pub antenna_above_ground_level: u32,
    /// Bearing in degrees, only meaningful for directional antennas.
    pub antenna_direction: u16,
    pub antenna_gain_dbi: f32,
}

/// A named set of transmitters used as a broadcast destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmitterGroup {
    pub name: String,
    pub description: String,
    pub transmitter_names: BTreeSet<String>,
    pub owner_names: BTreeSet<String>,
}

/// A news channel. Each rubric owns exactly one [`NewsList`], created
/// and destroyed alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub name: String,
    /// Channel id shown on the pager, 1..=95.
    pub number: u8,
    /// Display label, at most 11 characters.
    pub label: String,
    pub transmitter_group_names: BTreeSet<String>,
    pub owner_names: BTreeSet<String>,
}

/// One news item inside a rubric's slot ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct News {
    pub text: String,
    pub rubric_name: String,
    /// Requested slot, 1..=10. Zero means "assign automatically".
    pub number: u8,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub owner_name: String,
}

/// Fixed-capacity ring of news items, slots numbered 1..=10.
///
/// Automatic insertion pushes to the front, evicts the oldest item past
/// capacity, and renumbers every slot. Numbered insertion replaces the
/// addressed slot in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsList {
    slots: Vec<News>,
}

impl NewsList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a news item per the slot-assignment rules.
    pub fn add(&mut self, mut news: News) {
        if news.number < 1 || self.slots.is_empty() {
            news.number = 1;
            self.slots.insert(0, news);
            self.slots.truncate(NEWS_SLOTS);
            self.renumber();
        } else {
            let idx = usize::from(news.number).min(self.slots.len()) - 1;
            news.number = (idx + 1) as u8;
            self.slots[idx] = news;
        }
    }

    /// Removes the item at the given slot number, renumbering the rest.
    pub fn remove(&mut self, number: u8) -> Option<News> {
        let idx = usize::from(number).checked_sub(1)?;
        if idx >= self.slots.len() {
            return None;
        }
        let old = self.slots.remove(idx);
        self.renumber();
        Some(old)
    }

    /// Drops every item whose owner matches, renumbering the rest.
    /// Returns the number of items removed.
    pub fn remove_owned_by(&mut self, owner_key: &str) -> usize {
        let before = self.slots.len();
        self.slots
            .retain(|n| normalize_name(&n.owner_name) != owner_key);
        let removed = before - self.slots.len();
        if removed > 0 {
            self.renumber();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &News> {
        self.slots.iter()
    }

    fn renumber(&mut self) {
        for (idx, news) in self.slots.iter_mut().enumerate() {
            news.number = (idx + 1) as u8;
        }
    }
}

/// An outbound page. Immutable once posted except for cascaded
/// reference removal; has no identity of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub text: String,
    pub call_sign_names: BTreeSet<String>,
    pub transmitter_group_names: BTreeSet<String>,
    pub emergency: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub owner_name: String,
}

/// A pager activation request. Validated and fanned out, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    pub number: u32,
    pub transmitter_group_names: BTreeSet<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Process-wide counters. Reset on restart, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreStatistics {
    pub calls: u64,
    pub news: u64,
}
