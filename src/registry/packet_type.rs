//! Logical packet identities.
//!
//! A [`PacketKind`] is the stable, version-independent identity of a message
//! kind. Wire ids are transient: the host protocol reuses them per phase and
//! reassigns them across versions, so they are never used as long-lived keys.
//! [`PacketKey`] (direction, phase, symbolic name) is the durable key that
//! listener buckets and schema registrations hang off.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which way a message is travelling relative to the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// From the remote peer towards the host application.
    Inbound,
    /// From the host application towards the remote peer.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

/// Connection phase of the tracked protocol.
///
/// Wire ids are only unique within a (phase, direction) bucket; the same
/// numeric id means different things in different phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolPhase {
    Handshake,
    Status,
    Login,
    Configuration,
    Play,
}

impl ProtocolPhase {
    /// All phases, in connection order.
    pub const ALL: [ProtocolPhase; 5] = [
        ProtocolPhase::Handshake,
        ProtocolPhase::Status,
        ProtocolPhase::Login,
        ProtocolPhase::Configuration,
        ProtocolPhase::Play,
    ];
}

impl fmt::Display for ProtocolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolPhase::Handshake => "handshake",
            ProtocolPhase::Status => "status",
            ProtocolPhase::Login => "login",
            ProtocolPhase::Configuration => "configuration",
            ProtocolPhase::Play => "play",
        };
        write!(f, "{name}")
    }
}

/// Stable logical packet type.
///
/// Constructed once per registry rebuild and immutable thereafter; a version
/// change produces a fresh set of kinds rather than mutating existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PacketKind {
    direction: Direction,
    phase: ProtocolPhase,
    name: Arc<str>,
    wire_id: Option<u32>,
    terminal: bool,
}

impl PacketKind {
    pub fn new(
        direction: Direction,
        phase: ProtocolPhase,
        name: impl Into<Arc<str>>,
        wire_id: Option<u32>,
        terminal: bool,
    ) -> Self {
        Self {
            direction,
            phase,
            name: name.into(),
            wire_id,
            terminal,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn phase(&self) -> ProtocolPhase {
        self.phase
    }

    /// Stable symbolic name, unique within (direction, phase).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire id in the currently active protocol version, if the kind is
    /// supported there at all.
    pub fn wire_id(&self) -> Option<u32> {
        self.wire_id
    }

    /// Whether processing a message of this kind ends the current phase.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// The version-independent identity of this kind.
    pub fn key(&self) -> PacketKey {
        PacketKey {
            direction: self.direction,
            phase: self.phase,
            name: Arc::clone(&self.name),
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.wire_id {
            Some(id) => write!(f, "{}/{}/{} (0x{id:02X})", self.direction, self.phase, self.name),
            None => write!(f, "{}/{}/{} (unsupported)", self.direction, self.phase, self.name),
        }
    }
}

/// Durable lookup key for a packet kind: (direction, phase, symbolic name).
///
/// Survives registry rebuilds, unlike wire ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PacketKey {
    direction: Direction,
    phase: ProtocolPhase,
    name: Arc<str>,
}

impl PacketKey {
    pub fn new(direction: Direction, phase: ProtocolPhase, name: impl Into<Arc<str>>) -> Self {
        Self {
            direction,
            phase,
            name: name.into(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn phase(&self) -> ProtocolPhase {
        self.phase
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PacketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.direction, self.phase, self.name)
    }
}
