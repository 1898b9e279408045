//! Host protocol description boundary.
//!
//! The host application owns the authoritative (phase, direction) → wire-id
//! mapping; this crate only consumes it. The trait deliberately exposes a
//! generation stamp instead of change callbacks so the registry can detect
//! drift with a single atomic load rather than polling every entry.

use super::packet_type::{Direction, ProtocolPhase};

/// One packet definition inside a (phase, direction) bucket of the host
/// protocol description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketDef {
    /// Wire-level id the active protocol version assigns to this packet.
    pub wire_id: u32,
    /// Stable symbolic name, unique within the bucket.
    pub name: String,
    /// Whether processing this packet ends the current phase.
    pub terminal: bool,
}

impl PacketDef {
    pub fn new(wire_id: u32, name: impl Into<String>) -> Self {
        Self {
            wire_id,
            name: name.into(),
            terminal: false,
        }
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// Description of the currently active protocol, supplied by the host.
///
/// Implementations must be cheap to query for `generation`; `packets` is
/// only called during a rebuild and may allocate.
pub trait ProtocolDescription: Send + Sync {
    /// Monotonic stamp bumped by the host whenever the mapping changes
    /// (version upgrade, dynamic registration change). The registry compares
    /// this against the stamp captured at its last rebuild.
    fn generation(&self) -> u64;

    /// Numeric protocol version currently in effect.
    fn protocol_version(&self) -> u32;

    /// All packets defined for the given bucket in the active version.
    fn packets(&self, phase: ProtocolPhase, direction: Direction) -> Vec<PacketDef>;
}
