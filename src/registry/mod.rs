//! # Packet Type Registry
//!
//! Stable logical packet-type catalog for the active protocol version.
//!
//! Wire-level ids change across host versions and are reused between
//! protocol phases; the registry maps them to durable [`PacketKind`]
//! identities and back, detects when the host's mapping has drifted, and
//! rebuilds atomically so concurrent resolvers never observe a partially
//! updated table.
//!
//! ## Components
//! - **PacketKind / PacketKey**: version-independent identity values
//! - **ProtocolDescription**: host-supplied mapping with a change signal
//! - **TypeRegistry**: snapshot-swapped wire id ⇄ kind resolution

pub mod packet_type;
pub mod source;
pub mod type_registry;

pub use packet_type::{Direction, PacketKey, PacketKind, ProtocolPhase};
pub use source::{PacketDef, ProtocolDescription};
pub use type_registry::{RebuildReport, RegistryFault, TypeRegistry};
