//! # Interception Pipeline
//!
//! The channel-level hook that drives every inbound and outbound message of
//! a tracked connection through the listener machinery.
//!
//! ## Flow
//! 1. **Resolving** — the wire id is resolved to a logical kind via the
//!    [`crate::registry::TypeRegistry`]
//! 2. **Dispatching** — listeners run in priority order against a
//!    [`crate::accessor::StructureAccessor`]-wrapped message
//! 3. **Deciding** — the accumulated cancellation/mutation decision is read
//! 4. **Forwarding / Suppressed** — the message continues to the
//!    [`MessageSink`] or is dropped, in strict arrival order per
//!    (connection, direction)
//!
//! Unknown wire ids and kinds without listeners skip steps 2–3 entirely.

pub mod channel;
pub mod event;
pub mod wire;

use crate::registry::{Direction, ProtocolPhase};

pub use channel::{
    DeferralHandle, Delivery, InterceptionPipeline, MessageSink, Outcome, OutcomeReceiver,
};
pub use event::{PacketEvent, PostSendFn};
pub use wire::WirePacket;

/// Opaque identity of one peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Wire-level context accompanying a decoded message into the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct MessageContext {
    pub connection: ConnectionId,
    pub direction: Direction,
    pub phase: ProtocolPhase,
    pub wire_id: u32,
}

impl MessageContext {
    pub fn new(
        connection: ConnectionId,
        direction: Direction,
        phase: ProtocolPhase,
        wire_id: u32,
    ) -> Self {
        Self {
            connection,
            direction,
            phase,
            wire_id,
        }
    }
}
