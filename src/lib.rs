//! # packet-intercept
//!
//! Transparent interception, inspection, and selective rewriting of binary
//! protocol messages flowing between a network peer and a host application,
//! without touching the peer or the host's own message handling.
//!
//! The crate is a library layer inside a host message pipeline, not a
//! protocol codec: the host decodes bytes into typed messages and hands them
//! in with their wire context; this crate resolves their logical kind,
//! dispatches registered listeners in priority order, applies the aggregate
//! cancellation/mutation decision, and hands the result back to the host's
//! transport in strict per-connection arrival order.
//!
//! ## Components
//! - [`registry`] — stable logical packet-type catalog; wire id ⇄ kind
//!   resolution with atomic rebuilds when the host protocol drifts
//! - [`accessor`] — generic (declared type, ordinal) field access over
//!   decoded messages, with a background-compiled fast path per shape
//! - [`listener`] — thread-safe, priority-ordered listener buckets with
//!   copy-on-write dispatch snapshots
//! - [`pipeline`] — the per-connection interception hook: resolve, dispatch,
//!   decide, forward or suppress, FIFO per (connection, direction)
//!
//! ## Example
//! ```rust
//! use packet_intercept::accessor::SchemaBuilder;
//! use packet_intercept::listener::ListenerPriority;
//! use packet_intercept::registry::{Direction, PacketKey, ProtocolPhase};
//!
//! struct KeepAlive {
//!     id: u64,
//! }
//!
//! let schema = SchemaBuilder::<KeepAlive>::new()
//!     .field(|m: &KeepAlive| m.id, |m, v| m.id = v)
//!     .build();
//!
//! let mut message = KeepAlive { id: 7 };
//! let mut accessor =
//!     packet_intercept::accessor::StructureAccessor::new(schema, &mut message);
//! accessor.write::<u64>(0, 99).unwrap();
//! assert_eq!(accessor.read::<u64>(0).unwrap(), 99);
//!
//! let key = PacketKey::new(Direction::Outbound, ProtocolPhase::Play, "KeepAlive");
//! assert_eq!(key.name(), "KeepAlive");
//! let _ = ListenerPriority::Monitor;
//! ```

pub mod accessor;
pub mod config;
pub mod error;
pub mod listener;
pub mod pipeline;
pub mod registry;
pub mod utils;

pub use accessor::{MessageSchema, SchemaBuilder, SchemaRegistry, ShapeCache, StructureAccessor};
pub use config::InterceptConfig;
pub use error::{InterceptError, Result};
pub use listener::{ListenerPriority, ListenerRegistry, ListeningSet, PacketListener};
pub use pipeline::{
    ConnectionId, DeferralHandle, Delivery, InterceptionPipeline, MessageContext, MessageSink,
    Outcome, PacketEvent, WirePacket,
};
pub use registry::{
    Direction, PacketDef, PacketKey, PacketKind, ProtocolDescription, ProtocolPhase, TypeRegistry,
};
