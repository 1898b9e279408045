//! # Packet Listeners
//!
//! Listener surface and the thread-safe, priority-ordered registry that
//! dispatch iterates.
//!
//! Listeners for a packet kind are invoked in `(priority, registration
//! order)` ascending: `Lowest` first, `Monitor` last. `Monitor` listeners
//! observe the final state of the message and receive a read-only event.

pub mod registry;

use crate::pipeline::event::PacketEvent;

pub use registry::{ListenerRegistry, ListeningSet, Removal};

/// Invocation order of listeners on a single packet kind.
///
/// A fixed small enum rather than an arbitrary number keeps ordering
/// deterministic and bounded. Later positions see the effect of earlier
/// ones; `Highest` has the last word on mutation and cancellation before
/// `Monitor` observes the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerPriority {
    Lowest,
    Low,
    Normal,
    High,
    Highest,
    /// Observation only; events are read-only at this priority.
    Monitor,
}

/// Identity token for a registered listener, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// A packet listener: inspects, mutates, cancels, or defers one message at
/// a time through the [`PacketEvent`] surface.
pub trait PacketListener: Send + Sync {
    fn on_packet(&self, event: &mut PacketEvent<'_>);
}

impl<F> PacketListener for F
where
    F: Fn(&mut PacketEvent<'_>) + Send + Sync,
{
    fn on_packet(&self, event: &mut PacketEvent<'_>) {
        self(event)
    }
}

/// One registered listener plus its ordering key.
#[derive(Clone)]
pub struct ListenerEntry {
    pub(crate) priority: ListenerPriority,
    pub(crate) sequence: u64,
    pub(crate) id: ListenerId,
    pub(crate) handler: std::sync::Arc<dyn PacketListener>,
}

impl ListenerEntry {
    pub fn priority(&self) -> ListenerPriority {
        self.priority
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn handler(&self) -> &std::sync::Arc<dyn PacketListener> {
        &self.handler
    }
}

impl std::fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .field("id", &self.id)
            .finish()
    }
}
