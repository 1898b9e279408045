//! The per-message surface handed to listeners.
//!
//! A [`PacketEvent`] is alive for exactly one listener invocation. It exposes
//! the wrapped message through a [`StructureAccessor`], the cancellation and
//! mutation controls, post-send callback registration, and the deferral
//! escape hatch for listeners that finish their decision off-thread.
//!
//! Cancellation and mutation compose in invocation order: a later listener
//! observes (and may overwrite) everything earlier ones did. Two listeners of
//! equal priority that both cancel and mutate therefore race by registration
//! order; the last writer wins. That is defined behavior, not a bug, but
//! worth knowing when composing plugins.

use std::sync::Arc;

use crate::accessor::StructureAccessor;
use crate::error::{InterceptError, Result};
use crate::registry::{Direction, PacketKind};

use super::channel::DeferralHandle;
use super::ConnectionId;

/// Callback invoked after the message it was registered on has been
/// confirmed sent. Never invoked for suppressed messages.
pub type PostSendFn = Box<dyn FnOnce() + Send>;

/// One message, mid-interception, as seen by a single listener.
pub struct PacketEvent<'a> {
    kind: &'a Arc<PacketKind>,
    connection: ConnectionId,
    direction: Direction,
    accessor: StructureAccessor<'a>,
    read_only: bool,
    cancelled: &'a mut bool,
    post_send: &'a mut Vec<PostSendFn>,
    deferral: &'a mut Option<DeferralHandle>,
    make_deferral: &'a dyn Fn() -> DeferralHandle,
}

impl<'a> PacketEvent<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        kind: &'a Arc<PacketKind>,
        connection: ConnectionId,
        direction: Direction,
        accessor: StructureAccessor<'a>,
        read_only: bool,
        cancelled: &'a mut bool,
        post_send: &'a mut Vec<PostSendFn>,
        deferral: &'a mut Option<DeferralHandle>,
        make_deferral: &'a dyn Fn() -> DeferralHandle,
    ) -> Self {
        Self {
            kind,
            connection,
            direction,
            accessor,
            read_only,
            cancelled,
            post_send,
            deferral,
            make_deferral,
        }
    }

    /// Logical kind of the intercepted message.
    pub fn kind(&self) -> &Arc<PacketKind> {
        self.kind
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Read-only view of the message's fields.
    pub fn accessor(&self) -> &StructureAccessor<'a> {
        &self.accessor
    }

    /// Mutable field access. Fails for MONITOR listeners, which observe the
    /// final state and must not change it.
    pub fn accessor_mut(&mut self) -> Result<&mut StructureAccessor<'a>> {
        if self.read_only {
            return Err(InterceptError::ReadOnlyEvent);
        }
        Ok(&mut self.accessor)
    }

    /// Whether this event is read-only (MONITOR priority).
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether an earlier listener cancelled the message.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled
    }

    /// Cancel or un-cancel the message. The flag read after the last
    /// listener decides between forwarding and suppression.
    pub fn set_cancelled(&mut self, cancelled: bool) -> Result<()> {
        if self.read_only {
            return Err(InterceptError::ReadOnlyEvent);
        }
        *self.cancelled = cancelled;
        Ok(())
    }

    /// Register a callback to run once the message has been confirmed sent.
    ///
    /// If any listener cancels the message, callbacks registered by earlier
    /// (or later) listeners are discarded without being invoked.
    pub fn on_post_send(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.post_send.push(Box::new(callback));
    }

    /// Suspend this message's interception instead of finishing
    /// synchronously.
    ///
    /// Dispatch of the remaining listeners pauses when the current listener
    /// returns; the returned handle resumes it (or cancels it) from any
    /// thread. Later messages on the same connection and direction queue up
    /// behind this one until the handle resolves or the deferral timeout
    /// expires. Calling `defer` more than once in the same listener returns
    /// the same handle.
    pub fn defer(&mut self) -> DeferralHandle {
        if let Some(handle) = self.deferral.as_ref() {
            return handle.clone();
        }
        let handle = (self.make_deferral)();
        *self.deferral = Some(handle.clone());
        handle
    }
}

impl std::fmt::Debug for PacketEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketEvent")
            .field("kind", &self.kind.name())
            .field("connection", &self.connection)
            .field("direction", &self.direction)
            .field("cancelled", &*self.cancelled)
            .field("read_only", &self.read_only)
            .finish()
    }
}
