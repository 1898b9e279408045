//! Per-connection interception pipeline.
//!
//! Every tracked message runs `Resolving → Dispatching → Deciding →
//! Forwarding | Suppressed`. Uninteresting traffic (unknown wire id, no
//! listeners) short-circuits straight to forwarding with no accessor or
//! schema work.
//!
//! Ordering: each (connection, direction) owns a slot queue. A slot is taken
//! at arrival, before dispatch starts, and deliveries drain strictly from the
//! front, so a message that arrived later can never overtake an earlier one —
//! including earlier ones parked on a deferral. A parked head blocks only its
//! own channel; other connections and the opposite direction flow freely.

use dashmap::DashMap;
use futures::channel::oneshot;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, trace, warn};

use crate::accessor::{CompiledShape, MessageSchema, SchemaRegistry, ShapeCache, StructureAccessor};
use crate::config::InterceptConfig;
use crate::error::{constants, InterceptError, Result};
use crate::listener::{ListenerEntry, ListenerPriority, ListenerRegistry};
use crate::registry::{Direction, PacketKind, RegistryFault, TypeRegistry};
use crate::utils::metrics::global_metrics;

use super::event::{PacketEvent, PostSendFn};
use super::wire::WirePacket;
use super::{ConnectionId, MessageContext};

/// What the pipeline hands to the transport layer for one queue slot.
pub enum Delivery {
    /// Continue the (possibly mutated) decoded message to its destination.
    Forward(Box<dyn Any + Send>),
    /// Write a pre-serialized packet verbatim.
    Raw(WirePacket),
    /// Explicit instruction that this message was dropped by a listener.
    Suppress(Arc<PacketKind>),
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Forward(_) => write!(f, "Forward"),
            Delivery::Raw(packet) => write!(f, "Raw(0x{:02X})", packet.wire_id()),
            Delivery::Suppress(kind) => write!(f, "Suppress({})", kind.name()),
        }
    }
}

/// Transport-layer boundary the pipeline delivers into.
///
/// Deliveries for one (connection, direction) arrive in arrival order, from
/// one thread at a time.
pub trait MessageSink: Send + Sync {
    fn deliver(&self, connection: ConnectionId, direction: Direction, delivery: Delivery);
}

/// Final fate of one intercepted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Forwarded,
    Suppressed,
}

/// Future side of [`InterceptionPipeline::intercept_watched`]; resolves once
/// the message has been delivered or suppressed.
pub type OutcomeReceiver = oneshot::Receiver<Outcome>;

// ---------------------------------------------------------------------------
// FIFO slot queue
// ---------------------------------------------------------------------------

struct CompletedSlot {
    delivery: Delivery,
    post_send: Vec<PostSendFn>,
    watcher: Option<oneshot::Sender<Outcome>>,
}

enum SlotState {
    /// Synchronous dispatch running on the submitting thread.
    Dispatching,
    /// Waiting on a deferral handle (or its deadline).
    Parked {
        deadline: Option<Instant>,
        cell: Arc<DeferredCell>,
    },
    /// Decision made; waiting for earlier slots before delivery.
    Done(CompletedSlot),
}

struct Slot {
    seq: u64,
    state: SlotState,
}

struct QueueInner {
    next_seq: u64,
    slots: VecDeque<Slot>,
    draining: bool,
}

struct ChannelQueue {
    inner: Mutex<QueueInner>,
}

impl ChannelQueue {
    fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                next_seq: 0,
                slots: VecDeque::new(),
                draining: false,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch state & deferral
// ---------------------------------------------------------------------------

struct DispatchState {
    connection: ConnectionId,
    direction: Direction,
    seq: u64,
    kind: Arc<PacketKind>,
    schema: Arc<MessageSchema>,
    compiled: Option<Arc<CompiledShape>>,
    message: Box<dyn Any + Send>,
    snapshot: Arc<[ListenerEntry]>,
    next: usize,
    cancelled: bool,
    post_send: Vec<PostSendFn>,
    watcher: Option<oneshot::Sender<Outcome>>,
}

enum DeferState {
    /// Handle exists but the dispatch loop has not parked yet.
    Armed {
        resume_requested: bool,
        pending_cancel: Option<bool>,
    },
    /// Dispatch parked; the remaining listener chain lives here.
    Parked(Box<DispatchState>),
    /// Resumed, expired, or absorbed; the handle is spent.
    Finished,
}

struct DeferredCell {
    shared: Arc<Shared>,
    state: Mutex<DeferState>,
}

/// Capability to resume a deferred message.
///
/// Handed out by [`PacketEvent::defer`]; cloneable and safe to use from any
/// thread. All operations are no-ops once the message has completed, so a
/// late `resume` after a timeout expiry is harmless.
#[derive(Clone)]
pub struct DeferralHandle {
    cell: Arc<DeferredCell>,
}

impl DeferralHandle {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            cell: Arc::new(DeferredCell {
                shared,
                state: Mutex::new(DeferState::Armed {
                    resume_requested: false,
                    pending_cancel: None,
                }),
            }),
        }
    }

    /// Continue the remaining listener chain on the calling thread, then
    /// apply the decision and unblock the channel's queue.
    ///
    /// A resume that races the parking of the dispatch is absorbed: the
    /// dispatch simply continues inline without parking.
    pub fn resume(&self) {
        let taken = {
            let mut state = self.cell.state.lock();
            if let DeferState::Armed {
                resume_requested, ..
            } = &mut *state
            {
                *resume_requested = true;
                None
            } else {
                take_parked(&mut *state)
            }
        };

        if let Some(dispatch) = taken {
            Shared::continue_dispatch(&self.cell.shared, dispatch);
        }
    }

    /// Set the cancellation flag of the pending message. Listeners that run
    /// after `resume` still see (and may overwrite) the flag.
    pub fn set_cancelled(&self, cancelled: bool) {
        let mut state = self.cell.state.lock();
        match &mut *state {
            DeferState::Armed { pending_cancel, .. } => *pending_cancel = Some(cancelled),
            DeferState::Parked(dispatch) => dispatch.cancelled = cancelled,
            DeferState::Finished => {}
        }
    }

    /// Mutate the parked message through its accessor. Returns `None` when
    /// the message is not currently parked (still dispatching, already
    /// resumed, or expired).
    pub fn with_accessor<R>(&self, f: impl FnOnce(&mut StructureAccessor<'_>) -> R) -> Option<R> {
        let mut state = self.cell.state.lock();
        match &mut *state {
            DeferState::Parked(dispatch) => {
                let DispatchState {
                    schema,
                    compiled,
                    message,
                    ..
                } = &mut **dispatch;
                let mut accessor =
                    StructureAccessor::from_parts(Arc::clone(schema), compiled.clone(), &mut **message);
                Some(f(&mut accessor))
            }
            _ => None,
        }
    }

    /// Whether the deferred message is still awaiting its decision.
    pub fn is_pending(&self) -> bool {
        !matches!(*self.cell.state.lock(), DeferState::Finished)
    }
}

impl std::fmt::Debug for DeferralHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match *self.cell.state.lock() {
            DeferState::Armed { .. } => "armed",
            DeferState::Parked(_) => "parked",
            DeferState::Finished => "finished",
        };
        f.debug_struct("DeferralHandle").field("state", &state).finish()
    }
}

/// Swap a `Parked` state for `Finished`, returning the dispatch. Any other
/// state is restored untouched.
fn take_parked(state: &mut DeferState) -> Option<Box<DispatchState>> {
    match std::mem::replace(state, DeferState::Finished) {
        DeferState::Parked(dispatch) => Some(dispatch),
        other => {
            *state = other;
            None
        }
    }
}

enum ParkOutcome {
    Parked,
    Continue(Box<DispatchState>),
}

// ---------------------------------------------------------------------------
// Shared pipeline state
// ---------------------------------------------------------------------------

struct Shared {
    registry: Arc<TypeRegistry>,
    listeners: Arc<ListenerRegistry>,
    schemas: Arc<SchemaRegistry>,
    shapes: Arc<ShapeCache>,
    sink: Arc<dyn MessageSink>,
    config: InterceptConfig,
    channels: DashMap<(ConnectionId, Direction), Arc<ChannelQueue>>,
}

impl Shared {
    fn channel(&self, connection: ConnectionId, direction: Direction) -> Arc<ChannelQueue> {
        self.channels
            .entry((connection, direction))
            .or_insert_with(|| Arc::new(ChannelQueue::new()))
            .clone()
    }

    /// Reserve the next FIFO slot. Taken before dispatch so later arrivals
    /// on the same channel queue behind this message no matter how long its
    /// decision takes.
    fn allocate_slot(&self, queue: &ChannelQueue) -> Result<u64> {
        let mut inner = queue.inner.lock();
        let limit = self.config.pipeline.max_pending_per_channel;
        if inner.slots.len() >= limit {
            return Err(InterceptError::Backpressure {
                pending: inner.slots.len(),
                limit,
            });
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.slots.push_back(Slot {
            seq,
            state: SlotState::Dispatching,
        });
        Ok(seq)
    }

    fn complete(&self, connection: ConnectionId, direction: Direction, seq: u64, completed: CompletedSlot) {
        let Some(queue) = self
            .channels
            .get(&(connection, direction))
            .map(|entry| Arc::clone(&entry))
        else {
            // Channel closed while the message was in flight.
            if let Some(watcher) = completed.watcher {
                let _ = watcher.send(Outcome::Suppressed);
            }
            return;
        };

        {
            let mut inner = queue.inner.lock();
            let Some(slot) = inner.slots.iter_mut().find(|slot| slot.seq == seq) else {
                drop(inner);
                if let Some(watcher) = completed.watcher {
                    let _ = watcher.send(Outcome::Suppressed);
                }
                return;
            };
            slot.state = SlotState::Done(completed);
        }

        self.drain(&queue, connection, direction);
    }

    /// Deliver every decided slot at the queue front, in order. Only one
    /// thread drains a queue at a time; completions landing mid-drain are
    /// picked up before the drainer retires.
    fn drain(&self, queue: &ChannelQueue, connection: ConnectionId, direction: Direction) {
        loop {
            let batch = {
                let mut inner = queue.inner.lock();
                if inner.draining {
                    return;
                }
                let mut batch = Vec::new();
                while matches!(
                    inner.slots.front(),
                    Some(Slot {
                        state: SlotState::Done(_),
                        ..
                    })
                ) {
                    if let Some(Slot {
                        state: SlotState::Done(completed),
                        ..
                    }) = inner.slots.pop_front()
                    {
                        batch.push(completed);
                    }
                }
                if batch.is_empty() {
                    return;
                }
                inner.draining = true;
                batch
            };

            for completed in batch {
                self.deliver(connection, direction, completed);
            }

            let mut inner = queue.inner.lock();
            inner.draining = false;
            let head_ready = matches!(
                inner.slots.front(),
                Some(Slot {
                    state: SlotState::Done(_),
                    ..
                })
            );
            if !head_ready {
                return;
            }
        }
    }

    fn deliver(&self, connection: ConnectionId, direction: Direction, completed: CompletedSlot) {
        let CompletedSlot {
            delivery,
            post_send,
            watcher,
        } = completed;

        let outcome = match &delivery {
            Delivery::Suppress(_) => Outcome::Suppressed,
            Delivery::Forward(_) | Delivery::Raw(_) => Outcome::Forwarded,
        };

        self.sink.deliver(connection, direction, delivery);

        // The sink returning is the transmission confirmation; post-send
        // callbacks never run for suppressed messages.
        if outcome == Outcome::Forwarded {
            for callback in post_send {
                callback();
            }
            global_metrics().forwarded();
        } else {
            global_metrics().suppressed();
        }

        if let Some(watcher) = watcher {
            let _ = watcher.send(outcome);
        }
    }

    fn finish(&self, state: Box<DispatchState>) {
        let DispatchState {
            connection,
            direction,
            seq,
            kind,
            message,
            cancelled,
            post_send,
            watcher,
            ..
        } = *state;

        let completed = if cancelled {
            trace!(packet = kind.name(), "message cancelled by listener");
            CompletedSlot {
                delivery: Delivery::Suppress(kind),
                post_send: Vec::new(),
                watcher,
            }
        } else {
            CompletedSlot {
                delivery: Delivery::Forward(message),
                post_send,
                watcher,
            }
        };

        self.complete(connection, direction, seq, completed);
    }

    /// Run the listener chain from `state.next`. Returns the state for the
    /// decision step, or `None` when a listener parked the message.
    fn run_listeners(this: &Arc<Self>, mut state: Box<DispatchState>) -> Option<Box<DispatchState>> {
        loop {
            let Some(entry) = state.snapshot.get(state.next).cloned() else {
                return Some(state);
            };
            state.next += 1;

            let read_only = entry.priority() == ListenerPriority::Monitor;
            let mut deferral: Option<DeferralHandle> = None;
            {
                let DispatchState {
                    connection,
                    direction,
                    kind,
                    schema,
                    compiled,
                    message,
                    cancelled,
                    post_send,
                    ..
                } = &mut *state;
                let connection = *connection;
                let direction = *direction;

                let shared = Arc::clone(this);
                let make_deferral = move || DeferralHandle::new(Arc::clone(&shared));

                let accessor =
                    StructureAccessor::from_parts(Arc::clone(schema), compiled.clone(), &mut **message);
                let mut event = PacketEvent::new(
                    kind,
                    connection,
                    direction,
                    accessor,
                    read_only,
                    cancelled,
                    post_send,
                    &mut deferral,
                    &make_deferral,
                );

                let invoked = catch_unwind(AssertUnwindSafe(|| entry.handler().on_packet(&mut event)));
                if invoked.is_err() {
                    global_metrics().listener_panic();
                    error!(
                        packet = kind.name(),
                        priority = ?entry.priority(),
                        "listener panicked during dispatch, continuing with remaining listeners"
                    );
                }
            }

            if let Some(handle) = deferral {
                match Self::park(this, &handle, state) {
                    ParkOutcome::Parked => return None,
                    ParkOutcome::Continue(resumed) => state = resumed,
                }
            }
        }
    }

    /// Park a dispatch on its deferral cell, unless a resume already arrived,
    /// in which case dispatch continues inline.
    fn park(this: &Arc<Self>, handle: &DeferralHandle, mut state: Box<DispatchState>) -> ParkOutcome {
        let cell = &handle.cell;
        let mut cell_state = cell.state.lock();
        match std::mem::replace(&mut *cell_state, DeferState::Finished) {
            DeferState::Armed {
                resume_requested,
                pending_cancel,
            } => {
                if let Some(cancelled) = pending_cancel {
                    state.cancelled = cancelled;
                }
                if resume_requested {
                    // The off-thread resume beat us here; continue inline.
                    return ParkOutcome::Continue(state);
                }

                let connection = state.connection;
                let direction = state.direction;
                let seq = state.seq;
                let packet = state.kind.name().to_string();
                let deadline = this
                    .config
                    .pipeline
                    .enforce_deferral_timeout
                    .then(|| Instant::now() + this.config.pipeline.deferral_timeout);

                *cell_state = DeferState::Parked(state);
                drop(cell_state);

                if let Some(queue) = this
                    .channels
                    .get(&(connection, direction))
                    .map(|entry| Arc::clone(&entry))
                {
                    let mut inner = queue.inner.lock();
                    if let Some(slot) = inner.slots.iter_mut().find(|slot| slot.seq == seq) {
                        // An instant resume may already have completed the
                        // slot; only a still-dispatching slot parks.
                        if matches!(slot.state, SlotState::Dispatching) {
                            slot.state = SlotState::Parked {
                                deadline,
                                cell: Arc::clone(cell),
                            };
                        }
                    }
                }

                global_metrics().deferral_started();
                debug!(packet = %packet, ?connection, %direction, "message deferred, channel queue parked");

                if let Some(deadline) = deadline {
                    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                        let shared = Arc::clone(this);
                        let cell = Arc::clone(cell);
                        runtime.spawn(async move {
                            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
                            shared.expire_cell(&cell);
                        });
                    }
                }

                ParkOutcome::Parked
            }
            // A cell parks at most once; anything else means the handle was
            // already spent, so dispatch just continues.
            other => {
                *cell_state = other;
                ParkOutcome::Continue(state)
            }
        }
    }

    fn continue_dispatch(this: &Arc<Self>, state: Box<DispatchState>) {
        if let Some(done) = Self::run_listeners(this, state) {
            this.finish(done);
        }
    }

    /// Force a parked message to a cancelled decision after its deadline.
    fn expire_cell(&self, cell: &DeferredCell) {
        let taken = {
            let mut state = cell.state.lock();
            if matches!(&*state, DeferState::Parked(_)) {
                take_parked(&mut *state)
            } else {
                None
            }
        };

        let Some(dispatch) = taken else {
            return;
        };

        global_metrics().deferral_timeout();
        warn!(
            packet = dispatch.kind.name(),
            connection = ?dispatch.connection,
            "{}",
            constants::ERR_DEFERRAL_EXPIRED
        );

        let DispatchState {
            connection,
            direction,
            seq,
            kind,
            watcher,
            ..
        } = *dispatch;

        self.complete(
            connection,
            direction,
            seq,
            CompletedSlot {
                delivery: Delivery::Suppress(kind),
                post_send: Vec::new(),
                watcher,
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Public pipeline
// ---------------------------------------------------------------------------

/// The interception pipeline: resolves, dispatches, decides, and forwards or
/// suppresses every message of a tracked channel while preserving arrival
/// order per (connection, direction).
#[derive(Clone)]
pub struct InterceptionPipeline {
    shared: Arc<Shared>,
}

impl InterceptionPipeline {
    pub fn new(
        registry: Arc<TypeRegistry>,
        listeners: Arc<ListenerRegistry>,
        schemas: Arc<SchemaRegistry>,
        sink: Arc<dyn MessageSink>,
        config: InterceptConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                listeners,
                schemas,
                shapes: ShapeCache::new(),
                sink,
                config,
                channels: DashMap::new(),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.shared.registry
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.shared.listeners
    }

    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.shared.schemas
    }

    pub fn shape_cache(&self) -> &Arc<ShapeCache> {
        &self.shared.shapes
    }

    /// Register the decoder-supplied schema for a packet kind and prime the
    /// compiled fast path per configuration.
    pub fn register_schema(&self, key: crate::registry::PacketKey, schema: Arc<MessageSchema>) {
        if self.shared.config.accessor.background_compile {
            self.shared.shapes.request(&schema);
        } else {
            self.shared.shapes.compile_now(&schema);
        }
        self.shared.schemas.register(key, schema);
    }

    /// Intercept one decoded message.
    pub fn intercept(&self, ctx: MessageContext, message: Box<dyn Any + Send>) -> Result<()> {
        self.submit(ctx, message, None)
    }

    /// Intercept one decoded message and observe its final fate.
    pub fn intercept_watched(
        &self,
        ctx: MessageContext,
        message: Box<dyn Any + Send>,
    ) -> Result<OutcomeReceiver> {
        let (tx, rx) = oneshot::channel();
        self.submit(ctx, message, Some(tx))?;
        Ok(rx)
    }

    /// Inject a pre-serialized packet into a channel. The packet takes a
    /// FIFO slot like any intercepted message but bypasses typed dispatch.
    pub fn inject_raw(&self, connection: ConnectionId, direction: Direction, packet: WirePacket) -> Result<()> {
        let queue = self.shared.channel(connection, direction);
        let seq = self.shared.allocate_slot(&queue)?;
        global_metrics().raw_injected();
        self.shared.complete(
            connection,
            direction,
            seq,
            CompletedSlot {
                delivery: Delivery::Raw(packet),
                post_send: Vec::new(),
                watcher: None,
            },
        );
        Ok(())
    }

    /// Drop the queues of a closed connection. Decisions still in flight for
    /// it are discarded when they complete.
    pub fn close_connection(&self, connection: ConnectionId) {
        for direction in [Direction::Inbound, Direction::Outbound] {
            self.shared.channels.remove(&(connection, direction));
        }
    }

    /// Expire every parked message whose deadline has passed, unblocking the
    /// affected queues. Hosts without an ambient tokio runtime call this
    /// periodically; with a runtime, a watchdog task does it per deferral.
    pub fn expire_overdue(&self) -> usize {
        let now = Instant::now();
        let mut expired = Vec::new();
        for entry in self.shared.channels.iter() {
            let inner = entry.value().inner.lock();
            for slot in &inner.slots {
                if let SlotState::Parked {
                    deadline: Some(deadline),
                    cell,
                } = &slot.state
                {
                    if *deadline <= now {
                        expired.push(Arc::clone(cell));
                    }
                }
            }
        }

        let count = expired.len();
        for cell in expired {
            self.shared.expire_cell(&cell);
        }
        count
    }

    /// Cross-check that every listened-to, currently-supported kind has a
    /// registered schema. Intended after a registry rebuild.
    pub fn validate_schemas(&self) -> Vec<RegistryFault> {
        let mut faults = Vec::new();
        for key in self.shared.listeners.listened_keys() {
            if self.shared.registry.kind_for(&key).is_some() && !self.shared.schemas.contains(&key) {
                warn!(%key, "{}", constants::ERR_MISSING_SCHEMA);
                faults.push(RegistryFault::MissingSchema { key });
            }
        }
        faults
    }

    fn submit(
        &self,
        ctx: MessageContext,
        message: Box<dyn Any + Send>,
        watcher: Option<oneshot::Sender<Outcome>>,
    ) -> Result<()> {
        let shared = &self.shared;
        let metrics = global_metrics();
        metrics.message_seen(ctx.direction);

        if shared.config.pipeline.auto_rebuild && shared.registry.is_stale() {
            let report = shared.registry.rebuild();
            metrics.registry_rebuilt(report.faults.len() as u64);
        }

        let queue = shared.channel(ctx.connection, ctx.direction);
        let seq = shared.allocate_slot(&queue)?;

        // Unknown wire id: pass through untouched, no wrapping, no dispatch.
        let Some(kind) = shared.registry.resolve(ctx.wire_id, ctx.direction, ctx.phase) else {
            metrics.unknown_kind();
            shared.complete(
                ctx.connection,
                ctx.direction,
                seq,
                CompletedSlot {
                    delivery: Delivery::Forward(message),
                    post_send: Vec::new(),
                    watcher,
                },
            );
            return Ok(());
        };

        let key = kind.key();
        let Some(snapshot) = shared.listeners.snapshot(&key) else {
            metrics.passed_through();
            shared.complete(
                ctx.connection,
                ctx.direction,
                seq,
                CompletedSlot {
                    delivery: Delivery::Forward(message),
                    post_send: Vec::new(),
                    watcher,
                },
            );
            return Ok(());
        };

        let Some(schema) = shared.schemas.lookup(&key) else {
            // Configuration fault: listeners exist but the decoder never
            // registered a schema. Recorded, not fatal to the message.
            metrics.missing_schema();
            warn!(%key, "{}", constants::ERR_MISSING_SCHEMA);
            shared.complete(
                ctx.connection,
                ctx.direction,
                seq,
                CompletedSlot {
                    delivery: Delivery::Forward(message),
                    post_send: Vec::new(),
                    watcher,
                },
            );
            return Ok(());
        };

        let compiled = shared.shapes.lookup(schema.shape());
        if compiled.is_none() {
            shared.shapes.request(&schema);
        }

        let state = Box::new(DispatchState {
            connection: ctx.connection,
            direction: ctx.direction,
            seq,
            kind,
            schema,
            compiled,
            message,
            snapshot,
            next: 0,
            cancelled: false,
            post_send: Vec::new(),
            watcher,
        });

        if let Some(done) = Shared::run_listeners(&self.shared, state) {
            shared.finish(done);
        }
        Ok(())
    }
}

impl std::fmt::Debug for InterceptionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionPipeline")
            .field("channels", &self.shared.channels.len())
            .field("registry", &self.shared.registry)
            .field("listeners", &self.shared.listeners)
            .finish()
    }
}
