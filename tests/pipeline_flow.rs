use std::sync::{Arc, Mutex};
use std::time::Duration;

use packet_intercept::accessor::{SchemaBuilder, SchemaRegistry};
use packet_intercept::config::InterceptConfig;
use packet_intercept::error::InterceptError;
use packet_intercept::listener::{ListenerPriority, ListenerRegistry};
use packet_intercept::pipeline::{
    ConnectionId, DeferralHandle, Delivery, InterceptionPipeline, MessageContext, MessageSink,
    Outcome, PacketEvent, WirePacket,
};
use packet_intercept::registry::{
    Direction, PacketDef, PacketKey, ProtocolDescription, ProtocolPhase, TypeRegistry,
};

#[derive(Debug, Clone, PartialEq)]
struct Ping {
    nonce: u64,
    note: String,
}

impl Ping {
    fn new(nonce: u64) -> Self {
        Self {
            nonce,
            note: String::new(),
        }
    }
}

struct StaticSource;

impl ProtocolDescription for StaticSource {
    fn generation(&self) -> u64 {
        1
    }

    fn protocol_version(&self) -> u32 {
        765
    }

    fn packets(&self, phase: ProtocolPhase, direction: Direction) -> Vec<PacketDef> {
        if phase == ProtocolPhase::Play && direction == Direction::Outbound {
            vec![PacketDef::new(0x01, "Ping"), PacketDef::new(0x02, "Pong")]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, PartialEq)]
enum Seen {
    Ping(Ping),
    Raw(u32),
    Suppressed(String),
    Other,
}

#[derive(Default)]
struct CaptureSink {
    seen: Mutex<Vec<Seen>>,
}

impl CaptureSink {
    fn snapshot(&self) -> Vec<Seen> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }

    fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl MessageSink for CaptureSink {
    fn deliver(&self, _connection: ConnectionId, _direction: Direction, delivery: Delivery) {
        let seen = match delivery {
            Delivery::Forward(message) => match message.downcast::<Ping>() {
                Ok(ping) => Seen::Ping(*ping),
                Err(_) => Seen::Other,
            },
            Delivery::Raw(packet) => Seen::Raw(packet.wire_id()),
            Delivery::Suppress(kind) => Seen::Suppressed(kind.name().to_string()),
        };
        self.seen.lock().unwrap().push(seen);
    }
}

fn ping_key() -> PacketKey {
    PacketKey::new(Direction::Outbound, ProtocolPhase::Play, "Ping")
}

fn ping_ctx(wire_id: u32) -> MessageContext {
    MessageContext::new(ConnectionId(1), Direction::Outbound, ProtocolPhase::Play, wire_id)
}

fn build(config: InterceptConfig) -> (InterceptionPipeline, Arc<CaptureSink>) {
    let registry = Arc::new(TypeRegistry::new(Arc::new(StaticSource)));
    let listeners = Arc::new(ListenerRegistry::new());
    let schemas = Arc::new(SchemaRegistry::new());
    let sink = Arc::new(CaptureSink::default());
    let pipeline = InterceptionPipeline::new(
        registry,
        listeners,
        schemas,
        Arc::clone(&sink) as Arc<dyn MessageSink>,
        config,
    );

    let schema = SchemaBuilder::<Ping>::new()
        .field(|m: &Ping| m.nonce, |m, v| m.nonce = v)
        .field(|m: &Ping| m.note.clone(), |m, v: String| m.note = v)
        .build();
    pipeline.register_schema(ping_key(), schema);

    (pipeline, sink)
}

#[test]
fn messages_without_listeners_pass_through_unchanged() {
    let (pipeline, sink) = build(InterceptConfig::default());

    let original = Ping {
        nonce: 77,
        note: "untouched".into(),
    };
    pipeline
        .intercept(ping_ctx(0x01), Box::new(original.clone()))
        .unwrap();

    assert_eq!(sink.snapshot(), vec![Seen::Ping(original)]);
}

#[test]
fn unknown_wire_ids_pass_through_unchanged() {
    let (pipeline, sink) = build(InterceptConfig::default());

    // A listener on Ping must not matter for an unmapped id.
    pipeline.listeners().add(
        ping_key(),
        ListenerPriority::Normal,
        Arc::new(|event: &mut PacketEvent<'_>| {
            let _ = event.set_cancelled(true);
        }),
    );

    let original = Ping::new(5);
    pipeline
        .intercept(ping_ctx(0x7F), Box::new(original.clone()))
        .unwrap();

    assert_eq!(sink.snapshot(), vec![Seen::Ping(original)]);
}

#[test]
fn listeners_run_in_priority_then_registration_order() {
    let (pipeline, sink) = build(InterceptConfig::default());
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    for (label, priority) in [
        ("high", ListenerPriority::High),
        ("monitor", ListenerPriority::Monitor),
        ("low_a", ListenerPriority::Low),
        ("low_b", ListenerPriority::Low),
        ("normal", ListenerPriority::Normal),
    ] {
        let order = Arc::clone(&order);
        pipeline.listeners().add(
            ping_key(),
            priority,
            Arc::new(move |_event: &mut PacketEvent<'_>| {
                order.lock().unwrap().push(label);
            }),
        );
    }

    for _ in 0..3 {
        pipeline
            .intercept(ping_ctx(0x01), Box::new(Ping::new(1)))
            .unwrap();
        assert_eq!(
            *order.lock().unwrap(),
            vec!["low_a", "low_b", "normal", "high", "monitor"]
        );
        order.lock().unwrap().clear();
    }
    assert_eq!(sink.len(), 3);
}

#[test]
fn mutations_chain_through_the_listener_order() {
    let (pipeline, sink) = build(InterceptConfig::default());

    pipeline.listeners().add(
        ping_key(),
        ListenerPriority::Low,
        Arc::new(|event: &mut PacketEvent<'_>| {
            let accessor = event.accessor_mut().unwrap();
            accessor.write::<u64>(0, 1000).unwrap();
        }),
    );
    let observed = Arc::new(Mutex::new(0u64));
    {
        let observed = Arc::clone(&observed);
        pipeline.listeners().add(
            ping_key(),
            ListenerPriority::High,
            Arc::new(move |event: &mut PacketEvent<'_>| {
                // Sees the Low listener's write, then overwrites it.
                *observed.lock().unwrap() = event.accessor().read::<u64>(0).unwrap();
                event.accessor_mut().unwrap().write::<u64>(0, 2000).unwrap();
            }),
        );
    }

    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(1)))
        .unwrap();

    assert_eq!(*observed.lock().unwrap(), 1000);
    assert_eq!(
        sink.snapshot(),
        vec![Seen::Ping(Ping {
            nonce: 2000,
            note: String::new()
        })]
    );
}

#[test]
fn monitor_listeners_observe_but_cannot_modify() {
    let (pipeline, sink) = build(InterceptConfig::default());
    let checks: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));

    {
        let checks = Arc::clone(&checks);
        pipeline.listeners().add(
            ping_key(),
            ListenerPriority::Monitor,
            Arc::new(move |event: &mut PacketEvent<'_>| {
                let mut checks = checks.lock().unwrap();
                checks.push(event.is_read_only());
                checks.push(matches!(
                    event.set_cancelled(true),
                    Err(InterceptError::ReadOnlyEvent)
                ));
                checks.push(matches!(
                    event.accessor_mut(),
                    Err(InterceptError::ReadOnlyEvent)
                ));
                // Reading stays available.
                checks.push(event.accessor().read::<u64>(0).is_ok());
            }),
        );
    }

    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(4)))
        .unwrap();

    assert_eq!(*checks.lock().unwrap(), vec![true, true, true, true]);
    // The monitor's rejected cancellation did not suppress the message.
    assert_eq!(sink.len(), 1);
}

#[test]
fn cancellation_suppresses_and_drops_post_send_callbacks() {
    let (pipeline, sink) = build(InterceptConfig::default());
    let post_send_ran = Arc::new(Mutex::new(false));

    {
        let post_send_ran = Arc::clone(&post_send_ran);
        pipeline.listeners().add(
            ping_key(),
            ListenerPriority::Lowest,
            Arc::new(move |event: &mut PacketEvent<'_>| {
                let post_send_ran = Arc::clone(&post_send_ran);
                event.on_post_send(move || {
                    *post_send_ran.lock().unwrap() = true;
                });
            }),
        );
    }
    pipeline.listeners().add(
        ping_key(),
        ListenerPriority::Normal,
        Arc::new(|event: &mut PacketEvent<'_>| {
            event.set_cancelled(true).unwrap();
        }),
    );

    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(9)))
        .unwrap();

    assert_eq!(sink.snapshot(), vec![Seen::Suppressed("Ping".into())]);
    assert!(!*post_send_ran.lock().unwrap());
}

#[test]
fn post_send_callbacks_run_after_forwarding() {
    let (pipeline, sink) = build(InterceptConfig::default());
    let post_send_ran = Arc::new(Mutex::new(false));

    {
        let post_send_ran = Arc::clone(&post_send_ran);
        pipeline.listeners().add(
            ping_key(),
            ListenerPriority::Normal,
            Arc::new(move |event: &mut PacketEvent<'_>| {
                let post_send_ran = Arc::clone(&post_send_ran);
                event.on_post_send(move || {
                    *post_send_ran.lock().unwrap() = true;
                });
            }),
        );
    }

    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(2)))
        .unwrap();

    assert!(*post_send_ran.lock().unwrap());
    assert_eq!(sink.len(), 1);
}

#[test]
fn a_panicking_listener_does_not_take_down_the_message() {
    let (pipeline, sink) = build(InterceptConfig::default());

    pipeline.listeners().add(
        ping_key(),
        ListenerPriority::Low,
        Arc::new(|_event: &mut PacketEvent<'_>| {
            panic!("listener bug");
        }),
    );
    let reached = Arc::new(Mutex::new(false));
    {
        let reached = Arc::clone(&reached);
        pipeline.listeners().add(
            ping_key(),
            ListenerPriority::Normal,
            Arc::new(move |_event: &mut PacketEvent<'_>| {
                *reached.lock().unwrap() = true;
            }),
        );
    }

    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(3)))
        .unwrap();

    assert!(*reached.lock().unwrap());
    assert_eq!(sink.len(), 1);
}

#[test]
fn in_flight_dispatch_uses_the_snapshot_taken_at_start() {
    let (pipeline, sink) = build(InterceptConfig::default());
    let late_invocations = Arc::new(Mutex::new(0u32));

    {
        let pipeline_handle = pipeline.clone();
        let late_invocations = Arc::clone(&late_invocations);
        pipeline.listeners().add(
            ping_key(),
            ListenerPriority::Normal,
            Arc::new(move |_event: &mut PacketEvent<'_>| {
                // Registering mid-dispatch must not affect the current message.
                let late_invocations = Arc::clone(&late_invocations);
                pipeline_handle.listeners().add(
                    ping_key(),
                    ListenerPriority::Highest,
                    Arc::new(move |_event: &mut PacketEvent<'_>| {
                        *late_invocations.lock().unwrap() += 1;
                    }),
                );
            }),
        );
    }

    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(1)))
        .unwrap();
    assert_eq!(*late_invocations.lock().unwrap(), 0);

    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(2)))
        .unwrap();
    assert_eq!(*late_invocations.lock().unwrap(), 1);
    assert_eq!(sink.len(), 2);
}

fn deferring_listener(
    stash: &Arc<Mutex<Option<DeferralHandle>>>,
    defer_on_nonce: u64,
) -> Arc<dyn packet_intercept::listener::PacketListener> {
    let stash = Arc::clone(stash);
    Arc::new(move |event: &mut PacketEvent<'_>| {
        let nonce = event.accessor().read::<u64>(0).unwrap_or_default();
        if nonce == defer_on_nonce {
            *stash.lock().unwrap() = Some(event.defer());
        }
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deferred_messages_hold_the_fifo_until_resumed() {
    let (pipeline, sink) = build(InterceptConfig::default());
    let stash: Arc<Mutex<Option<DeferralHandle>>> = Arc::new(Mutex::new(None));

    pipeline
        .listeners()
        .add(ping_key(), ListenerPriority::Normal, deferring_listener(&stash, 1));

    let watched = pipeline
        .intercept_watched(ping_ctx(0x01), Box::new(Ping::new(1)))
        .unwrap();
    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(2)))
        .unwrap();
    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(3)))
        .unwrap();

    // m2 and m3 decided synchronously, but m1 still blocks the queue head.
    assert_eq!(sink.len(), 0);

    let handle = stash.lock().unwrap().take().expect("listener deferred");
    assert!(handle.is_pending());
    handle.resume();
    assert!(!handle.is_pending());

    assert_eq!(watched.await.unwrap(), Outcome::Forwarded);
    assert_eq!(
        sink.snapshot(),
        vec![
            Seen::Ping(Ping::new(1)),
            Seen::Ping(Ping::new(2)),
            Seen::Ping(Ping::new(3)),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deferred_messages_can_be_mutated_and_cancelled_off_thread() {
    let (pipeline, sink) = build(InterceptConfig::default());
    let stash: Arc<Mutex<Option<DeferralHandle>>> = Arc::new(Mutex::new(None));

    pipeline
        .listeners()
        .add(ping_key(), ListenerPriority::Normal, deferring_listener(&stash, 1));

    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(1)))
        .unwrap();
    let handle = stash.lock().unwrap().take().expect("listener deferred");

    let worker = {
        let handle = handle.clone();
        std::thread::spawn(move || {
            let wrote = handle.with_accessor(|accessor| {
                accessor.write::<String>(0, "rewritten".into()).unwrap();
            });
            assert!(wrote.is_some());
            handle.resume();
        })
    };
    worker.join().unwrap();

    assert_eq!(
        sink.snapshot(),
        vec![Seen::Ping(Ping {
            nonce: 1,
            note: "rewritten".into()
        })]
    );

    // Second round: cancel instead of mutate.
    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(1)))
        .unwrap();
    let handle = stash.lock().unwrap().take().expect("listener deferred");
    handle.set_cancelled(true);
    handle.resume();

    assert_eq!(sink.snapshot(), vec![Seen::Suppressed("Ping".into())]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn an_abandoned_deferral_times_out_as_cancelled() {
    let config = InterceptConfig::default_with_overrides(|config| {
        config.pipeline.deferral_timeout = Duration::from_millis(50);
    });
    let (pipeline, sink) = build(config);
    let stash: Arc<Mutex<Option<DeferralHandle>>> = Arc::new(Mutex::new(None));

    pipeline
        .listeners()
        .add(ping_key(), ListenerPriority::Normal, deferring_listener(&stash, 1));

    let watched = pipeline
        .intercept_watched(ping_ctx(0x01), Box::new(Ping::new(1)))
        .unwrap();
    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(2)))
        .unwrap();
    assert_eq!(sink.len(), 0);

    // Never resumed; the watchdog must unblock the queue.
    assert_eq!(watched.await.unwrap(), Outcome::Suppressed);

    // m2 lands in the same drain pass on the watchdog's thread.
    for _ in 0..200 {
        if sink.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(
        sink.snapshot(),
        vec![Seen::Suppressed("Ping".into()), Seen::Ping(Ping::new(2))]
    );

    // A late resume after expiry is a harmless no-op.
    let handle = stash.lock().unwrap().take().expect("listener deferred");
    assert!(!handle.is_pending());
    handle.resume();
    assert_eq!(sink.len(), 0);
}

#[test]
fn manual_expiry_sweep_unblocks_queues_without_a_runtime() {
    let config = InterceptConfig::default_with_overrides(|config| {
        config.pipeline.deferral_timeout = Duration::from_millis(20);
    });
    let (pipeline, sink) = build(config);
    let stash: Arc<Mutex<Option<DeferralHandle>>> = Arc::new(Mutex::new(None));

    pipeline
        .listeners()
        .add(ping_key(), ListenerPriority::Normal, deferring_listener(&stash, 1));

    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(1)))
        .unwrap();
    assert_eq!(pipeline.expire_overdue(), 0);

    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(pipeline.expire_overdue(), 1);
    assert_eq!(sink.snapshot(), vec![Seen::Suppressed("Ping".into())]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn raw_injections_respect_channel_ordering() {
    let (pipeline, sink) = build(InterceptConfig::default());
    let stash: Arc<Mutex<Option<DeferralHandle>>> = Arc::new(Mutex::new(None));

    pipeline
        .listeners()
        .add(ping_key(), ListenerPriority::Normal, deferring_listener(&stash, 1));

    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(1)))
        .unwrap();
    pipeline
        .inject_raw(
            ConnectionId(1),
            Direction::Outbound,
            WirePacket::new(0x02, vec![1, 2, 3]),
        )
        .unwrap();

    // Queued behind the parked message.
    assert_eq!(sink.len(), 0);

    let handle = stash.lock().unwrap().take().expect("listener deferred");
    handle.resume();

    assert_eq!(
        sink.snapshot(),
        vec![Seen::Ping(Ping::new(1)), Seen::Raw(0x02)]
    );

    // An idle channel delivers raw packets immediately.
    pipeline
        .inject_raw(
            ConnectionId(1),
            Direction::Outbound,
            WirePacket::new(0x05, vec![9]),
        )
        .unwrap();
    assert_eq!(sink.snapshot(), vec![Seen::Raw(0x05)]);
}

#[test]
fn a_parked_channel_does_not_block_other_channels() {
    let (pipeline, sink) = build(InterceptConfig::default());
    let stash: Arc<Mutex<Option<DeferralHandle>>> = Arc::new(Mutex::new(None));

    pipeline
        .listeners()
        .add(ping_key(), ListenerPriority::Normal, deferring_listener(&stash, 1));

    // Park connection 1 outbound.
    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(1)))
        .unwrap();
    assert_eq!(sink.len(), 0);

    // A different connection flows freely.
    let other = MessageContext::new(
        ConnectionId(2),
        Direction::Outbound,
        ProtocolPhase::Play,
        0x01,
    );
    pipeline.intercept(other, Box::new(Ping::new(5))).unwrap();
    assert_eq!(sink.snapshot(), vec![Seen::Ping(Ping::new(5))]);

    stash.lock().unwrap().take().expect("deferred").resume();
    assert_eq!(sink.snapshot(), vec![Seen::Ping(Ping::new(1))]);
}

#[test]
fn backpressure_rejects_when_a_channel_is_saturated() {
    let config = InterceptConfig::default_with_overrides(|config| {
        config.pipeline.max_pending_per_channel = 2;
        config.pipeline.enforce_deferral_timeout = false;
    });
    let (pipeline, _sink) = build(config);
    let stash: Arc<Mutex<Option<DeferralHandle>>> = Arc::new(Mutex::new(None));

    pipeline
        .listeners()
        .add(ping_key(), ListenerPriority::Normal, deferring_listener(&stash, 1));

    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(1)))
        .unwrap();
    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(2)))
        .unwrap();

    let result = pipeline.intercept(ping_ctx(0x01), Box::new(Ping::new(3)));
    assert!(matches!(
        result,
        Err(InterceptError::Backpressure { pending: 2, limit: 2 })
    ));

    // Resuming the head drains the queue and makes room again.
    stash.lock().unwrap().take().expect("deferred").resume();
    pipeline
        .intercept(ping_ctx(0x01), Box::new(Ping::new(4)))
        .unwrap();
}

#[test]
fn missing_schema_is_a_recorded_fault_not_a_dropped_message() {
    let (pipeline, sink) = build(InterceptConfig::default());

    // Pong has a listener but no schema was ever registered for it.
    let pong_key = PacketKey::new(Direction::Outbound, ProtocolPhase::Play, "Pong");
    let invoked = Arc::new(Mutex::new(false));
    {
        let invoked = Arc::clone(&invoked);
        pipeline.listeners().add(
            pong_key.clone(),
            ListenerPriority::Normal,
            Arc::new(move |_event: &mut PacketEvent<'_>| {
                *invoked.lock().unwrap() = true;
            }),
        );
    }

    let faults = pipeline.validate_schemas();
    assert_eq!(faults.len(), 1);

    pipeline
        .intercept(ping_ctx(0x02), Box::new(Ping::new(1)))
        .unwrap();

    // Forwarded unchanged; the listener never saw an unwrappable message.
    assert!(!*invoked.lock().unwrap());
    assert_eq!(sink.len(), 1);
}
