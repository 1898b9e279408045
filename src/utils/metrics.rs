//! Observability and Metrics
//!
//! This module provides metrics collection and observability features
//! for monitoring interception throughput and health.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

use crate::registry::Direction;

/// Global metrics collector for interception operations
#[derive(Debug)]
pub struct Metrics {
    /// Total inbound messages seen by the pipeline
    pub messages_inbound: AtomicU64,
    /// Total outbound messages seen by the pipeline
    pub messages_outbound: AtomicU64,
    /// Messages delivered to the sink (mutated or not)
    pub forwarded: AtomicU64,
    /// Messages suppressed by listener cancellation or expiry
    pub suppressed: AtomicU64,
    /// Messages of a known kind with no registered listeners
    pub passed_through: AtomicU64,
    /// Messages whose wire id had no mapping in the active version
    pub unknown_kinds: AtomicU64,
    /// Messages skipped because a listened-to kind had no schema
    pub missing_schemas: AtomicU64,
    /// Listener invocations that panicked
    pub listener_panics: AtomicU64,
    /// Messages that took the deferred path
    pub deferrals: AtomicU64,
    /// Deferred messages forcibly cancelled at their deadline
    pub deferral_timeouts: AtomicU64,
    /// Raw wire packets injected
    pub raw_injections: AtomicU64,
    /// Registry rebuilds triggered by staleness or explicit request
    pub registry_rebuilds: AtomicU64,
    /// Configuration faults recorded across all rebuilds
    pub registry_faults: AtomicU64,
    /// Shapes with a compiled fast-path index
    pub shapes_compiled: AtomicU64,
    /// Shapes rejected by the compiler (fallback access in use)
    pub shape_compile_failures: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            messages_inbound: AtomicU64::new(0),
            messages_outbound: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            passed_through: AtomicU64::new(0),
            unknown_kinds: AtomicU64::new(0),
            missing_schemas: AtomicU64::new(0),
            listener_panics: AtomicU64::new(0),
            deferrals: AtomicU64::new(0),
            deferral_timeouts: AtomicU64::new(0),
            raw_injections: AtomicU64::new(0),
            registry_rebuilds: AtomicU64::new(0),
            registry_faults: AtomicU64::new(0),
            shapes_compiled: AtomicU64::new(0),
            shape_compile_failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a message entering the pipeline
    pub fn message_seen(&self, direction: Direction) {
        match direction {
            Direction::Inbound => self.messages_inbound.fetch_add(1, Ordering::Relaxed),
            Direction::Outbound => self.messages_outbound.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record a message delivered to the sink
    pub fn forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a suppressed message
    pub fn suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message with no listeners
    pub fn passed_through(&self) {
        self.passed_through.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message with an unmapped wire id
    pub fn unknown_kind(&self) {
        self.unknown_kinds.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a listened-to kind without a schema
    pub fn missing_schema(&self) {
        self.missing_schemas.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a listener panic
    pub fn listener_panic(&self) {
        self.listener_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message entering the deferred path
    pub fn deferral_started(&self) {
        self.deferrals.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deferred message cancelled at its deadline
    pub fn deferral_timeout(&self) {
        self.deferral_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a raw packet injection
    pub fn raw_injected(&self) {
        self.raw_injections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a registry rebuild and its fault count
    pub fn registry_rebuilt(&self, faults: u64) {
        self.registry_rebuilds.fetch_add(1, Ordering::Relaxed);
        self.registry_faults.fetch_add(faults, Ordering::Relaxed);
    }

    /// Record a successfully compiled shape
    pub fn shape_compiled(&self) {
        self.shapes_compiled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a shape the compiler rejected
    pub fn shape_compile_failed(&self) {
        self.shape_compile_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_inbound: self.messages_inbound.load(Ordering::Relaxed),
            messages_outbound: self.messages_outbound.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            passed_through: self.passed_through.load(Ordering::Relaxed),
            unknown_kinds: self.unknown_kinds.load(Ordering::Relaxed),
            missing_schemas: self.missing_schemas.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
            deferrals: self.deferrals.load(Ordering::Relaxed),
            deferral_timeouts: self.deferral_timeouts.load(Ordering::Relaxed),
            raw_injections: self.raw_injections.load(Ordering::Relaxed),
            registry_rebuilds: self.registry_rebuilds.load(Ordering::Relaxed),
            registry_faults: self.registry_faults.load(Ordering::Relaxed),
            shapes_compiled: self.shapes_compiled.load(Ordering::Relaxed),
            shape_compile_failures: self.shape_compile_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            messages_inbound = snapshot.messages_inbound,
            messages_outbound = snapshot.messages_outbound,
            forwarded = snapshot.forwarded,
            suppressed = snapshot.suppressed,
            passed_through = snapshot.passed_through,
            unknown_kinds = snapshot.unknown_kinds,
            missing_schemas = snapshot.missing_schemas,
            listener_panics = snapshot.listener_panics,
            deferrals = snapshot.deferrals,
            deferral_timeouts = snapshot.deferral_timeouts,
            raw_injections = snapshot.raw_injections,
            registry_rebuilds = snapshot.registry_rebuilds,
            registry_faults = snapshot.registry_faults,
            shapes_compiled = snapshot.shapes_compiled,
            shape_compile_failures = snapshot.shape_compile_failures,
            uptime_seconds = snapshot.uptime_seconds,
            "Interception metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub messages_inbound: u64,
    pub messages_outbound: u64,
    pub forwarded: u64,
    pub suppressed: u64,
    pub passed_through: u64,
    pub unknown_kinds: u64,
    pub missing_schemas: u64,
    pub listener_panics: u64,
    pub deferrals: u64,
    pub deferral_timeouts: u64,
    pub raw_injections: u64,
    pub registry_rebuilds: u64,
    pub registry_faults: u64,
    pub shapes_compiled: u64,
    pub shape_compile_failures: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Initialize metrics collection (call once at startup)
pub fn init_metrics() {
    // Force initialization
    let _ = global_metrics();
    info!("Metrics collection initialized");
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }
}
