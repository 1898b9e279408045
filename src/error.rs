//! # Error Types
//!
//! Comprehensive error handling for the interception core.
//!
//! This module defines all error variants that can occur while intercepting
//! messages, from field-access failures inside a listener to caller contract
//! violations and configuration problems.
//!
//! ## Error Categories
//! - **Access Errors**: a listener asked for a field the schema cannot supply
//! - **Contract Errors**: invalid arguments, writes through a read-only event
//! - **Configuration Errors**: bad config files, missing schemas
//! - **Pipeline Errors**: delivery attempted on a closed channel
//!
//! Configuration faults discovered during a registry rebuild are *not*
//! errors; they are collected as [`crate::registry::RegistryFault`] values so
//! a single bad entry never aborts the rebuild.
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Example Usage
//! ```rust
//! use packet_intercept::error::{InterceptError, Result};
//!
//! fn checked_ordinal(available: usize, wanted: usize) -> Result<usize> {
//!     if wanted < available {
//!         Ok(wanted)
//!     } else {
//!         Err(InterceptError::FieldNotFound {
//!             type_name: "u32",
//!             ordinal: wanted,
//!             available,
//!         })
//!     }
//! }
//!
//! assert!(checked_ordinal(2, 5).is_err());
//! ```

use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Listener registry contract errors
    pub const ERR_EMPTY_LISTENING_SET: &str = "Listening set must name at least one packet kind";

    /// Event surface errors
    pub const ERR_READ_ONLY_EVENT: &str = "Event is read-only (MONITOR listeners cannot modify)";

    /// Pipeline errors
    pub const ERR_CHANNEL_CLOSED: &str = "Interception channel has been closed";

    /// Rebuild fault messages
    pub const ERR_WIRE_ID_COLLISION: &str = "Two packet kinds claim the same wire id";
    pub const ERR_DUPLICATE_NAME: &str = "Two packet kinds claim the same symbolic name";
    pub const ERR_MISSING_SCHEMA: &str = "No field schema registered for listened-to packet kind";

    /// Deferral fault messages
    pub const ERR_DEFERRAL_EXPIRED: &str = "Deferred message never resumed before its deadline";
}

/// InterceptError is the primary error type for all interception operations.
#[derive(Error, Debug)]
pub enum InterceptError {
    /// Fewer than `ordinal + 1` fields of the requested type exist in the
    /// message's schema.
    #[error("no field of type {type_name} at ordinal {ordinal} (schema has {available})")]
    FieldNotFound {
        type_name: &'static str,
        ordinal: usize,
        available: usize,
    },

    /// The runtime type of a value disagrees with the declared field type.
    #[error("type mismatch on field of type {expected} at ordinal {ordinal}")]
    TypeMismatch {
        expected: &'static str,
        ordinal: usize,
    },

    /// The underlying field refused access in the current runtime, e.g. a
    /// version-dependent field that is absent from the active message shape.
    #[error("field of type {type_name} at ordinal {ordinal} is not accessible")]
    AccessDenied {
        type_name: &'static str,
        ordinal: usize,
    },

    /// A MONITOR-priority listener attempted to mutate or cancel the event.
    #[error("event is read-only")]
    ReadOnlyEvent,

    /// Caller contract violation, fatal to the call and never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A listened-to packet kind has no registered field schema.
    #[error("missing schema for packet kind {0}")]
    MissingSchema(String),

    /// Message handed to a channel that was shut down.
    #[error("interception channel closed")]
    ChannelClosed,

    /// Too many undelivered messages queued on one channel, usually because
    /// a deferred message at the queue head never resumed.
    #[error("channel has {pending} undelivered messages, limit {limit}")]
    Backpressure { pending: usize, limit: usize },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("custom error: {0}")]
    Custom(String),
}

/// Type alias for Results using InterceptError
pub type Result<T> = std::result::Result<T, InterceptError>;
