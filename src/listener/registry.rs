//! Thread-safe listener buckets with copy-on-write dispatch snapshots.
//!
//! Each packet kind maps to an immutable `Arc<[ListenerEntry]>`. Mutation
//! builds a new slice and swaps the `Arc` under a brief write lock, so an
//! in-flight dispatch keeps iterating the snapshot it cloned at dispatch
//! start, unaffected by concurrent add/remove on the same or other kinds.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use crate::error::{constants, InterceptError, Result};
use crate::registry::PacketKey;

use super::{ListenerEntry, ListenerId, ListenerPriority, PacketListener};

/// The packet kinds one listener wants to observe.
///
/// An empty set is a caller contract violation.
#[derive(Debug, Clone, Default)]
pub struct ListeningSet {
    keys: Vec<PacketKey>,
}

impl ListeningSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: PacketKey) -> Self {
        self.keys.push(key);
        self
    }

    pub fn keys(&self) -> &[PacketKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<PacketKey> for ListeningSet {
    fn from_iter<I: IntoIterator<Item = PacketKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// Result of removing a listener from one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Listener removed; other entries remain in the bucket.
    Removed,
    /// Listener removed and the bucket is now empty (and has been dropped).
    RemovedLast,
    /// No such listener in the bucket; a no-op, not an error.
    NotFound,
}

/// Priority-sorted listener collection keyed by packet kind.
#[derive(Default)]
pub struct ListenerRegistry {
    buckets: RwLock<HashMap<PacketKey, Arc<[ListenerEntry]>>>,
    next_sequence: AtomicU64,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one packet kind.
    ///
    /// Entries are kept in `(priority, insertion sequence)` ascending order;
    /// insertion never reorders unrelated entries.
    pub fn add(
        &self,
        key: PacketKey,
        priority: ListenerPriority,
        handler: Arc<dyn PacketListener>,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = ListenerEntry {
            priority,
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            id,
            handler,
        };

        let mut buckets = self.buckets.write();
        let bucket = buckets
            .entry(key.clone())
            .or_insert_with(|| Arc::from(Vec::new()));

        let mut entries: Vec<ListenerEntry> = bucket.iter().cloned().collect();
        let position = entries
            .partition_point(|existing| (existing.priority, existing.sequence) <= (priority, entry.sequence));
        entries.insert(position, entry);
        *bucket = entries.into();

        trace!(%key, ?priority, listener = id.0, "listener registered");
        id
    }

    /// Register a listener for every kind in the set at a single priority.
    pub fn register(
        &self,
        set: &ListeningSet,
        priority: ListenerPriority,
        handler: Arc<dyn PacketListener>,
    ) -> Result<Vec<ListenerId>> {
        if set.is_empty() {
            return Err(InterceptError::InvalidArgument(
                constants::ERR_EMPTY_LISTENING_SET.to_string(),
            ));
        }

        Ok(set
            .keys()
            .iter()
            .map(|key| self.add(key.clone(), priority, Arc::clone(&handler)))
            .collect())
    }

    /// Remove a listener by identity. Removing an unknown id is a no-op.
    /// Empty buckets are garbage-collected, and the caller is told so.
    pub fn remove(&self, key: &PacketKey, id: ListenerId) -> Removal {
        let mut buckets = self.buckets.write();
        let Some(bucket) = buckets.get_mut(key) else {
            return Removal::NotFound;
        };

        let Some(position) = bucket.iter().position(|entry| entry.id == id) else {
            return Removal::NotFound;
        };

        let mut entries: Vec<ListenerEntry> = bucket.iter().cloned().collect();
        entries.remove(position);

        if entries.is_empty() {
            buckets.remove(key);
            trace!(%key, listener = id.0, "listener removed, bucket dropped");
            Removal::RemovedLast
        } else {
            *bucket = entries.into();
            trace!(%key, listener = id.0, "listener removed");
            Removal::Removed
        }
    }

    /// The immutable dispatch view for a kind: lazy to iterate, restartable,
    /// and isolated from concurrent registration changes.
    pub fn snapshot(&self, key: &PacketKey) -> Option<Arc<[ListenerEntry]>> {
        self.buckets.read().get(key).map(Arc::clone)
    }

    /// Whether any listener is registered for the kind. Cheaper than
    /// `snapshot` for the short-circuit probe.
    pub fn has_listeners(&self, key: &PacketKey) -> bool {
        self.buckets.read().contains_key(key)
    }

    /// Every kind that currently has at least one listener.
    pub fn listened_keys(&self) -> Vec<PacketKey> {
        self.buckets.read().keys().cloned().collect()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("buckets", &self.buckets.read().len())
            .finish()
    }
}
