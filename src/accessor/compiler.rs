//! Compiled fast-path shape index.
//!
//! Resolving "the n-th field of type T" by scanning the schema is always
//! correct but costs O(fields) per access. A [`CompiledShape`] turns that
//! into a direct table lookup. Compilation happens on a dedicated background
//! worker so the hot path never pays for it; until the index lands in the
//! cache, accessors use the scan transparently.
//!
//! Compilation is an optimization, never a correctness dependency: a shape
//! that fails to compile is marked rejected and served by the fallback
//! forever, without surfacing anything to listeners.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace, warn};

use super::schema::{MessageSchema, ShapeId};

/// Shapes with more fields than this are left to the fallback path.
const MAX_COMPILED_FIELDS: usize = u16::MAX as usize;

/// Per-shape index: declared type → absolute field indices in ordinal order.
#[derive(Debug)]
pub struct CompiledShape {
    by_type: HashMap<TypeId, Box<[u16]>>,
}

impl CompiledShape {
    fn compile(schema: &MessageSchema) -> Option<Self> {
        if schema.len() > MAX_COMPILED_FIELDS {
            return None;
        }

        let mut by_type: HashMap<TypeId, Vec<u16>> = HashMap::new();
        for (index, field) in schema.fields().iter().enumerate() {
            by_type
                .entry(field.type_id())
                .or_default()
                .push(index as u16);
        }

        Some(Self {
            by_type: by_type
                .into_iter()
                .map(|(type_id, indices)| (type_id, indices.into_boxed_slice()))
                .collect(),
        })
    }

    /// Direct lookup of the `ordinal`-th field of `type_id`.
    pub fn locate(&self, type_id: TypeId, ordinal: usize) -> Option<usize> {
        self.by_type
            .get(&type_id)
            .and_then(|indices| indices.get(ordinal))
            .map(|&index| index as usize)
    }
}

/// Shared, append-only cache of compiled shapes.
pub struct ShapeCache {
    compiled: DashMap<ShapeId, Arc<CompiledShape>>,
    rejected: DashMap<ShapeId, ()>,
    pending: DashMap<ShapeId, ()>,
    tx: Mutex<Option<mpsc::Sender<Arc<MessageSchema>>>>,
}

impl ShapeCache {
    /// Create a cache with a background compile worker.
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel::<Arc<MessageSchema>>();
        let cache = Arc::new(Self {
            compiled: DashMap::new(),
            rejected: DashMap::new(),
            pending: DashMap::new(),
            tx: Mutex::new(Some(tx)),
        });

        let worker_cache = Arc::downgrade(&cache);
        let spawned = thread::Builder::new()
            .name("shape-compiler".into())
            .spawn(move || {
                while let Ok(schema) = rx.recv() {
                    let Some(cache) = worker_cache.upgrade() else {
                        break;
                    };
                    cache.compile_one(&schema);
                }
            });

        if let Err(error) = spawned {
            // No worker: every shape stays on the fallback path.
            warn!(%error, "failed to spawn shape compiler, using uncompiled access only");
            *cache.tx.lock() = None;
        }

        cache
    }

    /// Compiled index for a shape, if one has landed.
    pub fn lookup(&self, shape: ShapeId) -> Option<Arc<CompiledShape>> {
        self.compiled.get(&shape).map(|entry| Arc::clone(&entry))
    }

    /// Ask the background worker to compile a shape. Cheap and idempotent;
    /// shapes already compiled, queued, or rejected are skipped.
    pub fn request(&self, schema: &Arc<MessageSchema>) {
        let shape = schema.shape();
        if self.compiled.contains_key(&shape) || self.rejected.contains_key(&shape) {
            return;
        }
        if self.pending.insert(shape, ()).is_some() {
            return;
        }

        let sender = self.tx.lock().clone();
        match sender {
            Some(sender) => {
                if sender.send(Arc::clone(schema)).is_err() {
                    trace!(message_type = schema.message_type(), "shape compiler gone");
                    self.pending.remove(&shape);
                }
            }
            None => {
                self.pending.remove(&shape);
            }
        }
    }

    /// Compile a shape on the calling thread. Used by hosts that prefer
    /// paying the cost at registration time over background population.
    pub fn compile_now(&self, schema: &Arc<MessageSchema>) -> bool {
        self.compile_one(schema)
    }

    /// Number of shapes with a compiled index.
    pub fn compiled_count(&self) -> usize {
        self.compiled.len()
    }

    fn compile_one(&self, schema: &Arc<MessageSchema>) -> bool {
        let shape = schema.shape();
        let compiled = if self.compiled.contains_key(&shape) {
            true
        } else {
            match CompiledShape::compile(schema) {
                Some(index) => {
                    self.compiled.entry(shape).or_insert_with(|| Arc::new(index));
                    crate::utils::metrics::global_metrics().shape_compiled();
                    debug!(
                        message_type = schema.message_type(),
                        fields = schema.len(),
                        "compiled shape index"
                    );
                    true
                }
                None => {
                    self.rejected.insert(shape, ());
                    crate::utils::metrics::global_metrics().shape_compile_failed();
                    warn!(
                        message_type = schema.message_type(),
                        fields = schema.len(),
                        "shape not compilable, keeping uncompiled access"
                    );
                    false
                }
            }
        };
        self.pending.remove(&shape);
        compiled
    }
}

impl std::fmt::Debug for ShapeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeCache")
            .field("compiled", &self.compiled.len())
            .field("rejected", &self.rejected.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
