//! Wire id ⇄ logical kind resolution.
//!
//! The registry keeps an immutable [`RegistryTable`] snapshot behind an
//! [`ArcSwap`]. Readers load the current snapshot with a single atomic
//! operation and never block; `rebuild` constructs a complete replacement
//! table off to the side and swaps it in, so a concurrent resolver observes
//! either the fully-old or the fully-new mapping, never a mix.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::packet_type::{Direction, PacketKey, PacketKind, ProtocolPhase};
use super::source::ProtocolDescription;

/// Configuration fault recorded during a rebuild.
///
/// Faults exclude the offending entry from the table instead of aborting the
/// rebuild; the host inspects them via [`RebuildReport`] or
/// [`TypeRegistry::faults`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryFault {
    /// Two definitions in the same (phase, direction) bucket claim the same
    /// wire id. The first definition wins; this one was skipped.
    WireIdCollision {
        phase: ProtocolPhase,
        direction: Direction,
        wire_id: u32,
        kept: String,
        skipped: String,
    },
    /// Two definitions in the same bucket claim the same symbolic name.
    DuplicateName {
        phase: ProtocolPhase,
        direction: Direction,
        name: String,
    },
    /// A kind with registered listeners has no field schema. Produced by
    /// [`crate::pipeline::InterceptionPipeline::validate_schemas`], not by
    /// `rebuild` itself.
    MissingSchema { key: PacketKey },
}

impl fmt::Display for RegistryFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryFault::WireIdCollision {
                phase,
                direction,
                wire_id,
                kept,
                skipped,
            } => write!(
                f,
                "wire id 0x{wire_id:02X} in {direction}/{phase} claimed by both {kept} (kept) and {skipped} (skipped)"
            ),
            RegistryFault::DuplicateName {
                phase,
                direction,
                name,
            } => write!(f, "duplicate symbolic name {name} in {direction}/{phase}"),
            RegistryFault::MissingSchema { key } => {
                write!(f, "no field schema registered for listened-to kind {key}")
            }
        }
    }
}

/// Outcome of one `rebuild` invocation.
#[derive(Debug, Clone)]
pub struct RebuildReport {
    /// Protocol version the new table was built against.
    pub protocol_version: u32,
    /// Source generation captured at build time.
    pub generation: u64,
    /// Number of kinds in the new table.
    pub kinds: usize,
    /// Configuration faults encountered (offending entries were skipped).
    pub faults: Vec<RegistryFault>,
}

/// One immutable snapshot of the wire mapping.
#[derive(Debug)]
struct RegistryTable {
    protocol_version: u32,
    generation: u64,
    by_wire: HashMap<(ProtocolPhase, Direction, u32), Arc<PacketKind>>,
    by_key: HashMap<PacketKey, Arc<PacketKind>>,
    faults: Vec<RegistryFault>,
}

impl RegistryTable {
    fn empty() -> Self {
        Self {
            protocol_version: 0,
            // Forces the first is_stale() to report true against any source.
            generation: u64::MAX,
            by_wire: HashMap::new(),
            by_key: HashMap::new(),
            faults: Vec::new(),
        }
    }
}

/// Catalog of logical packet types for the active protocol version.
pub struct TypeRegistry {
    source: Arc<dyn ProtocolDescription>,
    table: ArcSwap<RegistryTable>,
}

impl TypeRegistry {
    /// Create a registry over the given protocol description and perform the
    /// initial build.
    pub fn new(source: Arc<dyn ProtocolDescription>) -> Self {
        let registry = Self {
            source,
            table: ArcSwap::from_pointee(RegistryTable::empty()),
        };
        registry.rebuild();
        registry
    }

    /// Resolve a wire id to its logical kind.
    ///
    /// `None` is a valid, explicit result for wire ids that are not mapped in
    /// the active version. Callers must treat unknown kinds as pass-through
    /// traffic, not as a fault.
    pub fn resolve(
        &self,
        wire_id: u32,
        direction: Direction,
        phase: ProtocolPhase,
    ) -> Option<Arc<PacketKind>> {
        self.table
            .load()
            .by_wire
            .get(&(phase, direction, wire_id))
            .cloned()
    }

    /// Look up a kind by its stable identity.
    pub fn kind_for(&self, key: &PacketKey) -> Option<Arc<PacketKind>> {
        self.table.load().by_key.get(key).cloned()
    }

    /// Wire id assigned to the kind in the active protocol version, or
    /// `None` if the kind is not supported there.
    pub fn wire_id_for(&self, key: &PacketKey) -> Option<u32> {
        self.table.load().by_key.get(key).and_then(|k| k.wire_id())
    }

    /// All kinds in the current snapshot.
    pub fn kinds(&self) -> Vec<Arc<PacketKind>> {
        self.table.load().by_key.values().cloned().collect()
    }

    /// Whether the host protocol description has changed since the last
    /// rebuild.
    pub fn is_stale(&self) -> bool {
        self.table.load().generation != self.source.generation()
    }

    /// Configuration faults recorded by the rebuild that produced the current
    /// snapshot.
    pub fn faults(&self) -> Vec<RegistryFault> {
        self.table.load().faults.clone()
    }

    /// Protocol version the current snapshot was built against.
    pub fn protocol_version(&self) -> u32 {
        self.table.load().protocol_version
    }

    /// Recompute the entire wire-id table from the host protocol description.
    ///
    /// Idempotent; may be invoked speculatively. Atomic with respect to
    /// concurrent readers: the replacement table is fully built before the
    /// swap. Conflicting entries are skipped and recorded, never silently
    /// dropped.
    pub fn rebuild(&self) -> RebuildReport {
        // Capture the generation before reading the buckets so a concurrent
        // host mutation leaves us stale rather than silently current.
        let generation = self.source.generation();
        let protocol_version = self.source.protocol_version();

        let mut by_wire = HashMap::new();
        let mut by_key = HashMap::new();
        let mut faults = Vec::new();

        for phase in ProtocolPhase::ALL {
            for direction in [Direction::Inbound, Direction::Outbound] {
                for def in self.source.packets(phase, direction) {
                    let kind = Arc::new(PacketKind::new(
                        direction,
                        phase,
                        def.name.as_str(),
                        Some(def.wire_id),
                        def.terminal,
                    ));
                    let key = kind.key();

                    if by_key.contains_key(&key) {
                        warn!(%key, "skipping duplicate symbolic name during rebuild");
                        faults.push(RegistryFault::DuplicateName {
                            phase,
                            direction,
                            name: def.name.clone(),
                        });
                        continue;
                    }

                    match by_wire.entry((phase, direction, def.wire_id)) {
                        std::collections::hash_map::Entry::Occupied(existing) => {
                            let kept: &Arc<PacketKind> = existing.get();
                            warn!(
                                wire_id = def.wire_id,
                                kept = kept.name(),
                                skipped = def.name.as_str(),
                                %phase,
                                %direction,
                                "skipping wire id collision during rebuild"
                            );
                            faults.push(RegistryFault::WireIdCollision {
                                phase,
                                direction,
                                wire_id: def.wire_id,
                                kept: kept.name().to_string(),
                                skipped: def.name.clone(),
                            });
                        }
                        std::collections::hash_map::Entry::Vacant(slot) => {
                            slot.insert(Arc::clone(&kind));
                            by_key.insert(key, kind);
                        }
                    }
                }
            }
        }

        let report = RebuildReport {
            protocol_version,
            generation,
            kinds: by_key.len(),
            faults: faults.clone(),
        };

        self.table.store(Arc::new(RegistryTable {
            protocol_version,
            generation,
            by_wire,
            by_key,
            faults,
        }));

        debug!(
            protocol_version,
            generation,
            kinds = report.kinds,
            faults = report.faults.len(),
            "type registry rebuilt"
        );

        report
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.load();
        f.debug_struct("TypeRegistry")
            .field("protocol_version", &table.protocol_version)
            .field("generation", &table.generation)
            .field("kinds", &table.by_key.len())
            .field("faults", &table.faults.len())
            .finish()
    }
}
