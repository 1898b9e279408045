//! # Structure Accessor
//!
//! Generic, order-preserving access to the typed fields of a decoded message
//! by (declared type, ordinal), without compile-time knowledge of the
//! message's concrete shape.
//!
//! ## Components
//! - **Schema**: registration-time field descriptors per message shape
//! - **StructureAccessor**: bound read/write view over one message
//! - **Compiler**: background-built per-shape index for fast resolution
//!
//! ## Performance
//! Resolution of "the n-th field of type T" dominates repeated access cost.
//! The compiled index trades a one-time background build per shape for
//! near-direct lookups on every subsequent access; the uncompiled scan
//! remains the always-correct fallback.

pub mod compiler;
pub mod schema;
pub mod structure;

pub use compiler::{CompiledShape, ShapeCache};
pub use schema::{
    FieldDefaultFn, FieldDescriptor, FieldGetter, FieldSetter, MessageSchema, SchemaBuilder,
    SchemaRegistry, SetOutcome, ShapeId,
};
pub use structure::{DefaultsReport, SkippedDefault, StructureAccessor};
