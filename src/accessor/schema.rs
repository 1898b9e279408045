//! Field schemas for decoded messages.
//!
//! A producer (the external decoder collaborator) registers one
//! [`MessageSchema`] per concrete message shape, once. The schema is an
//! ordered list of erased field descriptors keyed by `TypeId`; everything the
//! accessor does afterwards is table lookups, no runtime introspection of the
//! message itself.
//!
//! Ordinals are per-declared-type: ordinal `1` of `u32` means "the second
//! field whose declared type is `u32`", independent of how many fields of
//! other types are declared around it. The builder preserves declaration
//! order, which makes ordinals stable for a given shape.

use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::registry::PacketKey;

/// Identity of a message shape, used as the compiled-cache key.
///
/// Two messages share a shape exactly when they are the same concrete Rust
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(TypeId);

impl ShapeId {
    pub fn of<M: Any>() -> Self {
        ShapeId(TypeId::of::<M>())
    }
}

/// Result of running a field setter.
pub enum SetOutcome {
    /// Value stored.
    Written,
    /// The field refused the write in the current runtime (absent in this
    /// version of the shape).
    Refused,
    /// The boxed value was not of the declared field type.
    WrongType,
}

/// Erased field read: `None` means the field refuses access at runtime.
pub type FieldGetter = Arc<dyn Fn(&dyn Any) -> Option<Box<dyn Any>> + Send + Sync>;
/// Erased field write.
pub type FieldSetter = Arc<dyn Fn(&mut dyn Any, Box<dyn Any>) -> SetOutcome + Send + Sync>;
/// Erased default-value constructor for `write_defaults`.
pub type FieldDefaultFn = Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>;

/// One field of a message shape: declared type plus erased accessors.
#[derive(Clone)]
pub struct FieldDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    getter: FieldGetter,
    setter: FieldSetter,
    default: Option<FieldDefaultFn>,
}

impl FieldDescriptor {
    /// Build a descriptor from raw erased accessors.
    ///
    /// This is the escape hatch for decoder collaborators that produce
    /// descriptors programmatically; the typed [`SchemaBuilder`] methods are
    /// preferred where the message type is known at compile time.
    pub fn from_parts(
        type_id: TypeId,
        type_name: &'static str,
        getter: FieldGetter,
        setter: FieldSetter,
        default: Option<FieldDefaultFn>,
    ) -> Self {
        Self {
            type_id,
            type_name,
            getter,
            setter,
            default,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn get(&self, target: &dyn Any) -> Option<Box<dyn Any>> {
        (self.getter)(target)
    }

    pub(crate) fn set(&self, target: &mut dyn Any, value: Box<dyn Any>) -> SetOutcome {
        (self.setter)(target, value)
    }

    pub(crate) fn default_value(&self) -> Option<Box<dyn Any>> {
        self.default.as_ref().map(|make| make())
    }

    pub(crate) fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("type_name", &self.type_name)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Ordered field schema for one message shape.
#[derive(Debug)]
pub struct MessageSchema {
    shape: ShapeId,
    message_type: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl MessageSchema {
    pub fn shape(&self) -> ShapeId {
        self.shape
    }

    pub fn message_type(&self) -> &'static str {
        self.message_type
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn field(&self, index: usize) -> &FieldDescriptor {
        &self.fields[index]
    }

    pub(crate) fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Uncompiled resolution: scan the declaration order for the `ordinal`-th
    /// field of the given type. Always correct; the compiled shape index
    /// exists purely to amortize this scan.
    pub(crate) fn locate(&self, type_id: TypeId, ordinal: usize) -> Option<usize> {
        let mut seen = 0;
        for (index, field) in self.fields.iter().enumerate() {
            if field.type_id == type_id {
                if seen == ordinal {
                    return Some(index);
                }
                seen += 1;
            }
        }
        None
    }

    /// How many fields of the given type the schema declares.
    pub(crate) fn count_of(&self, type_id: TypeId) -> usize {
        self.fields.iter().filter(|f| f.type_id == type_id).count()
    }
}

/// Builder for a [`MessageSchema`] over a concrete message type `M`.
pub struct SchemaBuilder<M> {
    fields: Vec<FieldDescriptor>,
    _marker: PhantomData<fn(M)>,
}

impl<M: Any> SchemaBuilder<M> {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declare a field of type `T` with infallible accessors.
    pub fn field<T, G, S>(mut self, get: G, set: S) -> Self
    where
        T: Any + Clone,
        G: Fn(&M) -> T + Send + Sync + 'static,
        S: Fn(&mut M, T) + Send + Sync + 'static,
    {
        self.fields.push(Self::descriptor_for(get, set, None));
        self
    }

    /// Declare a field of type `T` whose default value participates in
    /// [`crate::accessor::StructureAccessor::write_defaults`].
    pub fn field_with_default<T, G, S>(mut self, get: G, set: S) -> Self
    where
        T: Any + Clone + Default,
        G: Fn(&M) -> T + Send + Sync + 'static,
        S: Fn(&mut M, T) + Send + Sync + 'static,
    {
        let default: FieldDefaultFn = Arc::new(|| Box::new(T::default()));
        self.fields.push(Self::descriptor_for(get, set, Some(default)));
        self
    }

    /// Declare a field that may refuse access at runtime, e.g. one that only
    /// exists in some protocol versions of the shape. A getter returning
    /// `None` or a setter returning `false` surfaces as `AccessDenied`.
    pub fn fallible_field<T, G, S>(mut self, get: G, set: S) -> Self
    where
        T: Any + Clone,
        G: Fn(&M) -> Option<T> + Send + Sync + 'static,
        S: Fn(&mut M, T) -> bool + Send + Sync + 'static,
    {
        let getter: FieldGetter = Arc::new(move |target| {
            let message = target.downcast_ref::<M>()?;
            get(message).map(|value| Box::new(value) as Box<dyn Any>)
        });
        let setter: FieldSetter = Arc::new(move |target, value| {
            let Some(message) = target.downcast_mut::<M>() else {
                return SetOutcome::WrongType;
            };
            match value.downcast::<T>() {
                Ok(value) => {
                    if set(message, *value) {
                        SetOutcome::Written
                    } else {
                        SetOutcome::Refused
                    }
                }
                Err(_) => SetOutcome::WrongType,
            }
        });
        self.fields.push(FieldDescriptor::from_parts(
            TypeId::of::<T>(),
            type_name::<T>(),
            getter,
            setter,
            None,
        ));
        self
    }

    /// Append a pre-built descriptor verbatim.
    pub fn descriptor(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    pub fn build(self) -> Arc<MessageSchema> {
        Arc::new(MessageSchema {
            shape: ShapeId::of::<M>(),
            message_type: type_name::<M>(),
            fields: self.fields,
        })
    }

    fn descriptor_for<T, G, S>(get: G, set: S, default: Option<FieldDefaultFn>) -> FieldDescriptor
    where
        T: Any + Clone,
        G: Fn(&M) -> T + Send + Sync + 'static,
        S: Fn(&mut M, T) + Send + Sync + 'static,
    {
        let getter: FieldGetter = Arc::new(move |target| {
            let message = target.downcast_ref::<M>()?;
            Some(Box::new(get(message)) as Box<dyn Any>)
        });
        let setter: FieldSetter = Arc::new(move |target, value| {
            let Some(message) = target.downcast_mut::<M>() else {
                return SetOutcome::WrongType;
            };
            match value.downcast::<T>() {
                Ok(value) => {
                    set(message, *value);
                    SetOutcome::Written
                }
                Err(_) => SetOutcome::WrongType,
            }
        });
        FieldDescriptor::from_parts(TypeId::of::<T>(), type_name::<T>(), getter, setter, default)
    }
}

impl<M: Any> Default for SchemaBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Schemas supplied by the decoder collaborator, keyed by logical packet
/// kind.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<PacketKey, Arc<MessageSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the schema for a packet kind.
    pub fn register(&self, key: PacketKey, schema: Arc<MessageSchema>) {
        self.schemas.write().insert(key, schema);
    }

    pub fn lookup(&self, key: &PacketKey) -> Option<Arc<MessageSchema>> {
        self.schemas.read().get(key).cloned()
    }

    pub fn contains(&self, key: &PacketKey) -> bool {
        self.schemas.read().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        a: u32,
        b: u32,
        label: String,
    }

    fn sample_schema() -> Arc<MessageSchema> {
        SchemaBuilder::<Sample>::new()
            .field(|m: &Sample| m.a, |m, v| m.a = v)
            .field(
                |m: &Sample| m.label.clone(),
                |m, v: String| m.label = v,
            )
            .field(|m: &Sample| m.b, |m, v| m.b = v)
            .build()
    }

    #[test]
    fn ordinals_count_per_type_not_per_position() {
        let schema = sample_schema();

        // Second u32 field is at absolute index 2, after the String.
        assert_eq!(schema.locate(TypeId::of::<u32>(), 0), Some(0));
        assert_eq!(schema.locate(TypeId::of::<u32>(), 1), Some(2));
        assert_eq!(schema.locate(TypeId::of::<String>(), 0), Some(1));
        assert_eq!(schema.locate(TypeId::of::<u32>(), 2), None);
    }

    #[test]
    fn count_matches_declarations() {
        let schema = sample_schema();
        assert_eq!(schema.count_of(TypeId::of::<u32>()), 2);
        assert_eq!(schema.count_of(TypeId::of::<String>()), 1);
        assert_eq!(schema.count_of(TypeId::of::<bool>()), 0);
    }
}
