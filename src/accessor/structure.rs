//! Generic read/write view over a decoded message's typed fields.
//!
//! A [`StructureAccessor`] borrows one message for the scope of one
//! interception and addresses fields by (declared type, ordinal among fields
//! of that type). It never owns the message and never outlives the dispatch
//! that created it.
//!
//! Field resolution prefers the compiled per-shape index when the
//! [`ShapeCache`] has one; otherwise it falls back to scanning the schema.
//! Both paths return identical results.

use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use crate::error::{InterceptError, Result};

use super::compiler::{CompiledShape, ShapeCache};
use super::schema::{MessageSchema, SetOutcome};

/// Report produced by [`StructureAccessor::write_defaults`].
#[derive(Debug, Default)]
pub struct DefaultsReport {
    /// Number of fields that received a default value.
    pub applied: usize,
    /// Fields that could not be defaulted, with the reason left to the
    /// caller to inspect. The operation never aborts because of these.
    pub skipped: Vec<SkippedDefault>,
}

/// One field skipped by `write_defaults`.
#[derive(Debug)]
pub struct SkippedDefault {
    /// Absolute index of the field in the schema.
    pub index: usize,
    /// Declared type of the field.
    pub type_name: &'static str,
}

/// Accessor bound to one concrete decoded message.
pub struct StructureAccessor<'m> {
    schema: Arc<MessageSchema>,
    compiled: Option<Arc<CompiledShape>>,
    target: &'m mut dyn Any,
}

impl<'m> StructureAccessor<'m> {
    /// Bind a schema to a message using uncompiled resolution only.
    pub fn new(schema: Arc<MessageSchema>, target: &'m mut dyn Any) -> Self {
        Self {
            schema,
            compiled: None,
            target,
        }
    }

    /// Bind a schema to a message, picking up the compiled index if the
    /// cache has one and queueing background compilation if it does not.
    pub fn with_cache(
        schema: Arc<MessageSchema>,
        cache: &ShapeCache,
        target: &'m mut dyn Any,
    ) -> Self {
        let compiled = cache.lookup(schema.shape());
        if compiled.is_none() {
            cache.request(&schema);
        }
        Self {
            schema,
            compiled,
            target,
        }
    }

    pub(crate) fn from_parts(
        schema: Arc<MessageSchema>,
        compiled: Option<Arc<CompiledShape>>,
        target: &'m mut dyn Any,
    ) -> Self {
        Self {
            schema,
            compiled,
            target,
        }
    }

    /// Rebind to a different message of the same shape, reusing the schema
    /// and any compiled resolution already attached.
    ///
    /// This is the cheap path for hosts that see many messages of the same
    /// logical type: resolution state carries over, only the borrow changes.
    pub fn with_target<'n>(self, target: &'n mut dyn Any) -> StructureAccessor<'n> {
        StructureAccessor {
            schema: self.schema,
            compiled: self.compiled,
            target,
        }
    }

    /// The schema this accessor resolves against.
    pub fn schema(&self) -> &Arc<MessageSchema> {
        &self.schema
    }

    /// Whether the compiled fast path is active for this accessor.
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Number of declared fields of type `T`.
    pub fn field_count<T: Any>(&self) -> usize {
        self.schema.count_of(TypeId::of::<T>())
    }

    /// Read the `ordinal`-th field of type `T`.
    pub fn read<T: Any + Clone>(&self, ordinal: usize) -> Result<T> {
        let index = self.locate(TypeId::of::<T>(), ordinal).ok_or_else(|| {
            InterceptError::FieldNotFound {
                type_name: type_name::<T>(),
                ordinal,
                available: self.schema.count_of(TypeId::of::<T>()),
            }
        })?;

        let field = self.schema.field(index);
        let value = field
            .get(&*self.target)
            .ok_or_else(|| InterceptError::AccessDenied {
                type_name: field.type_name(),
                ordinal,
            })?;

        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| InterceptError::TypeMismatch {
                expected: type_name::<T>(),
                ordinal,
            })
    }

    /// Read the `ordinal`-th field of type `T`, or `None` if the field does
    /// not exist or refuses access. The quiet alternative to [`read`] for
    /// version-dependent fields.
    ///
    /// [`read`]: StructureAccessor::read
    pub fn read_safely<T: Any + Clone>(&self, ordinal: usize) -> Option<T> {
        self.read(ordinal).ok()
    }

    /// Write the `ordinal`-th field of type `T`.
    pub fn write<T: Any>(&mut self, ordinal: usize, value: T) -> Result<()> {
        let index = self.locate(TypeId::of::<T>(), ordinal).ok_or_else(|| {
            InterceptError::FieldNotFound {
                type_name: type_name::<T>(),
                ordinal,
                available: self.schema.count_of(TypeId::of::<T>()),
            }
        })?;

        let field = self.schema.field(index);
        match field.set(&mut *self.target, Box::new(value)) {
            SetOutcome::Written => Ok(()),
            SetOutcome::Refused => Err(InterceptError::AccessDenied {
                type_name: field.type_name(),
                ordinal,
            }),
            SetOutcome::WrongType => Err(InterceptError::TypeMismatch {
                expected: field.type_name(),
                ordinal,
            }),
        }
    }

    /// Read-modify-write the `ordinal`-th field of type `T`.
    pub fn modify<T: Any + Clone>(&mut self, ordinal: usize, apply: impl FnOnce(T) -> T) -> Result<()> {
        let value = self.read::<T>(ordinal)?;
        self.write(ordinal, apply(value))
    }

    /// Every readable value of type `T`, in ordinal order. Fields that
    /// refuse access are omitted.
    pub fn values<T: Any + Clone>(&self) -> Vec<T> {
        (0..self.field_count::<T>())
            .filter_map(|ordinal| self.read_safely(ordinal))
            .collect()
    }

    /// Fill every defaultable field with a type-appropriate default value.
    ///
    /// Used when synthesizing a message from scratch. Fields without a
    /// registered default, and fields whose setter refuses the write, are
    /// skipped and reported; the operation itself never fails.
    pub fn write_defaults(&mut self) -> DefaultsReport {
        let mut report = DefaultsReport::default();

        for index in 0..self.schema.len() {
            let field = self.schema.field(index);
            if !field.has_default() {
                report.skipped.push(SkippedDefault {
                    index,
                    type_name: field.type_name(),
                });
                continue;
            }

            let Some(value) = field.default_value() else {
                report.skipped.push(SkippedDefault {
                    index,
                    type_name: field.type_name(),
                });
                continue;
            };

            match field.set(&mut *self.target, value) {
                SetOutcome::Written => report.applied += 1,
                SetOutcome::Refused | SetOutcome::WrongType => {
                    report.skipped.push(SkippedDefault {
                        index,
                        type_name: field.type_name(),
                    });
                }
            }
        }

        report
    }

    fn locate(&self, type_id: TypeId, ordinal: usize) -> Option<usize> {
        match &self.compiled {
            Some(compiled) => compiled.locate(type_id, ordinal),
            None => self.schema.locate(type_id, ordinal),
        }
    }
}

impl std::fmt::Debug for StructureAccessor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructureAccessor")
            .field("message_type", &self.schema.message_type())
            .field("fields", &self.schema.len())
            .field("compiled", &self.compiled.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::schema::SchemaBuilder;
    use super::*;

    #[derive(Default)]
    struct Chat {
        sender_id: u64,
        text: String,
        echoed: bool,
    }

    fn chat_schema() -> Arc<MessageSchema> {
        SchemaBuilder::<Chat>::new()
            .field_with_default(|m: &Chat| m.sender_id, |m, v| m.sender_id = v)
            .field(|m: &Chat| m.text.clone(), |m, v: String| m.text = v)
            .field_with_default(|m: &Chat| m.echoed, |m, v| m.echoed = v)
            .build()
    }

    #[test]
    fn write_then_read_roundtrips() {
        let mut message = Chat::default();
        let mut accessor = StructureAccessor::new(chat_schema(), &mut message);

        accessor.write::<u64>(0, 42).unwrap();
        accessor.write::<String>(0, "hello".into()).unwrap();

        assert_eq!(accessor.read::<u64>(0).unwrap(), 42);
        assert_eq!(accessor.read::<String>(0).unwrap(), "hello");
        assert_eq!(message.sender_id, 42);
    }

    #[test]
    fn out_of_bounds_ordinal_is_field_not_found() {
        let mut message = Chat::default();
        let accessor = StructureAccessor::new(chat_schema(), &mut message);

        let error = accessor.read::<u64>(1).unwrap_err();
        assert!(matches!(
            error,
            InterceptError::FieldNotFound {
                ordinal: 1,
                available: 1,
                ..
            }
        ));
        assert!(accessor.read_safely::<u64>(1).is_none());
    }

    #[test]
    fn modify_applies_in_place() {
        let mut message = Chat {
            sender_id: 10,
            ..Chat::default()
        };
        let mut accessor = StructureAccessor::new(chat_schema(), &mut message);

        accessor.modify::<u64>(0, |v| v * 3).unwrap();
        assert_eq!(message.sender_id, 30);
    }

    #[test]
    fn defaults_skip_fields_without_one() {
        let mut message = Chat {
            sender_id: 7,
            text: "keep".into(),
            echoed: true,
        };
        let mut accessor = StructureAccessor::new(chat_schema(), &mut message);

        let report = accessor.write_defaults();
        assert_eq!(report.applied, 2);
        assert_eq!(report.skipped.len(), 1);

        assert_eq!(message.sender_id, 0);
        assert!(!message.echoed);
        assert_eq!(message.text, "keep");
    }

    #[test]
    fn with_target_carries_resolution_state() {
        let cache = ShapeCache::new();
        let schema = chat_schema();
        cache.compile_now(&schema);

        let mut first = Chat::default();
        let accessor = StructureAccessor::with_cache(Arc::clone(&schema), &cache, &mut first);
        assert!(accessor.is_compiled());

        let mut second = Chat::default();
        let mut accessor = accessor.with_target(&mut second);
        assert!(accessor.is_compiled());
        accessor.write::<bool>(0, true).unwrap();
        assert!(second.echoed);
    }
}
