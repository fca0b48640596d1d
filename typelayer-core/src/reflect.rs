//! Declarative type metadata: the closed set of field kinds, the canonical
//! exchange [`Value`], and the traits record types implement.
//!
//! Rust has no runtime reflection, so every record type carries a static
//! description of itself: a [`RecordVtable`] naming the type and listing its
//! [`RawField`]s, each of which pairs a [`FieldKind`] with capture-free
//! accessor functions operating on `&dyn Any`. The schema engine consumes
//! this metadata; nothing downstream ever needs to know the concrete type.
//!
//! The `#[derive(Record)]` macro emits all of this for a struct. The
//! [`FieldValue`] implementations in this module cover every supported
//! non-struct field type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use bson::Bson;
use chrono::{DateTime, Utc};

use crate::error::CodecError;

/// The scalar field kinds a record may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bool,
    String,
}

impl ScalarKind {
    /// A short name for error messages.
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Int8 => "i8",
            ScalarKind::Int16 => "i16",
            ScalarKind::Int32 => "i32",
            ScalarKind::Int64 => "i64",
            ScalarKind::UInt8 => "u8",
            ScalarKind::UInt16 => "u16",
            ScalarKind::UInt32 => "u32",
            ScalarKind::UInt64 => "u64",
            ScalarKind::Float32 => "f32",
            ScalarKind::Float64 => "f64",
            ScalarKind::Bool => "bool",
            ScalarKind::String => "string",
        }
    }
}

/// The closed set of kinds a record field may have.
///
/// `Optional` wraps any other kind; [`FieldKind::indirect`] strips one layer
/// of it, which is how the rest of the engine reasons about "the type behind
/// the pointer".
#[derive(Clone, Debug)]
pub enum FieldKind {
    /// A plain scalar.
    Scalar(ScalarKind),
    /// A 16-byte UUID, stored as tagged binary.
    Uuid,
    /// A point in time, stored as a native document datetime.
    DateTime,
    /// An opaque document value passed through untouched.
    Raw,
    /// A nested record struct, identified by its vtable.
    Struct(&'static RecordVtable),
    /// A homogeneous list of the given element kind.
    List(Box<FieldKind>),
    /// A string-keyed map of the given value kind.
    Map(Box<FieldKind>),
    /// An optional wrapper around another kind.
    Optional(Box<FieldKind>),
}

impl FieldKind {
    /// Strips at most one `Optional` layer.
    pub fn indirect(&self) -> &FieldKind {
        match self {
            FieldKind::Optional(inner) => inner,
            other => other,
        }
    }

    /// The vtable of the struct behind at most one `Optional` layer, if any.
    pub fn struct_vtable(&self) -> Option<&'static RecordVtable> {
        match self.indirect() {
            FieldKind::Struct(vtable) => Some(vtable),
            _ => None,
        }
    }

    /// A structural description for error messages, e.g. `list<i32>` or
    /// `optional<User>`.
    pub fn describe(&self) -> String {
        match self {
            FieldKind::Scalar(kind) => kind.name().to_string(),
            FieldKind::Uuid => "uuid".to_string(),
            FieldKind::DateTime => "datetime".to_string(),
            FieldKind::Raw => "raw".to_string(),
            FieldKind::Struct(vtable) => vtable.name.to_string(),
            FieldKind::List(elem) => format!("list<{}>", elem.describe()),
            FieldKind::Map(value) => format!("map<string, {}>", value.describe()),
            FieldKind::Optional(inner) => format!("optional<{}>", inner.describe()),
        }
    }
}

/// The canonical exchange value between field accessors and the codec.
///
/// Narrow integers widen to the 32-bit form on read; 64-bit integers pass
/// through unchanged. `Record` carries a type-erased nested record for the
/// codec to recurse into.
#[derive(Debug)]
pub enum Value {
    Null,
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Double(f64),
    Bool(bool),
    String(String),
    Uuid(bson::Uuid),
    DateTime(bson::DateTime),
    Record(Box<dyn AnyRecord>),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
    Raw(Bson),
}

impl Value {
    /// A short name of the variant for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int32(_) => "i32",
            Value::Int64(_) => "i64",
            Value::UInt32(_) => "u32",
            Value::UInt64(_) => "u64",
            Value::Double(_) => "f64",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Uuid(_) => "uuid",
            Value::DateTime(_) => "datetime",
            Value::Record(_) => "record",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Raw(_) => "raw",
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Null => Value::Null,
            Value::Int32(v) => Value::Int32(*v),
            Value::Int64(v) => Value::Int64(*v),
            Value::UInt32(v) => Value::UInt32(*v),
            Value::UInt64(v) => Value::UInt64(*v),
            Value::Double(v) => Value::Double(*v),
            Value::Bool(v) => Value::Bool(*v),
            Value::String(v) => Value::String(v.clone()),
            Value::Uuid(v) => Value::Uuid(*v),
            Value::DateTime(v) => Value::DateTime(*v),
            Value::Record(rec) => Value::Record(rec.clone_boxed()),
            Value::List(items) => Value::List(items.clone()),
            Value::Map(entries) => Value::Map(entries.clone()),
            Value::Raw(raw) => Value::Raw(raw.clone()),
        }
    }
}

pub(crate) fn shape_mismatch(expected: &str, found: &Value) -> CodecError {
    CodecError::ShapeMismatch {
        expected: expected.to_string(),
        found: found.kind_name().to_string(),
    }
}

/// Static description of a record type: its name, its field list, and the
/// hooks needed to create and identify instances behind type erasure.
pub struct RecordVtable {
    /// The unqualified record type name.
    pub name: &'static str,
    /// Returns the declarative field list, in declaration order.
    pub fields: fn() -> &'static [RawField],
    /// Creates a zero-valued boxed instance.
    pub new_boxed: fn() -> Box<dyn AnyRecord>,
    /// Returns the `TypeId` of the concrete type.
    pub type_id: fn() -> TypeId,
}

impl fmt::Debug for RecordVtable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordVtable").field("name", &self.name).finish()
    }
}

/// Declarative metadata for a single field, as emitted by the derive.
///
/// The accessors are capture-free functions that downcast the erased record
/// to the concrete type internally. `borrow`/`borrow_mut` expose a nested
/// record struct for embedded-field traversal; they return `None` for
/// non-struct fields and for unset optionals (`borrow_mut` allocates a zero
/// instance into an unset optional instead).
#[derive(Clone, Debug)]
pub struct RawField {
    /// Source field name as written in the struct.
    pub name: &'static str,
    /// The raw mapping tag attached to the field, possibly empty.
    pub tag: &'static str,
    /// The field's declared kind.
    pub kind: FieldKind,
    /// Reads the field as a canonical [`Value`].
    pub get: fn(&dyn Any) -> Value,
    /// Writes a canonical [`Value`] into the field, coercing as needed.
    pub set: fn(&mut dyn Any, Value) -> Result<(), CodecError>,
    /// Borrows the field as an erased nested record, if it is one.
    pub borrow: fn(&dyn Any) -> Option<&dyn Any>,
    /// Mutably borrows the field as an erased nested record, allocating
    /// through an unset optional.
    pub borrow_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>,
}

/// Per-type conversion contract between a field's native type and the
/// canonical [`Value`].
///
/// Implemented here for every supported non-struct field type and by
/// `#[derive(Record)]` for record structs.
pub trait FieldValue: Send + Sync + Sized + 'static {
    /// The declared kind of this type.
    fn field_kind() -> FieldKind;

    /// The zero value decode starts from.
    fn zero() -> Self;

    /// Converts to the canonical exchange value.
    fn to_value(&self) -> Value;

    /// Converts from the canonical exchange value. `Value::Null` always
    /// yields the zero value.
    fn from_value(value: Value) -> Result<Self, CodecError>;

    /// Borrows this value as an erased record struct, if it is one.
    fn as_record(&self) -> Option<&dyn Any> {
        None
    }

    /// Mutably borrows this value as an erased record struct, if it is one.
    /// Optional wrappers allocate their zero value first.
    fn as_record_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// A mappable record struct. Implemented via `#[derive(Record)]`.
pub trait Record: FieldValue + Clone + fmt::Debug + Send + Sync + 'static {
    /// The unqualified type name.
    fn record_name() -> &'static str;

    /// The declarative field list, in declaration order.
    fn raw_fields() -> &'static [RawField];

    /// The static vtable shared by all instances.
    fn vtable() -> &'static RecordVtable;
}

/// Object-safe companion of [`Record`], blanket-implemented for every record
/// type. This is the currency of type-erased payloads and nested record
/// values.
pub trait AnyRecord: fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn clone_boxed(&self) -> Box<dyn AnyRecord>;
    fn record_vtable(&self) -> &'static RecordVtable;
}

impl<T: Record> AnyRecord for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_boxed(&self) -> Box<dyn AnyRecord> {
        Box::new(self.clone())
    }

    fn record_vtable(&self) -> &'static RecordVtable {
        T::vtable()
    }
}

impl Clone for Box<dyn AnyRecord> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Recovers a concrete record from a type-erased [`Value::Record`].
///
/// Shared by every derived `FieldValue::from_value` implementation.
pub fn record_from_value<T: Record>(value: Value) -> Result<T, CodecError> {
    match value {
        Value::Null => Ok(T::zero()),
        Value::Record(rec) => {
            let found = rec.record_vtable().name;
            rec.into_any()
                .downcast::<T>()
                .map(|boxed| *boxed)
                .map_err(|_| CodecError::RecordMismatch {
                    expected: T::record_name(),
                    found,
                })
        }
        other => Err(shape_mismatch(T::record_name(), &other)),
    }
}

macro_rules! integer_field_value {
    ($ty:ty, $kind:ident, |$v:ident| $to:expr) => {
        impl FieldValue for $ty {
            fn field_kind() -> FieldKind {
                FieldKind::Scalar(ScalarKind::$kind)
            }

            fn zero() -> Self {
                0
            }

            fn to_value(&self) -> Value {
                let $v = *self;
                $to
            }

            fn from_value(value: Value) -> Result<Self, CodecError> {
                match value {
                    Value::Null => Ok(0),
                    Value::Int32(v) => Ok(v as $ty),
                    Value::Int64(v) => Ok(v as $ty),
                    Value::UInt32(v) => Ok(v as $ty),
                    Value::UInt64(v) => Ok(v as $ty),
                    other => Err(shape_mismatch("an integer", &other)),
                }
            }
        }
    };
}

integer_field_value!(i8, Int8, |v| Value::Int32(i32::from(v)));
integer_field_value!(i16, Int16, |v| Value::Int32(i32::from(v)));
integer_field_value!(i32, Int32, |v| Value::Int32(v));
integer_field_value!(i64, Int64, |v| Value::Int64(v));
integer_field_value!(u8, UInt8, |v| Value::UInt32(u32::from(v)));
integer_field_value!(u16, UInt16, |v| Value::UInt32(u32::from(v)));
integer_field_value!(u32, UInt32, |v| Value::UInt32(v));
integer_field_value!(u64, UInt64, |v| Value::UInt64(v));

macro_rules! float_field_value {
    ($ty:ty, $kind:ident) => {
        impl FieldValue for $ty {
            fn field_kind() -> FieldKind {
                FieldKind::Scalar(ScalarKind::$kind)
            }

            fn zero() -> Self {
                0.0
            }

            fn to_value(&self) -> Value {
                Value::Double(f64::from(*self))
            }

            fn from_value(value: Value) -> Result<Self, CodecError> {
                match value {
                    Value::Null => Ok(0.0),
                    Value::Double(v) => Ok(v as $ty),
                    Value::Int32(v) => Ok(v as $ty),
                    Value::Int64(v) => Ok(v as $ty),
                    Value::UInt32(v) => Ok(v as $ty),
                    Value::UInt64(v) => Ok(v as $ty),
                    other => Err(shape_mismatch("a number", &other)),
                }
            }
        }
    };
}

float_field_value!(f32, Float32);
float_field_value!(f64, Float64);

impl FieldValue for bool {
    fn field_kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::Bool)
    }

    fn zero() -> Self {
        false
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(v) => Ok(v),
            other => Err(shape_mismatch("bool", &other)),
        }
    }
}

impl FieldValue for String {
    fn field_kind() -> FieldKind {
        FieldKind::Scalar(ScalarKind::String)
    }

    fn zero() -> Self {
        String::new()
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::String(v) => Ok(v),
            other => Err(shape_mismatch("string", &other)),
        }
    }
}

impl FieldValue for bson::Uuid {
    fn field_kind() -> FieldKind {
        FieldKind::Uuid
    }

    fn zero() -> Self {
        bson::Uuid::from_bytes([0; 16])
    }

    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(Self::zero()),
            Value::Uuid(v) => Ok(v),
            other => Err(shape_mismatch("uuid", &other)),
        }
    }
}

impl FieldValue for DateTime<Utc> {
    fn field_kind() -> FieldKind {
        FieldKind::DateTime
    }

    fn zero() -> Self {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn to_value(&self) -> Value {
        Value::DateTime(bson::DateTime::from_chrono(*self))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(Self::zero()),
            Value::DateTime(v) => Ok(v.to_chrono()),
            other => Err(shape_mismatch("datetime", &other)),
        }
    }
}

impl FieldValue for bson::DateTime {
    fn field_kind() -> FieldKind {
        FieldKind::DateTime
    }

    fn zero() -> Self {
        bson::DateTime::from_millis(0)
    }

    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(Self::zero()),
            Value::DateTime(v) => Ok(v),
            other => Err(shape_mismatch("datetime", &other)),
        }
    }
}

impl FieldValue for Bson {
    fn field_kind() -> FieldKind {
        FieldKind::Raw
    }

    fn zero() -> Self {
        Bson::Null
    }

    fn to_value(&self) -> Value {
        Value::Raw(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(Bson::Null),
            Value::Raw(raw) => Ok(raw),
            Value::Int32(v) => Ok(Bson::Int32(v)),
            Value::Int64(v) => Ok(Bson::Int64(v)),
            Value::UInt32(v) => Ok(Bson::Int64(i64::from(v))),
            Value::UInt64(v) => i64::try_from(v)
                .map(Bson::Int64)
                .map_err(|_| CodecError::UnsignedOverflow(v)),
            Value::Double(v) => Ok(Bson::Double(v)),
            Value::Bool(v) => Ok(Bson::Boolean(v)),
            Value::String(v) => Ok(Bson::String(v)),
            Value::Uuid(v) => Ok(Bson::from(v)),
            Value::DateTime(v) => Ok(Bson::DateTime(v)),
            Value::List(items) => Ok(Bson::Array(
                items
                    .into_iter()
                    .map(Bson::from_value)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Value::Map(entries) => {
                let mut doc = bson::Document::new();
                for (key, entry) in entries {
                    doc.insert(key, Bson::from_value(entry)?);
                }
                Ok(Bson::Document(doc))
            }
            other @ Value::Record(_) => Err(shape_mismatch("a raw value", &other)),
        }
    }
}

impl<V: FieldValue> FieldValue for Option<V> {
    fn field_kind() -> FieldKind {
        FieldKind::Optional(Box::new(V::field_kind()))
    }

    fn zero() -> Self {
        None
    }

    fn to_value(&self) -> Value {
        match self {
            None => Value::Null,
            Some(inner) => inner.to_value(),
        }
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(None),
            other => Ok(Some(V::from_value(other)?)),
        }
    }

    fn as_record(&self) -> Option<&dyn Any> {
        self.as_ref().and_then(FieldValue::as_record)
    }

    fn as_record_mut(&mut self) -> Option<&mut dyn Any> {
        // Resolve-or-create: writing through an unset optional allocates
        // the zero value first.
        self.get_or_insert_with(V::zero).as_record_mut()
    }
}

impl<V: FieldValue> FieldValue for Vec<V> {
    fn field_kind() -> FieldKind {
        FieldKind::List(Box::new(V::field_kind()))
    }

    fn zero() -> Self {
        Vec::new()
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::List(items) => items.into_iter().map(V::from_value).collect(),
            other => Err(shape_mismatch("a list", &other)),
        }
    }
}

impl<V: FieldValue> FieldValue for HashMap<String, V> {
    fn field_kind() -> FieldKind {
        FieldKind::Map(Box::new(V::field_kind()))
    }

    fn zero() -> Self {
        HashMap::new()
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(key, entry)| (key.clone(), entry.to_value()))
                .collect(),
        )
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(HashMap::new()),
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, entry)| Ok((key, V::from_value(entry)?)))
                .collect(),
            other => Err(shape_mismatch("a map", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_integers_widen_on_read() {
        assert!(matches!(5i8.to_value(), Value::Int32(5)));
        assert!(matches!(5u16.to_value(), Value::UInt32(5)));
        assert!(matches!(5i64.to_value(), Value::Int64(5)));
    }

    #[test]
    fn null_yields_zero_values() {
        assert_eq!(i32::from_value(Value::Null).unwrap(), 0);
        assert_eq!(String::from_value(Value::Null).unwrap(), "");
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Vec::<bool>::from_value(Value::Null).unwrap(), Vec::<bool>::new());
    }

    #[test]
    fn integer_narrowing_uses_plain_casts() {
        assert_eq!(i8::from_value(Value::Int64(300)).unwrap(), 300i64 as i8);
        assert_eq!(u32::from_value(Value::Int64(7)).unwrap(), 7);
    }

    #[test]
    fn shape_mismatches_are_rejected() {
        assert!(matches!(
            bool::from_value(Value::String("yes".into())),
            Err(CodecError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            Vec::<i32>::from_value(Value::Int32(1)),
            Err(CodecError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn optional_wraps_and_unwraps() {
        assert!(matches!(Option::<i32>::field_kind(), FieldKind::Optional(_)));
        let kind = Option::<i32>::field_kind();
        assert!(matches!(kind.indirect(), FieldKind::Scalar(ScalarKind::Int32)));
        assert!(matches!(Some(3i32).to_value(), Value::Int32(3)));
        assert!(matches!(None::<i32>.to_value(), Value::Null));
    }

    #[test]
    fn kind_descriptions() {
        assert_eq!(Vec::<Option<String>>::field_kind().describe(), "list<optional<string>>");
        assert_eq!(
            HashMap::<String, f64>::field_kind().describe(),
            "map<string, f64>"
        );
    }

    #[test]
    fn datetime_round_trips_through_millis() {
        let now = bson::DateTime::from_millis(1_700_000_000_000);
        let chrono_value = DateTime::<Utc>::from_value(Value::DateTime(now)).unwrap();
        assert!(matches!(
            chrono_value.to_value(),
            Value::DateTime(dt) if dt == now
        ));
    }
}
