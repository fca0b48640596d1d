//! Hand-written record fixtures for the crate's own tests.
//!
//! The `test_record!` macro expands the same `Record`/`FieldValue`
//! implementation the derive emits, minus the attribute parsing, so the core
//! can be tested without depending on the proc-macro crate.

use chrono::{DateTime, Utc};

macro_rules! test_record {
    ($name:ident { $($field:ident : $ty:ty = $tag:literal),* $(,)? }) => {
        impl crate::reflect::FieldValue for $name {
            fn field_kind() -> crate::reflect::FieldKind {
                crate::reflect::FieldKind::Struct(<$name as crate::reflect::Record>::vtable())
            }

            fn zero() -> Self {
                Self {
                    $($field: <$ty as crate::reflect::FieldValue>::zero(),)*
                }
            }

            fn to_value(&self) -> crate::reflect::Value {
                crate::reflect::Value::Record(Box::new(self.clone()))
            }

            fn from_value(
                value: crate::reflect::Value,
            ) -> Result<Self, crate::error::CodecError> {
                crate::reflect::record_from_value(value)
            }

            fn as_record(&self) -> Option<&dyn std::any::Any> {
                Some(self)
            }

            fn as_record_mut(&mut self) -> Option<&mut dyn std::any::Any> {
                Some(self)
            }
        }

        impl crate::reflect::Record for $name {
            fn record_name() -> &'static str {
                stringify!($name)
            }

            fn raw_fields() -> &'static [crate::reflect::RawField] {
                static FIELDS: std::sync::LazyLock<Vec<crate::reflect::RawField>> =
                    std::sync::LazyLock::new(|| {
                        vec![
                            $(crate::reflect::RawField {
                                name: stringify!($field),
                                tag: $tag,
                                kind: <$ty as crate::reflect::FieldValue>::field_kind(),
                                get: |record| {
                                    let record = record
                                        .downcast_ref::<$name>()
                                        .expect("record type");
                                    crate::reflect::FieldValue::to_value(&record.$field)
                                },
                                set: |record, value| {
                                    let record = record
                                        .downcast_mut::<$name>()
                                        .expect("record type");
                                    record.$field =
                                        crate::reflect::FieldValue::from_value(value)?;
                                    Ok(())
                                },
                                borrow: |record| {
                                    let record = record
                                        .downcast_ref::<$name>()
                                        .expect("record type");
                                    crate::reflect::FieldValue::as_record(&record.$field)
                                },
                                borrow_mut: |record| {
                                    let record = record
                                        .downcast_mut::<$name>()
                                        .expect("record type");
                                    crate::reflect::FieldValue::as_record_mut(
                                        &mut record.$field,
                                    )
                                },
                            },)*
                        ]
                    });
                &FIELDS
            }

            fn vtable() -> &'static crate::reflect::RecordVtable {
                static VTABLE: crate::reflect::RecordVtable = crate::reflect::RecordVtable {
                    name: stringify!($name),
                    fields: <$name as crate::reflect::Record>::raw_fields,
                    new_boxed: || Box::new(<$name as crate::reflect::FieldValue>::zero()),
                    type_id: std::any::TypeId::of::<$name>,
                };
                &VTABLE
            }
        }
    };
}

pub(crate) use test_record;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Point {
    pub x: i64,
    pub y: i64,
}

test_record!(Point {
    x: i64 = "",
    y: i64 = "",
});

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Base {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

test_record!(Base {
    id: String = "id,index",
    created_at: DateTime<Utc> = "",
});

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct User {
    pub base: Base,
    pub name: String,
    pub age: i64,
    pub secret: String,
}

test_record!(User {
    base: Base = ",embed",
    name: String = "",
    age: i64 = "",
    secret: String = "-",
});

/// Same shape as [`User`] but embedding through an optional.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LazyUser {
    pub base: Option<Base>,
    pub name: String,
}

test_record!(LazyUser {
    base: Option<Base> = ",embed",
    name: String = "",
});
