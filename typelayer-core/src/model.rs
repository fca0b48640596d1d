//! Ready-made helper records for common document shapes.

use std::any::{Any, TypeId};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};

use crate::error::CodecError;
use crate::reflect::{
    record_from_value, FieldKind, FieldValue, RawField, Record, RecordVtable, Value,
};

/// Creation/modification times, meant to be embedded into record types:
///
/// ```ignore
/// #[derive(Record, Clone, Debug)]
/// struct Article {
///     title: String,
///     #[record(",embed")]
///     stamps: Timestamps,
/// }
/// ```
///
/// Implemented by hand rather than derived, which doubles as a reference
/// for what `#[derive(Record)]` expands to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Timestamps {
    /// Both stamps set to the current instant.
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    /// Bumps the modification time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl FieldValue for Timestamps {
    fn field_kind() -> FieldKind {
        FieldKind::Struct(Self::vtable())
    }

    fn zero() -> Self {
        Self {
            created_at: FieldValue::zero(),
            updated_at: FieldValue::zero(),
        }
    }

    fn to_value(&self) -> Value {
        Value::Record(Box::new(*self))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        record_from_value(value)
    }

    fn as_record(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_record_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}

impl Record for Timestamps {
    fn record_name() -> &'static str {
        "Timestamps"
    }

    fn raw_fields() -> &'static [RawField] {
        static FIELDS: LazyLock<Vec<RawField>> = LazyLock::new(|| {
            vec![
                RawField {
                    name: "created_at",
                    tag: "",
                    kind: <DateTime<Utc> as FieldValue>::field_kind(),
                    get: |record| {
                        let record = record.downcast_ref::<Timestamps>().expect("record type");
                        record.created_at.to_value()
                    },
                    set: |record, value| {
                        let record = record.downcast_mut::<Timestamps>().expect("record type");
                        record.created_at = FieldValue::from_value(value)?;
                        Ok(())
                    },
                    borrow: |_| None,
                    borrow_mut: |_| None,
                },
                RawField {
                    name: "updated_at",
                    tag: "",
                    kind: <DateTime<Utc> as FieldValue>::field_kind(),
                    get: |record| {
                        let record = record.downcast_ref::<Timestamps>().expect("record type");
                        record.updated_at.to_value()
                    },
                    set: |record, value| {
                        let record = record.downcast_mut::<Timestamps>().expect("record type");
                        record.updated_at = FieldValue::from_value(value)?;
                        Ok(())
                    },
                    borrow: |_| None,
                    borrow_mut: |_| None,
                },
            ]
        });
        &FIELDS
    }

    fn vtable() -> &'static RecordVtable {
        static VTABLE: RecordVtable = RecordVtable {
            name: "Timestamps",
            fields: <Timestamps as Record>::raw_fields,
            new_boxed: || Box::new(<Timestamps as FieldValue>::zero()),
            type_id: TypeId::of::<Timestamps>,
        };
        &VTABLE
    }
}
