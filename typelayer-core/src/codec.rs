//! The document codec: recursive conversion between records and documents,
//! driven entirely by derived schemas.
//!
//! Encoding walks the schema's flattened descriptors in order, so document
//! key order always equals field declaration order. Decoding dispatches on
//! the runtime shape of each stored value and is additive onto a zero
//! record: unknown keys (such as a backend-generated `_id`) are ignored,
//! null leaves the zero value in place, and a sub-document stored under a
//! scalar field is skipped rather than failing the read.

use std::any::Any;

use bson::spec::BinarySubtype;
use bson::{Bson, Document};

use crate::error::CodecError;
use crate::reflect::{AnyRecord, FieldKind, Record, Value};
use crate::registry::SchemaRegistry;
use crate::schema::{FieldDescriptor, Schema};

impl SchemaRegistry {
    /// Encodes a record into a document, deriving its schema on first use.
    pub fn encode_record<T: Record>(&self, record: &T) -> Result<Document, CodecError> {
        let schema = self.schema_of::<T>()?;
        self.encode(&schema, record)
    }

    /// Encodes an erased record of `schema`'s type into a document.
    ///
    /// The record is read but never mutated: unset optional embeddings are
    /// observed through a transient zero instance instead of being
    /// allocated in place.
    pub fn encode(&self, schema: &Schema, record: &dyn Any) -> Result<Document, CodecError> {
        let mut doc = Document::new();
        for field in schema.fields() {
            let bson = self.value_to_bson(field.get(record))?;
            doc.insert(field.db_name(), bson);
        }
        Ok(doc)
    }

    fn encode_any(&self, record: &dyn AnyRecord) -> Result<Document, CodecError> {
        let schema = self.schema_of_vtable(record.record_vtable())?;
        self.encode(&schema, record.as_any())
    }

    /// Lowers a canonical value to its stored form, normalizing integer
    /// widths: 32-bit-and-narrower integers store as `Int32` (unsigned ones
    /// spill to `Int64` when they don't fit), 64-bit integers store as
    /// `Int64`, and an unsigned value beyond `i64::MAX` is an error.
    fn value_to_bson(&self, value: Value) -> Result<Bson, CodecError> {
        match value {
            Value::Null => Ok(Bson::Null),
            Value::Int32(v) => Ok(Bson::Int32(v)),
            Value::Int64(v) => Ok(Bson::Int64(v)),
            Value::UInt32(v) => Ok(match i32::try_from(v) {
                Ok(small) => Bson::Int32(small),
                Err(_) => Bson::Int64(i64::from(v)),
            }),
            Value::UInt64(v) => i64::try_from(v)
                .map(Bson::Int64)
                .map_err(|_| CodecError::UnsignedOverflow(v)),
            Value::Double(v) => Ok(Bson::Double(v)),
            Value::Bool(v) => Ok(Bson::Boolean(v)),
            Value::String(v) => Ok(Bson::String(v)),
            Value::Uuid(v) => Ok(Bson::from(v)),
            Value::DateTime(v) => Ok(Bson::DateTime(v)),
            Value::Record(record) => Ok(Bson::Document(self.encode_any(&*record)?)),
            Value::List(items) => Ok(Bson::Array(
                items
                    .into_iter()
                    .map(|item| self.value_to_bson(item))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Value::Map(entries) => {
                let mut doc = Document::new();
                for (key, entry) in entries {
                    let bson = self.value_to_bson(entry)?;
                    doc.insert(key, bson);
                }
                Ok(Bson::Document(doc))
            }
            Value::Raw(raw) => Ok(raw),
        }
    }

    /// Decodes a document into a fresh zero record, deriving the schema on
    /// first use.
    pub fn decode_record<T: Record>(&self, doc: &Document) -> Result<T, CodecError> {
        let schema = self.schema_of::<T>()?;
        let mut record = T::zero();
        self.decode_into(&schema, doc, &mut record)?;
        Ok(record)
    }

    /// Decodes a document additively into an erased record of `schema`'s
    /// type. On error the record keeps whatever fields were populated
    /// before the failure.
    pub fn decode_into(
        &self,
        schema: &Schema,
        doc: &Document,
        record: &mut dyn Any,
    ) -> Result<(), CodecError> {
        for (key, raw) in doc.iter() {
            let Some(field) = schema.field_by_db_name(key) else {
                continue;
            };
            let Some(value) = self.decode_entry(field, raw)? else {
                continue;
            };
            field.set(record, value)?;
        }
        Ok(())
    }

    /// Converts one stored value into the canonical form for `field`.
    /// `Ok(None)` means "leave the field alone": stored nulls and
    /// sub-documents that don't fit the declared kind.
    fn decode_entry(&self, field: &FieldDescriptor, raw: &Bson) -> Result<Option<Value>, CodecError> {
        let value = match raw {
            Bson::Null => None,
            Bson::Array(items) => Some(self.decode_list(field, items)?),
            Bson::Document(sub) => self.decode_subdocument(field, sub)?,
            Bson::Binary(bin) if bin.subtype == BinarySubtype::Uuid => {
                let bytes: [u8; 16] = bin.bytes.as_slice().try_into().map_err(|_| {
                    CodecError::InvalidUuid(format!(
                        "expected 16 bytes, got {}",
                        bin.bytes.len()
                    ))
                })?;
                Some(Value::Uuid(bson::Uuid::from_bytes(bytes)))
            }
            // Backend-assigned object ids surface as their hex form.
            Bson::ObjectId(oid) => Some(Value::String(oid.to_hex())),
            Bson::DateTime(dt) => Some(Value::DateTime(*dt)),
            Bson::Int32(v) => Some(Value::Int64(i64::from(*v))),
            Bson::Int64(v) => Some(Value::Int64(*v)),
            Bson::Double(v) => Some(Value::Double(*v)),
            Bson::Boolean(v) => Some(Value::Bool(*v)),
            Bson::String(v) => Some(Value::String(v.clone())),
            other => Some(Value::Raw(other.clone())),
        };
        Ok(value)
    }

    fn decode_subdocument(
        &self,
        field: &FieldDescriptor,
        sub: &Document,
    ) -> Result<Option<Value>, CodecError> {
        match field.kind().indirect() {
            FieldKind::Struct(vtable) => Ok(Some(Value::Record(self.decode_new(vtable, sub)?))),
            FieldKind::Map(value_kind) => {
                if let FieldKind::Struct(vtable) = value_kind.indirect() {
                    let mut entries = Vec::with_capacity(sub.len());
                    for (key, entry) in sub {
                        let Bson::Document(inner) = entry else {
                            return Err(CodecError::ShapeMismatch {
                                expected: format!("a {} sub-document", vtable.name),
                                found: bson_kind_name(entry).to_string(),
                            });
                        };
                        entries.push((key.clone(), Value::Record(self.decode_new(vtable, inner)?)));
                    }
                    Ok(Some(Value::Map(entries)))
                } else {
                    Ok(Some(Value::Map(
                        sub.iter()
                            .map(|(key, entry)| (key.clone(), bson_to_value(entry)))
                            .collect(),
                    )))
                }
            }
            FieldKind::Raw => Ok(Some(Value::Raw(Bson::Document(sub.clone())))),
            // A sub-document stored under a scalar field: skip it.
            _ => Ok(None),
        }
    }

    fn decode_list(&self, field: &FieldDescriptor, items: &[Bson]) -> Result<Value, CodecError> {
        let elem = match field.kind().indirect() {
            FieldKind::List(elem) => elem,
            // A raw field keeps whatever the store holds, arrays included.
            FieldKind::Raw => return Ok(Value::Raw(Bson::Array(items.to_vec()))),
            other => {
                return Err(CodecError::ShapeMismatch {
                    expected: other.describe(),
                    found: "array".to_string(),
                });
            }
        };
        match elem.indirect() {
            FieldKind::Struct(vtable) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let sub = match item {
                        Bson::Document(sub) => sub,
                        // A null element stands in for a zero record.
                        Bson::Null => {
                            out.push(Value::Record((vtable.new_boxed)()));
                            continue;
                        }
                        other => {
                            return Err(CodecError::UnsupportedListElement {
                                field: field.name().to_string(),
                                detail: format!(
                                    "expected a {} sub-document, found {}",
                                    vtable.name,
                                    bson_kind_name(other)
                                ),
                            });
                        }
                    };
                    out.push(Value::Record(self.decode_new(vtable, sub)?));
                }
                Ok(Value::List(out))
            }
            FieldKind::Map(_) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let sub = match item {
                        Bson::Document(sub) => sub,
                        Bson::Null => {
                            out.push(Value::Map(Vec::new()));
                            continue;
                        }
                        other => {
                            return Err(CodecError::UnsupportedListElement {
                                field: field.name().to_string(),
                                detail: format!(
                                    "expected a map sub-document, found {}",
                                    bson_kind_name(other)
                                ),
                            });
                        }
                    };
                    out.push(Value::Map(
                        sub.iter()
                            .map(|(key, entry)| (key.clone(), bson_to_value(entry)))
                            .collect(),
                    ));
                }
                Ok(Value::List(out))
            }
            _ => Ok(Value::List(items.iter().map(bson_to_value).collect())),
        }
    }

    fn decode_new(
        &self,
        vtable: &'static crate::reflect::RecordVtable,
        doc: &Document,
    ) -> Result<Box<dyn AnyRecord>, CodecError> {
        let schema = self.schema_of_vtable(vtable)?;
        let mut record = (vtable.new_boxed)();
        self.decode_into(&schema, doc, record.as_any_mut())?;
        Ok(record)
    }
}

/// Shape-preserving conversion for scalar-ish stored values, used for list
/// elements and plain map entries. Integers widen to `Int64`.
fn bson_to_value(raw: &Bson) -> Value {
    match raw {
        Bson::Null => Value::Null,
        Bson::Int32(v) => Value::Int64(i64::from(*v)),
        Bson::Int64(v) => Value::Int64(*v),
        Bson::Double(v) => Value::Double(*v),
        Bson::Boolean(v) => Value::Bool(*v),
        Bson::String(v) => Value::String(v.clone()),
        Bson::DateTime(dt) => Value::DateTime(*dt),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::Binary(bin) if bin.subtype == BinarySubtype::Uuid && bin.bytes.len() == 16 => {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&bin.bytes);
            Value::Uuid(bson::Uuid::from_bytes(bytes))
        }
        Bson::Array(items) => Value::List(items.iter().map(bson_to_value).collect()),
        Bson::Document(sub) => Value::Map(
            sub.iter()
                .map(|(key, entry)| (key.clone(), bson_to_value(entry)))
                .collect(),
        ),
        other => Value::Raw(other.clone()),
    }
}

fn bson_kind_name(raw: &Bson) -> &'static str {
    match raw {
        Bson::Null => "null",
        Bson::Int32(_) => "int32",
        Bson::Int64(_) => "int64",
        Bson::Double(_) => "double",
        Bson::Boolean(_) => "bool",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "document",
        Bson::Binary(_) => "binary",
        Bson::ObjectId(_) => "object id",
        Bson::DateTime(_) => "datetime",
        _ => "value",
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::reflect::FieldValue;
    use crate::testutil::{test_record, Base, LazyUser, Point, User};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new()
    }

    #[test]
    fn point_encodes_as_ordered_pairs() {
        let registry = registry();
        let doc = registry.encode_record(&Point { x: 10, y: -3 }).unwrap();
        let keys: Vec<_> = doc.keys().collect();
        assert_eq!(keys, ["x", "y"]);
        assert_eq!(doc.get("x"), Some(&Bson::Int64(10)));
        assert_eq!(doc.get("y"), Some(&Bson::Int64(-3)));
    }

    #[test]
    fn point_round_trips() {
        let registry = registry();
        let original = Point { x: 7, y: 42 };
        let doc = registry.encode_record(&original).unwrap();
        let decoded: Point = registry.decode_record(&doc).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn embedded_fields_flatten_into_the_top_level() {
        let registry = registry();
        let user = User {
            base: Base {
                id: "u-9".into(),
                created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            },
            name: "Ada".into(),
            age: 36,
            secret: "hidden".into(),
        };
        let doc = registry.encode_record(&user).unwrap();

        let keys: Vec<_> = doc.keys().collect();
        assert_eq!(keys, ["id", "created_at", "name", "age"]);
        assert_eq!(doc.get("id"), Some(&Bson::String("u-9".into())));
        assert!(doc.get("secret").is_none());

        let decoded: User = registry.decode_record(&doc).unwrap();
        assert_eq!(decoded.base, user.base);
        assert_eq!(decoded.name, user.name);
        assert_eq!(decoded.age, user.age);
        // Skipped fields never travel.
        assert_eq!(decoded.secret, "");
    }

    #[test]
    fn unset_optional_embedding_encodes_zero_without_mutation() {
        let registry = registry();
        let user = LazyUser {
            base: None,
            name: "Grace".into(),
        };
        let doc = registry.encode_record(&user).unwrap();

        assert_eq!(doc.get("id"), Some(&Bson::String(String::new())));
        assert_eq!(
            doc.get("created_at"),
            Some(&Bson::DateTime(bson::DateTime::from_millis(0)))
        );
        assert!(user.base.is_none());
    }

    #[test]
    fn decode_allocates_through_optional_embedding() {
        let registry = registry();
        let doc = doc! { "id": "u-1", "name": "Lin" };
        let decoded: LazyUser = registry.decode_record(&doc).unwrap();
        assert_eq!(decoded.base.as_ref().map(|b| b.id.as_str()), Some("u-1"));
        assert_eq!(decoded.name, "Lin");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let registry = registry();
        let doc = doc! { "_id": ObjectId::new(), "x": 1i64, "y": 2i64, "stray": true };
        let decoded: Point = registry.decode_record(&doc).unwrap();
        assert_eq!(decoded, Point { x: 1, y: 2 });
    }

    #[test]
    fn nested_struct_fields_recurse() {
        #[derive(Clone, Debug, PartialEq)]
        struct Shape {
            label: String,
            origin: Point,
            corners: Vec<Point>,
        }
        test_record!(Shape {
            label: String = "",
            origin: Point = "",
            corners: Vec<Point> = "",
        });

        let registry = registry();
        let shape = Shape {
            label: "box".into(),
            origin: Point { x: 0, y: 0 },
            corners: vec![Point { x: 1, y: 1 }, Point { x: 2, y: 2 }],
        };
        let doc = registry.encode_record(&shape).unwrap();
        assert_eq!(
            doc.get("origin"),
            Some(&Bson::Document(doc! { "x": 0i64, "y": 0i64 }))
        );

        let decoded: Shape = registry.decode_record(&doc).unwrap();
        assert_eq!(decoded, shape);
    }

    #[test]
    fn scalar_list_in_struct_list_out_of_maps() {
        #[derive(Clone, Debug, PartialEq)]
        struct Bag {
            tags: Vec<String>,
            rows: Vec<std::collections::HashMap<String, i64>>,
        }
        test_record!(Bag {
            tags: Vec<String> = "",
            rows: Vec<std::collections::HashMap<String, i64>> = "",
        });

        let registry = registry();
        let bag = Bag {
            tags: vec!["a".into(), "b".into()],
            rows: vec![std::collections::HashMap::from([("n".to_string(), 3i64)])],
        };
        let doc = registry.encode_record(&bag).unwrap();
        let decoded: Bag = registry.decode_record(&doc).unwrap();
        assert_eq!(decoded, bag);
    }

    #[test]
    fn scalar_element_where_subdocument_required_fails() {
        #[derive(Clone, Debug, PartialEq)]
        struct Cluster {
            points: Vec<Point>,
        }
        test_record!(Cluster { points: Vec<Point> = "" });

        let registry = registry();
        let doc = doc! { "points": [1i32, 2i32] };
        assert!(matches!(
            registry.decode_record::<Cluster>(&doc),
            Err(CodecError::UnsupportedListElement { ref field, .. }) if field == "points"
        ));
    }

    #[test]
    fn integer_widths_normalize_on_encode() {
        #[derive(Clone, Debug, PartialEq)]
        struct Widths {
            small: i16,
            wide: u32,
            huge: u64,
        }
        test_record!(Widths {
            small: i16 = "",
            wide: u32 = "",
            huge: u64 = "",
        });

        let registry = registry();
        let doc = registry
            .encode_record(&Widths {
                small: -4,
                wide: u32::MAX,
                huge: 9,
            })
            .unwrap();
        assert_eq!(doc.get("small"), Some(&Bson::Int32(-4)));
        assert_eq!(doc.get("wide"), Some(&Bson::Int64(i64::from(u32::MAX))));
        assert_eq!(doc.get("huge"), Some(&Bson::Int64(9)));

        assert!(matches!(
            registry.encode_record(&Widths {
                small: 0,
                wide: 0,
                huge: u64::MAX,
            }),
            Err(CodecError::UnsignedOverflow(v)) if v == u64::MAX
        ));
    }

    #[test]
    fn uuid_and_object_id_decode() {
        #[derive(Clone, Debug, PartialEq)]
        struct Keys {
            key: bson::Uuid,
            ext: String,
        }
        test_record!(Keys {
            key: bson::Uuid = "",
            ext: String = "",
        });

        let registry = registry();
        let key = bson::Uuid::from_bytes([7; 16]);
        let oid = ObjectId::new();
        let doc = doc! { "key": key, "ext": oid };
        let decoded: Keys = registry.decode_record(&doc).unwrap();
        assert_eq!(decoded.key, key);
        assert_eq!(decoded.ext, oid.to_hex());
    }

    #[test]
    fn null_leaves_zero_values_in_place() {
        let registry = registry();
        let doc = doc! { "x": Bson::Null, "y": 5i64 };
        let decoded: Point = registry.decode_record(&doc).unwrap();
        assert_eq!(decoded, Point { x: 0, y: 5 });
    }

    #[test]
    fn subdocument_under_scalar_field_is_skipped() {
        let registry = registry();
        let doc = doc! { "x": { "nested": 1 }, "y": 2i64 };
        let decoded: Point = registry.decode_record(&doc).unwrap();
        assert_eq!(decoded, Point { x: 0, y: 2 });
    }

    #[test]
    fn raw_fields_pass_through() {
        #[derive(Clone, Debug, PartialEq)]
        struct Envelope {
            body: Bson,
        }
        test_record!(Envelope { body: Bson = "" });

        let registry = registry();
        let envelope = Envelope {
            body: Bson::Document(doc! { "anything": [1, 2, 3] }),
        };
        let doc = registry.encode_record(&envelope).unwrap();
        assert_eq!(doc.get("body"), Some(&envelope.body));

        let decoded: Envelope = registry.decode_record(&doc).unwrap();
        assert_eq!(decoded, envelope);

        // Stored arrays come back verbatim too.
        let array = Envelope {
            body: Bson::Array(vec![Bson::Int32(1), Bson::String("two".into())]),
        };
        let doc = registry.encode_record(&array).unwrap();
        let decoded: Envelope = registry.decode_record(&doc).unwrap();
        assert_eq!(decoded, array);
    }

    #[test]
    fn null_list_elements_decode_as_zero() {
        #[derive(Clone, Debug, PartialEq)]
        struct Cluster {
            points: Vec<Point>,
            rows: Vec<std::collections::HashMap<String, i64>>,
        }
        test_record!(Cluster {
            points: Vec<Point> = "",
            rows: Vec<std::collections::HashMap<String, i64>> = "",
        });

        let registry = registry();
        let doc = doc! {
            "points": [{ "x": 1i64, "y": 2i64 }, Bson::Null],
            "rows": [Bson::Null],
        };
        let decoded: Cluster = registry.decode_record(&doc).unwrap();
        assert_eq!(
            decoded.points,
            [Point { x: 1, y: 2 }, Point { x: 0, y: 0 }]
        );
        assert_eq!(decoded.rows, [std::collections::HashMap::new()]);
    }

    #[test]
    fn decode_is_partial_on_error() {
        let registry = registry();
        let schema = registry.schema_of::<Point>().unwrap();
        let mut point = Point::zero();
        let doc = doc! { "x": 3i64, "y": "oops" };
        let err = registry.decode_into(&schema, &doc, &mut point);
        assert!(err.is_err());
        assert_eq!(point.x, 3);
    }
}
