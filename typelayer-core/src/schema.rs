//! Schema derivation: turning a record type's declarative metadata into an
//! ordered, flattened list of field descriptors with bound accessors.
//!
//! A [`Schema`] is derived once per type (see
//! [`SchemaRegistry`](crate::registry::SchemaRegistry)) and holds everything
//! the codec and the collection layer need: the collection name, the
//! flattened field list, and lookup indices by field name, storage name and
//! indexed-field name. Embedded structs are flattened into their owner at
//! derivation time, so the codec never sees embedding at all.

use std::any::Any;
use std::collections::HashMap;

use crate::error::{CodecError, SchemaError};
use crate::naming;
use crate::reflect::{FieldKind, RawField, RecordVtable, Value};

/// One traversal step from a record to (or towards) a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStep {
    /// Step into the field at this declaration position.
    Direct(usize),
    /// Step through the optional wrapper of the field at this position.
    ThroughPointer(usize),
}

/// The full traversal path from the root record to a field, one step per
/// embedding level plus the leaf.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<PathStep>);

impl FieldPath {
    /// The steps from root to leaf, in order.
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }
}

/// One embedding hop of a bound accessor: how to borrow the nested struct,
/// and the vtable needed to conjure a transient zero instance when an
/// optional hop is unset.
#[derive(Clone, Copy)]
struct Hop {
    vtable: &'static RecordVtable,
    borrow: fn(&dyn Any) -> Option<&dyn Any>,
    borrow_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>,
}

/// A pre-resolved accessor for one flattened field: zero or more embedding
/// hops followed by the leaf get/set functions.
#[derive(Clone)]
pub struct Accessor {
    hops: Vec<Hop>,
    get_leaf: fn(&dyn Any) -> Value,
    set_leaf: fn(&mut dyn Any, Value) -> Result<(), CodecError>,
}

impl Accessor {
    /// Reads the field from `record`.
    ///
    /// An unset optional hop is read through a transient zero instance, so
    /// the source record is never mutated and the result equals what a
    /// freshly allocated intermediate would hold.
    pub fn get(&self, record: &dyn Any) -> Value {
        self.get_from(record, 0)
    }

    fn get_from(&self, current: &dyn Any, hop: usize) -> Value {
        match self.hops.get(hop) {
            None => (self.get_leaf)(current),
            Some(step) => match (step.borrow)(current) {
                Some(inner) => self.get_from(inner, hop + 1),
                None => {
                    let zero = (step.vtable.new_boxed)();
                    self.get_from(zero.as_any(), hop + 1)
                }
            },
        }
    }

    /// Writes `value` into the field of `record`, allocating zero-valued
    /// intermediates through unset optional hops.
    pub fn set(&self, record: &mut dyn Any, value: Value) -> Result<(), CodecError> {
        let mut current = record;
        for step in &self.hops {
            current = (step.borrow_mut)(current).ok_or_else(|| CodecError::ShapeMismatch {
                expected: format!("embedded {}", step.vtable.name),
                found: "a non-struct field".to_string(),
            })?;
        }
        (self.set_leaf)(current, value)
    }
}

/// A single flattened field of a derived schema.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    db_name: String,
    kind: FieldKind,
    indexed: bool,
    path: FieldPath,
    accessor: Accessor,
}

impl FieldDescriptor {
    /// The source field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The storage key this field maps to.
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// The field's declared kind.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Whether the field carries the `index` flag.
    pub fn indexed(&self) -> bool {
        self.indexed
    }

    /// The traversal path from the root record to this field.
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Reads this field from an erased record of the schema's type.
    pub fn get(&self, record: &dyn Any) -> Value {
        self.accessor.get(record)
    }

    /// Writes into this field of an erased record of the schema's type.
    pub fn set(&self, record: &mut dyn Any, value: Value) -> Result<(), CodecError> {
        self.accessor.set(record, value)
    }
}

impl std::fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("db_name", &self.db_name)
            .field("kind", &self.kind)
            .field("indexed", &self.indexed)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Parsed form of a field's mapping tag.
///
/// The tag is a comma-separated list: the first token overrides the storage
/// name (empty keeps the snake_case default), a `-` anywhere skips the field
/// entirely, and the remaining tokens are flags (`index`, `embed`). Unknown
/// flags are ignored.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct TagSettings<'a> {
    pub db_name: Option<&'a str>,
    pub index: bool,
    pub embed: bool,
    pub skip: bool,
}

pub(crate) fn parse_tag(tag: &str) -> TagSettings<'_> {
    let mut tokens = tag.split(',');
    let first = tokens.next().unwrap_or("").trim();
    let mut settings = TagSettings {
        db_name: (!first.is_empty() && first != "-").then_some(first),
        skip: first == "-",
        ..TagSettings::default()
    };
    for token in tokens {
        match token.trim() {
            "index" => settings.index = true,
            "embed" => settings.embed = true,
            "-" => settings.skip = true,
            _ => {}
        }
    }
    settings
}

/// The derived mapping of one record type: collection name, ordered
/// flattened fields, and the lookup indices over them.
#[derive(Debug)]
pub struct Schema {
    name: &'static str,
    collection: String,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<&'static str, usize>,
    by_db_name: HashMap<String, usize>,
    by_index_name: HashMap<&'static str, usize>,
}

impl Schema {
    /// The record type name the schema was derived from.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The pluralized snake_case collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// All flattened fields, in declaration order (embedded fields appear at
    /// their embedding position).
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by its source name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Looks up a field by its storage name.
    pub fn field_by_db_name(&self, db_name: &str) -> Option<&FieldDescriptor> {
        self.by_db_name.get(db_name).map(|&i| &self.fields[i])
    }

    /// Looks up an indexed field by its source name.
    pub fn indexed_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_index_name.get(name).map(|&i| &self.fields[i])
    }

    /// All fields carrying the `index` flag, in declaration order.
    pub fn index_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.indexed)
    }

    /// Derives the schema for a record type. Called through the registry;
    /// embedded sub-schemas are derived transiently here and never enter
    /// the shared cache.
    pub(crate) fn build(vtable: &'static RecordVtable) -> Result<Schema, SchemaError> {
        let mut fields = Vec::new();
        for (position, raw) in (vtable.fields)().iter().enumerate() {
            let tag = parse_tag(raw.tag);
            if tag.skip {
                continue;
            }
            if tag.embed {
                flatten_embedded(vtable, raw, position, &mut fields)?;
                continue;
            }
            let db_name = tag
                .db_name
                .map(str::to_string)
                .unwrap_or_else(|| naming::to_snake_case(raw.name));
            fields.push(FieldDescriptor {
                name: raw.name,
                db_name,
                kind: raw.kind.clone(),
                indexed: tag.index,
                path: FieldPath(vec![PathStep::Direct(position)]),
                accessor: Accessor {
                    hops: Vec::new(),
                    get_leaf: raw.get,
                    set_leaf: raw.set,
                },
            });
        }

        let mut by_name = HashMap::with_capacity(fields.len());
        let mut by_db_name = HashMap::with_capacity(fields.len());
        let mut by_index_name = HashMap::new();
        for (i, field) in fields.iter().enumerate() {
            let name_clash = by_name.insert(field.name, i).is_some();
            let db_clash = by_db_name.insert(field.db_name.clone(), i).is_some();
            if name_clash || db_clash {
                return Err(SchemaError::DuplicateStorageName {
                    owner: vtable.name.to_string(),
                    field: field.name.to_string(),
                    db_name: field.db_name.clone(),
                });
            }
            if field.indexed {
                by_index_name.insert(field.name, i);
            }
        }

        Ok(Schema {
            name: vtable.name,
            collection: naming::collection_name(vtable.name),
            fields,
            by_name,
            by_db_name,
            by_index_name,
        })
    }
}

/// Flattens the fields of an embedded struct into the owner's field list,
/// prefixing each child's path and accessor with the embedding hop.
fn flatten_embedded(
    owner: &'static RecordVtable,
    raw: &RawField,
    position: usize,
    out: &mut Vec<FieldDescriptor>,
) -> Result<(), SchemaError> {
    let through_pointer = matches!(raw.kind, FieldKind::Optional(_));
    let Some(vtable) = raw.kind.struct_vtable() else {
        return Err(SchemaError::InvalidEmbedding {
            owner: owner.name.to_string(),
            field: raw.name.to_string(),
            kind: raw.kind.indirect().describe(),
        });
    };
    let step = if through_pointer {
        PathStep::ThroughPointer(position)
    } else {
        PathStep::Direct(position)
    };
    let hop = Hop {
        vtable,
        borrow: raw.borrow,
        borrow_mut: raw.borrow_mut,
    };

    let embedded = Schema::build(vtable)?;
    for child in embedded.fields {
        let mut path = Vec::with_capacity(child.path.0.len() + 1);
        path.push(step);
        path.extend(child.path.0);

        let mut hops = Vec::with_capacity(child.accessor.hops.len() + 1);
        hops.push(hop);
        hops.extend(child.accessor.hops);

        out.push(FieldDescriptor {
            name: child.name,
            db_name: child.db_name,
            kind: child.kind,
            indexed: child.indexed,
            path: FieldPath(path),
            accessor: Accessor {
                hops,
                get_leaf: child.accessor.get_leaf,
                set_leaf: child.accessor.set_leaf,
            },
        });
    }
    Ok(())
}
