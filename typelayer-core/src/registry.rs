//! The schema registry: one derived [`Schema`] per record type, with
//! single-flight derivation.
//!
//! Derivation is pure metadata work, so the registry is a synchronous,
//! blocking cache. When several callers race for an unseen type, exactly one
//! performs the derivation while the rest block on the in-flight entry; all
//! of them observe the same result. A failed derivation is delivered to
//! every waiter and then evicted, so a later call can retry.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use crate::error::SchemaError;
use crate::reflect::{AnyRecord, FieldKind, Record, RecordVtable};
use crate::schema::Schema;

const LOCK_POISONED: &str = "schema registry lock poisoned";

type DeriveResult = Result<Arc<Schema>, SchemaError>;

/// Broadcast cell for one in-flight derivation.
#[derive(Default)]
struct Flight {
    result: Mutex<Option<DeriveResult>>,
    done: Condvar,
}

impl Flight {
    fn complete(&self, result: DeriveResult) {
        *self.result.lock().expect(LOCK_POISONED) = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> DeriveResult {
        let mut slot = self.result.lock().expect(LOCK_POISONED);
        while slot.is_none() {
            slot = self.done.wait(slot).expect(LOCK_POISONED);
        }
        slot.clone().expect("flight completed")
    }
}

enum Entry {
    InFlight(Arc<Flight>),
    Ready(Arc<Schema>),
}

enum Claim {
    Done(DeriveResult),
    Wait(Arc<Flight>),
    Run(Arc<Flight>),
}

/// Shared cache of derived schemas, keyed by record `TypeId`.
///
/// Construct one per store and hand it around by reference; schemas come
/// back as `Arc<Schema>` so repeated lookups for the same type return the
/// same allocation.
#[derive(Default)]
pub struct SchemaRegistry {
    entries: Mutex<HashMap<TypeId, Entry>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schema for `T`, deriving it on first use.
    pub fn schema_of<T: Record>(&self) -> DeriveResult {
        self.schema_of_vtable(T::vtable())
    }

    /// Returns the schema for the record type behind `vtable`, deriving it
    /// on first use. Concurrent callers for the same type share a single
    /// derivation.
    pub fn schema_of_vtable(&self, vtable: &'static RecordVtable) -> DeriveResult {
        let key = (vtable.type_id)();
        let claim = {
            let mut entries = self.entries.lock().expect(LOCK_POISONED);
            match entries.get(&key) {
                Some(Entry::Ready(schema)) => Claim::Done(Ok(schema.clone())),
                Some(Entry::InFlight(flight)) => Claim::Wait(flight.clone()),
                None => {
                    let flight = Arc::new(Flight::default());
                    entries.insert(key, Entry::InFlight(flight.clone()));
                    Claim::Run(flight)
                }
            }
        };

        match claim {
            Claim::Done(result) => result,
            Claim::Wait(flight) => flight.wait(),
            Claim::Run(flight) => {
                let result = Schema::build(vtable).map(Arc::new);
                {
                    let mut entries = self.entries.lock().expect(LOCK_POISONED);
                    match &result {
                        Ok(schema) => {
                            entries.insert(key, Entry::Ready(schema.clone()));
                        }
                        // Evict so a corrected type can retry later.
                        Err(_) => {
                            entries.remove(&key);
                        }
                    }
                }
                flight.complete(result.clone());
                result
            }
        }
    }

    /// Resolves `kind` to a record struct (through at most one optional
    /// layer) and returns its schema. Non-struct kinds fail with
    /// [`SchemaError::NotAStruct`] naming the offending kind.
    pub fn schema_of_kind(&self, kind: &FieldKind) -> DeriveResult {
        match kind.indirect() {
            FieldKind::Struct(vtable) => self.schema_of_vtable(vtable),
            other => Err(SchemaError::NotAStruct {
                type_name: other.describe(),
            }),
        }
    }

    /// Returns the schema for a type-erased payload, or
    /// [`SchemaError::NilInput`] when no payload was provided.
    pub fn schema_of_payload(&self, payload: Option<&dyn AnyRecord>) -> DeriveResult {
        match payload {
            None => Err(SchemaError::NilInput),
            Some(record) => self.schema_of_vtable(record.record_vtable()),
        }
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry").finish_non_exhaustive()
    }
}
