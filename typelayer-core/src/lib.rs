//! Core of typelayer: a metadata-driven mapping layer between typed record
//! structs and schemaless documents.
//!
//! Record types describe themselves through declarative per-field metadata
//! (normally emitted by `#[derive(Record)]` from the `typelayer-derive`
//! crate). From that metadata a [`Schema`](schema::Schema) is derived once
//! per type and cached in a [`SchemaRegistry`](registry::SchemaRegistry):
//! storage names are the snake_case field names unless a tag overrides
//! them, embedded structs are flattened into their owner, and the
//! collection name is the pluralized snake_case type name. The codec then
//! converts records to and from documents purely by walking the schema.
//!
//! Persistence is pluggable: a [`Store`](store::Store) drives any
//! [`StorageBackend`](backend::StorageBackend) implementation and hands out
//! typed [`Collection`](collection::Collection)s.

// Lets derive-emitted `typelayer::` paths resolve inside this crate as well.
extern crate self as typelayer;

pub mod backend;
mod codec;
pub mod collection;
pub mod error;
pub mod model;
pub mod naming;
pub mod query;
pub mod reflect;
pub mod registry;
pub mod schema;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use backend::StorageBackend;
pub use collection::Collection;
pub use error::{CodecError, SchemaError, StoreError, StoreResult};
pub use query::{Order, Query};
pub use reflect::{AnyRecord, FieldKind, FieldValue, Record, Value};
pub use registry::SchemaRegistry;
pub use schema::Schema;
pub use store::Store;
