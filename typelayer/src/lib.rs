//! typelayer: a metadata-driven mapping layer between typed record structs
//! and schemaless documents.
//!
//! Annotate a struct with `#[derive(Record)]` and obtain a typed
//! [`Collection`] from a [`Store`] over any [`StorageBackend`]:
//!
//! ```ignore
//! use typelayer::prelude::*;
//!
//! #[derive(Record, Clone, Debug)]
//! struct User {
//!     #[record("id,index")]
//!     id: String,
//!     name: String,
//! }
//!
//! let store = Store::new(MemoryBackend::new());
//! let users = store.collection::<User>().await?;
//! users.insert(&User { id: "u-1".into(), name: "Ada".into() }).await?;
//! ```
//!
//! Storage names default to the snake_case field name, embedded structs
//! flatten into their owner, and the collection name is the pluralized
//! snake_case type name (`User` lives in `users`). See `typelayer-core`
//! for the full mapping rules.

pub mod prelude;

pub use typelayer_core::{
    backend, collection, error, model, naming, query, reflect, registry, schema, store,
};

pub use typelayer_core::{
    AnyRecord, CodecError, Collection, FieldKind, FieldValue, Order, Query, Record, Schema,
    SchemaError, SchemaRegistry, StorageBackend, Store, StoreError, StoreResult, Value,
};
pub use typelayer_derive::Record;
pub use typelayer_memory::{IndexRequest, MemoryBackend};
#[cfg(feature = "mongodb")]
pub use typelayer_mongodb::MongoBackend;
