//! The typelayer prelude: everything a typical caller needs.
//!
//! ```ignore
//! use typelayer::prelude::*;
//! ```

pub use typelayer_core::model::Timestamps;
pub use typelayer_core::{
    FieldValue, Order, Query, Record, StorageBackend, Store, StoreError, StoreResult,
};
pub use typelayer_derive::Record;
pub use typelayer_memory::MemoryBackend;
#[cfg(feature = "mongodb")]
pub use typelayer_mongodb::MongoBackend;
