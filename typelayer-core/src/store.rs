//! The store: a backend plus the schema registry shared by all of its
//! collections.

use crate::backend::StorageBackend;
use crate::collection::Collection;
use crate::error::StoreResult;
use crate::reflect::Record;
use crate::registry::SchemaRegistry;

/// Owns a storage backend and the [`SchemaRegistry`] every collection
/// derived from it shares.
#[derive(Debug, Default)]
pub struct Store<B: StorageBackend> {
    backend: B,
    registry: SchemaRegistry,
}

impl<B: StorageBackend> Store<B> {
    /// Wraps a backend with a fresh registry.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            registry: SchemaRegistry::new(),
        }
    }

    /// The shared schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Opens the typed collection for `T`, deriving its schema on first use
    /// and (re-)registering its unique indexes.
    pub async fn collection<T: Record>(&self) -> StoreResult<Collection<'_, B, T>> {
        Collection::register(&self.backend, &self.registry).await
    }
}
