//! The storage backend contract.
//!
//! Backends speak documents only: they receive fully encoded documents and
//! document-shaped filters, and return stored documents verbatim. All
//! record/document conversion stays above this trait, so a backend never
//! needs to know about record types or schemas.

use async_trait::async_trait;
use bson::Document;

use crate::error::StoreResult;
use crate::query::FindSpec;

/// An asynchronous document store a [`Store`](crate::store::Store) drives.
///
/// Update operations receive the complete update document (already
/// `$set`-shaped); delete and find operations receive plain equality
/// filters. `create_index` must be idempotent: registering a collection
/// repeatedly re-requests the same indexes.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Inserts one encoded document into `collection`.
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>>;

    /// Returns all documents matching `filter`, honoring the sort, limit
    /// and skip of `spec`.
    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        spec: FindSpec,
    ) -> StoreResult<Vec<Document>>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<()>;

    /// Applies `update` to every document matching `filter`.
    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<()>;

    /// Deletes the first document matching `filter`.
    async fn delete_one(&self, collection: &str, filter: Document) -> StoreResult<()>;

    /// Deletes every document matching `filter`.
    async fn delete_many(&self, collection: &str, filter: Document) -> StoreResult<()>;

    /// Ensures an index on `field` of `collection`, unique when requested.
    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> StoreResult<()>;
}
