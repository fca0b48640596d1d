//! A typed view over one backend collection.
//!
//! A [`Collection`] is obtained from a [`Store`](crate::store::Store) and
//! binds one record type to its derived schema and collection name.
//! Obtaining the collection registers its unique indexes; the CRUD
//! operations then encode payloads fully before any write is issued, so a
//! conversion failure never leaves a half-written document behind.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use bson::{doc, Document};

use crate::backend::StorageBackend;
use crate::error::{SchemaError, StoreError, StoreResult};
use crate::query::Query;
use crate::reflect::Record;
use crate::registry::SchemaRegistry;
use crate::schema::Schema;

/// A typed handle to the backend collection storing `T`.
#[derive(Debug)]
pub struct Collection<'a, B: StorageBackend, T: Record> {
    backend: &'a B,
    registry: &'a SchemaRegistry,
    schema: Arc<Schema>,
    _record: PhantomData<fn() -> T>,
}

impl<'a, B: StorageBackend, T: Record> Collection<'a, B, T> {
    /// Derives (or fetches) the schema for `T` and requests a unique index
    /// for every indexed field.
    pub(crate) async fn register(
        backend: &'a B,
        registry: &'a SchemaRegistry,
    ) -> StoreResult<Self> {
        let schema = registry.schema_of::<T>()?;
        for field in schema.index_fields() {
            backend
                .create_index(schema.collection(), field.db_name(), true)
                .await?;
        }
        Ok(Self {
            backend,
            registry,
            schema,
            _record: PhantomData,
        })
    }

    /// The backend collection name.
    pub fn name(&self) -> &str {
        self.schema.collection()
    }

    /// The derived schema backing this collection.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Encodes the payload of `query`, rejecting a missing payload and a
    /// payload of a different record type.
    fn encode_payload(&self, query: &Query) -> StoreResult<Document> {
        let payload = query
            .payload_ref()
            .ok_or(StoreError::Schema(SchemaError::NilInput))?;
        let vtable = payload.record_vtable();
        if (vtable.type_id)() != TypeId::of::<T>() {
            return Err(StoreError::TypeMismatch {
                expected: T::record_name(),
                found: vtable.name,
            });
        }
        Ok(self.registry.encode(&self.schema, payload.as_any())?)
    }

    fn decode(&self, doc: &Document) -> StoreResult<T> {
        let mut record = T::zero();
        self.registry.decode_into(&self.schema, doc, &mut record)?;
        Ok(record)
    }

    /// Stores the payload of `query` as a new document.
    pub async fn save(&self, query: Query) -> StoreResult<()> {
        let document = self.encode_payload(&query)?;
        self.backend.insert(self.name(), document).await
    }

    /// Stores `record` as a new document. Shorthand for [`Collection::save`]
    /// with a payload-only query.
    pub async fn insert(&self, record: &T) -> StoreResult<()> {
        let document = self.registry.encode(&self.schema, record)?;
        self.backend.insert(self.name(), document).await
    }

    /// Returns the first record matching the query's filter, if any.
    pub async fn find_one(&self, query: Query) -> StoreResult<Option<T>> {
        match self
            .backend
            .find_one(self.name(), query.filter().clone())
            .await?
        {
            Some(document) => Ok(Some(self.decode(&document)?)),
            None => Ok(None),
        }
    }

    /// Returns all records matching the query's filter, honoring its sort,
    /// limit and skip.
    pub async fn find_many(&self, query: Query) -> StoreResult<Vec<T>> {
        let documents = self
            .backend
            .find_many(self.name(), query.filter().clone(), query.find_spec())
            .await?;
        documents.iter().map(|doc| self.decode(doc)).collect()
    }

    /// Overwrites the fields of the first matching document with the
    /// query's payload.
    pub async fn update_one(&self, query: Query) -> StoreResult<()> {
        let fields = self.encode_payload(&query)?;
        self.backend
            .update_one(self.name(), query.filter().clone(), doc! { "$set": fields })
            .await
    }

    /// Overwrites the fields of every matching document with the query's
    /// payload.
    pub async fn update_many(&self, query: Query) -> StoreResult<()> {
        let fields = self.encode_payload(&query)?;
        self.backend
            .update_many(self.name(), query.filter().clone(), doc! { "$set": fields })
            .await
    }

    /// Deletes the first document matching the query's filter.
    pub async fn delete_one(&self, query: Query) -> StoreResult<()> {
        self.backend
            .delete_one(self.name(), query.filter().clone())
            .await
    }

    /// Deletes every document matching the query's filter.
    pub async fn delete_many(&self, query: Query) -> StoreResult<()> {
        self.backend
            .delete_many(self.name(), query.filter().clone())
            .await
    }
}
