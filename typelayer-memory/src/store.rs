//! An in-memory storage backend for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;

use typelayer_core::backend::StorageBackend;
use typelayer_core::error::{StoreError, StoreResult};
use typelayer_core::query::FindSpec;

use crate::filter;

/// One recorded call to `create_index`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexRequest {
    pub collection: String,
    pub field: String,
    pub unique: bool,
}

/// A process-local document store.
///
/// Documents are held verbatim in per-collection vectors in insertion
/// order. Unique indexes are enforced on insert, and every index request is
/// recorded so tests can assert what a collection registered.
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    indexes: RwLock<Vec<IndexRequest>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            indexes: RwLock::new(Vec::new()),
        }
    }

    /// All index requests seen so far, in call order.
    pub async fn index_requests(&self) -> Vec<IndexRequest> {
        self.indexes.read().await.clone()
    }

    /// A snapshot of the stored documents of one collection.
    pub async fn dump(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    async fn unique_fields(&self, collection: &str) -> Vec<String> {
        self.indexes
            .read()
            .await
            .iter()
            .filter(|req| req.unique && req.collection == collection)
            .map(|req| req.field.clone())
            .collect()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()> {
        let unique = self.unique_fields(collection).await;
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();

        for field in &unique {
            let Some(value) = document.get(field) else {
                continue;
            };
            if documents
                .iter()
                .any(|stored| stored.get(field) == Some(value))
            {
                return Err(StoreError::Backend(format!(
                    "duplicate key {value} for unique index on {collection}.{field}"
                )));
            }
        }

        documents.push(document);
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| filter::matches(doc, &filter)))
            .cloned())
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        spec: FindSpec,
    ) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let mut matched: Vec<Document> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter::matches(doc, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !spec.sort.is_empty() {
            matched.sort_by(|a, b| filter::compare(a, b, &spec.sort));
        }
        let skip = spec.skip.unwrap_or(0).max(0) as usize;
        let matched = matched.into_iter().skip(skip);
        Ok(match spec.limit {
            Some(limit) if limit >= 0 => matched.take(limit as usize).collect(),
            _ => matched.collect(),
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<()> {
        let fields = set_fields(&update)?;
        let mut collections = self.collections.write().await;
        if let Some(documents) = collections.get_mut(collection) {
            if let Some(doc) = documents.iter_mut().find(|doc| filter::matches(doc, &filter)) {
                apply_set(doc, fields);
            }
        }
        Ok(())
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<()> {
        let fields = set_fields(&update)?;
        let mut collections = self.collections.write().await;
        if let Some(documents) = collections.get_mut(collection) {
            for doc in documents.iter_mut().filter(|doc| filter::matches(doc, &filter)) {
                apply_set(doc, fields);
            }
        }
        Ok(())
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        if let Some(documents) = collections.get_mut(collection) {
            if let Some(position) = documents.iter().position(|doc| filter::matches(doc, &filter))
            {
                documents.remove(position);
            }
        }
        Ok(())
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        if let Some(documents) = collections.get_mut(collection) {
            documents.retain(|doc| !filter::matches(doc, &filter));
        }
        Ok(())
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> StoreResult<()> {
        let request = IndexRequest {
            collection: collection.to_string(),
            field: field.to_string(),
            unique,
        };
        let mut indexes = self.indexes.write().await;
        // Re-registration is idempotent.
        if !indexes.contains(&request) {
            indexes.push(request);
        }
        Ok(())
    }
}

fn set_fields(update: &Document) -> StoreResult<&Document> {
    match update.get("$set") {
        Some(Bson::Document(fields)) => Ok(fields),
        _ => Err(StoreError::Backend(
            "memory backend only supports $set-shaped updates".to_string(),
        )),
    }
}

fn apply_set(doc: &mut Document, fields: &Document) {
    for (key, value) in fields {
        doc.insert(key.clone(), value.clone());
    }
}
