use async_trait::async_trait;
use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, FindOptions, IndexOptions};
use mongodb::{Client, Collection as MongoCollection, IndexModel};

use typelayer_core::backend::StorageBackend;
use typelayer_core::error::{StoreError, StoreResult};
use typelayer_core::query::FindSpec;

/// MongoDB-backed [`StorageBackend`].
///
/// Documents are stored exactly as encoded; MongoDB assigns its own `_id`,
/// which the decoder ignores on the way back out.
#[derive(Debug)]
pub struct MongoBackend {
    client: Client,
    database: String,
}

impl MongoBackend {
    /// Wraps an already connected client.
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    /// Parses a connection string, connects, and verifies the deployment
    /// with a ping.
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let options = ClientOptions::parse(uri).await.map_err(backend_err)?;
        let client = Client::with_options(options).map_err(backend_err)?;
        client
            .database(database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(backend_err)?;
        Ok(Self::new(client, database))
    }

    /// Shuts the underlying client down cleanly.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }

    fn collection(&self, name: &str) -> MongoCollection<Document> {
        self.client.database(&self.database).collection(name)
    }
}

fn backend_err(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl StorageBackend for MongoBackend {
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<()> {
        self.collection(collection)
            .insert_one(document)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        self.collection(collection)
            .find_one(filter)
            .await
            .map_err(backend_err)
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: Document,
        spec: FindSpec,
    ) -> StoreResult<Vec<Document>> {
        let mut options = FindOptions::default();
        options.limit = spec.limit;
        options.skip = spec.skip.and_then(|skip| u64::try_from(skip).ok());
        if !spec.sort.is_empty() {
            options.sort = Some(spec.sort);
        }

        self.collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_err)?
            .try_collect()
            .await
            .map_err(backend_err)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<()> {
        self.collection(collection)
            .update_one(filter, update)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<()> {
        self.collection(collection)
            .update_many(filter, update)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> StoreResult<()> {
        self.collection(collection)
            .delete_one(filter)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> StoreResult<()> {
        self.collection(collection)
            .delete_many(filter)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> StoreResult<()> {
        self.collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { field: 1 })
                    .options(IndexOptions::builder().unique(unique).build())
                    .build(),
            )
            .await
            .map_err(backend_err)?;
        Ok(())
    }
}
