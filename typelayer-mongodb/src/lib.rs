//! MongoDB [`StorageBackend`](typelayer_core::backend::StorageBackend)
//! implementation on top of the official driver.

mod store;

pub use store::MongoBackend;
