//! In-memory [`StorageBackend`](typelayer_core::backend::StorageBackend)
//! implementation.
//!
//! Intended for development and tests: documents live in process memory,
//! unique indexes are enforced on insert, and every index request is
//! recorded for inspection.

mod filter;
mod store;

pub use store::{IndexRequest, MemoryBackend};
