//! The query surface: a thin builder over document-shaped filters.
//!
//! A [`Query`] accumulates equality constraints, sort keys, paging bounds
//! and an optional record payload for save/update operations. It stays
//! deliberately close to the storage shape: the filter and sort are plain
//! documents the backend can use as-is.

use bson::{Bson, Document};

use crate::reflect::{AnyRecord, Record};

/// Sort direction for [`Query::order_by`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

impl Order {
    /// The numeric direction the document layer stores: `1` ascending,
    /// `-1` descending.
    pub fn direction(self) -> i32 {
        match self {
            Order::Asc => 1,
            Order::Desc => -1,
        }
    }
}

/// Sort, limit and skip extracted from a query, in the form backends
/// consume.
#[derive(Clone, Debug, Default)]
pub struct FindSpec {
    /// Sort keys in insertion order, values are `1`/`-1` directions.
    pub sort: Document,
    /// Maximum number of documents to return.
    pub limit: Option<i64>,
    /// Number of matching documents to skip first.
    pub skip: Option<i64>,
}

/// A composable query against one collection.
#[derive(Clone, Debug, Default)]
pub struct Query {
    filter: Document,
    sort: Document,
    limit: Option<i64>,
    skip: Option<i64>,
    payload: Option<Box<dyn AnyRecord>>,
}

impl Query {
    /// An empty query matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality constraint on a storage field.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.filter.insert(field, value);
        self
    }

    /// Adds a sort key. Keys are applied in the order they were added.
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.sort.insert(field, Bson::Int32(order.direction()));
        self
    }

    /// Caps the number of returned documents.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `skip` matching documents.
    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Attaches the record payload consumed by save and update operations.
    pub fn payload(mut self, record: impl Record) -> Self {
        self.payload = Some(Box::new(record));
        self
    }

    /// The accumulated equality filter.
    pub fn filter(&self) -> &Document {
        &self.filter
    }

    /// The attached payload, if any.
    pub fn payload_ref(&self) -> Option<&dyn AnyRecord> {
        self.payload.as_deref()
    }

    /// The sort/limit/skip portion in backend form.
    pub fn find_spec(&self) -> FindSpec {
        FindSpec {
            sort: self.sort.clone(),
            limit: self.limit,
            skip: self.skip,
        }
    }
}
