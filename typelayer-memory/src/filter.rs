//! Equality matching and ordering over stored documents.
//!
//! Numeric values compare by magnitude regardless of their stored width, so
//! a filter built with an `i32` literal still matches a document that
//! stored the field as `Int64`.

use std::cmp::Ordering;

use bson::{Bson, Document};

/// Whether `doc` satisfies every equality constraint in `filter`.
pub(crate) fn matches(doc: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| doc.get(key).is_some_and(|found| values_equal(found, expected)))
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Total order over documents induced by a sort specification: keys apply
/// in insertion order, direction `-1` reverses.
pub(crate) fn compare(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (key, direction) in sort {
        let mut ord = compare_values(a.get(key), b.get(key));
        if matches!(direction, Bson::Int32(d) if *d < 0)
            || matches!(direction, Bson::Int64(d) if *d < 0)
        {
            ord = ord.reverse();
        }
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let (Some(a), Some(b)) = (a, b) else {
        // Missing sorts before present.
        return match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            _ => unreachable!(),
        };
    };
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
