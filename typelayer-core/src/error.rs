//! Error and result types for schema derivation, the document codec, and
//! store operations.
//!
//! Each layer has its own error enum: [`SchemaError`] for metadata
//! derivation, [`CodecError`] for encode/decode failures, and [`StoreError`]
//! as the top-level type returned by collection and store operations. Use
//! [`StoreResult<T>`] as the return type of fallible store operations.

use thiserror::Error;

/// Errors produced while deriving a [`Schema`](crate::schema::Schema) from a
/// record type's declarative metadata.
///
/// Derivation failures are broadcast to every caller waiting on the same
/// in-flight derivation, which is why this type is `Clone`. A failed
/// derivation is evicted from the registry so a corrected type can retry
/// without restarting the process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// No payload was provided to derive a schema from.
    #[error("nothing to derive a schema from: missing payload")]
    NilInput,

    /// The requested kind does not resolve to a record struct.
    #[error("unsupported data type: {type_name} is not a record struct")]
    NotAStruct {
        /// A record name for named types, or a structural description
        /// (e.g. `list<i32>`) for anonymous kinds.
        type_name: String,
    },

    /// A field marked `embed` has a kind that cannot be flattened into its
    /// owner. Only a struct, or an `Option` of a struct, may be embedded.
    #[error("invalid embedded field {field} of {owner}: should be a struct, but got {kind}")]
    InvalidEmbedding {
        /// Name of the record type owning the embedded field.
        owner: String,
        /// Name of the offending field.
        field: String,
        /// Description of the field's kind after stripping one `Option`.
        kind: String,
    },

    /// Flattening an embedded struct produced a field whose name or storage
    /// name collides with another field of the owning type.
    #[error("duplicate storage name {db_name:?} in {owner} (field {field})")]
    DuplicateStorageName {
        /// Name of the record type owning the colliding fields.
        owner: String,
        /// Name of the later of the two colliding fields.
        field: String,
        /// The storage name both fields resolve to.
        db_name: String,
    },
}

/// Errors produced by the document encoder and decoder.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A nested schema derivation failed mid-conversion.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A value's runtime shape does not fit the declared field kind, e.g. a
    /// scalar where a sub-document was required.
    #[error("value shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Description of the shape the declared field kind requires.
        expected: String,
        /// Description of the shape actually found.
        found: String,
    },

    /// A stored list entry cannot be converted into the field's element kind.
    #[error("unsupported list element for field {field}: {detail}")]
    UnsupportedListElement {
        /// Name of the list-valued field being decoded.
        field: String,
        /// What was found instead of a convertible element.
        detail: String,
    },

    /// A binary payload tagged as a UUID did not hold exactly 16 bytes.
    #[error("invalid uuid payload: {0}")]
    InvalidUuid(String),

    /// An unsigned 64-bit value does not fit the signed 64-bit integer the
    /// document format stores.
    #[error("unsigned value {0} does not fit a signed 64-bit document integer")]
    UnsignedOverflow(u64),

    /// A type-erased record value held a different record type than the
    /// target field declares.
    #[error("record type mismatch: expected {expected}, found {found}")]
    RecordMismatch {
        /// The record type the field declares.
        expected: &'static str,
        /// The record type actually held by the value.
        found: &'static str,
    },
}

/// Top-level error type for collection and store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Schema derivation failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Document encoding or decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A save-style operation received a payload of the wrong record type.
    #[error("payload type mismatch: collection stores {expected}, got {found}")]
    TypeMismatch {
        /// The record type the collection was opened for.
        expected: &'static str,
        /// The record type of the payload actually provided.
        found: &'static str,
    },

    /// The underlying storage backend reported an error.
    #[error("backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
