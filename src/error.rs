use thiserror::Error;

use crate::statement::StatementKind;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised by storage accessors and the connection pool.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The record template marks no identity field.
    #[error("record template for `{source_name}` has no identity field")]
    NoIdentity { source_name: String },

    #[error("record template for `{source_name}` maps column `{column}` more than once")]
    DuplicateColumn { source_name: String, column: String },

    #[error("view `{view}` does not support {operation}")]
    ReadOnlyView {
        view: String,
        operation: &'static str,
    },

    #[error("{operation}: {message}")]
    InvalidArgument {
        operation: &'static str,
        message: String,
    },

    #[error("unable to {operation} more than limit {limit}, got {got}")]
    BatchLimit {
        operation: &'static str,
        limit: usize,
        got: usize,
    },

    /// A key is not a plain (optionally qualified) column identifier.
    #[error("`{column}` is not a valid column name")]
    InvalidColumn { column: String },

    /// A compiled field list names a field the record no longer exposes.
    #[error("record has no field `{field}`")]
    UnknownField { field: String },

    #[error("`{source_name}` has no columns to update")]
    NothingToUpdate { source_name: String },

    #[error("`{source_name}` has no columns to insert")]
    NothingToInsert { source_name: String },

    #[error("failed to decode column `{column}` into field `{field}`: {source}")]
    Decode {
        column: String,
        field: String,
        #[source]
        source: DecodeError,
    },

    #[error("failed to open connection: {0}")]
    Connection(#[source] rusqlite::Error),

    #[error("{kind} statement failed: {source}")]
    Execution {
        kind: StatementKind,
        #[source]
        source: rusqlite::Error,
    },
}

impl StorageError {
    pub(crate) fn execution(kind: StatementKind) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| StorageError::Execution { kind, source }
    }
}

/// Why a column value could not be stored in its destination field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("cannot store {found} value in a {expected} field")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("malformed number `{0}`")]
    Number(String),

    #[error("value {0} is out of range")]
    OutOfRange(i64),

    #[error("bytes are not valid UTF-8")]
    Utf8,
}
