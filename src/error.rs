/// Error types for LivePivot
///
/// Recoverable problems (an unknown sample type, an invalid filter clause)
/// are reported through [`crate::diagnostics::Diagnostics`] and never show up
/// here. Everything in this enum stops the current ingestion or view build.

use crate::column::StorageType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("column '{0}' not found in schema")]
    ColumnNotFound(String),

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("cannot build a table from a batch with no column names")]
    EmptySchema,

    #[error("unknown type tag '{tag}' for column '{column}'")]
    UnknownTypeTag { column: String, tag: String },

    #[error("type mismatch in column '{column}': expected {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: StorageType,
        found: String,
    },

    #[error("cannot coerce value at row {row} of column '{column}' to {expected}")]
    Coercion {
        column: String,
        row: usize,
        expected: StorageType,
    },

    #[error("row {row} out of range for column of length {len}")]
    RowOutOfRange { row: usize, len: usize },

    #[error("cannot promote column '{column}' from {from} to {to}")]
    InvalidPromotion {
        column: String,
        from: StorageType,
        to: StorageType,
    },

    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("unknown aggregate '{0}'")]
    UnknownAggregate(String),

    #[error("unknown sort order '{0}'")]
    UnknownSortOrder(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::ColumnNotFound("price".to_string());
        assert_eq!(err.to_string(), "column 'price' not found in schema");

        let err = Error::Coercion {
            column: "flag".to_string(),
            row: 3,
            expected: StorageType::Bool,
        };
        assert_eq!(err.to_string(), "cannot coerce value at row 3 of column 'flag' to bool");
    }

    #[test]
    fn test_json_error_converts() {
        let parsed: Result<serde_json::Value> = serde_json::from_str("{").map_err(Error::from);
        assert!(matches!(parsed, Err(Error::Json(_))));
    }
}
