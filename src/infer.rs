/// Schema inference
///
/// Names come from the first row plus any keys later rows introduce; types
/// come from the first non-null sample of each column. Declared schemas skip
/// sampling and map type tags straight to storage types.
///
/// # Examples
///
/// ```
/// use livepivot::{infer_schema, BatchAccessor, LogDiagnostics, StorageType};
/// use serde_json::json;
///
/// let accessor = BatchAccessor::from_json(json!([
///     {"sym": "AAPL", "qty": 10, "px": 101.5},
///     {"sym": "MSFT", "qty": 20, "px": null},
/// ])).unwrap();
///
/// let schema = infer_schema(&accessor, &LogDiagnostics).unwrap();
/// assert_eq!(schema.get_dtype("sym"), Some(StorageType::String));
/// assert_eq!(schema.get_dtype("qty"), Some(StorageType::Int32));
/// assert_eq!(schema.get_dtype("px"), Some(StorageType::Float64));
/// ```

use crate::accessor::{DataAccessor, DataFormat, RowBatch};
use crate::classify::classify;
use crate::column::StorageType;
use crate::data_table::Schema;
use crate::date::DateParser;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::ingest::IMPLICIT_INDEX;
use std::collections::HashSet;

/// Initial number of rows scanned for column names.
pub const NAME_SCAN_ROWS: usize = 50;

/// Values sampled per column for type inference.
pub const TYPE_SAMPLE_ROWS: usize = 100;

/// Ordered column names of a batch.
///
/// For record batches the scan window starts at [`NAME_SCAN_ROWS`] and
/// doubles every time a row introduces a key the earlier rows lacked.
pub fn infer_names(batch: &RowBatch, diagnostics: &dyn Diagnostics) -> Vec<String> {
    match batch {
        RowBatch::Records(rows) => {
            let Some(first) = rows.first() else {
                return Vec::new();
            };

            let mut names: Vec<String> = first.iter().map(|(k, _)| k.clone()).collect();
            let mut seen: HashSet<String> = names.iter().cloned().collect();
            let mut window = NAME_SCAN_ROWS;
            let mut warned = false;
            let mut ix = 0;

            while ix < rows.len() && ix < window {
                let before = names.len();
                for (key, _) in &rows[ix] {
                    if seen.insert(key.clone()) {
                        names.push(key.clone());
                    }
                }
                if names.len() > before {
                    if !warned {
                        diagnostics.warn("Inconsistent rows in data: later rows introduce new columns");
                        warned = true;
                    }
                    diagnostics.warn(&format!("Extended from {} to {} columns", before, names.len()));
                    window *= 2;
                }
                ix += 1;
            }
            names
        }
        RowBatch::Columns(columns) => columns.iter().map(|(name, _)| name.clone()).collect(),
        RowBatch::Schema(declared) => declared.iter().map(|(name, _)| name.clone()).collect(),
    }
}

/// Storage type of each named column, from its first non-null sample.
/// Columns with no sample in the window default to STRING.
pub fn infer_types(
    batch: &RowBatch,
    names: &[String],
    date_parser: &dyn DateParser,
    diagnostics: &dyn Diagnostics,
) -> Vec<StorageType> {
    names
        .iter()
        .map(|name| {
            let sample = match batch {
                RowBatch::Records(rows) => rows
                    .iter()
                    .take(TYPE_SAMPLE_ROWS)
                    .filter_map(|row| row.iter().find(|(k, _)| k == name).map(|(_, v)| v))
                    .find(|v| !v.is_null()),
                RowBatch::Columns(columns) => columns
                    .iter()
                    .find(|(k, _)| k == name)
                    .and_then(|(_, values)| values.iter().take(TYPE_SAMPLE_ROWS).find(|v| !v.is_null())),
                RowBatch::Schema(_) => None,
            };

            match sample {
                Some(value) => classify(value, date_parser),
                None => {
                    diagnostics.warn(&format!(
                        "Could not infer type of column '{}' from its first {} values, using string",
                        name, TYPE_SAMPLE_ROWS
                    ));
                    StorageType::String
                }
            }
        })
        .collect()
}

/// Type names accepted in a declared schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// Unbounded host integer
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    /// Host double
    Float,
    Float32,
    Float64,
    Str,
    Bool,
    Date,
    DateTime,
}

impl TypeTag {
    /// Case-insensitive lookup. Unlisted names (`float16`, `object`, ...)
    /// are unknown.
    pub fn from_name(name: &str) -> Option<TypeTag> {
        let tag = match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => TypeTag::Int,
            "int8" => TypeTag::Int8,
            "int16" => TypeTag::Int16,
            "int32" => TypeTag::Int32,
            "int64" => TypeTag::Int64,
            "float" => TypeTag::Float,
            "float32" => TypeTag::Float32,
            "float64" => TypeTag::Float64,
            "str" | "string" => TypeTag::Str,
            "bool" | "bool8" | "boolean" => TypeTag::Bool,
            "date" => TypeTag::Date,
            "datetime" | "datetime64" | "timestamp" | "time" => TypeTag::DateTime,
            _ => return None,
        };
        Some(tag)
    }

    pub fn storage_type(self) -> StorageType {
        match self {
            TypeTag::Int | TypeTag::Int64 => StorageType::Int64,
            TypeTag::Int8 => StorageType::Int8,
            TypeTag::Int16 => StorageType::Int16,
            TypeTag::Int32 => StorageType::Int32,
            TypeTag::Float | TypeTag::Float64 => StorageType::Float64,
            TypeTag::Float32 => StorageType::Float32,
            TypeTag::Str => StorageType::String,
            TypeTag::Bool => StorageType::Bool,
            TypeTag::Date => StorageType::Date,
            TypeTag::DateTime => StorageType::Time,
        }
    }
}

/// Outcome of resolving a declared schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclaredSchema {
    pub columns: Vec<(String, StorageType)>,
    /// (column, tag) pairs whose tag was not recognized
    pub rejected: Vec<(String, String)>,
}

/// Maps declared type tags to storage types. Unknown tags are reported as
/// critical and the column is left out; the implicit index marker is left
/// out with a warning.
pub fn resolve_declared_schema(declared: &[(String, String)], diagnostics: &dyn Diagnostics) -> DeclaredSchema {
    let mut resolved = DeclaredSchema::default();
    for (name, tag) in declared {
        if name == IMPLICIT_INDEX {
            diagnostics.warn(&format!("Column name '{}' is reserved and was ignored", IMPLICIT_INDEX));
            continue;
        }
        match TypeTag::from_name(tag) {
            Some(t) => resolved.columns.push((name.clone(), t.storage_type())),
            None => {
                diagnostics.critical(&format!("Unknown type '{}' for column '{}'", tag, name));
                resolved.rejected.push((name.clone(), tag.clone()));
            }
        }
    }
    resolved
}

/// Input schema of a batch, in accessor column order.
///
/// Fails when the batch names no columns or a declared tag is unknown.
pub fn infer_schema(accessor: &dyn DataAccessor, diagnostics: &dyn Diagnostics) -> Result<Schema> {
    let columns = match accessor.format() {
        DataFormat::Schema => {
            let RowBatch::Schema(declared) = accessor.data() else {
                return Err(Error::InvalidBatch("declared schema format without a schema".to_string()));
            };
            let resolved = resolve_declared_schema(declared, diagnostics);
            if let Some((column, tag)) = resolved.rejected.into_iter().next() {
                return Err(Error::UnknownTypeTag { column, tag });
            }
            resolved.columns
        }
        DataFormat::Records | DataFormat::Columns => {
            let names = accessor.column_names().to_vec();
            let types = infer_types(accessor.data(), &names, accessor.date_parser(), diagnostics);
            names.into_iter().zip(types).collect()
        }
    };

    if columns.is_empty() {
        return Err(Error::EmptySchema);
    }
    Ok(Schema::new(
        columns.into_iter().map(|(name, dtype)| (name, dtype, true)).collect(),
    ))
}
