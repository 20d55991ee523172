/// Data accessor boundary
///
/// Ingestion never walks raw input itself. It asks a [`DataAccessor`] for
/// the batch shape, the column names and, cell by cell, for a value already
/// coerced toward the type the target column expects.
///
/// [`BatchAccessor`] is the in-memory implementation over a [`RowBatch`].
///
/// # Examples
///
/// ```
/// use livepivot::{BatchAccessor, DataAccessor, DataFormat, RowBatch, StorageType};
/// use serde_json::json;
///
/// let batch = RowBatch::from_json(json!([{"a": 1, "b": "x"}, {"a": null}])).unwrap();
/// let accessor = BatchAccessor::new(batch);
///
/// assert_eq!(accessor.format(), DataFormat::Records);
/// assert_eq!(accessor.column_names(), ["a", "b"]);
/// assert_eq!(accessor.row_count(), 2);
/// assert!(accessor.marshal(0, 1, StorageType::Int32).unwrap().is_none());
/// ```

use crate::column::StorageType;
use crate::date::{DateParser, IsoDateParser, ParsedDate};
use crate::diagnostics::{Diagnostics, LogDiagnostics};
use crate::error::{Error, Result};
use crate::infer::infer_names;
use crate::value::{parse_bool, InputValue};
use serde_json::Value;

/// Shape of an input batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// Sequence of name→value rows
    Records = 0,
    /// Map of name→column array
    Columns = 1,
    /// Map of name→type tag, no data
    Schema = 2,
}

/// Raw input, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum RowBatch {
    Records(Vec<Vec<(String, InputValue)>>),
    Columns(Vec<(String, Vec<InputValue>)>),
    Schema(Vec<(String, String)>),
}

impl RowBatch {
    /// Builds a batch from JSON: an array of objects, an object of arrays,
    /// or an object of type names.
    pub fn from_json(value: Value) -> Result<RowBatch> {
        match value {
            Value::Array(items) => {
                let mut rows = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let Value::Object(map) = item else {
                        return Err(Error::InvalidBatch(format!("row {} is not an object", i)));
                    };
                    rows.push(map.into_iter().map(|(k, v)| (k, InputValue::from(v))).collect());
                }
                Ok(RowBatch::Records(rows))
            }
            Value::Object(map) => match map.values().next() {
                None => Ok(RowBatch::Columns(Vec::new())),
                Some(Value::String(_)) => {
                    let mut declared = Vec::with_capacity(map.len());
                    for (name, tag) in map {
                        let Value::String(tag) = tag else {
                            return Err(Error::InvalidBatch(format!("type of column '{}' is not a string", name)));
                        };
                        declared.push((name, tag));
                    }
                    Ok(RowBatch::Schema(declared))
                }
                Some(Value::Array(_)) => {
                    let mut columns = Vec::with_capacity(map.len());
                    for (name, values) in map {
                        let Value::Array(values) = values else {
                            return Err(Error::InvalidBatch(format!("column '{}' is not an array", name)));
                        };
                        columns.push((name, values.into_iter().map(InputValue::from).collect()));
                    }
                    Ok(RowBatch::Columns(columns))
                }
                Some(_) => Err(Error::InvalidBatch(
                    "object values must be arrays or type names".to_string(),
                )),
            },
            _ => Err(Error::InvalidBatch(
                "expected an array of rows or an object".to_string(),
            )),
        }
    }

    pub fn from_json_str(json: &str) -> Result<RowBatch> {
        RowBatch::from_json(serde_json::from_str(json)?)
    }

    pub fn format(&self) -> DataFormat {
        match self {
            RowBatch::Records(_) => DataFormat::Records,
            RowBatch::Columns(_) => DataFormat::Columns,
            RowBatch::Schema(_) => DataFormat::Schema,
        }
    }

    /// Rows in the batch; ragged column maps count their longest column.
    pub fn row_count(&self) -> usize {
        match self {
            RowBatch::Records(rows) => rows.len(),
            RowBatch::Columns(columns) => columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0),
            RowBatch::Schema(_) => 0,
        }
    }
}

pub trait DataAccessor {
    fn format(&self) -> DataFormat;

    fn data(&self) -> &RowBatch;

    fn row_count(&self) -> usize;

    fn column_names(&self) -> &[String];

    /// Types the source already knows, empty when it knows none.
    fn column_types(&self) -> &[StorageType];

    fn date_parser(&self) -> &dyn DateParser;

    /// One cell coerced toward `expected`, or `None` for null and missing.
    fn marshal(&self, cidx: usize, ridx: usize, expected: StorageType) -> Result<Option<InputValue>>;

    /// Arrow-backed sources are not ingested by this crate.
    fn is_arrow(&self) -> bool {
        false
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names().iter().position(|n| n == name)
    }
}

pub struct BatchAccessor {
    batch: RowBatch,
    names: Vec<String>,
    types: Vec<StorageType>,
    date_parser: Box<dyn DateParser>,
}

impl BatchAccessor {
    pub fn new(batch: RowBatch) -> Self {
        Self::with_diagnostics(batch, &LogDiagnostics)
    }

    /// Infers column names, reporting inconsistent rows to `diagnostics`.
    pub fn with_diagnostics(batch: RowBatch, diagnostics: &dyn Diagnostics) -> Self {
        let names = infer_names(&batch, diagnostics);
        BatchAccessor {
            batch,
            names,
            types: Vec::new(),
            date_parser: Box::new(IsoDateParser),
        }
    }

    pub fn from_json(value: Value) -> Result<Self> {
        Ok(Self::new(RowBatch::from_json(value)?))
    }

    pub fn with_date_parser(mut self, date_parser: Box<dyn DateParser>) -> Self {
        self.date_parser = date_parser;
        self
    }

    /// Declares column types up front, one per column name.
    pub fn with_types(mut self, types: Vec<StorageType>) -> Self {
        self.types = types;
        self
    }

    fn raw(&self, name: &str, ridx: usize) -> Result<Option<&InputValue>> {
        let value = match &self.batch {
            RowBatch::Records(rows) => rows
                .get(ridx)
                .and_then(|row| row.iter().find(|(k, _)| k == name))
                .map(|(_, v)| v),
            RowBatch::Columns(columns) => columns
                .iter()
                .find(|(k, _)| k == name)
                .and_then(|(_, values)| values.get(ridx)),
            RowBatch::Schema(_) => {
                return Err(Error::Unsupported(
                    "a declared schema carries no values to marshal".to_string(),
                ))
            }
        };
        Ok(value.filter(|v| !v.is_null()))
    }

    fn coerce(&self, raw: &InputValue, expected: StorageType) -> InputValue {
        match (expected, raw) {
            (StorageType::String, InputValue::Str(_)) => raw.clone(),
            (StorageType::String, other) => InputValue::Str(other.to_string()),
            (StorageType::Bool, InputValue::Str(s)) => match parse_bool(s) {
                Some(b) => InputValue::Bool(b),
                None => raw.clone(),
            },
            (StorageType::Date | StorageType::Time, InputValue::Str(s)) => match self.date_parser.parse(s) {
                Some(ParsedDate::Date(d)) => InputValue::Date(d),
                Some(ParsedDate::DateTime(dt)) => InputValue::DateTime(dt),
                None => raw.clone(),
            },
            _ => raw.clone(),
        }
    }
}

impl DataAccessor for BatchAccessor {
    fn format(&self) -> DataFormat {
        self.batch.format()
    }

    fn data(&self) -> &RowBatch {
        &self.batch
    }

    fn row_count(&self) -> usize {
        self.batch.row_count()
    }

    fn column_names(&self) -> &[String] {
        &self.names
    }

    fn column_types(&self) -> &[StorageType] {
        &self.types
    }

    fn date_parser(&self) -> &dyn DateParser {
        self.date_parser.as_ref()
    }

    fn marshal(&self, cidx: usize, ridx: usize, expected: StorageType) -> Result<Option<InputValue>> {
        let name = self
            .names
            .get(cidx)
            .ok_or_else(|| Error::ColumnNotFound(format!("#{}", cidx)))?;
        Ok(self.raw(name, ridx)?.map(|raw| self.coerce(raw, expected)))
    }
}
