/// Row ingestion driver
///
/// Fills every input column of a staging table and then establishes the two
/// key columns downstream processing relies on:
///
/// - `psp_pkey`: row identity used to upsert into the store
/// - `psp_okey`: operation key, always a copy of the primary key
///
/// Keys come from the `__INDEX__` input column when present, else from a
/// named index column, else from the row number modulo the table's row limit.

use crate::accessor::DataAccessor;
use crate::column::{ColumnValue, StorageType};
use crate::data_table::{DataTable, Schema};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::fill::fill_column;

pub const PRIMARY_KEY: &str = "psp_pkey";
pub const OPERATION_KEY: &str = "psp_okey";
/// Input column that carries explicit row identity
pub const IMPLICIT_INDEX: &str = "__INDEX__";
/// Row limit of a table created without one
pub const DEFAULT_LIMIT: u32 = u32::MAX;

/// Ingests `accessor` into `table` using the types in `schema`.
///
/// `offset` and `limit` belong to the caller's table; rows without explicit
/// identity are keyed `(row + offset) % limit`.
#[allow(clippy::too_many_arguments)]
pub fn ingest(
    table: &mut DataTable,
    accessor: &dyn DataAccessor,
    schema: &Schema,
    index: Option<&str>,
    offset: u32,
    limit: u32,
    is_update: bool,
    diagnostics: &dyn Diagnostics,
) -> Result<()> {
    if accessor.is_arrow() {
        return Err(Error::Unsupported("arrow-backed batches cannot be ingested".to_string()));
    }
    if limit == 0 {
        return Err(Error::InvalidOption("row limit must be positive".to_string()));
    }

    let nrows = accessor.row_count();
    if table.size() < nrows {
        table.extend(nrows - table.size());
    }

    let mut implicit = false;
    for (name, dtype) in schema.iter() {
        let cidx = accessor
            .column_index(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;

        let target = if name == IMPLICIT_INDEX { PRIMARY_KEY } else { name };
        if table.get_column(target).is_err() {
            table.add_column(target, dtype, true)?;
        }
        let filled = fill_column(table, accessor, target, cidx, dtype, is_update, diagnostics)?;
        if filled != dtype {
            log::debug!("column '{}' promoted from {} to {} during ingestion", name, dtype, filled);
        }

        if name == IMPLICIT_INDEX {
            table.clone_column(PRIMARY_KEY, OPERATION_KEY)?;
            implicit = true;
        }
    }

    if implicit {
        return Ok(());
    }

    match index {
        Some(index) => {
            table.clone_column(index, PRIMARY_KEY)?;
            table.clone_column(index, OPERATION_KEY)?;
        }
        None => synthesize_keys(table, nrows, offset, limit)?,
    }
    Ok(())
}

/// Ring-buffer keys: once `limit` rows exist, new rows reuse old keys.
fn synthesize_keys(table: &mut DataTable, nrows: usize, offset: u32, limit: u32) -> Result<()> {
    for key in [PRIMARY_KEY, OPERATION_KEY] {
        if table.get_column(key).is_err() {
            table.add_column(key, StorageType::Int64, true)?;
        }
        let column = table.get_column_mut(key)?;
        for ridx in 0..nrows {
            let value = (ridx as u64 + offset as u64) % limit as u64;
            column.set(ridx, ColumnValue::Int64(value as i64))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{BatchAccessor, DataFormat, RowBatch};
    use crate::date::DateParser;
    use crate::diagnostics::LogDiagnostics;
    use crate::infer::infer_schema;
    use crate::interner::StringInterner;
    use crate::value::InputValue;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn run(value: serde_json::Value, index: Option<&str>, offset: u32, limit: u32) -> Result<DataTable> {
        let accessor = BatchAccessor::from_json(value)?;
        let input = infer_schema(&accessor, &LogDiagnostics)?;
        let mut table = DataTable::new(input.without(&[IMPLICIT_INDEX]), Rc::new(RefCell::new(StringInterner::new())));
        table.extend(accessor.row_count());
        ingest(&mut table, &accessor, &input, index, offset, limit, false, &LogDiagnostics)?;
        Ok(table)
    }

    fn keys(table: &DataTable, name: &str) -> Vec<ColumnValue> {
        table.get_column(name).unwrap().iter().collect()
    }

    #[test]
    fn test_synthetic_keys_wrap_at_limit() {
        let table = run(json!([{"a": 1}, {"a": 2}, {"a": 3}]), None, 1, 2).unwrap();

        let expected = vec![ColumnValue::Int64(1), ColumnValue::Int64(0), ColumnValue::Int64(1)];
        assert_eq!(keys(&table, PRIMARY_KEY), expected);
        assert_eq!(keys(&table, OPERATION_KEY), expected);
    }

    #[test]
    fn test_synthetic_keys_with_default_limit() {
        let table = run(json!([{"a": 1}, {"a": 2}]), None, DEFAULT_LIMIT - 1, DEFAULT_LIMIT).unwrap();
        assert_eq!(
            keys(&table, PRIMARY_KEY),
            vec![ColumnValue::Int64(DEFAULT_LIMIT as i64 - 1), ColumnValue::Int64(0)]
        );
    }

    #[test]
    fn test_explicit_index_is_cloned() {
        let table = run(json!([{"id": "x", "v": 1}, {"id": "y", "v": 2}]), Some("id"), 0, DEFAULT_LIMIT).unwrap();

        assert_eq!(
            keys(&table, PRIMARY_KEY),
            vec![ColumnValue::String("x".into()), ColumnValue::String("y".into())]
        );
        assert_eq!(table.schema().get_dtype(OPERATION_KEY), Some(StorageType::String));
        assert!(matches!(
            run(json!([{"v": 1}]), Some("id"), 0, DEFAULT_LIMIT),
            Err(Error::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_implicit_index_short_circuits() {
        let table = run(json!([{"__INDEX__": 10, "v": 1}, {"__INDEX__": 20, "v": 2}]), Some("v"), 0, 1).unwrap();

        assert!(!table.schema().contains(IMPLICIT_INDEX));
        assert_eq!(keys(&table, PRIMARY_KEY), vec![ColumnValue::Int32(10), ColumnValue::Int32(20)]);
        assert_eq!(keys(&table, OPERATION_KEY), keys(&table, PRIMARY_KEY));
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(run(json!([{"a": 1}]), None, 0, 0), Err(Error::InvalidOption(_))));
    }

    #[test]
    fn test_declared_schema_builds_empty_columns() {
        let table = run(json!({"a": "int", "b": "str"}), None, 0, DEFAULT_LIMIT).unwrap();
        assert_eq!(table.size(), 0);
        assert_eq!(table.schema().column_names(), vec!["a", "b", PRIMARY_KEY, OPERATION_KEY]);
    }

    struct ArrowLike(BatchAccessor);

    impl DataAccessor for ArrowLike {
        fn format(&self) -> DataFormat {
            self.0.format()
        }
        fn data(&self) -> &RowBatch {
            self.0.data()
        }
        fn row_count(&self) -> usize {
            self.0.row_count()
        }
        fn column_names(&self) -> &[String] {
            self.0.column_names()
        }
        fn column_types(&self) -> &[StorageType] {
            self.0.column_types()
        }
        fn date_parser(&self) -> &dyn DateParser {
            self.0.date_parser()
        }
        fn marshal(&self, cidx: usize, ridx: usize, expected: StorageType) -> Result<Option<InputValue>> {
            self.0.marshal(cidx, ridx, expected)
        }
        fn is_arrow(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_arrow_is_unsupported() {
        let accessor = ArrowLike(BatchAccessor::from_json(json!([{"a": 1}])).unwrap());
        let schema = infer_schema(&accessor, &LogDiagnostics).unwrap();
        let mut table = DataTable::new(schema.clone(), Rc::new(RefCell::new(StringInterner::new())));
        let err = ingest(&mut table, &accessor, &schema, None, 0, DEFAULT_LIMIT, false, &LogDiagnostics);
        assert!(matches!(err, Err(Error::Unsupported(_))));
    }
}
