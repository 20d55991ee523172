/// LivePivot - schema inference, typed ingestion and view configuration
///
/// Loosely-typed batches (rows of records, maps of columns, or declared
/// schemas) become strongly-typed columnar tables. Column types are inferred
/// from a bounded sample and widened in place when later values do not fit.
/// View requests are resolved against the resulting schema into typed pivot,
/// aggregate, sort and filter parameters.

pub mod accessor;
pub mod changeset;
pub mod classify;
pub mod column;
pub mod data_table;
pub mod date;
pub mod diagnostics;
pub mod error;
pub mod fill;
pub mod infer;
pub mod ingest;
pub mod interner;
pub mod store;
pub mod table;
pub mod value;
pub mod view_config;

pub use accessor::{BatchAccessor, DataAccessor, DataFormat, RowBatch};
pub use changeset::{Changeset, TableChange};
pub use classify::{classify, INT32_SAMPLE_LIMIT};
pub use column::{CellStatus, Column, ColumnValue, PromotionTrigger, StorageType};
pub use data_table::{DataTable, Schema};
pub use date::{DateParser, IsoDateParser, ParsedDate};
pub use diagnostics::{CollectedDiagnostics, Diagnostics, LogDiagnostics, Severity};
pub use error::{Error, Result};
pub use fill::{fill_column, write_cell, WriteOutcome};
pub use infer::{
    infer_names, infer_schema, infer_types, resolve_declared_schema, DeclaredSchema, TypeTag, NAME_SCAN_ROWS,
    TYPE_SAMPLE_ROWS,
};
pub use ingest::{ingest, DEFAULT_LIMIT, IMPLICIT_INDEX, OPERATION_KEY, PRIMARY_KEY};
pub use interner::{StringId, StringInterner};
pub use store::{MemoryStore, PrimaryKey, Store};
pub use table::{Table, TableOptions};
pub use value::InputValue;
pub use view_config::{
    build_view_config, AggSpec, Aggregate, ContextConfig, ContextFactory, Filter, FilterCombinator, FilterOp,
    FilterTerm, RawViewConfig, Sidedness, SortOrder, SortSpec, Totals, ViewConfig,
};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::rc::Rc;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn values(table: &Table, column: &str) -> Vec<ColumnValue> {
        (0..table.size()).map(|row| table.get(row, column).unwrap()).collect()
    }

    #[test]
    fn test_overflow_promotes_to_float() {
        init();
        let table = Table::from_json(json!([{"a": 1}, {"a": 2}, {"a": 3_000_000_000i64}]), TableOptions::default())
            .unwrap();

        assert_eq!(table.dtype("a").unwrap(), StorageType::Float64);
        assert_eq!(
            values(&table, "a"),
            vec![ColumnValue::Float64(1.0), ColumnValue::Float64(2.0), ColumnValue::Float64(3e9)]
        );
    }

    #[test]
    fn test_in_range_value_keeps_int32() {
        init();
        // 99999 is past the sampling bound but still fits in 32 bits
        let table = Table::from_json(json!([{"a": 1}, {"a": 2}, {"a": 99999}]), TableOptions::default()).unwrap();

        assert_eq!(table.dtype("a").unwrap(), StorageType::Int32);
        assert_eq!(table.get(2, "a").unwrap(), ColumnValue::Int32(99999));
    }

    #[test]
    fn test_non_number_falls_back_to_string() {
        init();
        let diagnostics = Rc::new(CollectedDiagnostics::new());
        let accessor = BatchAccessor::from_json(json!([{"a": 1}, {"a": 2.5}, {"a": "x"}])).unwrap();
        let table =
            Table::with_diagnostics(&accessor, TableOptions::default(), Box::new(Rc::clone(&diagnostics))).unwrap();

        // 2.5 truncates while the column is still INT32, then "x" forces a refill
        assert_eq!(table.dtype("a").unwrap(), StorageType::String);
        assert_eq!(
            values(&table, "a"),
            vec![
                ColumnValue::String("1".into()),
                ColumnValue::String("2.5".into()),
                ColumnValue::String("x".into())
            ]
        );
        assert_eq!(diagnostics.count(Severity::Warning), 1);
    }

    #[test]
    fn test_bool_column_accepts_string_update() {
        init();
        let mut table = Table::from_json(json!([{"b": true}]), TableOptions::default()).unwrap();
        table.update_json(json!([{"b": "false"}])).unwrap();

        assert_eq!(table.dtype("b").unwrap(), StorageType::Bool);
        assert_eq!(values(&table, "b"), vec![ColumnValue::Bool(true), ColumnValue::Bool(false)]);
    }

    #[test]
    fn test_index_overflow_update_keeps_rows() {
        init();
        let mut table =
            Table::from_json(json!([{"id": 1, "v": 10}, {"id": 2, "v": 20}]), TableOptions::with_index("id")).unwrap();
        table
            .update_json(json!([{"id": 1, "v": 99}, {"id": 3_000_000_000i64, "v": 1}]))
            .unwrap();

        assert_eq!(table.size(), 3);
        assert_eq!(table.dtype("id").unwrap(), StorageType::Float64);
        assert_eq!(table.get(0, "v").unwrap(), ColumnValue::Int32(99));
        assert_eq!(table.find(&ColumnValue::Int32(1)), Some(0));

        table.update_json(json!([{"id": 2, "v": 21}])).unwrap();
        assert_eq!(table.size(), 3);
        assert_eq!(table.get(1, "v").unwrap(), ColumnValue::Int32(21));
    }

    #[test]
    fn test_index_string_update_keeps_rows() {
        init();
        let mut table =
            Table::from_json(json!([{"id": 1, "v": 10}, {"id": 2, "v": 20}]), TableOptions::with_index("id")).unwrap();
        table.update_json(json!([{"id": 1, "v": 99}, {"id": "x", "v": 1}])).unwrap();

        assert_eq!(table.size(), 3);
        assert_eq!(table.dtype("id").unwrap(), StorageType::String);
        assert_eq!(table.get(0, "v").unwrap(), ColumnValue::Int32(99));
        assert_eq!(table.find(&ColumnValue::String("x".into())), Some(2));
    }

    #[test]
    fn test_inconsistent_rows_extend_names() {
        init();
        let diagnostics = CollectedDiagnostics::new();
        let batch = RowBatch::from_json(json!([{"x": 1}, {"y": 2}])).unwrap();
        let accessor = BatchAccessor::with_diagnostics(batch, &diagnostics);

        assert_eq!(accessor.column_names(), ["x", "y"]);
        assert_eq!(diagnostics.count(Severity::Warning), 2);

        let table = Table::new(&accessor, TableOptions::default()).unwrap();
        assert_eq!(values(&table, "x"), vec![ColumnValue::Int32(1), ColumnValue::Null]);
        assert_eq!(values(&table, "y"), vec![ColumnValue::Null, ColumnValue::Int32(2)]);
    }

    #[test]
    fn test_inference_is_deterministic() {
        init();
        let batch = json!({
            "when": ["2021-03-04", null],
            "n": [null, 12000],
            "s": ["abc", "def"],
            "empty": [null, null]
        });
        let first = infer_schema(&BatchAccessor::from_json(batch.clone()).unwrap(), &LogDiagnostics).unwrap();
        let second = infer_schema(&BatchAccessor::from_json(batch).unwrap(), &LogDiagnostics).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first.iter().collect::<Vec<_>>(),
            vec![
                ("when", StorageType::Time),
                ("n", StorageType::Float64),
                ("s", StorageType::String),
                ("empty", StorageType::String)
            ]
        );
    }

    #[test]
    fn test_declared_schema_then_rows() {
        init();
        let mut table = Table::from_json(json!({"id": "str", "qty": "int", "at": "date"}), TableOptions::with_index("id"))
            .unwrap();
        assert_eq!(table.size(), 0);

        table
            .update_json(json!([{"id": "a", "qty": 3, "at": "2020-05-01"}, {"id": "a", "qty": 4}]))
            .unwrap();

        assert_eq!(table.size(), 1);
        assert_eq!(table.get(0, "qty").unwrap(), ColumnValue::Int64(4));
        assert_eq!(table.get(0, "at").unwrap().to_string(), "2020-05-01");
        assert_eq!(
            table.schema_names(),
            vec![
                ("id".to_string(), "string"),
                ("qty".to_string(), "integer"),
                ("at".to_string(), "date")
            ]
        );
    }

    struct ShapeOnly;

    impl ContextFactory for ShapeOnly {
        type Context = (Sidedness, bool);

        fn make_context(&mut self, sides: Sidedness, config: &ContextConfig) -> Result<Self::Context> {
            let column_only = matches!(config, ContextConfig::Two { column_only: true, .. });
            Ok((sides, column_only))
        }
    }

    #[test]
    fn test_column_only_view_on_table() {
        init();
        let table = Table::from_json(
            json!([{"sym": "A", "px": 1.0, "day": "2020-01-01"}, {"sym": "B", "px": 2.0, "day": "2020-01-02"}]),
            TableOptions::default(),
        )
        .unwrap();
        let raw = RawViewConfig::from_json(
            r#"{"column-pivots": ["sym"], "filter": [["day", ">=", "2020-01-02"], ["px", "==", "abc"]]}"#,
        )
        .unwrap();

        let (config, context) = table.make_view(&mut ShapeOnly, &raw).unwrap();
        assert_eq!(context, (Sidedness::Two, true));
        assert_eq!(config.row_pivots(), [PRIMARY_KEY.to_string()]);
        assert_eq!(config.columns(), ["sym".to_string(), "px".to_string(), "day".to_string()]);
        assert_eq!(config.filters().len(), 1);
        assert_eq!(config.filters()[0].terms, vec![FilterTerm::Time(1_577_923_200_000)]);
        assert_eq!(config.aggspecs().len(), 3);
    }
}
