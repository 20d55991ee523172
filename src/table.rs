/// LivePivot Table
///
/// A Table owns a store and runs every batch through the same pipeline:
/// infer or look up the input schema, stage a typed `DataTable`, ingest,
/// then hand the staged rows to the store to upsert by primary key.
///
/// # Examples
///
/// ```
/// use livepivot::{StorageType, Table, TableOptions};
/// use serde_json::json;
///
/// let mut table = Table::from_json(json!([{"sym": "A", "px": 1.5}, {"sym": "B", "px": 2.0}]), TableOptions::default()).unwrap();
/// assert_eq!(table.size(), 2);
/// assert_eq!(table.columns(), vec!["sym", "px"]);
///
/// table.update_json(json!([{"sym": "C", "px": 3}])).unwrap();
/// assert_eq!(table.size(), 3);
/// assert_eq!(table.schema().get_dtype("px"), Some(StorageType::Float64));
/// ```

use crate::accessor::{BatchAccessor, DataAccessor, DataFormat, RowBatch};
use crate::changeset::TableChange;
use crate::column::{ColumnValue, StorageType};
use crate::data_table::{DataTable, Schema};
use crate::date::{DateParser, IsoDateParser};
use crate::diagnostics::{Diagnostics, LogDiagnostics};
use crate::error::{Error, Result};
use crate::infer::infer_schema;
use crate::ingest::{ingest, DEFAULT_LIMIT, IMPLICIT_INDEX, OPERATION_KEY, PRIMARY_KEY};
use crate::interner::StringInterner;
use crate::store::{MemoryStore, PrimaryKey, Store};
use crate::view_config::{build_view_config, ContextFactory, RawViewConfig, ViewConfig};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Options fixed when a table is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    /// Input column whose values identify rows
    pub index: Option<String>,
    /// Row limit; synthetic keys wrap around at this many rows
    pub limit: u32,
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions {
            index: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl TableOptions {
    pub fn with_index(index: impl Into<String>) -> Self {
        TableOptions {
            index: Some(index.into()),
            ..Default::default()
        }
    }

    pub fn with_limit(limit: u32) -> Self {
        TableOptions {
            limit,
            ..Default::default()
        }
    }
}

pub struct Table {
    options: TableOptions,
    offset: u32,
    store: Box<dyn Store>,
    date_parser: Box<dyn DateParser>,
    diagnostics: Box<dyn Diagnostics>,
}

impl Table {
    pub fn new(accessor: &dyn DataAccessor, options: TableOptions) -> Result<Self> {
        Self::with_diagnostics(accessor, options, Box::new(LogDiagnostics))
    }

    pub fn with_diagnostics(
        accessor: &dyn DataAccessor,
        options: TableOptions,
        diagnostics: Box<dyn Diagnostics>,
    ) -> Result<Self> {
        let store = MemoryStore::new(Rc::new(RefCell::new(StringInterner::new())));
        Self::with_store(accessor, options, Box::new(store), diagnostics)
    }

    /// Creates a table over a caller-supplied store and loads `accessor` into it.
    pub fn with_store(
        accessor: &dyn DataAccessor,
        options: TableOptions,
        store: Box<dyn Store>,
        diagnostics: Box<dyn Diagnostics>,
    ) -> Result<Self> {
        if options.limit == 0 {
            return Err(Error::InvalidOption("limit must be greater than zero".to_string()));
        }

        let mut table = Table {
            options,
            offset: 0,
            store,
            date_parser: Box::new(IsoDateParser),
            diagnostics,
        };
        table.load(accessor)?;
        Ok(table)
    }

    pub fn from_json(value: Value, options: TableOptions) -> Result<Self> {
        Self::new(&BatchAccessor::from_json(value)?, options)
    }

    /// Parser used for date and datetime filter terms.
    pub fn with_date_parser(mut self, date_parser: Box<dyn DateParser>) -> Self {
        self.date_parser = date_parser;
        self
    }

    fn load(&mut self, accessor: &dyn DataAccessor) -> Result<()> {
        let input = infer_schema(accessor, self.diagnostics.as_ref())?;
        if let Some(index) = &self.options.index {
            if !input.contains(index) {
                return Err(Error::ColumnNotFound(index.clone()));
            }
        }
        log::debug!("loading {} rows with {} input columns", accessor.row_count(), input.len());
        self.stage(accessor, &input, false)
    }

    /// Applies a batch to the existing table.
    ///
    /// Column types come from the batch when it declares one per column and
    /// from the table otherwise. Columns the table does not have are skipped.
    pub fn update(&mut self, accessor: &dyn DataAccessor) -> Result<()> {
        if accessor.format() == DataFormat::Schema {
            return Err(Error::Unsupported("a declared schema cannot update a table".to_string()));
        }

        let names = accessor.column_names();
        let declared = accessor.column_types();
        let declared = (declared.len() == names.len()).then_some(declared);

        let mut input = Schema::default();
        for (cidx, name) in names.iter().enumerate() {
            let known = if name == IMPLICIT_INDEX {
                self.store.schema().get_dtype(PRIMARY_KEY)
            } else {
                self.store.schema().get_dtype(name)
            };
            let Some(known) = known else {
                self.diagnostics
                    .warn(&format!("Skipping column '{}' that is not in the table", name));
                continue;
            };
            input.push(name.as_str(), declared.map_or(known, |types| types[cidx]), true)?;
        }
        if input.is_empty() {
            return Err(Error::EmptySchema);
        }

        self.stage(accessor, &input, true)
    }

    pub fn update_json(&mut self, value: Value) -> Result<()> {
        let accessor = BatchAccessor::with_diagnostics(RowBatch::from_json(value)?, self.diagnostics.as_ref());
        self.update(&accessor)
    }

    fn stage(&mut self, accessor: &dyn DataAccessor, input: &Schema, is_update: bool) -> Result<()> {
        let nrows = accessor.row_count();
        let mut staged = DataTable::new(input.without(&[IMPLICIT_INDEX]), self.store.interner());
        staged.extend(nrows);

        ingest(
            &mut staged,
            accessor,
            input,
            self.options.index.as_deref(),
            self.offset,
            self.options.limit,
            is_update,
            self.diagnostics.as_ref(),
        )?;
        self.store.process(&staged, self.diagnostics.as_ref())?;

        self.offset = ((self.offset as u64 + nrows as u64) % self.options.limit as u64) as u32;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.store.size()
    }

    /// Full stored schema, key columns included.
    pub fn schema(&self) -> &Schema {
        self.store.schema()
    }

    /// User-visible column names.
    pub fn columns(&self) -> Vec<String> {
        self.schema()
            .column_names()
            .into_iter()
            .filter(|name| !is_key_column(name))
            .map(str::to_string)
            .collect()
    }

    /// User-visible columns with their display type names.
    pub fn schema_names(&self) -> Vec<(String, &'static str)> {
        self.schema()
            .iter()
            .filter(|(name, _)| !is_key_column(name))
            .map(|(name, dtype)| (name.to_string(), dtype.type_name()))
            .collect()
    }

    pub fn index(&self) -> Option<&str> {
        self.options.index.as_deref()
    }

    pub fn limit(&self) -> u32 {
        self.options.limit
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn interner(&self) -> Rc<RefCell<StringInterner>> {
        self.store.interner()
    }

    pub fn get(&self, row: usize, column: &str) -> Result<ColumnValue> {
        self.store.get(row, column)
    }

    /// Row currently holding `key`.
    pub fn find(&self, key: &ColumnValue) -> Option<usize> {
        let cast = self.store.schema().get_dtype(PRIMARY_KEY).and_then(|dtype| key.cast(dtype));
        PrimaryKey::from_value(cast.as_ref().unwrap_or(key)).and_then(|key| self.store.find(&key))
    }

    pub fn dtype(&self, column: &str) -> Result<StorageType> {
        self.schema()
            .get_dtype(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))
    }

    /// Changes since the last drain. The default store never bounds them, so
    /// a table that keeps taking updates must be drained, or built
    /// `with_store` over `MemoryStore::with_change_limit`.
    pub fn drain_changes(&mut self) -> Vec<TableChange> {
        self.store.drain_changes()
    }

    /// Resolves a view request against this table. An empty column list
    /// means every user-visible column.
    pub fn view_config(&self, raw: &RawViewConfig) -> Result<ViewConfig> {
        let filled;
        let raw = if raw.columns.is_empty() {
            filled = RawViewConfig {
                columns: self.columns(),
                ..raw.clone()
            };
            &filled
        } else {
            raw
        };

        build_view_config(
            self.schema(),
            self.date_parser.as_ref(),
            raw,
            &self.store.interner(),
            self.diagnostics.as_ref(),
        )
    }

    /// Resolves a view request and asks `factory` for a context of the
    /// matching shape.
    pub fn make_view<F: ContextFactory>(&self, factory: &mut F, raw: &RawViewConfig) -> Result<(ViewConfig, F::Context)> {
        let config = self.view_config(raw)?;
        let context = factory.make_context(config.sidedness(), &config.context_config())?;
        Ok((config, context))
    }
}

fn is_key_column(name: &str) -> bool {
    name == PRIMARY_KEY || name == OPERATION_KEY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectedDiagnostics, Severity};
    use crate::view_config::{ContextConfig, Sidedness};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn column(table: &Table, name: &str) -> Vec<ColumnValue> {
        (0..table.size()).map(|row| table.get(row, name).unwrap()).collect()
    }

    #[test]
    fn test_load_records() {
        let table = Table::from_json(
            json!([{"a": 1, "b": "x", "c": true}, {"a": 2, "b": "y", "c": false}]),
            TableOptions::default(),
        )
        .unwrap();

        assert_eq!(table.size(), 2);
        assert_eq!(
            table.schema_names(),
            vec![
                ("a".to_string(), "integer"),
                ("b".to_string(), "string"),
                ("c".to_string(), "boolean")
            ]
        );
        assert_eq!(table.schema().len(), 5);
        assert_eq!(column(&table, PRIMARY_KEY), vec![ColumnValue::Int64(0), ColumnValue::Int64(1)]);
        assert_eq!(table.offset(), 2);
    }

    #[test]
    fn test_declared_schema_is_empty() {
        let table = Table::from_json(json!({"a": "integer", "d": "datetime"}), TableOptions::default()).unwrap();

        assert_eq!(table.size(), 0);
        assert_eq!(table.dtype("a").unwrap(), StorageType::Int64);
        assert_eq!(table.dtype("d").unwrap(), StorageType::Time);
    }

    #[test]
    fn test_bad_options() {
        assert!(matches!(
            Table::from_json(json!([{"a": 1}]), TableOptions::with_limit(0)),
            Err(Error::InvalidOption(_))
        ));
        assert!(matches!(
            Table::from_json(json!([{"a": 1}]), TableOptions::with_index("id")),
            Err(Error::ColumnNotFound(_))
        ));
        assert!(matches!(
            Table::from_json(json!({"a": "decimal"}), TableOptions::default()),
            Err(Error::UnknownTypeTag { .. })
        ));
    }

    #[test]
    fn test_update_upserts_by_index() {
        let mut table = Table::from_json(
            json!([{"id": "a", "v": 1, "w": 10}, {"id": "b", "v": 2, "w": 20}]),
            TableOptions::with_index("id"),
        )
        .unwrap();
        table.drain_changes();

        table.update_json(json!([{"id": "b", "v": 5}, {"id": "c", "v": 6, "w": 60}])).unwrap();

        assert_eq!(table.size(), 3);
        assert_eq!(column(&table, "v"), vec![ColumnValue::Int32(1), ColumnValue::Int32(5), ColumnValue::Int32(6)]);
        // "w" was missing for "b", so it keeps its value
        assert_eq!(table.get(1, "w").unwrap(), ColumnValue::Int32(20));
        assert_eq!(table.find(&ColumnValue::String("c".into())), Some(2));

        let changes = table.drain_changes();
        assert_eq!(changes.iter().filter(|c| c.is_insert()).count(), 1);
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_update_widens_column() {
        let mut table = Table::from_json(json!([{"id": 1, "v": 1}]), TableOptions::with_index("id")).unwrap();
        table.update_json(json!([{"id": 2, "v": "n/a"}])).unwrap();

        assert_eq!(table.dtype("v").unwrap(), StorageType::String);
        assert_eq!(column(&table, "v"), vec![ColumnValue::String("1".into()), ColumnValue::String("n/a".into())]);

        table.update_json(json!([{"id": 3, "v": 7}])).unwrap();
        assert_eq!(table.get(2, "v").unwrap(), ColumnValue::String("7".into()));
    }

    #[test]
    fn test_update_keeps_bool_type() {
        let mut table = Table::from_json(json!([{"flag": true}]), TableOptions::default()).unwrap();
        table.update_json(json!([{"flag": "false"}])).unwrap();

        assert_eq!(table.dtype("flag").unwrap(), StorageType::Bool);
        assert_eq!(table.get(1, "flag").unwrap(), ColumnValue::Bool(false));
    }

    #[test]
    fn test_update_skips_unknown_columns() {
        let diagnostics = Rc::new(CollectedDiagnostics::new());
        let accessor = BatchAccessor::from_json(json!([{"a": 1}])).unwrap();
        let mut table =
            Table::with_diagnostics(&accessor, TableOptions::default(), Box::new(Rc::clone(&diagnostics))).unwrap();

        table.update_json(json!([{"a": 2, "zzz": 3}])).unwrap();
        assert_eq!(table.size(), 2);
        assert!(!table.schema().contains("zzz"));
        assert_eq!(diagnostics.count(Severity::Warning), 1);

        assert!(matches!(table.update_json(json!([{"zzz": 1}])), Err(Error::EmptySchema)));
        assert!(matches!(
            table.update_json(json!({"a": "int"})),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_update_with_declared_types() {
        let mut table = Table::from_json(json!([{"a": 1}]), TableOptions::default()).unwrap();
        let accessor = BatchAccessor::from_json(json!([{"a": 3000000000i64}]))
            .unwrap()
            .with_types(vec![StorageType::Float64]);
        table.update(&accessor).unwrap();

        assert_eq!(table.dtype("a").unwrap(), StorageType::Float64);
        assert_eq!(table.get(0, "a").unwrap(), ColumnValue::Float64(1.0));
        assert_eq!(table.get(1, "a").unwrap(), ColumnValue::Float64(3e9));
    }

    #[test]
    fn test_ring_buffer_limit() {
        let mut table = Table::from_json(json!([{"a": 1}, {"a": 2}]), TableOptions::with_limit(3)).unwrap();
        table.update_json(json!([{"a": 3}, {"a": 4}])).unwrap();

        assert_eq!(table.size(), 3);
        assert_eq!(column(&table, "a"), vec![ColumnValue::Int32(4), ColumnValue::Int32(2), ColumnValue::Int32(3)]);
        assert_eq!(table.offset(), 1);
    }

    #[test]
    fn test_implicit_index_update() {
        let mut table = Table::from_json(json!([{"__INDEX__": 5, "v": 1}]), TableOptions::default()).unwrap();
        table.update_json(json!([{"__INDEX__": 5, "v": 9}])).unwrap();

        assert_eq!(table.size(), 1);
        assert_eq!(table.get(0, "v").unwrap(), ColumnValue::Int32(9));
        assert!(!table.schema().contains(IMPLICIT_INDEX));
    }

    #[test]
    fn test_view_config_defaults_to_all_columns() {
        let table = Table::from_json(json!([{"sym": "A", "px": 1.5}]), TableOptions::default()).unwrap();
        let config = table.view_config(&RawViewConfig::default()).unwrap();

        assert_eq!(config.columns(), ["sym".to_string(), "px".to_string()]);
        assert_eq!(config.sidedness(), Sidedness::Zero);
    }

    struct Failing;

    impl ContextFactory for Failing {
        type Context = ();

        fn make_context(&mut self, _sides: Sidedness, _config: &ContextConfig) -> Result<()> {
            Err(Error::Unsupported("no contexts here".to_string()))
        }
    }

    #[test]
    fn test_failed_view_releases_terms() {
        let table = Table::from_json(json!([{"sym": "A"}]), TableOptions::default()).unwrap();
        let raw = RawViewConfig::from_json(r#"{"filter": [["sym", "==", "zzz"]]}"#).unwrap();

        assert!(table.make_view(&mut Failing, &raw).is_err());
        assert_eq!(table.interner().borrow().get("zzz"), None);
    }

    #[test]
    fn test_repeated_view_configs_keep_pool_steady() {
        let table = Table::from_json(json!([{"sym": "A"}, {"sym": "B"}]), TableOptions::default()).unwrap();
        let raw = RawViewConfig::from_json(r#"{"filter": [["sym", "==", "A"], ["sym", "==", "ZZZ"]]}"#).unwrap();
        let interner = table.interner();
        let a = interner.borrow().get("A").unwrap();

        for _ in 0..3 {
            let config = table.view_config(&raw).unwrap();
            assert_eq!(config.filters().len(), 2);
            assert_eq!(interner.borrow().ref_count(a), 2);
        }

        assert_eq!(interner.borrow().ref_count(a), 1);
        assert_eq!(interner.borrow().get("ZZZ"), None);
    }
}
