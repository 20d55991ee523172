/// Schema and staging table
///
/// A `DataTable` is the typed, columnar target of one ingestion call: the
/// driver adds key columns to it, the filler writes and promotes its columns,
/// and the store consumes it afterwards. Columns are addressed by name.
///
/// # Examples
///
/// ```
/// use livepivot::{DataTable, Schema, StorageType, StringInterner};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let schema = Schema::new(vec![
///     ("sym".to_string(), StorageType::String, true),
///     ("qty".to_string(), StorageType::Int32, true),
/// ]);
/// let mut table = DataTable::new(schema, Rc::new(RefCell::new(StringInterner::new())));
/// table.extend(3);
///
/// assert_eq!(table.size(), 3);
/// assert_eq!(table.get_column("qty").unwrap().len(), 3);
/// ```

use crate::column::{Column, StorageType};
use crate::error::{Error, Result};
use crate::interner::StringInterner;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Ordered (name, type, nullable) triples with unique names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<(String, StorageType, bool)>,
}

impl Schema {
    pub fn new(columns: Vec<(String, StorageType, bool)>) -> Self {
        Schema { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _, _)| name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _, _)| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Returns (name, type, nullable) at `index`.
    pub fn column_info(&self, index: usize) -> Option<(&str, StorageType, bool)> {
        self.columns.get(index).map(|(name, ty, nullable)| (name.as_str(), *ty, *nullable))
    }

    pub fn get_dtype(&self, name: &str) -> Option<StorageType> {
        self.columns.iter().find(|(n, _, _)| n == name).map(|(_, ty, _)| *ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, StorageType)> + '_ {
        self.columns.iter().map(|(name, ty, _)| (name.as_str(), *ty))
    }

    pub fn push(&mut self, name: impl Into<String>, dtype: StorageType, nullable: bool) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            return Err(Error::DuplicateColumn(name));
        }
        self.columns.push((name, dtype, nullable));
        Ok(())
    }

    pub fn set_dtype(&mut self, name: &str, dtype: StorageType) -> Result<()> {
        let entry = self
            .columns
            .iter_mut()
            .find(|(n, _, _)| n == name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))?;
        entry.1 = dtype;
        Ok(())
    }

    /// Copy without the named columns.
    pub fn without(&self, names: &[&str]) -> Schema {
        Schema {
            columns: self
                .columns
                .iter()
                .filter(|(n, _, _)| !names.contains(&n.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Folds `other` into this schema. New columns are appended; shared
    /// columns may only widen, a narrower incoming type keeps the current one.
    pub fn merge(&mut self, other: &Schema) -> Result<()> {
        for (name, incoming, nullable) in &other.columns {
            match self.get_dtype(name) {
                None => self.columns.push((name.clone(), *incoming, *nullable)),
                Some(current) if current.can_widen_to(*incoming) => self.set_dtype(name, *incoming)?,
                Some(current) if incoming.can_widen_to(current) => {}
                Some(current) => {
                    return Err(Error::TypeMismatch {
                        column: name.clone(),
                        expected: current,
                        found: incoming.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

pub struct DataTable {
    schema: Schema,
    columns: Vec<Column>,
    size: usize,
    interner: Rc<RefCell<StringInterner>>,
}

impl DataTable {
    /// Creates one empty column per schema entry.
    pub fn new(schema: Schema, interner: Rc<RefCell<StringInterner>>) -> Self {
        let columns = schema
            .columns
            .iter()
            .map(|(name, dtype, nullable)| Column::new(name.clone(), *dtype, *nullable, Rc::clone(&interner)))
            .collect();
        DataTable {
            schema,
            columns,
            size: 0,
            interner,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn interner(&self) -> &Rc<RefCell<StringInterner>> {
        &self.interner
    }

    /// Appends `n` cleared rows to every column.
    pub fn extend(&mut self, n: usize) {
        for column in &mut self.columns {
            column.extend(n);
        }
        self.size += n;
    }

    pub fn add_column(&mut self, name: &str, dtype: StorageType, nullable: bool) -> Result<&mut Column> {
        self.schema.push(name, dtype, nullable)?;
        let mut column = Column::new(name, dtype, nullable, Rc::clone(&self.interner));
        column.extend(self.size);
        self.columns.push(column);
        let last = self.columns.len() - 1;
        Ok(&mut self.columns[last])
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.schema
            .column_index(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    pub fn get_column(&self, name: &str) -> Result<&Column> {
        let idx = self.position(name)?;
        Ok(&self.columns[idx])
    }

    pub fn get_column_mut(&mut self, name: &str) -> Result<&mut Column> {
        let idx = self.position(name)?;
        Ok(&mut self.columns[idx])
    }

    /// Copies `src` into `dst`, replacing `dst` if it already exists.
    pub fn clone_column(&mut self, src: &str, dst: &str) -> Result<()> {
        let copy = self.get_column(src)?.clone_as(dst);
        let dtype = copy.dtype();
        let nullable = copy.is_nullable();
        match self.schema.column_index(dst) {
            Some(idx) => {
                self.columns[idx] = copy;
                self.schema.set_dtype(dst, dtype)?;
            }
            None => {
                self.schema.push(dst, dtype, nullable)?;
                self.columns.push(copy);
            }
        }
        Ok(())
    }

    /// Changes a column's storage type, see [`Column::promote`].
    pub fn promote_column(
        &mut self,
        name: &str,
        new_type: StorageType,
        from_row: usize,
        copy_existing: bool,
    ) -> Result<()> {
        let idx = self.position(name)?;
        self.columns[idx].promote(new_type, from_row, copy_existing)?;
        self.schema.set_dtype(name, new_type)
    }
}

impl fmt::Debug for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTable")
            .field("size", &self.size)
            .field("columns", &self.columns)
            .finish()
    }
}
