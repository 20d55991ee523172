/// Store - where staged batches end up
///
/// The `Store` trait is the seam to whatever owns a table's rows between
/// ingestion calls. `MemoryStore` keeps them in columns of its own and
/// upserts each staged row by primary key:
///
/// - a new key appends a row
/// - a known key overwrites valid cells, nulls cleared cells and leaves
///   unset cells with their prior value
///
/// A staged column wider than the stored one widens the stored column first.

use crate::changeset::{Changeset, TableChange};
use crate::column::{CellStatus, Column, ColumnValue};
use crate::data_table::{DataTable, Schema};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::ingest::PRIMARY_KEY;
use crate::interner::StringInterner;
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Hashable row identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrimaryKey {
    Bool(bool),
    /// Every integer width maps here, so 1i32 and 1i64 are one key
    Int(i64),
    /// Bit pattern of the f64 value
    Float(u64),
    String(String),
    Date(NaiveDate),
    Time(i64),
}

impl PrimaryKey {
    /// `None` for null values.
    pub fn from_value(value: &ColumnValue) -> Option<PrimaryKey> {
        let key = match value {
            ColumnValue::Null => return None,
            ColumnValue::Bool(b) => PrimaryKey::Bool(*b),
            ColumnValue::Int8(_) | ColumnValue::Int16(_) | ColumnValue::Int32(_) | ColumnValue::Int64(_) => {
                PrimaryKey::Int(value.as_i64()?)
            }
            ColumnValue::Float32(_) | ColumnValue::Float64(_) => PrimaryKey::Float(value.as_f64()?.to_bits()),
            ColumnValue::String(s) => PrimaryKey::String(s.clone()),
            ColumnValue::Date(d) => PrimaryKey::Date(*d),
            ColumnValue::Time(ms) => PrimaryKey::Time(*ms),
        };
        Some(key)
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Bool(b) => write!(f, "{}", b),
            PrimaryKey::Int(i) => write!(f, "{}", i),
            PrimaryKey::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            PrimaryKey::String(s) => f.write_str(s),
            PrimaryKey::Date(d) => write!(f, "{}", d),
            PrimaryKey::Time(ms) => write!(f, "{}", ms),
        }
    }
}

pub trait Store {
    fn schema(&self) -> &Schema;

    /// Number of distinct primary keys held.
    fn size(&self) -> usize;

    /// Merges a staged batch. The batch must carry a primary key column.
    fn process(&mut self, staged: &DataTable, diagnostics: &dyn Diagnostics) -> Result<()>;

    fn get(&self, row: usize, column: &str) -> Result<ColumnValue>;

    /// Row holding `key`, if any.
    fn find(&self, key: &PrimaryKey) -> Option<usize>;

    /// Takes the changes recorded since the last drain. Callers that keep
    /// processing batches must drain regularly or bound the buffer.
    fn drain_changes(&mut self) -> Vec<TableChange>;

    /// Pool that staged tables and filter terms must intern into.
    fn interner(&self) -> Rc<RefCell<StringInterner>>;
}

pub struct MemoryStore {
    schema: Schema,
    columns: Vec<Column>,
    rows: HashMap<PrimaryKey, usize>,
    size: usize,
    interner: Rc<RefCell<StringInterner>>,
    changeset: Changeset,
}

impl MemoryStore {
    pub fn new(interner: Rc<RefCell<StringInterner>>) -> Self {
        MemoryStore {
            schema: Schema::default(),
            columns: Vec::new(),
            rows: HashMap::new(),
            size: 0,
            interner,
            changeset: Changeset::new(),
        }
    }

    /// Store whose change buffer holds at most `limit` entries between drains.
    pub fn with_change_limit(interner: Rc<RefCell<StringInterner>>, limit: usize) -> Self {
        MemoryStore {
            changeset: Changeset::bounded(limit),
            ..MemoryStore::new(interner)
        }
    }

    pub fn changeset(&self) -> &Changeset {
        &self.changeset
    }

    /// Makes every staged column exist here with a type at least as wide.
    fn reconcile(&mut self, staged: &DataTable) -> Result<Vec<usize>> {
        let mut targets = Vec::with_capacity(staged.columns().len());
        for column in staged.columns() {
            let name = column.name();
            let incoming = column.dtype();
            let idx = match self.schema.column_index(name) {
                Some(idx) => {
                    let current = self.columns[idx].dtype();
                    if current != incoming {
                        if current.can_widen_to(incoming) {
                            self.columns[idx].promote(incoming, self.size, true)?;
                            self.schema.set_dtype(name, incoming)?;
                            self.changeset.push(TableChange::ColumnWidened {
                                column: name.to_string(),
                                from: current,
                                to: incoming,
                            });
                            if name == PRIMARY_KEY {
                                self.rekey(idx)?;
                            }
                        } else if !incoming.can_widen_to(current) {
                            return Err(Error::TypeMismatch {
                                column: name.to_string(),
                                expected: current,
                                found: incoming.to_string(),
                            });
                        }
                    }
                    idx
                }
                None => {
                    let mut created = Column::new(name, incoming, column.is_nullable(), Rc::clone(&self.interner));
                    created.extend(self.size);
                    self.schema.push(name, incoming, column.is_nullable())?;
                    self.columns.push(created);
                    self.columns.len() - 1
                }
            };
            targets.push(idx);
        }
        Ok(targets)
    }

    /// Rebuilds the key lookup from the primary key column at `idx`.
    fn rekey(&mut self, idx: usize) -> Result<()> {
        let column = &self.columns[idx];
        let mut rows = HashMap::with_capacity(self.rows.len());
        for row in 0..self.size {
            if let Some(key) = PrimaryKey::from_value(&column.get(row)?) {
                rows.insert(key, row);
            }
        }
        log::debug!("rekeyed {} rows after {} became {}", rows.len(), PRIMARY_KEY, column.dtype());
        self.rows = rows;
        Ok(())
    }
}

impl Store for MemoryStore {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn size(&self) -> usize {
        self.size
    }

    fn process(&mut self, staged: &DataTable, diagnostics: &dyn Diagnostics) -> Result<()> {
        let keys = staged.get_column(PRIMARY_KEY)?;
        let targets = self.reconcile(staged)?;
        let key_dtype = self.schema.get_dtype(PRIMARY_KEY).unwrap_or_else(|| keys.dtype());

        for row in 0..staged.size() {
            // Keys compare in the stored key type, so 1i32 finds a row keyed 1.0
            let value = keys.get(row)?;
            let value = value.cast(key_dtype).unwrap_or(value);
            let Some(key) = PrimaryKey::from_value(&value) else {
                diagnostics.warn(&format!("Skipping row {} with a null primary key", row));
                continue;
            };

            let (target, inserted) = match self.rows.get(&key) {
                Some(&target) => (target, false),
                None => {
                    for column in &mut self.columns {
                        column.extend(1);
                    }
                    self.rows.insert(key.clone(), self.size);
                    self.size += 1;
                    (self.size - 1, true)
                }
            };

            for (column, &idx) in staged.columns().iter().zip(&targets) {
                match column.status(row)? {
                    CellStatus::Valid => {
                        let dest = &mut self.columns[idx];
                        let value = column.get(row)?;
                        let value = value.cast(dest.dtype()).ok_or_else(|| Error::TypeMismatch {
                            column: column.name().to_string(),
                            expected: dest.dtype(),
                            found: value.storage_type().to_string(),
                        })?;
                        dest.set(target, value)?;
                    }
                    CellStatus::Cleared => self.columns[idx].clear(target)?,
                    CellStatus::Unset => {}
                }
            }

            self.changeset.push(if inserted {
                TableChange::RowInserted { index: target, key }
            } else {
                TableChange::RowUpdated { index: target, key }
            });
        }

        log::debug!("processed {} staged rows, store holds {}", staged.size(), self.size);
        Ok(())
    }

    fn get(&self, row: usize, column: &str) -> Result<ColumnValue> {
        let idx = self
            .schema
            .column_index(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))?;
        self.columns[idx].get(row)
    }

    fn find(&self, key: &PrimaryKey) -> Option<usize> {
        self.rows.get(key).copied()
    }

    fn drain_changes(&mut self) -> Vec<TableChange> {
        self.changeset.drain()
    }

    fn interner(&self) -> Rc<RefCell<StringInterner>> {
        Rc::clone(&self.interner)
    }
}
