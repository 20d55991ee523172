/// LivePivot Column Implementation
///
/// A Column is a dense, positionally indexed run of cells that all share one
/// `StorageType`, plus a `CellStatus` per cell. The backing vector is a
/// tagged variant (`ColumnData`) so every dispatch on the storage type is an
/// exhaustive `match`.
///
/// # String Interning
///
/// STRING cells hold IDs into the table's shared `StringInterner`. A cell owns
/// one reference on its ID while it holds one; clearing, overwriting and
/// dropping the column give the reference back.
///
/// # Examples
///
/// ```
/// use livepivot::{Column, ColumnValue, StorageType, StringInterner};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let pool = Rc::new(RefCell::new(StringInterner::new()));
/// let mut col = Column::new("qty", StorageType::Int32, true, pool);
/// col.extend(2);
/// col.set(0, ColumnValue::Int32(7)).unwrap();
///
/// assert_eq!(col.get(0).unwrap(), ColumnValue::Int32(7));
/// assert!(col.get(1).unwrap().is_null());
///
/// // Widen in place, carrying row 0 forward
/// col.promote(StorageType::Float64, 1, true).unwrap();
/// assert_eq!(col.get(0).unwrap(), ColumnValue::Float64(7.0));
/// ```

use crate::date::{date_to_millis, format_date, format_timestamp, millis_to_datetime};
use crate::error::{Error, Result};
use crate::interner::{StringId, StringInterner};
use chrono::NaiveDate;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Canonical column representation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    None,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Date,
    Time,
}

/// Reason a write could not be stored in the current representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionTrigger {
    /// Numeric value outside the representable range
    Overflow,
    /// Value is not a number under numeric coercion
    NotANumber,
}

impl PromotionTrigger {
    /// Type a column moves to when this trigger fires.
    pub fn target(self) -> StorageType {
        match self {
            PromotionTrigger::Overflow => StorageType::Float64,
            PromotionTrigger::NotANumber => StorageType::String,
        }
    }
}

impl StorageType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            StorageType::Int8 | StorageType::Int16 | StorageType::Int32 | StorageType::Int64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, StorageType::Float32 | StorageType::Float64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Name shown to users in table schemas.
    pub fn type_name(self) -> &'static str {
        match self {
            StorageType::None => "none",
            StorageType::Bool => "boolean",
            StorageType::Int8 | StorageType::Int16 | StorageType::Int32 | StorageType::Int64 => "integer",
            StorageType::Float32 | StorageType::Float64 => "float",
            StorageType::String => "string",
            StorageType::Date => "date",
            StorageType::Time => "datetime",
        }
    }

    /// Promotion state machine. Only two edges exist: an overflowing INT32
    /// widens to FLOAT64, and a non-numeric value in INT32/INT64 falls back to
    /// STRING. STRING is terminal.
    pub fn promote(self, trigger: PromotionTrigger) -> Option<StorageType> {
        let allowed = match trigger {
            PromotionTrigger::Overflow => self == StorageType::Int32,
            PromotionTrigger::NotANumber => matches!(self, StorageType::Int32 | StorageType::Int64),
        };
        allowed.then(|| trigger.target())
    }

    /// True when a column of this type may be replaced by `other` without
    /// losing information, as happens when merging an update's schema.
    pub fn can_widen_to(self, other: StorageType) -> bool {
        self == other
            || self == StorageType::None
            || matches!(
                (self, other),
                (StorageType::Int32, StorageType::Float64)
                    | (StorageType::Int32 | StorageType::Int64, StorageType::String)
            )
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageType::None => "none",
            StorageType::Bool => "bool",
            StorageType::Int8 => "int8",
            StorageType::Int16 => "int16",
            StorageType::Int32 => "int32",
            StorageType::Int64 => "int64",
            StorageType::Float32 => "float32",
            StorageType::Float64 => "float64",
            StorageType::String => "string",
            StorageType::Date => "date",
            StorageType::Time => "time",
        };
        f.write_str(name)
    }
}

/// Validity marker of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    Valid,
    /// Null with no prior value (fresh load)
    Cleared,
    /// Null that leaves any prior value in place (update)
    Unset,
}

/// Owned value read out of (or written into) a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Date(NaiveDate),
    /// Milliseconds since the Unix epoch
    Time(i64),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            ColumnValue::Null => StorageType::None,
            ColumnValue::Bool(_) => StorageType::Bool,
            ColumnValue::Int8(_) => StorageType::Int8,
            ColumnValue::Int16(_) => StorageType::Int16,
            ColumnValue::Int32(_) => StorageType::Int32,
            ColumnValue::Int64(_) => StorageType::Int64,
            ColumnValue::Float32(_) => StorageType::Float32,
            ColumnValue::Float64(_) => StorageType::Float64,
            ColumnValue::String(_) => StorageType::String,
            ColumnValue::Date(_) => StorageType::Date,
            ColumnValue::Time(_) => StorageType::Time,
        }
    }

    /// Numeric view of integer and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Int8(v) => Some(*v as f64),
            ColumnValue::Int16(v) => Some(*v as f64),
            ColumnValue::Int32(v) => Some(*v as f64),
            ColumnValue::Int64(v) => Some(*v as f64),
            ColumnValue::Float32(v) => Some(*v as f64),
            ColumnValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::Int8(v) => Some(*v as i64),
            ColumnValue::Int16(v) => Some(*v as i64),
            ColumnValue::Int32(v) => Some(*v as i64),
            ColumnValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ColumnValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ColumnValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Converts to `target` when the conversion is a widening one. Any value
    /// converts to STRING through its canonical rendering.
    pub fn cast(&self, target: StorageType) -> Option<ColumnValue> {
        if self.is_null() {
            return Some(ColumnValue::Null);
        }
        if self.storage_type() == target {
            return Some(self.clone());
        }

        let integral = |lo: f64, hi: f64| {
            self.as_f64().filter(|f| f.fract() == 0.0 && *f >= lo && *f <= hi)
        };

        match target {
            StorageType::None => Some(ColumnValue::Null),
            StorageType::Bool => None,
            StorageType::Int8 => integral(i8::MIN as f64, i8::MAX as f64).map(|f| ColumnValue::Int8(f as i8)),
            StorageType::Int16 => integral(i16::MIN as f64, i16::MAX as f64).map(|f| ColumnValue::Int16(f as i16)),
            StorageType::Int32 => integral(i32::MIN as f64, i32::MAX as f64).map(|f| ColumnValue::Int32(f as i32)),
            StorageType::Int64 => self
                .as_i64()
                .or_else(|| integral(i64::MIN as f64, i64::MAX as f64).map(|f| f as i64))
                .map(ColumnValue::Int64),
            StorageType::Float32 => self.as_f64().map(|f| ColumnValue::Float32(f as f32)),
            StorageType::Float64 => self.as_f64().map(ColumnValue::Float64),
            StorageType::String => Some(ColumnValue::String(self.to_string())),
            StorageType::Date => match self {
                ColumnValue::Time(ms) => millis_to_datetime(*ms).map(|dt| ColumnValue::Date(dt.date())),
                _ => None,
            },
            StorageType::Time => match self {
                ColumnValue::Date(d) => Some(ColumnValue::Time(date_to_millis(*d))),
                _ => None,
            },
        }
    }
}

/// Canonical rendering, used when a column falls back to STRING.
impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => Ok(()),
            ColumnValue::Bool(v) => write!(f, "{}", v),
            ColumnValue::Int8(v) => write!(f, "{}", v),
            ColumnValue::Int16(v) => write!(f, "{}", v),
            ColumnValue::Int32(v) => write!(f, "{}", v),
            ColumnValue::Int64(v) => write!(f, "{}", v),
            ColumnValue::Float32(v) => write!(f, "{}", v),
            ColumnValue::Float64(v) => write!(f, "{}", v),
            ColumnValue::String(v) => f.write_str(v),
            ColumnValue::Date(d) => f.write_str(&format_date(*d)),
            ColumnValue::Time(ms) => f.write_str(&format_timestamp(*ms)),
        }
    }
}

/// Backing storage, one variant per `StorageType`.
#[derive(Debug, Clone, PartialEq)]
enum ColumnData {
    /// NONE columns carry no values, only a length
    None(usize),
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    /// `Some` while the cell holds a reference on the ID
    String(Vec<Option<StringId>>),
    Date(Vec<NaiveDate>),
    Time(Vec<i64>),
}

impl ColumnData {
    fn with_len(dtype: StorageType, len: usize) -> Self {
        match dtype {
            StorageType::None => ColumnData::None(len),
            StorageType::Bool => ColumnData::Bool(vec![false; len]),
            StorageType::Int8 => ColumnData::Int8(vec![0; len]),
            StorageType::Int16 => ColumnData::Int16(vec![0; len]),
            StorageType::Int32 => ColumnData::Int32(vec![0; len]),
            StorageType::Int64 => ColumnData::Int64(vec![0; len]),
            StorageType::Float32 => ColumnData::Float32(vec![0.0; len]),
            StorageType::Float64 => ColumnData::Float64(vec![0.0; len]),
            StorageType::String => ColumnData::String(vec![None; len]),
            StorageType::Date => ColumnData::Date(vec![NaiveDate::default(); len]),
            StorageType::Time => ColumnData::Time(vec![0; len]),
        }
    }

    fn storage_type(&self) -> StorageType {
        match self {
            ColumnData::None(_) => StorageType::None,
            ColumnData::Bool(_) => StorageType::Bool,
            ColumnData::Int8(_) => StorageType::Int8,
            ColumnData::Int16(_) => StorageType::Int16,
            ColumnData::Int32(_) => StorageType::Int32,
            ColumnData::Int64(_) => StorageType::Int64,
            ColumnData::Float32(_) => StorageType::Float32,
            ColumnData::Float64(_) => StorageType::Float64,
            ColumnData::String(_) => StorageType::String,
            ColumnData::Date(_) => StorageType::Date,
            ColumnData::Time(_) => StorageType::Time,
        }
    }

    fn extend(&mut self, n: usize) {
        match self {
            ColumnData::None(len) => *len += n,
            ColumnData::Bool(v) => v.resize(v.len() + n, false),
            ColumnData::Int8(v) => v.resize(v.len() + n, 0),
            ColumnData::Int16(v) => v.resize(v.len() + n, 0),
            ColumnData::Int32(v) => v.resize(v.len() + n, 0),
            ColumnData::Int64(v) => v.resize(v.len() + n, 0),
            ColumnData::Float32(v) => v.resize(v.len() + n, 0.0),
            ColumnData::Float64(v) => v.resize(v.len() + n, 0.0),
            ColumnData::String(v) => v.resize(v.len() + n, None),
            ColumnData::Date(v) => v.resize(v.len() + n, NaiveDate::default()),
            ColumnData::Time(v) => v.resize(v.len() + n, 0),
        }
    }
}

pub struct Column {
    name: String,
    nullable: bool,
    data: ColumnData,
    status: Vec<CellStatus>,
    interner: Rc<RefCell<StringInterner>>,
}

impl Column {
    /// Creates an empty column. Use [`Column::extend`] to allocate rows.
    pub fn new(
        name: impl Into<String>,
        dtype: StorageType,
        nullable: bool,
        interner: Rc<RefCell<StringInterner>>,
    ) -> Self {
        Column {
            name: name.into(),
            nullable,
            data: ColumnData::with_len(dtype, 0),
            status: Vec::new(),
            interner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> StorageType {
        self.data.storage_type()
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn len(&self) -> usize {
        self.status.len()
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_empty()
    }

    pub fn interner(&self) -> &Rc<RefCell<StringInterner>> {
        &self.interner
    }

    /// Appends `n` cleared cells.
    pub fn extend(&mut self, n: usize) {
        self.data.extend(n);
        self.status.resize(self.status.len() + n, CellStatus::Cleared);
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.len() {
            return Err(Error::RowOutOfRange { row, len: self.len() });
        }
        Ok(())
    }

    pub fn status(&self, row: usize) -> Result<CellStatus> {
        self.check_row(row)?;
        Ok(self.status[row])
    }

    pub fn is_valid(&self, row: usize) -> bool {
        self.status.get(row) == Some(&CellStatus::Valid)
    }

    /// Reads a cell. Cleared and unset cells read as `Null`.
    pub fn get(&self, row: usize) -> Result<ColumnValue> {
        self.check_row(row)?;
        if self.status[row] != CellStatus::Valid {
            return Ok(ColumnValue::Null);
        }

        let value = match &self.data {
            ColumnData::None(_) => ColumnValue::Null,
            ColumnData::Bool(v) => ColumnValue::Bool(v[row]),
            ColumnData::Int8(v) => ColumnValue::Int8(v[row]),
            ColumnData::Int16(v) => ColumnValue::Int16(v[row]),
            ColumnData::Int32(v) => ColumnValue::Int32(v[row]),
            ColumnData::Int64(v) => ColumnValue::Int64(v[row]),
            ColumnData::Float32(v) => ColumnValue::Float32(v[row]),
            ColumnData::Float64(v) => ColumnValue::Float64(v[row]),
            // Cells not carried across a promotion read as null until rewritten
            ColumnData::String(v) => match v[row] {
                Some(id) => self
                    .interner
                    .borrow()
                    .resolve(id)
                    .map(|s| ColumnValue::String(s.to_string()))
                    .unwrap_or(ColumnValue::Null),
                None => ColumnValue::Null,
            },
            ColumnData::Date(v) => ColumnValue::Date(v[row]),
            ColumnData::Time(v) => ColumnValue::Time(v[row]),
        };
        Ok(value)
    }

    /// Fast numeric read for valid numeric cells.
    pub fn get_f64(&self, row: usize) -> Option<f64> {
        if !self.is_valid(row) {
            return None;
        }
        match &self.data {
            ColumnData::Int8(v) => Some(v[row] as f64),
            ColumnData::Int16(v) => Some(v[row] as f64),
            ColumnData::Int32(v) => Some(v[row] as f64),
            ColumnData::Int64(v) => Some(v[row] as f64),
            ColumnData::Float32(v) => Some(v[row] as f64),
            ColumnData::Float64(v) => Some(v[row]),
            _ => None,
        }
    }

    /// Writes a value whose variant matches the column type. `Null` clears.
    pub fn set(&mut self, row: usize, value: ColumnValue) -> Result<()> {
        self.check_row(row)?;
        if value.is_null() {
            return self.clear(row);
        }

        match (&mut self.data, value) {
            (ColumnData::Bool(v), ColumnValue::Bool(x)) => v[row] = x,
            (ColumnData::Int8(v), ColumnValue::Int8(x)) => v[row] = x,
            (ColumnData::Int16(v), ColumnValue::Int16(x)) => v[row] = x,
            (ColumnData::Int32(v), ColumnValue::Int32(x)) => v[row] = x,
            (ColumnData::Int64(v), ColumnValue::Int64(x)) => v[row] = x,
            (ColumnData::Float32(v), ColumnValue::Float32(x)) => v[row] = x,
            (ColumnData::Float64(v), ColumnValue::Float64(x)) => v[row] = x,
            (ColumnData::String(v), ColumnValue::String(s)) => {
                let mut pool = self.interner.borrow_mut();
                let id = pool.intern(&s);
                if let Some(old) = v[row].replace(id) {
                    pool.release(old);
                }
            }
            (ColumnData::Date(v), ColumnValue::Date(x)) => v[row] = x,
            (ColumnData::Time(v), ColumnValue::Time(x)) => v[row] = x,
            (data, value) => {
                return Err(Error::TypeMismatch {
                    column: self.name.clone(),
                    expected: data.storage_type(),
                    found: value.storage_type().to_string(),
                })
            }
        }

        self.status[row] = CellStatus::Valid;
        Ok(())
    }

    /// Marks a cell null with no prior value.
    pub fn clear(&mut self, row: usize) -> Result<()> {
        self.check_row(row)?;
        self.release_cell(row);
        self.status[row] = CellStatus::Cleared;
        Ok(())
    }

    /// Marks a cell null while leaving room for a prior value.
    pub fn unset(&mut self, row: usize) -> Result<()> {
        self.check_row(row)?;
        self.release_cell(row);
        self.status[row] = CellStatus::Unset;
        Ok(())
    }

    fn release_cell(&mut self, row: usize) {
        if let ColumnData::String(v) = &mut self.data {
            if let Some(id) = v[row].take() {
                self.interner.borrow_mut().release(id);
            }
        }
    }

    /// Replaces the backing storage with one of type `to`.
    ///
    /// Length and every cell status are preserved. With `copy_existing`,
    /// valid cells before `from_row` are converted with [`ColumnValue::cast`];
    /// other cells keep their status but hold a default until rewritten.
    pub fn promote(&mut self, to: StorageType, from_row: usize, copy_existing: bool) -> Result<()> {
        let from = self.dtype();
        if from == to {
            return Ok(());
        }
        if from == StorageType::String {
            return Err(Error::InvalidPromotion {
                column: self.name.clone(),
                from,
                to,
            });
        }

        let mut carried = Vec::new();
        if copy_existing {
            for row in 0..from_row.min(self.len()) {
                if !self.is_valid(row) {
                    continue;
                }
                let value = self.get(row)?;
                let cast = value.cast(to).ok_or_else(|| Error::InvalidPromotion {
                    column: self.name.clone(),
                    from,
                    to,
                })?;
                carried.push((row, cast));
            }
        }

        log::debug!(
            "promoting column '{}' from {} to {} ({} cells carried)",
            self.name,
            from,
            to,
            carried.len()
        );

        self.data = ColumnData::with_len(to, self.len());
        for (row, value) in carried {
            self.set(row, value)?;
        }
        Ok(())
    }

    /// Copy of this column under another name, sharing the interner.
    pub fn clone_as(&self, name: impl Into<String>) -> Column {
        if let ColumnData::String(v) = &self.data {
            let mut pool = self.interner.borrow_mut();
            for id in v.iter().flatten() {
                pool.add_ref(*id);
            }
        }
        Column {
            name: name.into(),
            nullable: self.nullable,
            data: self.data.clone(),
            status: self.status.clone(),
            interner: Rc::clone(&self.interner),
        }
    }

    pub fn iter(&self) -> ColumnIterator<'_> {
        ColumnIterator { column: self, index: 0 }
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if let ColumnData::String(v) = &self.data {
            if let Ok(mut pool) = self.interner.try_borrow_mut() {
                for id in v.iter().flatten() {
                    pool.release(*id);
                }
            }
        }
    }
}

pub struct ColumnIterator<'a> {
    column: &'a Column,
    index: usize,
}

impl<'a> Iterator for ColumnIterator<'a> {
    type Item = ColumnValue;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.column.get(self.index).ok()?;
        self.index += 1;
        Some(value)
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Column {{ name: '{}', type: {}, nullable: {}, len: {} }}",
            self.name,
            self.dtype(),
            self.nullable,
            self.len()
        )
    }
}
