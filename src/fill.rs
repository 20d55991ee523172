//! Column filling with in-place promotion.
//!
//! Values are pulled from the accessor one row at a time and written into a
//! column of the staging table. A write that does not fit the current type
//! either widens the column and retries the same row (INT32 overflow to
//! FLOAT64), or turns it into STRING and refills it from row 0 so earlier
//! numeric cells are re-expressed as text.

use crate::accessor::DataAccessor;
use crate::column::{Column, ColumnValue, PromotionTrigger, StorageType};
use crate::data_table::DataTable;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::value::InputValue;

/// Outcome of writing one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Stored,
    Promote(PromotionTrigger),
}

/// Fills column `name` of `table` from accessor column `cidx` and returns the
/// column's final storage type.
///
/// Nulls become unset cells in update mode and cleared cells otherwise.
pub fn fill_column(
    table: &mut DataTable,
    accessor: &dyn DataAccessor,
    name: &str,
    cidx: usize,
    dtype: StorageType,
    is_update: bool,
    diagnostics: &dyn Diagnostics,
) -> Result<StorageType> {
    let mut dtype = dtype;
    let nrows = accessor.row_count();
    let mut ridx = 0;

    while ridx < nrows {
        let value = accessor.marshal(cidx, ridx, dtype)?;
        // Promotion swaps the column's storage, so look it up on every row.
        let column = table.get_column_mut(name)?;

        let Some(value) = value else {
            if is_update {
                column.unset(ridx)?;
            } else {
                column.clear(ridx)?;
            }
            ridx += 1;
            continue;
        };

        let trigger = match write_cell(column, ridx, &value)? {
            WriteOutcome::Stored => {
                ridx += 1;
                continue;
            }
            WriteOutcome::Promote(trigger) => trigger,
        };

        let next = next_type(name, dtype, trigger)?;

        if next == StorageType::String {
            diagnostics.warn(&format!(
                "Column '{}' holds non-numeric value '{}' at row {}, storing as string",
                name, value, ridx
            ));
            table.promote_column(name, next, 0, false)?;
            ridx = 0;
        } else {
            table.promote_column(name, next, ridx, true)?;
        }
        dtype = next;
    }

    Ok(dtype)
}

fn next_type(name: &str, dtype: StorageType, trigger: PromotionTrigger) -> Result<StorageType> {
    dtype.promote(trigger).ok_or_else(|| Error::InvalidPromotion {
        column: name.to_string(),
        from: dtype,
        to: trigger.target(),
    })
}

/// Coerces `value` to the column's current type and stores it, or reports
/// which promotion would let it fit.
///
/// Integer columns take fractional numbers truncated toward zero, so `2.5`
/// is stored in an INT32 column as `2`.
pub fn write_cell(column: &mut Column, row: usize, value: &InputValue) -> Result<WriteOutcome> {
    let dtype = column.dtype();
    let coerced = match dtype {
        StorageType::None => {
            column.clear(row)?;
            return Ok(WriteOutcome::Stored);
        }
        StorageType::Bool => value.to_bool().map(ColumnValue::Bool),
        StorageType::Int8 => in_range(value, i8::MIN as f64, i8::MAX as f64).map(|f| ColumnValue::Int8(f as i8)),
        StorageType::Int16 => in_range(value, i16::MIN as f64, i16::MAX as f64).map(|f| ColumnValue::Int16(f as i16)),
        StorageType::Int32 => match value.to_f64() {
            None => return Ok(WriteOutcome::Promote(PromotionTrigger::NotANumber)),
            Some(f) if f.is_nan() => return Ok(WriteOutcome::Promote(PromotionTrigger::NotANumber)),
            Some(f) if f < i32::MIN as f64 || f > i32::MAX as f64 => {
                return Ok(WriteOutcome::Promote(PromotionTrigger::Overflow))
            }
            Some(f) => Some(ColumnValue::Int32(truncated(column, row, f) as i32)),
        },
        StorageType::Int64 => match (value, value.to_f64()) {
            (InputValue::Int(i), _) => Some(ColumnValue::Int64(*i)),
            (_, Some(f)) if !f.is_nan() => Some(ColumnValue::Int64(truncated(column, row, f) as i64)),
            _ => return Ok(WriteOutcome::Promote(PromotionTrigger::NotANumber)),
        },
        StorageType::Float32 => value.to_f64().map(|f| ColumnValue::Float32(f as f32)),
        StorageType::Float64 => value.to_f64().map(ColumnValue::Float64),
        StorageType::String => Some(ColumnValue::String(value.to_string())),
        StorageType::Date => match value {
            InputValue::Date(d) => Some(ColumnValue::Date(*d)),
            InputValue::DateTime(dt) => Some(ColumnValue::Date(dt.date())),
            _ => None,
        },
        StorageType::Time => match value {
            InputValue::Date(_) | InputValue::DateTime(_) => value.to_millis().map(ColumnValue::Time),
            InputValue::Int(ms) => Some(ColumnValue::Time(*ms)),
            InputValue::Float(ms) if ms.is_finite() => Some(ColumnValue::Time(*ms as i64)),
            _ => None,
        },
    };

    match coerced {
        Some(v) => {
            column.set(row, v)?;
            Ok(WriteOutcome::Stored)
        }
        None => Err(Error::Coercion {
            column: column.name().to_string(),
            row,
            expected: dtype,
        }),
    }
}

fn truncated(column: &Column, row: usize, f: f64) -> f64 {
    if f.fract() != 0.0 {
        log::debug!("truncating {} to fit {} column '{}' at row {}", f, column.dtype(), column.name(), row);
    }
    f.trunc()
}

fn in_range(value: &InputValue, lo: f64, hi: f64) -> Option<f64> {
    value.to_f64().filter(|f| *f >= lo && *f <= hi)
}
