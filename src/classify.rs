/// Scalar type classification
///
/// Maps one input value to the storage type a column would get if that value
/// were its first non-null sample. Checks run in a fixed precedence and
/// the first match wins; nothing here fails, unknown shapes become STRING.

use crate::column::StorageType;
use crate::date::DateParser;
use crate::value::{parse_bool, InputValue};

/// Integers at or above this magnitude are sampled as FLOAT64.
pub const INT32_SAMPLE_LIMIT: f64 = 10_000.0;

pub fn classify(value: &InputValue, date_parser: &dyn DateParser) -> StorageType {
    match value {
        InputValue::Null => StorageType::None,
        InputValue::Bool(_) => StorageType::Bool,
        InputValue::Int(i) => classify_integer(*i as f64),
        InputValue::Float(_) => StorageType::Float64,
        InputValue::DateTime(_) => StorageType::Time,
        InputValue::Date(_) => StorageType::Date,
        InputValue::Str(s) => {
            if date_parser.is_valid(s) {
                StorageType::Time
            } else if parse_bool(s).is_some() {
                StorageType::Bool
            } else {
                StorageType::String
            }
        }
        InputValue::Other(_) => StorageType::String,
    }
}

/// Small non-zero whole numbers are INT32; zero and large magnitudes are
/// kept as FLOAT64 so that a later wide value does not force a promotion.
fn classify_integer(x: f64) -> StorageType {
    if x != 0.0 && x.fract() == 0.0 && x.abs() < INT32_SAMPLE_LIMIT {
        StorageType::Int32
    } else {
        StorageType::Float64
    }
}
