//! Decoding of single array cells into JSON-compatible values.
//!
//! Cells decode recursively: lists become arrays, structs become objects,
//! binary payloads become arrays of byte values. Non-finite floats decode
//! to `null`, matching what a JSON round trip would produce.

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};
use arrow_array::{Array, ArrayRef};
use arrow_schema::DataType;
use serde_json::{Map, Value};

use colony_core::BatchError;

/// Decode the cell at `index` of `array`.
pub fn decode_cell(array: &dyn Array, index: usize) -> Result<Value, BatchError> {
    if array.is_null(index) {
        return Ok(Value::Null);
    }
    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Bool(array.as_boolean().value(index)),
        DataType::Int8 => Value::from(array.as_primitive::<Int8Type>().value(index)),
        DataType::Int16 => Value::from(array.as_primitive::<Int16Type>().value(index)),
        DataType::Int32 => Value::from(array.as_primitive::<Int32Type>().value(index)),
        DataType::Int64 => Value::from(array.as_primitive::<Int64Type>().value(index)),
        DataType::UInt8 => Value::from(array.as_primitive::<UInt8Type>().value(index)),
        DataType::UInt16 => Value::from(array.as_primitive::<UInt16Type>().value(index)),
        DataType::UInt32 => Value::from(array.as_primitive::<UInt32Type>().value(index)),
        DataType::UInt64 => Value::from(array.as_primitive::<UInt64Type>().value(index)),
        DataType::Float32 => Value::from(array.as_primitive::<Float32Type>().value(index)),
        DataType::Float64 => Value::from(array.as_primitive::<Float64Type>().value(index)),
        DataType::Utf8 => Value::from(array.as_string::<i32>().value(index)),
        DataType::LargeUtf8 => Value::from(array.as_string::<i64>().value(index)),
        DataType::Binary => bytes_value(array.as_binary::<i32>().value(index)),
        DataType::LargeBinary => bytes_value(array.as_binary::<i64>().value(index)),
        DataType::FixedSizeBinary(_) => bytes_value(array.as_fixed_size_binary().value(index)),
        DataType::List(_) => list_value(&array.as_list::<i32>().value(index))?,
        DataType::LargeList(_) => list_value(&array.as_list::<i64>().value(index))?,
        DataType::FixedSizeList(_, _) => list_value(&array.as_fixed_size_list().value(index))?,
        DataType::Struct(_) => {
            let array = array.as_struct();
            let mut object = Map::with_capacity(array.num_columns());
            for (field, child) in array.fields().iter().zip(array.columns()) {
                object.insert(field.name().clone(), decode_cell(child.as_ref(), index)?);
            }
            Value::Object(object)
        }
        other => {
            return Err(BatchError::Decode {
                reason: format!("unsupported array type {other}"),
            })
        }
    };
    Ok(value)
}

/// Decode every cell of `array`.
pub fn decode_array(array: &dyn Array) -> Result<Vec<Value>, BatchError> {
    (0..array.len()).map(|i| decode_cell(array, i)).collect()
}

/// Parse the JSON string carried by an any-type cell.
///
/// Null cells stay null; anything that is not a string is returned as-is.
pub fn decode_any(raw: Value, field: &str, index: usize) -> Result<Value, BatchError> {
    match raw {
        Value::String(text) => serde_json::from_str(&text).map_err(|e| BatchError::Decode {
            reason: format!("field '{field}' row {index}: invalid JSON payload: {e}"),
        }),
        other => Ok(other),
    }
}

/// Render a 16-byte identifier in canonical hyphenated form.
pub fn uuid_to_str(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(36);
    for (i, b) in bytes.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn bytes_value(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
}

fn list_value(child: &ArrayRef) -> Result<Value, BatchError> {
    decode_array(child.as_ref()).map(Value::Array)
}
