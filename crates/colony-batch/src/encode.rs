//! Encoding of per-agent value lists into typed arrow arrays.
//!
//! The declared field type drives the encoding. `null` cells map to the
//! array's null representation; anything else that does not fit the type
//! fails with the offending agent index, value and type.

use std::sync::Arc;

use arrow_array::types::{
    Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};
use arrow_array::{
    Array, ArrayRef, ArrowPrimitiveType, BinaryArray, BooleanArray, FixedSizeBinaryArray,
    FixedSizeListArray, GenericListArray, LargeBinaryArray, LargeStringArray, NullArray,
    OffsetSizeTrait, PrimitiveArray, StringArray, StructArray,
};
use arrow_buffer::{NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow_schema::{DataType, Field, FieldRef, Fields};
use serde_json::Value;

use colony_core::EncodingError;

static NULL: Value = Value::Null;

/// A cell that failed to encode, positioned relative to the slice being
/// built. Nested builders lift the position back to the parent row.
#[derive(Debug)]
struct CellFault {
    index: usize,
    value: Value,
    data_type: DataType,
    reason: String,
}

impl CellFault {
    fn new(index: usize, value: &Value, data_type: &DataType, reason: impl Into<String>) -> Self {
        Self {
            index,
            value: value.clone(),
            data_type: data_type.clone(),
            reason: reason.into(),
        }
    }

    /// Map a child position to its parent row given the parent's offsets.
    fn lift(mut self, offsets: &[usize]) -> Self {
        self.index = offsets[1..].partition_point(|&end| end <= self.index);
        self
    }
}

/// Encode `values` as an array of `field`'s declared type.
pub fn encode_column(field: &Field, values: &[&Value]) -> Result<ArrayRef, EncodingError> {
    let fault_to_error = |fault: CellFault| EncodingError {
        field: field.name().clone(),
        agent_index: fault.index,
        value: fault.value,
        data_type: fault.data_type,
        reason: fault.reason,
    };
    if !field.is_nullable() {
        if let Some(index) = values.iter().position(|v| v.is_null()) {
            return Err(fault_to_error(CellFault::new(
                index,
                &NULL,
                field.data_type(),
                "null in non-nullable field",
            )));
        }
    }
    build_array(values, field.data_type()).map_err(fault_to_error)
}

fn build_array(values: &[&Value], data_type: &DataType) -> Result<ArrayRef, CellFault> {
    let array: ArrayRef = match data_type {
        DataType::Null => {
            if let Some(i) = values.iter().position(|v| !v.is_null()) {
                return Err(CellFault::new(i, values[i], data_type, "expected null"));
            }
            Arc::new(NullArray::new(values.len()))
        }
        DataType::Boolean => {
            let cells = collect(values, data_type, Value::as_bool, "expected a boolean")?;
            Arc::new(BooleanArray::from(cells))
        }
        DataType::Int8 => primitive::<Int8Type>(values, data_type, |v| int(v))?,
        DataType::Int16 => primitive::<Int16Type>(values, data_type, |v| int(v))?,
        DataType::Int32 => primitive::<Int32Type>(values, data_type, |v| int(v))?,
        DataType::Int64 => primitive::<Int64Type>(values, data_type, |v| int(v))?,
        DataType::UInt8 => primitive::<UInt8Type>(values, data_type, |v| int(v))?,
        DataType::UInt16 => primitive::<UInt16Type>(values, data_type, |v| int(v))?,
        DataType::UInt32 => primitive::<UInt32Type>(values, data_type, |v| int(v))?,
        DataType::UInt64 => primitive::<UInt64Type>(values, data_type, |v| int(v))?,
        DataType::Float32 => {
            primitive::<Float32Type>(values, data_type, |v| v.as_f64().map(|f| f as f32))?
        }
        DataType::Float64 => primitive::<Float64Type>(values, data_type, Value::as_f64)?,
        DataType::Utf8 => {
            let cells = collect(values, data_type, Value::as_str, "expected a string")?;
            Arc::new(StringArray::from(cells))
        }
        DataType::LargeUtf8 => {
            let cells = collect(values, data_type, Value::as_str, "expected a string")?;
            Arc::new(LargeStringArray::from(cells))
        }
        DataType::Binary => {
            let cells = collect(values, data_type, bytes, "expected an array of bytes")?;
            let refs: Vec<Option<&[u8]>> = cells.iter().map(|c| c.as_deref()).collect();
            Arc::new(BinaryArray::from(refs))
        }
        DataType::LargeBinary => {
            let cells = collect(values, data_type, bytes, "expected an array of bytes")?;
            let refs: Vec<Option<&[u8]>> = cells.iter().map(|c| c.as_deref()).collect();
            Arc::new(LargeBinaryArray::from(refs))
        }
        DataType::FixedSizeBinary(size) => {
            let width = *size as usize;
            let cells = collect(
                values,
                data_type,
                |v| bytes(v).filter(|b| b.len() == width),
                "expected an array of bytes of the declared width",
            )?;
            let array =
                FixedSizeBinaryArray::try_from_sparse_iter_with_size(cells.into_iter(), *size)
                    .map_err(|e| CellFault::new(0, &NULL, data_type, e.to_string()))?;
            Arc::new(array)
        }
        DataType::List(child) => list::<i32>(values, data_type, child)?,
        DataType::LargeList(child) => list::<i64>(values, data_type, child)?,
        DataType::FixedSizeList(child, size) => fixed_size_list(values, data_type, child, *size)?,
        DataType::Struct(fields) => structure(values, data_type, fields)?,
        other => {
            let first = values.first().copied().unwrap_or(&NULL);
            return Err(CellFault::new(0, first, other, "unsupported array type"));
        }
    };
    Ok(array)
}

fn collect<'v, T>(
    values: &[&'v Value],
    data_type: &DataType,
    convert: impl Fn(&'v Value) -> Option<T>,
    expected: &str,
) -> Result<Vec<Option<T>>, CellFault> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if v.is_null() {
                return Ok(None);
            }
            convert(v)
                .map(Some)
                .ok_or_else(|| CellFault::new(i, v, data_type, expected))
        })
        .collect()
}

fn primitive<T: ArrowPrimitiveType>(
    values: &[&Value],
    data_type: &DataType,
    convert: impl Fn(&Value) -> Option<T::Native>,
) -> Result<ArrayRef, CellFault> {
    let cells = collect(values, data_type, convert, "expected a number in range")?;
    Ok(Arc::new(cells.into_iter().collect::<PrimitiveArray<T>>()))
}

/// Integer conversion accepting integral floats (`3.0`) but nothing lossy.
fn int<N: TryFrom<i128>>(v: &Value) -> Option<N> {
    let wide = if let Some(i) = v.as_i64() {
        i as i128
    } else if let Some(u) = v.as_u64() {
        u as i128
    } else {
        let f = v.as_f64()?;
        if !f.is_finite() || f.fract() != 0.0 || f.abs() > 2f64.powi(64) {
            return None;
        }
        f as i128
    };
    N::try_from(wide).ok()
}

fn bytes(v: &Value) -> Option<Vec<u8>> {
    v.as_array()?
        .iter()
        .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
        .collect()
}

fn null_buffer(validity: Vec<bool>) -> Option<NullBuffer> {
    if validity.iter().all(|valid| *valid) {
        None
    } else {
        Some(NullBuffer::from(validity))
    }
}

/// Reject nulls inside a non-nullable child, reporting them at their row.
fn check_child_nulls(
    child: &ArrayRef,
    field: &Field,
    offsets: &[usize],
) -> Result<(), CellFault> {
    if field.is_nullable() || child.null_count() == 0 {
        return Ok(());
    }
    let first = (0..child.len()).find(|&i| child.is_null(i)).unwrap_or(0);
    Err(CellFault::new(
        first,
        &NULL,
        field.data_type(),
        format!("null in non-nullable field '{}'", field.name()),
    )
    .lift(offsets))
}

fn list<O: OffsetSizeTrait>(
    values: &[&Value],
    data_type: &DataType,
    child: &FieldRef,
) -> Result<ArrayRef, CellFault> {
    let mut offsets = Vec::with_capacity(values.len() + 1);
    offsets.push(0usize);
    let mut validity = Vec::with_capacity(values.len());
    let mut items: Vec<&Value> = Vec::new();
    for (i, v) in values.iter().enumerate() {
        match v {
            Value::Null => validity.push(false),
            Value::Array(cells) => {
                items.extend(cells.iter());
                validity.push(true);
            }
            other => return Err(CellFault::new(i, other, data_type, "expected an array")),
        }
        offsets.push(items.len());
    }
    let child_array = build_array(&items, child.data_type()).map_err(|f| f.lift(&offsets))?;
    check_child_nulls(&child_array, child, &offsets)?;

    let native: Vec<O> = offsets
        .iter()
        .map(|&o| O::from_usize(o))
        .collect::<Option<_>>()
        .ok_or_else(|| CellFault::new(0, &NULL, data_type, "list offsets overflow"))?;
    let array = GenericListArray::<O>::try_new(
        child.clone(),
        OffsetBuffer::new(ScalarBuffer::from(native)),
        child_array,
        null_buffer(validity),
    )
    .map_err(|e| CellFault::new(0, &NULL, data_type, e.to_string()))?;
    Ok(Arc::new(array))
}

fn fixed_size_list(
    values: &[&Value],
    data_type: &DataType,
    child: &FieldRef,
    size: i32,
) -> Result<ArrayRef, CellFault> {
    let width = size as usize;
    let mut validity = Vec::with_capacity(values.len());
    let mut items: Vec<&Value> = Vec::with_capacity(values.len() * width);
    for (i, v) in values.iter().enumerate() {
        match v {
            Value::Null => {
                items.extend(std::iter::repeat(&NULL).take(width));
                validity.push(false);
            }
            Value::Array(cells) if cells.len() == width => {
                items.extend(cells.iter());
                validity.push(true);
            }
            other => {
                return Err(CellFault::new(
                    i,
                    other,
                    data_type,
                    format!("expected an array of {width} items"),
                ))
            }
        }
    }
    let offsets: Vec<usize> = (0..=values.len()).map(|row| row * width).collect();
    let child_array = build_array(&items, child.data_type()).map_err(|f| f.lift(&offsets))?;
    let nulls = null_buffer(validity);
    if !child.is_nullable() && child_array.null_count() > 0 {
        // Null rows pad their slots with nulls; only nulls under valid rows count.
        for row in 0..values.len() {
            let row_valid = nulls.as_ref().map_or(true, |n| n.is_valid(row));
            if row_valid && (row * width..(row + 1) * width).any(|i| child_array.is_null(i)) {
                return Err(CellFault::new(
                    row,
                    &NULL,
                    child.data_type(),
                    format!("null in non-nullable field '{}'", child.name()),
                ));
            }
        }
    }
    let array = FixedSizeListArray::try_new(child.clone(), size, child_array, nulls)
        .map_err(|e| CellFault::new(0, &NULL, data_type, e.to_string()))?;
    Ok(Arc::new(array))
}

fn structure(
    values: &[&Value],
    data_type: &DataType,
    fields: &Fields,
) -> Result<ArrayRef, CellFault> {
    let mut validity = Vec::with_capacity(values.len());
    for (i, v) in values.iter().enumerate() {
        match v {
            Value::Null => validity.push(false),
            Value::Object(_) => validity.push(true),
            other => return Err(CellFault::new(i, other, data_type, "expected an object")),
        }
    }

    let mut children = Vec::with_capacity(fields.len());
    for field in fields.iter() {
        let cells: Vec<&Value> = values
            .iter()
            .map(|v| match v {
                Value::Object(map) => map.get(field.name()).unwrap_or(&NULL),
                _ => &NULL,
            })
            .collect();
        if !field.is_nullable() {
            let unmasked = cells
                .iter()
                .zip(&validity)
                .position(|(cell, valid)| *valid && cell.is_null());
            if let Some(row) = unmasked {
                return Err(CellFault::new(
                    row,
                    &NULL,
                    field.data_type(),
                    format!("null in non-nullable field '{}'", field.name()),
                ));
            }
        }
        children.push(build_array(&cells, field.data_type())?);
    }

    let array = StructArray::try_new(fields.clone(), children, null_buffer(validity))
        .map_err(|e| CellFault::new(0, &NULL, data_type, e.to_string()))?;
    Ok(Arc::new(array))
}
