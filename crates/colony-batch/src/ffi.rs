//! Cross-boundary array transfer structures.
//!
//! [`FfiArrayData`] mirrors the arrow physical layout closely enough for the
//! host to adopt the buffers without copying: a validity bitmap, one values
//! buffer for fixed-width types, an offsets buffer plus a values buffer for
//! variable-length types, and recursive child data for lists and structs.
//! It is a transfer view only; nothing here retains the data after the
//! host has merged it.

use arrow_array::{make_array, Array, ArrayRef};
use arrow_buffer::Buffer;
use arrow_data::ArrayData;
use arrow_schema::{ArrowError, DataType};

/// Array payload handed across the worker/host boundary.
#[derive(Clone, Debug)]
pub struct FfiArrayData {
    /// Number of logical slots.
    pub len: usize,
    /// Number of null slots.
    pub null_count: usize,
    /// Validity bitmap, absent when no slot is null.
    pub null_bits: Option<Buffer>,
    /// Offsets and/or values buffers in arrow order.
    pub buffers: Vec<Buffer>,
    /// Children of nested types, in field order.
    pub child_data: Vec<FfiArrayData>,
}

impl FfiArrayData {
    /// Build the transfer view of `array`.
    pub fn from_array(array: &dyn Array) -> Self {
        Self::from_array_data(&array.to_data())
    }

    /// Build the transfer view of raw arrow array data.
    pub fn from_array_data(data: &ArrayData) -> Self {
        Self {
            len: data.len(),
            null_count: data.null_count(),
            null_bits: data.nulls().map(|nulls| nulls.inner().sliced()),
            buffers: data.buffers().to_vec(),
            child_data: data.child_data().iter().map(Self::from_array_data).collect(),
        }
    }

    /// Rebuild arrow array data of type `data_type` from the transfer view.
    ///
    /// This is the host-side half of the exchange; buffers are shared, not
    /// copied.
    pub fn to_array_data(&self, data_type: &DataType) -> Result<ArrayData, ArrowError> {
        let child_types = child_types(data_type);
        if child_types.len() != self.child_data.len() {
            return Err(ArrowError::InvalidArgumentError(format!(
                "{data_type} expects {} children, transfer carries {}",
                child_types.len(),
                self.child_data.len()
            )));
        }
        let children = self
            .child_data
            .iter()
            .zip(&child_types)
            .map(|(child, ty)| child.to_array_data(ty))
            .collect::<Result<Vec<_>, _>>()?;
        ArrayData::builder(data_type.clone())
            .len(self.len)
            .null_bit_buffer(self.null_bits.clone())
            .buffers(self.buffers.clone())
            .child_data(children)
            .build()
    }

    /// Rebuild a typed arrow array from the transfer view.
    pub fn to_array(&self, data_type: &DataType) -> Result<ArrayRef, ArrowError> {
        self.to_array_data(data_type).map(make_array)
    }
}

fn child_types(data_type: &DataType) -> Vec<DataType> {
    match data_type {
        DataType::List(child) | DataType::LargeList(child) | DataType::FixedSizeList(child, _) => {
            vec![child.data_type().clone()]
        }
        DataType::Struct(fields) => fields.iter().map(|f| f.data_type().clone()).collect(),
        DataType::Map(entries, _) => vec![entries.data_type().clone()],
        _ => Vec::new(),
    }
}

/// One flushed column: the schema position of the field and its data.
#[derive(Clone, Debug)]
pub struct ChangeRecord {
    /// Index of the field in the batch schema.
    pub field_index: usize,
    /// The encoded column.
    pub data: FfiArrayData,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::types::Int64Type;
    use arrow_array::{Int64Array, ListArray, StringArray};

    use super::*;

    #[test]
    fn fixed_width_has_single_values_buffer() {
        let array = Int64Array::from(vec![Some(1), None, Some(3)]);
        let data = FfiArrayData::from_array(&array);
        assert_eq!(data.len, 3);
        assert_eq!(data.null_count, 1);
        assert!(data.null_bits.is_some());
        assert_eq!(data.buffers.len(), 1);
        assert!(data.child_data.is_empty());
    }

    #[test]
    fn variable_width_has_offsets_and_values() {
        let array = StringArray::from(vec!["ab", "c"]);
        let data = FfiArrayData::from_array(&array);
        assert_eq!(data.buffers.len(), 2);
        assert!(data.null_bits.is_none());
    }

    #[test]
    fn lists_recurse_into_children() {
        let array = ListArray::from_iter_primitive::<Int64Type, _, _>(vec![
            Some(vec![Some(1), Some(2)]),
            None,
        ]);
        let data = FfiArrayData::from_array(&array);
        assert_eq!(data.buffers.len(), 1);
        assert_eq!(data.child_data.len(), 1);
        assert_eq!(data.child_data[0].len, 2);

        let rebuilt = data.to_array(array.data_type()).unwrap();
        assert_eq!(rebuilt.as_ref(), &array as &dyn Array);
    }

    #[test]
    fn child_count_mismatch_is_rejected() {
        let data = FfiArrayData::from_array(&Int64Array::from(vec![1]));
        let item = arrow_schema::Field::new("item", DataType::Int64, true);
        let list = DataType::List(Arc::new(item));
        assert!(data.to_array_data(&list).is_err());
    }
}
