//! Column materialization: vectors → mutable per-agent value lists.
//!
//! Two decode strategies exist:
//!
//! - **Full:** every cell is decoded up front into a `Vec<Value>`. Used for
//!   the fields behavior code works with directly.
//! - **Shallow:** the column keeps its backing vector and decodes cells on
//!   read. Writes are kept as per-row overrides. Used for hidden/private
//!   fields that are read rarely or passed through opaquely.
//!
//! Both strategies JSON-parse the cells of any-type fields.

use std::borrow::Cow;
use std::collections::BTreeMap;

use arrow_array::ArrayRef;
use indexmap::IndexMap;
use serde_json::Value;

use colony_core::BatchError;

use crate::cell::{decode_any, decode_cell};
use crate::vector::Vector;

/// A loader strategy turning a vector into a column.
pub type ColumnLoader = fn(&Vector) -> Result<Column, BatchError>;

/// Explicit loader strategies keyed by field name.
pub type Loaders = IndexMap<String, ColumnLoader>;

/// Which decode strategy produced a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Fully decoded values.
    Full,
    /// Backing vector plus lazily decoded cells.
    Shallow,
}

#[derive(Clone, Debug)]
enum Cells {
    Full(Vec<Value>),
    Shallow {
        vector: ArrayRef,
        is_any: bool,
        overrides: BTreeMap<usize, Value>,
    },
}

/// Mutable, materialized per-agent values of one field.
#[derive(Clone, Debug)]
pub struct Column {
    field: String,
    cells: Cells,
}

impl Column {
    /// A fully decoded column.
    pub fn full(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            cells: Cells::Full(values),
        }
    }

    /// A shallow column over `vector`'s array.
    pub fn shallow(vector: &Vector) -> Self {
        Self {
            field: vector.name().to_string(),
            cells: Cells::Shallow {
                vector: vector.array().clone(),
                is_any: vector.is_any(),
                overrides: BTreeMap::new(),
            },
        }
    }

    /// Name of the field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The decode strategy.
    pub fn kind(&self) -> ColumnKind {
        match self.cells {
            Cells::Full(_) => ColumnKind::Full,
            Cells::Shallow { .. } => ColumnKind::Shallow,
        }
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        match &self.cells {
            Cells::Full(values) => values.len(),
            Cells::Shallow { vector, .. } => vector.len(),
        }
    }

    /// Whether the column has no agents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, index: usize) -> Result<(), BatchError> {
        if index < self.len() {
            Ok(())
        } else {
            Err(BatchError::IndexOutOfRange {
                field: self.field.clone(),
                index,
                len: self.len(),
            })
        }
    }

    /// The value at `index`, borrowed where the column already holds it.
    pub fn cell(&self, index: usize) -> Result<Cow<'_, Value>, BatchError> {
        self.check(index)?;
        match &self.cells {
            Cells::Full(values) => Ok(Cow::Borrowed(&values[index])),
            Cells::Shallow {
                vector,
                is_any,
                overrides,
            } => match overrides.get(&index) {
                Some(value) => Ok(Cow::Borrowed(value)),
                None => decode_shallow(vector, *is_any, &self.field, index).map(Cow::Owned),
            },
        }
    }

    /// Mutable access to the value at `index`, decoding it first if needed.
    pub fn cell_mut(&mut self, index: usize) -> Result<&mut Value, BatchError> {
        self.check(index)?;
        match &mut self.cells {
            Cells::Full(values) => Ok(&mut values[index]),
            Cells::Shallow {
                vector,
                is_any,
                overrides,
            } => {
                if !overrides.contains_key(&index) {
                    let decoded = decode_shallow(vector, *is_any, &self.field, index)?;
                    overrides.insert(index, decoded);
                }
                overrides
                    .get_mut(&index)
                    .ok_or_else(|| BatchError::IndexOutOfRange {
                        field: self.field.clone(),
                        index,
                        len: vector.len(),
                    })
            }
        }
    }

    /// Replace the value at `index`.
    pub fn set(&mut self, index: usize, value: Value) -> Result<(), BatchError> {
        self.check(index)?;
        match &mut self.cells {
            Cells::Full(values) => values[index] = value,
            Cells::Shallow { overrides, .. } => {
                overrides.insert(index, value);
            }
        }
        Ok(())
    }

    /// Every value in agent order.
    pub fn values(&self) -> Result<Vec<Cow<'_, Value>>, BatchError> {
        (0..self.len()).map(|i| self.cell(i)).collect()
    }

    /// The untouched backing array of a shallow column with no writes.
    ///
    /// Flushing such a column re-emits its wire data as-is.
    pub fn passthrough(&self) -> Option<&ArrayRef> {
        match &self.cells {
            Cells::Shallow {
                vector, overrides, ..
            } if overrides.is_empty() => Some(vector),
            _ => None,
        }
    }
}

fn decode_shallow(
    vector: &ArrayRef,
    is_any: bool,
    field: &str,
    index: usize,
) -> Result<Value, BatchError> {
    let raw = decode_cell(vector.as_ref(), index)?;
    if is_any {
        decode_any(raw, field, index)
    } else {
        Ok(raw)
    }
}

/// Decode every cell of `vector` up front.
pub fn load_full(vector: &Vector) -> Result<Column, BatchError> {
    let array = vector.array();
    let values = (0..array.len())
        .map(|i| decode_shallow(array, vector.is_any(), vector.name(), i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Column::full(vector.name(), values))
}

/// Keep `vector` as the backing store and decode cells lazily.
pub fn load_shallow(vector: &Vector) -> Result<Column, BatchError> {
    Ok(Column::shallow(vector))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::{Int32Array, StringArray};
    use arrow_schema::{DataType, Field};
    use serde_json::json;

    use super::*;

    fn int_vector() -> Vector {
        Vector::new(
            Arc::new(Field::new("health", DataType::Int32, true)),
            Arc::new(Int32Array::from(vec![Some(5), None, Some(7)])),
            false,
        )
    }

    fn any_vector() -> Vector {
        Vector::new(
            Arc::new(Field::new("tags", DataType::Utf8, true)),
            Arc::new(StringArray::from(vec!["[1,2]", "{\"k\":true}"])),
            true,
        )
    }

    #[test]
    fn full_load_decodes_every_cell() {
        let col = load_full(&int_vector()).unwrap();
        assert_eq!(col.kind(), ColumnKind::Full);
        let values: Vec<Value> = col.values().unwrap().into_iter().map(Cow::into_owned).collect();
        assert_eq!(values, vec![json!(5), Value::Null, json!(7)]);
        assert!(col.passthrough().is_none());
    }

    #[test]
    fn shallow_load_decodes_on_read() {
        let mut col = load_shallow(&int_vector()).unwrap();
        assert_eq!(col.kind(), ColumnKind::Shallow);
        assert!(col.passthrough().is_some());
        assert_eq!(col.cell(2).unwrap().into_owned(), json!(7));

        col.set(0, json!(99)).unwrap();
        assert!(col.passthrough().is_none());
        assert_eq!(col.cell(0).unwrap().into_owned(), json!(99));
        assert_eq!(col.cell(2).unwrap().into_owned(), json!(7));
    }

    #[test]
    fn any_cells_are_parsed_by_both_strategies() {
        let full = load_full(&any_vector()).unwrap();
        let shallow = load_shallow(&any_vector()).unwrap();
        for col in [full, shallow] {
            assert_eq!(col.cell(0).unwrap().into_owned(), json!([1, 2]));
            assert_eq!(col.cell(1).unwrap().into_owned(), json!({"k": true}));
        }
    }

    #[test]
    fn cell_mut_materializes_shallow_cell() {
        let mut col = load_shallow(&any_vector()).unwrap();
        col.cell_mut(0)
            .unwrap()
            .as_array_mut()
            .unwrap()
            .push(json!(3));
        assert_eq!(col.cell(0).unwrap().into_owned(), json!([1, 2, 3]));
    }

    #[test]
    fn out_of_range_index_is_reported() {
        let mut col = load_full(&int_vector()).unwrap();
        let err = col.set(3, json!(1)).unwrap_err();
        assert_eq!(
            err,
            BatchError::IndexOutOfRange {
                field: "health".into(),
                index: 3,
                len: 3
            }
        );
        assert!(col.cell(10).is_err());
    }
}
