//! Vector loading: columnar wire message → zero-copy typed column views.
//!
//! The metadata+data range of a segment holds one encapsulated arrow IPC
//! record-batch message:
//!
//! ```text
//! [ 0xFFFFFFFF | len: i32 LE | flatbuffer (len bytes, padded) | body ]
//! ```
//!
//! A legacy prefix without the continuation marker is also accepted.
//! Decoded arrays point into the segment's buffer wherever alignment allows.

use std::collections::{HashMap, HashSet};

use arrow_array::{Array, ArrayRef};
use arrow_buffer::Buffer;
use arrow_ipc::reader::read_record_batch;
use arrow_schema::{DataType, FieldRef, Schema, SchemaRef};
use indexmap::IndexMap;

use colony_core::BatchError;

use crate::segment::SharedSegment;

/// IPC continuation marker preceding the metadata length.
pub const CONTINUATION_MARKER: u32 = 0xFFFF_FFFF;

/// Typed, zero-copy view of one field's column.
#[derive(Clone, Debug)]
pub struct Vector {
    field: FieldRef,
    array: ArrayRef,
    is_any: bool,
}

impl Vector {
    /// Wrap a decoded array.
    pub fn new(field: FieldRef, array: ArrayRef, is_any: bool) -> Self {
        Self {
            field,
            array,
            is_any,
        }
    }

    /// Name of the field.
    pub fn name(&self) -> &str {
        self.field.name()
    }

    /// The schema field this vector was decoded for.
    pub fn field(&self) -> &FieldRef {
        &self.field
    }

    /// Declared type of the column.
    pub fn data_type(&self) -> &DataType {
        self.field.data_type()
    }

    /// The decoded array.
    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    /// Whether cells carry JSON-encoded heterogeneous values.
    pub fn is_any(&self) -> bool {
        self.is_any
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }
}

/// Decoded vectors keyed by field name, in schema order.
pub type Vectors = IndexMap<String, Vector>;

/// Names listed under `key` in the schema metadata.
pub fn any_type_fields(schema: &Schema, key: &str) -> HashSet<String> {
    schema
        .metadata()
        .get(key)
        .map(|names| {
            names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn decode_error(reason: impl Into<String>) -> BatchError {
    BatchError::Decode {
        reason: reason.into(),
    }
}

/// Split the encapsulation prefix; returns `(prefix_len, metadata_len)`.
fn read_prefix(bytes: &[u8]) -> Result<(usize, usize), BatchError> {
    let word = |at: usize| -> Result<[u8; 4], BatchError> {
        bytes
            .get(at..at + 4)
            .and_then(|w| w.try_into().ok())
            .ok_or_else(|| decode_error("message prefix truncated"))
    };
    let first = word(0)?;
    let (prefix, len) = if u32::from_le_bytes(first) == CONTINUATION_MARKER {
        (8, i32::from_le_bytes(word(4)?))
    } else {
        (4, i32::from_le_bytes(first))
    };
    match usize::try_from(len) {
        Ok(0) => Err(decode_error("empty message (end-of-stream marker)")),
        Ok(len) => Ok((prefix, len)),
        Err(_) => Err(decode_error(format!("negative metadata length {len}"))),
    }
}

/// Decode one record-batch message into vectors matching `schema`.
///
/// Fields named in the schema's `any_type_key` metadata are tagged
/// `is_any`. Never returns a partial result.
pub fn load(
    message: &Buffer,
    schema: &SchemaRef,
    any_type_key: &str,
) -> Result<Vectors, BatchError> {
    let bytes = message.as_slice();
    let (prefix, meta_len) = read_prefix(bytes)?;
    let meta_end = prefix
        .checked_add(meta_len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| decode_error("metadata length exceeds region"))?;

    let ipc_message = arrow_ipc::root_as_message(&bytes[prefix..meta_end])
        .map_err(|e| decode_error(format!("invalid message flatbuffer: {e}")))?;
    let header = ipc_message
        .header_as_record_batch()
        .ok_or_else(|| decode_error("message is not a record batch"))?;
    let body_len = usize::try_from(ipc_message.bodyLength())
        .map_err(|_| decode_error("negative body length"))?;
    if meta_end
        .checked_add(body_len)
        .map_or(true, |end| end > bytes.len())
    {
        return Err(decode_error(format!(
            "body of {body_len} bytes exceeds region of {} bytes",
            bytes.len() - meta_end
        )));
    }
    let body = message.slice_with_length(meta_end, body_len);

    let batch = read_record_batch(
        &body,
        header,
        schema.clone(),
        &HashMap::new(),
        None,
        &ipc_message.version(),
    )
    .map_err(|e| decode_error(e.to_string()))?;

    let any = any_type_fields(schema, any_type_key);
    let vectors = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, array)| {
            let is_any = any.contains(field.name());
            (
                field.name().clone(),
                Vector::new(field.clone(), array.clone(), is_any),
            )
        })
        .collect();
    Ok(vectors)
}

/// Validate the segment's markers and decode its metadata+data range.
pub fn load_from_segment(
    segment: &SharedSegment,
    schema: &SchemaRef,
    any_type_key: &str,
) -> Result<Vectors, BatchError> {
    let markers = segment.markers()?;
    let range = markers.message_range()?;
    let message = segment.slice(range.start, range.len());
    load(&message, schema, any_type_key)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::Field;

    use super::*;

    fn schema_with(meta: Option<&str>) -> Schema {
        let mut metadata = HashMap::new();
        if let Some(names) = meta {
            metadata.insert("any_type_fields".to_string(), names.to_string());
        }
        Schema::new_with_metadata(
            vec![
                Field::new("a", DataType::Utf8, true),
                Field::new("b", DataType::Utf8, true),
            ],
            metadata,
        )
    }

    #[test]
    fn any_type_fields_split_on_commas() {
        let set = any_type_fields(&schema_with(Some("a, b,,")), "any_type_fields");
        assert!(set.contains("a"));
        assert!(set.contains("b"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn missing_metadata_means_no_any_fields() {
        assert!(any_type_fields(&schema_with(None), "any_type_fields").is_empty());
    }

    #[test]
    fn truncated_prefix_is_a_decode_error() {
        let schema = Arc::new(schema_with(None));
        let err = load(&Buffer::from_vec(vec![0xFFu8; 5]), &schema, "any_type_fields").unwrap_err();
        assert!(matches!(err, BatchError::Decode { .. }));
    }

    #[test]
    fn end_of_stream_marker_is_rejected() {
        let schema = Arc::new(schema_with(None));
        let mut bytes = CONTINUATION_MARKER.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0i32.to_le_bytes());
        let err = load(&Buffer::from_vec(bytes), &schema, "any_type_fields").unwrap_err();
        assert!(matches!(err, BatchError::Decode { .. }));
    }

    #[test]
    fn oversized_metadata_length_is_rejected() {
        let schema = Arc::new(schema_with(None));
        let mut bytes = CONTINUATION_MARKER.to_le_bytes().to_vec();
        bytes.extend_from_slice(&1024i32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(load(&Buffer::from_vec(bytes), &schema, "any_type_fields").is_err());
    }
}
