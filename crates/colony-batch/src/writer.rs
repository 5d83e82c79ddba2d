//! Host-side segment encoding.
//!
//! [`SegmentWriter`] lays a record batch out in the shared-segment format
//! the vector loader consumes. Workers never call it on the hot path; it
//! exists for hosts embedding this crate, for replaying flushed changes
//! into the next step, and for fixtures.

use arrow_array::RecordBatch;
use arrow_ipc::writer::{DictionaryTracker, IpcDataGenerator, IpcWriteOptions};
use arrow_schema::ArrowError;

use crate::markers::{Markers, MARKERS_LEN};
use crate::segment::SharedSegment;
use crate::vector::CONTINUATION_MARKER;

/// Encodes record batches into marker-delimited shared segments.
#[derive(Clone, Debug, Default)]
pub struct SegmentWriter {
    options: IpcWriteOptions,
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

impl SegmentWriter {
    /// Create a writer with explicit IPC options.
    pub fn new(options: IpcWriteOptions) -> Self {
        Self { options }
    }

    /// Encode `batch`, placing `header` in the header region.
    ///
    /// Dictionary-encoded columns are not supported.
    pub fn write(&self, batch: &RecordBatch, header: &[u8]) -> Result<SharedSegment, ArrowError> {
        let generator = IpcDataGenerator::default();
        let mut tracker = DictionaryTracker::new(false);
        let schema_message = generator.schema_to_bytes_with_dictionary_tracker(
            batch.schema().as_ref(),
            &mut tracker,
            &self.options,
        );
        let (dictionaries, encoded) = generator.encoded_batch(batch, &mut tracker, &self.options)?;
        if !dictionaries.is_empty() {
            return Err(ArrowError::NotYetImplemented(
                "dictionary-encoded columns in shared segments".to_string(),
            ));
        }

        let schema_offset = MARKERS_LEN;
        let schema_size = schema_message.ipc_message.len();
        let header_offset = align8(schema_offset + schema_size);
        let header_size = header.len();
        let meta_offset = align8(header_offset + header_size);
        let flatbuffer_len = align8(encoded.ipc_message.len());
        let meta_size = 8 + flatbuffer_len;
        let data_offset = meta_offset + meta_size;
        let data_size = encoded.arrow_data.len();
        let markers = Markers {
            schema_offset,
            schema_size,
            header_offset,
            header_size,
            meta_offset,
            meta_size,
            data_offset,
            data_size,
        };
        let meta_len = i32::try_from(flatbuffer_len).map_err(|_| {
            ArrowError::InvalidArgumentError(format!(
                "metadata of {flatbuffer_len} bytes too large"
            ))
        })?;

        let mut bytes = vec![0u8; data_offset + data_size];
        bytes[..MARKERS_LEN].copy_from_slice(&markers.to_bytes());
        bytes[schema_offset..schema_offset + schema_size]
            .copy_from_slice(&schema_message.ipc_message);
        bytes[header_offset..header_offset + header_size].copy_from_slice(header);
        bytes[meta_offset..meta_offset + 4].copy_from_slice(&CONTINUATION_MARKER.to_le_bytes());
        bytes[meta_offset + 4..meta_offset + 8].copy_from_slice(&meta_len.to_le_bytes());
        let fb_start = meta_offset + 8;
        bytes[fb_start..fb_start + encoded.ipc_message.len()].copy_from_slice(&encoded.ipc_message);
        bytes[data_offset..].copy_from_slice(&encoded.arrow_data);
        Ok(SharedSegment::from_vec(bytes))
    }
}
