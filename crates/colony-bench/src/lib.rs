//! Benchmark profiles for the Colony agent-state layer.
//!
//! - [`reference_profile`]: 10K agents with a mix of scalar, string and
//!   any-type fields, plus empty outboxes
//! - [`Profile::segments`]: encode the profile into host segments

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{ArrowError, DataType, Field, Schema, SchemaRef};
use serde_json::{json, Value};

use colony_batch::{encode_column, BatchDescriptor, SegmentWriter, SharedSegment};
use colony_core::{BatchId, BatchVersion, MemVersion, AGENT_ID_FIELD};
use colony_state::message_batch_schema;

/// Column values for one group, laid out field by field.
pub struct Profile {
    /// Layout of the agent batch.
    pub agent_schema: SchemaRef,
    /// Layout of the message batch.
    pub msg_schema: SchemaRef,
    /// Agent values, one list per agent field.
    pub agent_columns: Vec<Vec<Value>>,
    /// Message values: ids and empty outboxes.
    pub msg_columns: Vec<Vec<Value>>,
}

/// Build a profile of `n` agents.
///
/// Fields: `agent_id`, `health: Int32`, `speed: Float64`, `name: Utf8`,
/// `memory: any`, `_PRIVATE_0_behaviors: Utf8`.
pub fn reference_profile(n: usize) -> Profile {
    let metadata = HashMap::from([("any_type_fields".to_string(), "memory".to_string())]);
    let agent_schema = Arc::new(Schema::new_with_metadata(
        vec![
            Field::new(AGENT_ID_FIELD, DataType::FixedSizeBinary(16), false),
            Field::new("health", DataType::Int32, true),
            Field::new("speed", DataType::Float64, true),
            Field::new("name", DataType::Utf8, true),
            Field::new("memory", DataType::Utf8, true),
            Field::new("_PRIVATE_0_behaviors", DataType::Utf8, true),
        ],
        metadata,
    ));
    let ids: Vec<Value> = (0..n)
        .map(|i| {
            let mut id = [0u8; 16];
            id[8..].copy_from_slice(&(i as u64).to_be_bytes());
            json!(id.to_vec())
        })
        .collect();
    let agent_columns = vec![
        ids.clone(),
        (0..n).map(|i| json!((i % 100) as i32)).collect(),
        (0..n).map(|i| json!(i as f64 * 0.5)).collect(),
        (0..n).map(|i| json!(format!("agent-{i}"))).collect(),
        (0..n)
            .map(|i| json!(json!({"seen": [i, i + 1], "mood": "calm"}).to_string()))
            .collect(),
        (0..n).map(|_| json!("[\"move\",\"eat\"]")).collect(),
    ];
    let msg_columns = vec![ids, (0..n).map(|_| json!([])).collect()];
    Profile {
        agent_schema,
        msg_schema: message_batch_schema(),
        agent_columns,
        msg_columns,
    }
}

impl Profile {
    /// Encode the agent and message batches as step-1 descriptors.
    pub fn segments(&self) -> Result<(BatchDescriptor, BatchDescriptor), ArrowError> {
        let agents = encode_segment(&self.agent_schema, &self.agent_columns)?;
        let msgs = encode_segment(&self.msg_schema, &self.msg_columns)?;
        Ok((descriptor("agents", agents), descriptor("messages", msgs)))
    }
}

fn descriptor(id: &str, segment: SharedSegment) -> BatchDescriptor {
    BatchDescriptor {
        id: BatchId::from(id),
        mem_version: MemVersion(1),
        batch_version: BatchVersion(1),
        segment,
    }
}

fn encode_segment(schema: &SchemaRef, columns: &[Vec<Value>]) -> Result<SharedSegment, ArrowError> {
    let arrays = schema
        .fields()
        .iter()
        .zip(columns)
        .map(|(field, values)| {
            let cells: Vec<&Value> = values.iter().collect();
            encode_column(field, &cells)
                .map_err(|e| ArrowError::InvalidArgumentError(e.to_string()))
        })
        .collect::<Result<Vec<ArrayRef>, _>>()?;
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    SegmentWriter::default().write(&batch, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_profile_encodes() {
        let profile = reference_profile(16);
        let (agents, msgs) = profile.segments().unwrap();
        assert!(agents.segment.markers().is_ok());
        assert!(msgs.segment.markers().is_ok());
    }
}
