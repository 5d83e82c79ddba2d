//! Test utilities for Colony development.
//!
//! Provides agent-id helpers, schema and record-batch builders that take
//! plain JSON values, and a [`StepHost`] that plays the host side of the
//! protocol: publishing segments, bumping versions and merging flushed
//! changes into the next step.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use serde_json::{json, Value};

use colony_batch::{encode_column, BatchDescriptor, ChangeRecord, SegmentWriter, SharedSegment};
use colony_core::{BatchId, BatchVersion, MemVersion, AGENT_ID_FIELD};

/// Deterministic 16-byte identifier for agent `n`.
pub fn agent_id_bytes(n: u32) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    bytes[0] = 0xA0;
    bytes[12..].copy_from_slice(&n.to_be_bytes());
    bytes
}

/// Agent `n`'s identifier as the JSON byte array stored in columns.
pub fn agent_id_value(n: u32) -> Value {
    json!(agent_id_bytes(n).to_vec())
}

/// Agent `n`'s identifier in canonical string form.
pub fn agent_id_str(n: u32) -> String {
    format!("a0000000-0000-0000-0000-{n:012x}")
}

/// The identity column every agent schema starts with.
pub fn agent_id_field() -> Field {
    Field::new(AGENT_ID_FIELD, DataType::FixedSizeBinary(16), false)
}

/// An agent schema: `agent_id` followed by `fields`, with the listed
/// any-type fields recorded in the metadata.
pub fn agent_schema(fields: Vec<Field>, any_type_fields: &[&str]) -> SchemaRef {
    let mut all = vec![agent_id_field()];
    all.extend(fields);
    let mut metadata = HashMap::new();
    if !any_type_fields.is_empty() {
        metadata.insert("any_type_fields".to_string(), any_type_fields.join(","));
    }
    Arc::new(Schema::new_with_metadata(all, metadata))
}

/// `{agent_id, health: Int32, tags: any}`.
pub fn scenario_schema() -> SchemaRef {
    agent_schema(
        vec![
            Field::new("health", DataType::Int32, true),
            Field::new("tags", DataType::Utf8, true),
        ],
        &["tags"],
    )
}

/// Three agents for [`scenario_schema`], columns in schema order.
pub fn scenario_columns() -> Vec<Vec<Value>> {
    vec![
        (0..3).map(agent_id_value).collect(),
        vec![json!(100), json!(80), json!(60)],
        vec![
            json!(json!(["scout"]).to_string()),
            json!(json!({"rank": 2, "squad": ["a", "b"]}).to_string()),
            json!("null"),
        ],
    ]
}

/// Build a record batch from per-field JSON columns.
///
/// # Panics
///
/// Panics if a value does not fit its field's type.
pub fn record_batch(schema: &SchemaRef, columns: &[Vec<Value>]) -> RecordBatch {
    let arrays: Vec<ArrayRef> = schema
        .fields()
        .iter()
        .zip(columns)
        .map(|(field, values)| {
            let refs: Vec<&Value> = values.iter().collect();
            encode_column(field, &refs).expect("fixture column fits its field")
        })
        .collect();
    RecordBatch::try_new(schema.clone(), arrays).expect("fixture batch is well-formed")
}

/// Encode per-field JSON columns into a shared segment.
pub fn segment(schema: &SchemaRef, columns: &[Vec<Value>]) -> SharedSegment {
    SegmentWriter::default()
        .write(&record_batch(schema, columns), &[])
        .expect("fixture segment encodes")
}

/// Build a descriptor from raw parts.
pub fn descriptor(id: &str, mem: u64, batch: u64, segment: SharedSegment) -> BatchDescriptor {
    BatchDescriptor {
        id: BatchId::from(id),
        mem_version: MemVersion(mem),
        batch_version: BatchVersion(batch),
        segment,
    }
}

/// Simulated host owning the canonical copy of one batch.
///
/// Each [`publish`](StepHost::publish) writes a fresh segment and bumps
/// both versions, like a host that reallocates every step.
pub struct StepHost {
    id: BatchId,
    schema: SchemaRef,
    batch: RecordBatch,
    mem_version: u64,
    batch_version: u64,
    segment: Option<SharedSegment>,
}

impl StepHost {
    pub fn new(id: &str, schema: SchemaRef, columns: &[Vec<Value>]) -> Self {
        let batch = record_batch(&schema, columns);
        Self {
            id: BatchId::from(id),
            schema,
            batch,
            mem_version: 0,
            batch_version: 0,
            segment: None,
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Write the canonical batch into a new segment and describe it.
    pub fn publish(&mut self) -> BatchDescriptor {
        self.mem_version += 1;
        self.batch_version += 1;
        let segment = SegmentWriter::default()
            .write(&self.batch, &[])
            .expect("canonical batch encodes");
        self.segment = Some(segment.clone());
        self.current()
    }

    /// Describe the current segment again without any change.
    pub fn current(&self) -> BatchDescriptor {
        BatchDescriptor {
            id: self.id.clone(),
            mem_version: MemVersion(self.mem_version),
            batch_version: BatchVersion(self.batch_version),
            segment: self.segment.clone().expect("published at least once"),
        }
    }

    /// Merge flushed columns into the canonical batch.
    pub fn merge(&mut self, changes: &[ChangeRecord]) {
        let mut columns = self.batch.columns().to_vec();
        for change in changes {
            let field = self.schema.field(change.field_index);
            columns[change.field_index] = change
                .data
                .to_array(field.data_type())
                .expect("flushed data matches the declared type");
        }
        self.batch = RecordBatch::try_new(self.schema.clone(), columns)
            .expect("merged batch is well-formed");
    }
}
