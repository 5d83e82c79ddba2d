//! Colony: columnar agent-state synchronization for simulation workers.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Colony sub-crates. A worker syncs the host's shared segments into
//! versioned batches, exposes them to behavior code as per-agent views and
//! hands the touched columns back as [`batch::ChangeRecord`]s.
//!
//! # Quick start
//!
//! ```rust
//! use std::error::Error;
//!
//! use arrow_array::RecordBatch;
//! use arrow_schema::{DataType, Field, Schema, SchemaRef};
//! use colony::prelude::*;
//! use serde_json::{json, Value};
//!
//! // Host side: lay out one step's columns in a shared segment.
//! fn segment(
//!     schema: &SchemaRef,
//!     columns: &[Vec<Value>],
//! ) -> Result<SharedSegment, Box<dyn Error>> {
//!     let arrays = schema
//!         .fields()
//!         .iter()
//!         .zip(columns)
//!         .map(|(field, values)| {
//!             let cells: Vec<&Value> = values.iter().collect();
//!             encode_column(field, &cells)
//!         })
//!         .collect::<Result<Vec<_>, _>>()?;
//!     let batch = RecordBatch::try_new(schema.clone(), arrays)?;
//!     Ok(SegmentWriter::default().write(&batch, &[])?)
//! }
//!
//! let agent_schema: SchemaRef = std::sync::Arc::new(Schema::new(vec![
//!     Field::new("agent_id", DataType::FixedSizeBinary(16), false),
//!     Field::new("health", DataType::Int32, true),
//! ]));
//! let schema = GroupSchema::new(agent_schema.clone())?;
//! let ids: Vec<Value> = (0u8..2).map(|n| json!(vec![n; 16])).collect();
//! let agents = segment(&agent_schema, &[ids.clone(), vec![json!(10), json!(20)]])?;
//! let msgs = segment(schema.msg(), &[ids, vec![json!([]), json!([])]])?;
//! let descriptor = |id: &str, segment: SharedSegment| BatchDescriptor {
//!     id: BatchId::from(id),
//!     mem_version: MemVersion(1),
//!     batch_version: BatchVersion(1),
//!     segment,
//! };
//!
//! // Worker side: sync, run behavior code, flush.
//! let mut agent_batches = Batches::default();
//! let mut msg_batches = Batches::default();
//! let agent_batch = agent_batches.sync(&descriptor("agents", agents), schema.agent())?;
//! let msg_batch = msg_batches.sync(&descriptor("messages", msgs), schema.msg())?;
//! let mut group = GroupState::new(schema.clone(), agent_batch, msg_batch)?;
//! group.load("health")?;
//!
//! let mut agent = group.get_agent(1);
//! agent.modify("health", |hp| json!(hp.as_i64().unwrap_or(0) - 5))?;
//! agent.add_message("agent-0", "hit", &json!({"damage": 5}))?;
//! assert_eq!(agent.get("health")?, json!(15));
//!
//! let changes = group.flush_changes()?;
//! assert_eq!(changes.agent.len(), 1);
//! assert_eq!(changes.msg.len(), 1);
//! # Ok::<(), Box<dyn Error>>(())
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `colony-core` | IDs, version counters, error taxonomy |
//! | [`batch`] | `colony-batch` | Segments, vectors, batches, columns, flush encoding |
//! | [`state`] | `colony-state` | Group and agent views, accessors, messages |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Identifiers, version counters and errors (`colony-core`).
pub use colony_core as types;

/// Shared segments, versioned batches and column encoding (`colony-batch`).
///
/// [`batch::Batches`] is the per-worker registry; flushing yields
/// [`batch::ChangeRecord`]s carrying [`batch::FfiArrayData`].
pub use colony_batch as batch;

/// Behavior-facing views (`colony-state`).
///
/// [`state::GroupState`] binds one group's agent and message batches;
/// [`state::AgentState`] addresses a single row.
pub use colony_state as state;

/// Common imports for typical Colony usage.
///
/// ```rust
/// use colony::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use colony_core::{BatchId, BatchVersion, MemVersion, AGENT_ID_FIELD, MESSAGES_FIELD};

    // Errors
    pub use colony_core::{BatchError, EncodingError, FormatError, StateError};

    // Batches
    pub use colony_batch::{
        encode_column, Batch, BatchConfig, BatchDescriptor, Batches, ChangeRecord, FfiArrayData,
        SegmentWriter, SharedSegment,
    };

    // State
    pub use colony_state::{
        message_batch_schema, AgentState, GroupChanges, GroupSchema, GroupState, Getter, Message,
    };
}
